//! Quartz event tap backend.
//!
//! The tap is created at the session level, inserted at the head of the delivery
//! chain, and lives on its own thread with its own run loop. Creating it requires the
//! Accessibility permission (System Settings > Privacy & Security > Accessibility).

use std::{
    ffi::c_void,
    ptr,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicPtr, Ordering},
    },
    thread,
    time::Duration,
};

use core_foundation::{
    base::TCFType,
    boolean::CFBoolean,
    dictionary::CFDictionary,
    runloop::{CFRunLoop, kCFRunLoopCommonModes, kCFRunLoopDefaultMode},
    string::CFString,
};
use core_foundation_sys::{
    dictionary::CFDictionaryRef,
    mach_port::{CFMachPortInvalidate, CFMachPortRef},
};
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions,
    CGEventTapPlacement, CGEventType, EventField,
};

use crate::{
    error::{Error, Result},
    keyboard_hook::KeyboardHook,
    permission::PermissionGate,
    policy::{AllowList, Decision, EventKind, KeyCode, KeyEvent, Modifiers},
};

#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    fn AXIsProcessTrustedWithOptions(options: CFDictionaryRef) -> bool;
    fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);
}

/// How long the tap thread's run loop sleeps before checking for a stop request.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Accessibility trust check (`AXIsProcessTrustedWithOptions`).
#[derive(Debug, Default, Clone, Copy)]
pub struct AccessibilityPermission;

impl PermissionGate for AccessibilityPermission {
    fn is_granted(&self, prompt: bool) -> bool {
        let key = CFString::new("AXTrustedCheckOptionPrompt");
        let value = if prompt {
            CFBoolean::true_value()
        } else {
            CFBoolean::false_value()
        };
        let options = CFDictionary::from_CFType_pairs(&[(key.as_CFType(), value.as_CFType())]);

        unsafe { AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef()) }
    }
}

/// Installs a `CGEventTap` that swallows blocked keyboard events.
#[derive(Debug, Default)]
pub struct EventTapHook;

/// A running event tap and the thread that services it.
#[derive(Debug)]
pub struct EventTapHandle {
    stop: Arc<AtomicBool>,
    thread: thread::JoinHandle<()>,
}

impl KeyboardHook for EventTapHook {
    type Handle = EventTapHandle;

    fn install(&mut self, policy: AllowList) -> Result<EventTapHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let (result_tx, result_rx) = oneshot::channel::<Result<()>>();

        let thread_stop = Arc::clone(&stop);
        let thread = thread::spawn(move || run_event_tap(policy, thread_stop, result_tx));

        match result_rx.recv() {
            Ok(Ok(())) => Ok(EventTapHandle { stop, thread }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(Error::HookThreadCrashed),
        }
    }

    fn uninstall(&mut self, handle: EventTapHandle) {
        handle.stop.store(true, Ordering::SeqCst);

        if handle.thread.join().is_err() {
            #[cfg(feature = "log")]
            log::error!("event tap thread panicked");
        }
    }
}

fn run_event_tap(
    policy: AllowList,
    stop: Arc<AtomicBool>,
    result_tx: oneshot::Sender<Result<()>>,
) {
    // Filled in once the tap exists, so the callback can turn it back on.
    let tap_port = Arc::new(AtomicPtr::<c_void>::new(ptr::null_mut()));
    let callback_port = Arc::clone(&tap_port);

    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::Default,
        vec![
            CGEventType::KeyDown,
            CGEventType::KeyUp,
            CGEventType::FlagsChanged,
        ],
        move |_proxy, event_type, event| {
            if disabled_by_timeout(event_type) {
                let port = callback_port.load(Ordering::SeqCst);
                if !port.is_null() {
                    #[cfg(feature = "log")]
                    log::warn!("event tap disabled by timeout, re-enabling");
                    unsafe { CGEventTapEnable(port as CFMachPortRef, true) };
                }
                return Some(event.to_owned());
            }

            let Some(key_event) = key_event(event_type, event) else {
                return Some(event.to_owned());
            };

            match policy.classify(&key_event) {
                Decision::Allow => Some(event.to_owned()),
                Decision::Block => {
                    #[cfg(feature = "log")]
                    log::trace!("blocked keyboard event: {:?}", key_event);
                    None
                }
            }
        },
    );

    let tap = match tap {
        Ok(tap) => tap,
        Err(_) => {
            let _ = result_tx.send(Err(Error::HookCreationFailed(std::io::Error::other(
                "the window server refused to create the event tap",
            ))));
            return;
        }
    };

    let source = match tap.mach_port.create_runloop_source(0) {
        Ok(source) => source,
        Err(_) => {
            let _ = result_tx.send(Err(Error::HookCreationFailed(std::io::Error::other(
                "failed to create a run loop source for the event tap",
            ))));
            return;
        }
    };

    let port = tap.mach_port.as_concrete_TypeRef();
    tap_port.store(port as *mut c_void, Ordering::SeqCst);

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }
    tap.enable();

    let _ = result_tx.send(Ok(()));

    #[cfg(feature = "log")]
    log::debug!("event tap running");

    while !stop.load(Ordering::SeqCst) {
        unsafe {
            CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, STOP_POLL_INTERVAL, false);
        }
    }

    tap_port.store(ptr::null_mut(), Ordering::SeqCst);
    unsafe {
        CGEventTapEnable(port, false);
        run_loop.remove_source(&source, kCFRunLoopCommonModes);
        CFMachPortInvalidate(port);
    }

    #[cfg(feature = "log")]
    log::debug!("event tap stopped");
}

/// The window server switches a tap off when its callback is too slow; it has to be
/// switched back on or keyboard input flows again while the hook is still installed.
fn disabled_by_timeout(event_type: CGEventType) -> bool {
    matches!(event_type, CGEventType::TapDisabledByTimeout)
}

/// Translates a tapped Quartz event into a [`KeyEvent`].
///
/// Returns `None` for events that are not keyboard input, such as the notifications
/// the window server sends when it disables a tap.
fn key_event(event_type: CGEventType, event: &CGEvent) -> Option<KeyEvent> {
    let kind = match event_type {
        CGEventType::KeyDown => EventKind::KeyDown,
        CGEventType::KeyUp => EventKind::KeyUp,
        CGEventType::FlagsChanged => EventKind::ModifiersChanged,
        _ => return None,
    };

    let key_code = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE);

    Some(KeyEvent {
        kind,
        key_code: u32::try_from(key_code).ok().map(KeyCode),
        modifiers: modifiers(event.get_flags()),
    })
}

fn modifiers(flags: CGEventFlags) -> Modifiers {
    [
        (CGEventFlags::CGEventFlagCommand, Modifiers::COMMAND),
        (CGEventFlags::CGEventFlagControl, Modifiers::CONTROL),
        (CGEventFlags::CGEventFlagAlternate, Modifiers::ALT),
        (CGEventFlags::CGEventFlagShift, Modifiers::SHIFT),
    ]
    .into_iter()
    .filter(|(flag, _)| flags.contains(*flag))
    .fold(Modifiers::NONE, |held, (_, modifier)| held | modifier)
}
