//! `WH_KEYBOARD_LL` backend.
//!
//! The hook is registered from a dedicated thread that pumps messages for as long as
//! the hook is installed. Low-level keyboard hooks need no special privilege.

use std::{cell::OnceCell, thread};

use windows::{
    Win32::{
        Foundation::{LPARAM, LRESULT, WPARAM},
        System::{LibraryLoader::GetModuleHandleW, Threading::GetCurrentThreadId},
        UI::{
            Input::KeyboardAndMouse::{
                GetAsyncKeyState, VIRTUAL_KEY, VK_CONTROL, VK_LCONTROL, VK_LMENU, VK_LSHIFT,
                VK_LWIN, VK_MENU, VK_RCONTROL, VK_RMENU, VK_RSHIFT, VK_RWIN, VK_SHIFT,
            },
            WindowsAndMessaging::{
                CallNextHookEx, DispatchMessageW, GetMessageW, HC_ACTION, HHOOK, HOOKPROC,
                KBDLLHOOKSTRUCT, MSG, PM_NOREMOVE, PeekMessageW, PostThreadMessageW,
                SetWindowsHookExW, TranslateMessage, WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP,
                WM_QUIT, WM_SYSKEYDOWN, WM_SYSKEYUP, WM_USER,
            },
        },
    },
    core::Owned,
};

use crate::{
    error::{Error, Result},
    keyboard_hook::KeyboardHook,
    permission::PermissionGate,
    policy::{AllowList, Decision, EventKind, KeyCode, KeyEvent, Modifiers},
};

thread_local! {
    static HOOK_POLICY: OnceCell<AllowList> = const { OnceCell::new() };
}

/// Low-level keyboard hooks are available to every desktop process.
#[derive(Debug, Default, Clone, Copy)]
pub struct LowLevelHookPermission;

impl PermissionGate for LowLevelHookPermission {
    fn is_granted(&self, _prompt: bool) -> bool {
        true
    }
}

/// Installs a `WH_KEYBOARD_LL` hook that swallows blocked keyboard events.
#[derive(Debug, Default)]
pub struct LowLevelHook;

/// The thread that owns the registered hook and pumps its messages.
#[derive(Debug)]
pub struct HookThread {
    thread_id: u32,
    thread: thread::JoinHandle<()>,
}

impl KeyboardHook for LowLevelHook {
    type Handle = HookThread;

    fn install(&mut self, policy: AllowList) -> Result<HookThread> {
        let (result_tx, result_rx) = oneshot::channel::<Result<u32>>();

        let thread = thread::spawn(move || run_hook_thread(policy, result_tx));

        match result_rx.recv() {
            Ok(Ok(thread_id)) => Ok(HookThread { thread_id, thread }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(Error::HookThreadCrashed),
        }
    }

    fn uninstall(&mut self, handle: HookThread) {
        let posted =
            unsafe { PostThreadMessageW(handle.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) };

        if let Err(_e) = posted {
            // The thread is already gone, which also means the hook is.
            #[cfg(feature = "log")]
            log::warn!("failed to stop the keyboard hook thread: {}", _e);
        }

        if handle.thread.join().is_err() {
            #[cfg(feature = "log")]
            log::error!("keyboard hook thread panicked");
        }
    }
}

fn run_hook_thread(policy: AllowList, result_tx: oneshot::Sender<Result<u32>>) {
    HOOK_POLICY.with(|p| {
        let _ = p.set(policy);
    });

    let mut msg = MSG::default();

    // Forces creation of this thread's message queue so WM_QUIT can be posted to it.
    let _ = unsafe { PeekMessageW(&mut msg, None, WM_USER, WM_USER, PM_NOREMOVE) };

    let hook_result = unsafe { register_keyboard_hook(Some(low_level_keyboard_proc)) };

    let _hook_handle = match hook_result {
        Err(e) => {
            let _ = result_tx.send(Err(Error::HookCreationFailed(e)));
            return;
        }
        Ok(handle) => {
            let thread_id = unsafe { GetCurrentThreadId() };
            let _ = result_tx.send(Ok(thread_id));
            handle
        }
    };

    #[cfg(feature = "log")]
    log::debug!("keyboard hook thread running");

    unsafe {
        while GetMessageW(&mut msg, None, 0, 0).into() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }

    #[cfg(feature = "log")]
    log::debug!("keyboard hook thread stopped");
}

unsafe extern "system" fn low_level_keyboard_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code == HC_ACTION as i32 {
        let kbd = unsafe { &*(l_param.0 as *const KBDLLHOOKSTRUCT) };

        if let Some(event) = key_event(kbd, w_param) {
            let decision = HOOK_POLICY
                .with(|p| p.get().map(|policy| policy.classify(&event)))
                .unwrap_or(Decision::Allow);

            if decision == Decision::Block {
                #[cfg(feature = "log")]
                log::trace!("blocked keyboard event: {:?}", event);

                // A non-zero result keeps the event from reaching any window.
                return LRESULT(1);
            }
        }
    }

    unsafe { CallNextHookEx(None, n_code, w_param, l_param) }
}

unsafe fn register_keyboard_hook(f: HOOKPROC) -> std::io::Result<Owned<HHOOK>> {
    let keyboard_hook = unsafe {
        SetWindowsHookExW(
            WH_KEYBOARD_LL,
            f,
            Some(GetModuleHandleW(None)?.into()),
            0,
        )
    }?;

    Ok(unsafe { Owned::new(keyboard_hook) })
}

/// Translates the hook's message and payload into a [`KeyEvent`].
///
/// Presses and releases of Ctrl, Alt, Shift and the Windows keys are reported as
/// modifier changes.
fn key_event(kbd: &KBDLLHOOKSTRUCT, w_param: WPARAM) -> Option<KeyEvent> {
    let vk = VIRTUAL_KEY(kbd.vkCode as u16);

    let kind = if is_modifier_key(vk) {
        EventKind::ModifiersChanged
    } else if w_param.0 == WM_KEYDOWN as usize || w_param.0 == WM_SYSKEYDOWN as usize {
        EventKind::KeyDown
    } else if w_param.0 == WM_KEYUP as usize || w_param.0 == WM_SYSKEYUP as usize {
        EventKind::KeyUp
    } else {
        return None;
    };

    Some(KeyEvent {
        kind,
        key_code: Some(KeyCode(kbd.vkCode)),
        modifiers: held_modifiers(),
    })
}

fn is_modifier_key(vk: VIRTUAL_KEY) -> bool {
    matches!(
        vk,
        VK_LWIN
            | VK_RWIN
            | VK_CONTROL
            | VK_LCONTROL
            | VK_RCONTROL
            | VK_MENU
            | VK_LMENU
            | VK_RMENU
            | VK_SHIFT
            | VK_LSHIFT
            | VK_RSHIFT
    )
}

fn held_modifiers() -> Modifiers {
    let mut held = Modifiers::NONE;
    if is_down(VK_LWIN) || is_down(VK_RWIN) {
        held = held | Modifiers::COMMAND;
    }
    if is_down(VK_CONTROL) {
        held = held | Modifiers::CONTROL;
    }
    if is_down(VK_MENU) {
        held = held | Modifiers::ALT;
    }
    if is_down(VK_SHIFT) {
        held = held | Modifiers::SHIFT;
    }
    held
}

fn is_down(vk: VIRTUAL_KEY) -> bool {
    let state = unsafe { GetAsyncKeyState(vk.0 as i32) };
    (state as u16) & 0x8000 != 0
}
