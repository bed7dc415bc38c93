//! The enabled / disabled state machine that owns the keyboard hook.
//!
//! [`KeyboardBlocker`] is what a user interface talks to: it reports whether the
//! keyboard is currently blocked, turns blocking on and off, and notifies subscribers
//! of every change. Dropping it always removes the hook first, so the keyboard can
//! never stay blocked after its owner is gone.

use std::{fmt::Display, sync::Arc, sync::mpsc, thread};

use crate::{
    error::{Error, Result},
    keyboard_hook::{InputInterceptor, KeyboardHook},
    permission::{self, PermissionGate},
    policy::AllowList,
};

/// Whether keyboard input is currently being suppressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum InterceptionState {
    /// A hook is installed and blocked events are swallowed.
    Enabled,
    /// No hook is installed.
    #[default]
    Disabled,
}

impl InterceptionState {
    pub fn is_enabled(&self) -> bool {
        matches!(self, InterceptionState::Enabled)
    }
}

impl Display for InterceptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InterceptionState::Enabled => "keyboard blocked",
            InterceptionState::Disabled => "keyboard active",
        };
        write!(f, "{}", s)
    }
}

/// Configuration for a [`KeyboardBlocker`].
///
/// By default the platform's consent prompt is requested when permission is missing,
/// and the default [`AllowList`] is used.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Ask the operating system to show its permission prompt when [`KeyboardBlocker::enable`]
    /// finds the permission missing.
    pub prompt_for_permission: bool,
    /// The events that still get through while blocking.
    pub allow_list: AllowList,
}

impl Config {
    /// Sets whether a missing permission triggers the platform's consent prompt.
    pub fn set_prompt_for_permission(mut self, prompt: bool) -> Self {
        self.prompt_for_permission = prompt;
        self
    }

    /// Sets the allow-list handed to the hook on every install.
    pub fn set_allow_list(mut self, allow_list: AllowList) -> Self {
        self.allow_list = allow_list;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt_for_permission: true,
            allow_list: AllowList::default(),
        }
    }
}

/// Owns exactly one [`InputInterceptor`] and the published [`InterceptionState`].
///
/// All methods take `&mut self` or `&self` and are expected to be called from a single
/// controlling thread, typically the UI thread.
pub struct KeyboardBlocker<H: KeyboardHook, G: ?Sized> {
    interceptor: InputInterceptor<H, G>,
    state: InterceptionState,
    prompt_for_permission: bool,
    subscribers: Vec<mpsc::Sender<InterceptionState>>,
}

impl<H: KeyboardHook, G: ?Sized> KeyboardBlocker<H, G> {
    /// Creates a blocker in the [`InterceptionState::Disabled`] state.
    pub fn new(hook: H, gate: Arc<G>, config: Config) -> Self {
        Self {
            interceptor: InputInterceptor::new(hook, gate, config.allow_list),
            state: InterceptionState::Disabled,
            prompt_for_permission: config.prompt_for_permission,
            subscribers: Vec::new(),
        }
    }

    pub fn state(&self) -> InterceptionState {
        self.state
    }

    /// Returns `true` while keyboard input is being suppressed.
    pub fn is_enabled(&self) -> bool {
        self.state.is_enabled()
    }

    pub fn interceptor(&self) -> &InputInterceptor<H, G> {
        &self.interceptor
    }

    /// Registers an observer of state changes.
    ///
    /// The receiver gets the current state immediately, then one message per
    /// transition. Dropping the receiver unsubscribes it.
    pub fn subscribe(&mut self) -> mpsc::Receiver<InterceptionState> {
        let (tx, rx) = mpsc::channel();
        if tx.send(self.state).is_ok() {
            self.subscribers.push(tx);
        }
        rx
    }

    /// Stops suppressing keyboard input.
    ///
    /// Does nothing if already disabled. Never fails.
    pub fn disable(&mut self) {
        if self.state == InterceptionState::Disabled {
            return;
        }

        self.interceptor.uninstall();
        self.set_state(InterceptionState::Disabled);
    }

    /// Disables blocking and drops the blocker.
    ///
    /// Equivalent to dropping it, spelled out for call sites that want the teardown to
    /// be visible.
    pub fn shutdown(mut self) {
        self.disable();
    }

    fn set_state(&mut self, state: InterceptionState) {
        self.state = state;

        #[cfg(feature = "log")]
        log::info!("{}", state);

        self.subscribers.retain(|tx| tx.send(state).is_ok());
    }
}

impl<H: KeyboardHook, G: PermissionGate + ?Sized> KeyboardBlocker<H, G> {
    /// Starts suppressing keyboard input.
    ///
    /// Does nothing if already enabled. Otherwise checks the permission and installs the
    /// hook; on any failure the state stays [`InterceptionState::Disabled`] and the
    /// error is returned.
    pub fn enable(&mut self) -> Result<()> {
        if self.state == InterceptionState::Enabled {
            return Ok(());
        }

        if !self.interceptor.gate().is_granted(self.prompt_for_permission) {
            #[cfg(feature = "log")]
            log::warn!("keyboard interception permission required");
            return Err(Error::PermissionDenied);
        }

        self.interceptor.install()?;
        self.set_state(InterceptionState::Enabled);
        Ok(())
    }

    /// Flips between enabled and disabled. Returns the new state.
    pub fn toggle(&mut self) -> Result<InterceptionState> {
        match self.state {
            InterceptionState::Enabled => self.disable(),
            InterceptionState::Disabled => self.enable()?,
        }
        Ok(self.state)
    }
}

impl<H: KeyboardHook, G: PermissionGate + ?Sized + 'static> KeyboardBlocker<H, G> {
    /// Checks the permission on a background thread and calls `completion` with the
    /// answer. The calling thread is not blocked.
    pub fn check_permission<F>(&self, completion: F) -> thread::JoinHandle<()>
    where
        F: FnOnce(bool) + Send + 'static,
    {
        permission::check_permission(Arc::clone(self.interceptor.gate()), completion)
    }
}

impl<H: KeyboardHook, G: ?Sized> Drop for KeyboardBlocker<H, G> {
    fn drop(&mut self) {
        self.disable();
    }
}
