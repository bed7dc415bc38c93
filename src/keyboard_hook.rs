//! Install and remove the process-wide keyboard hook.
//!
//! The operating system hook is abstracted behind [`KeyboardHook`] so the install /
//! uninstall bookkeeping in [`InputInterceptor`] does not depend on a real OS hook.
//! Real implementations live in [`crate::platform`].

use std::sync::Arc;

use crate::{
    error::{Error, Result},
    permission::PermissionGate,
    policy::AllowList,
};

/// A platform mechanism that can insert the process ahead of normal keyboard event
/// delivery.
///
/// While a handle returned by [`KeyboardHook::install`] is alive, every key-down,
/// key-up and modifier change must be classified with the given [`AllowList`] and
/// swallowed when the decision is [`crate::policy::Decision::Block`].
pub trait KeyboardHook {
    /// The platform resource representing one installed hook.
    type Handle;

    /// Registers the hook. Called at most once per handle lifetime.
    ///
    /// Returns [`Error::HookCreationFailed`] or [`Error::HookThreadCrashed`] if the
    /// platform refuses the registration.
    fn install(&mut self, policy: AllowList) -> Result<Self::Handle>;

    /// Stops event delivery to the hook and releases it.
    ///
    /// Must not fail, even if the platform already invalidated the resource. Once this
    /// returns no further event is classified.
    fn uninstall(&mut self, handle: Self::Handle);
}

/// Owns at most one installed [`KeyboardHook`] handle.
///
/// [`install`](InputInterceptor::install) and
/// [`uninstall`](InputInterceptor::uninstall) are idempotent, and the handle is
/// released when the interceptor is dropped.
pub struct InputInterceptor<H: KeyboardHook, G: ?Sized> {
    hook: H,
    gate: Arc<G>,
    policy: AllowList,
    handle: Option<H::Handle>,
}

impl<H: KeyboardHook, G: ?Sized> InputInterceptor<H, G> {
    pub fn new(hook: H, gate: Arc<G>, policy: AllowList) -> Self {
        Self {
            hook,
            gate,
            policy,
            handle: None,
        }
    }

    /// Removes the hook if one is installed; otherwise does nothing.
    pub fn uninstall(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.hook.uninstall(handle);

            #[cfg(feature = "log")]
            log::info!("uninstalled keyboard hook");
        }
    }

    pub fn is_installed(&self) -> bool {
        self.handle.is_some()
    }

    pub fn handle(&self) -> Option<&H::Handle> {
        self.handle.as_ref()
    }

    pub fn gate(&self) -> &Arc<G> {
        &self.gate
    }
}

impl<H: KeyboardHook, G: PermissionGate + ?Sized> InputInterceptor<H, G> {
    /// Installs the hook, or returns the existing handle if it is already installed.
    ///
    /// Fails with [`Error::PermissionDenied`] if the process is not trusted to observe
    /// keyboard events at the time of the call.
    pub fn install(&mut self) -> Result<&H::Handle> {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => {
                if !self.gate.is_granted(false) {
                    #[cfg(feature = "log")]
                    log::warn!("refusing to install keyboard hook without permission");
                    return Err(Error::PermissionDenied);
                }

                let handle = self.hook.install(self.policy).inspect_err(|_e| {
                    #[cfg(feature = "log")]
                    log::error!("failed to install keyboard hook: {}", _e);
                })?;

                #[cfg(feature = "log")]
                log::info!("installed keyboard hook");

                handle
            }
        };

        Ok(self.handle.insert(handle))
    }
}

impl<H: KeyboardHook, G: ?Sized> Drop for InputInterceptor<H, G> {
    fn drop(&mut self) {
        self.uninstall();
    }
}
