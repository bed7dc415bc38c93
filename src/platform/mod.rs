//! Keyboard hooks and permission checks backed by the host operating system.
//!
//! [`SystemHook`] and [`SystemPermission`] name the implementation for the target
//! being compiled.

#[cfg(target_os = "macos")]
pub mod macos;
#[cfg(windows)]
pub mod windows;

#[cfg(target_os = "macos")]
pub use macos::{AccessibilityPermission as SystemPermission, EventTapHook as SystemHook};
#[cfg(windows)]
pub use windows::{LowLevelHook as SystemHook, LowLevelHookPermission as SystemPermission};

#[cfg(not(any(target_os = "macos", windows)))]
pub use unsupported::{UnsupportedHook as SystemHook, UnsupportedPermission as SystemPermission};

#[cfg(not(any(target_os = "macos", windows)))]
mod unsupported {
    use crate::{
        error::{Error, Result},
        keyboard_hook::KeyboardHook,
        permission::PermissionGate,
        policy::AllowList,
    };

    /// Stand-in for targets without a keyboard interception backend.
    #[derive(Debug, Default)]
    pub struct UnsupportedHook;

    impl KeyboardHook for UnsupportedHook {
        type Handle = ();

        fn install(&mut self, _policy: AllowList) -> Result<()> {
            Err(Error::HookCreationFailed(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "keyboard interception is not available on this platform",
            )))
        }

        fn uninstall(&mut self, _handle: ()) {}
    }

    /// Never grants permission, so the keyboard is never reported as blocked.
    #[derive(Debug, Default)]
    pub struct UnsupportedPermission;

    impl PermissionGate for UnsupportedPermission {
        fn is_granted(&self, _prompt: bool) -> bool {
            false
        }
    }
}
