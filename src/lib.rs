//! Temporarily blocks keyboard input so the keyboard can be cleaned.
//!
//! Pointer input keeps working, and a few safety shortcuts (quit, switch application,
//! force quit) still reach the system; see [`policy`] for the exact rules.
//!
//! ```no_run
//! let mut blocker = keyboard_cleaner::start(Default::default())?;
//!
//! // wipe the keyboard ...
//!
//! blocker.disable();
//! # Ok::<(), keyboard_cleaner::error::Error>(())
//! ```

pub mod blocker;
pub mod error;
pub mod keyboard_hook;
pub mod permission;
pub mod platform;
pub mod policy;

use std::sync::Arc;

use blocker::{Config, KeyboardBlocker};
use error::Result;
use platform::{SystemHook, SystemPermission};

/// Creates a [`KeyboardBlocker`] for the running operating system.
///
/// The blocker starts disabled.
pub fn system_blocker(config: Config) -> KeyboardBlocker<SystemHook, SystemPermission> {
    KeyboardBlocker::new(
        SystemHook::default(),
        Arc::new(SystemPermission::default()),
        config,
    )
}

/// Creates a [`KeyboardBlocker`] for the running operating system and enables it.
///
/// Keyboard input stays blocked until the returned blocker is disabled or dropped.
pub fn start(config: Config) -> Result<KeyboardBlocker<SystemHook, SystemPermission>> {
    let mut blocker = system_blocker(config);
    blocker.enable()?;
    Ok(blocker)
}
