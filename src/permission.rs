//! Ask the operating system whether this process may observe global keyboard events.
//!
//! Lack of permission is a normal answer, not an error: every query resolves to a
//! plain `bool`.

use std::{sync::Arc, thread};

/// Access to the host's "trusted process" check.
///
/// Implementations must be cheap to call from any thread.
pub trait PermissionGate: Send + Sync {
    /// Returns whether the privilege needed to intercept keyboard events is granted.
    ///
    /// When `prompt` is `true` the platform may show its one-time consent dialog as a
    /// side effect; whether it does is up to the platform.
    fn is_granted(&self, prompt: bool) -> bool;
}

/// Checks the permission in the background and hands the answer to `completion`.
///
/// The calling thread is never blocked; `completion` runs exactly once on a
/// short-lived worker thread. The platform's consent prompt is requested.
pub fn check_permission<G, F>(gate: Arc<G>, completion: F) -> thread::JoinHandle<()>
where
    G: PermissionGate + ?Sized + 'static,
    F: FnOnce(bool) + Send + 'static,
{
    thread::spawn(move || {
        let granted = gate.is_granted(true);

        #[cfg(feature = "log")]
        if granted {
            log::debug!("keyboard interception permission granted");
        } else {
            log::warn!("keyboard interception permission not granted");
        }

        completion(granted);
    })
}

/// Like [`check_permission`], but delivers the answer through a channel.
///
/// The returned receiver yields exactly one value. It can be polled with
/// `try_recv` from a UI loop or awaited with `recv`.
pub fn request_permission<G>(gate: Arc<G>) -> oneshot::Receiver<bool>
where
    G: PermissionGate + ?Sized + 'static,
{
    let (tx, rx) = oneshot::channel::<bool>();
    check_permission(gate, move |granted| {
        let _ = tx.send(granted);
    });
    rx
}
