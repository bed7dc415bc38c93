#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use keyboard_cleaner::{
    error::{Error, Result},
    keyboard_hook::KeyboardHook,
    permission::PermissionGate,
    policy::{AllowList, Decision, KeyCode, KeyEvent},
};

#[cfg(not(windows))]
pub const KEY_A: KeyCode = KeyCode(0);
#[cfg(windows)]
pub const KEY_A: KeyCode = KeyCode(0x41);

#[derive(Debug, Default)]
struct Recorder {
    installs: usize,
    uninstalls: usize,
    active: Option<AllowList>,
    classified: usize,
    fail_installs: bool,
}

/// A hook that records install / uninstall calls and classifies fed events with the
/// installed policy.
#[derive(Debug, Clone, Default)]
pub struct FakeHook {
    recorder: Arc<Mutex<Recorder>>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct FakeHandle(pub usize);

impl FakeHook {
    pub fn installs(&self) -> usize {
        self.recorder.lock().unwrap().installs
    }

    pub fn uninstalls(&self) -> usize {
        self.recorder.lock().unwrap().uninstalls
    }

    pub fn is_active(&self) -> bool {
        self.recorder.lock().unwrap().active.is_some()
    }

    pub fn classified(&self) -> usize {
        self.recorder.lock().unwrap().classified
    }

    pub fn fail_installs(&self, fail: bool) {
        self.recorder.lock().unwrap().fail_installs = fail;
    }

    /// Delivers a synthetic event. Returns `None` when no hook is installed, i.e. the
    /// event reaches applications without being classified.
    pub fn feed(&self, event: KeyEvent) -> Option<Decision> {
        let mut recorder = self.recorder.lock().unwrap();
        let policy = recorder.active?;
        recorder.classified += 1;
        Some(policy.classify(&event))
    }
}

impl KeyboardHook for FakeHook {
    type Handle = FakeHandle;

    fn install(&mut self, policy: AllowList) -> Result<FakeHandle> {
        let mut recorder = self.recorder.lock().unwrap();
        assert!(recorder.active.is_none(), "hook installed twice");

        if recorder.fail_installs {
            return Err(Error::HookCreationFailed(std::io::Error::other(
                "observer registration refused",
            )));
        }

        recorder.installs += 1;
        recorder.active = Some(policy);
        Ok(FakeHandle(recorder.installs))
    }

    fn uninstall(&mut self, _handle: FakeHandle) {
        let mut recorder = self.recorder.lock().unwrap();
        recorder.uninstalls += 1;
        recorder.active = None;
    }
}

#[derive(Debug, Default)]
pub struct FakeGate {
    granted: AtomicBool,
    queries: AtomicUsize,
    prompts: AtomicUsize,
}

impl FakeGate {
    pub fn granted() -> Arc<FakeGate> {
        let gate = FakeGate::default();
        gate.set_granted(true);
        Arc::new(gate)
    }

    pub fn denied() -> Arc<FakeGate> {
        Arc::new(FakeGate::default())
    }

    pub fn set_granted(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }

    /// Reads the configured answer without counting it as a query.
    pub fn current(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

impl PermissionGate for FakeGate {
    fn is_granted(&self, prompt: bool) -> bool {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if prompt {
            self.prompts.fetch_add(1, Ordering::SeqCst);
        }
        self.granted.load(Ordering::SeqCst)
    }
}
