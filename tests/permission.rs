mod common;

use std::{sync::mpsc, time::Duration};

use common::FakeGate;
use keyboard_cleaner::{
    blocker::{Config, KeyboardBlocker},
    permission::{check_permission, request_permission},
};

#[test]
fn check_permission_delivers_result_to_completion() {
    let gate = FakeGate::granted();
    let (tx, rx) = mpsc::channel();

    let worker = check_permission(gate.clone(), move |granted| tx.send(granted).unwrap());

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(true));
    worker.join().unwrap();
    assert_eq!(gate.prompts(), 1);
}

#[test]
fn check_permission_reports_denial_as_false() {
    let gate = FakeGate::denied();
    let (tx, rx) = mpsc::channel();

    check_permission(gate, move |granted| tx.send(granted).unwrap())
        .join()
        .unwrap();

    assert_eq!(rx.try_recv(), Ok(false));
}

#[test]
fn request_permission_yields_one_answer() {
    let gate = FakeGate::granted();

    let answer = request_permission(gate.clone());

    assert_eq!(answer.recv_timeout(Duration::from_secs(5)), Ok(true));
    assert_eq!(gate.queries(), 1);
}

#[test]
fn blocker_checks_permission_with_its_gate() {
    let gate = FakeGate::denied();
    let blocker =
        KeyboardBlocker::new(common::FakeHook::default(), gate.clone(), Config::default());
    let (tx, rx) = mpsc::channel();

    blocker
        .check_permission(move |granted| tx.send(granted).unwrap())
        .join()
        .unwrap();

    assert_eq!(rx.try_recv(), Ok(false));
    assert_eq!(gate.prompts(), 1);
}
