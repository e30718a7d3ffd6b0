// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

use super::*;
use serial_test::serial;
use std::collections::HashMap;

// ptrace operations are process-global enough (follow-fork disable, the
// tracer/tracee relationship) that these tests run serially.

#[test]
#[serial]
fn spawn_stops_then_runs_to_exit() {
    let path = PathBuf::from("/bin/true");
    let mut inferior =
        Inferior::spawn(&path, &[], &[], &HashMap::new()).expect("spawn /bin/true");

    let state = inferior.continue_run().expect("continue to exit");
    assert_eq!(state, RunState::Exited(0));
    assert!(inferior.is_exited());
    assert_eq!(inferior.exit_code(), Some(0));
}

#[test]
#[serial]
fn attach_to_running_sleep_and_terminate() {
    let path = PathBuf::from("/bin/sleep");
    let mut child = Command::new(&path)
        .arg("5")
        .spawn()
        .expect("spawn /bin/sleep");
    let pid = child.id();

    // Give the child a moment to reach the syscall before attaching.
    std::thread::sleep(std::time::Duration::from_millis(50));

    let inferior = Inferior::attach(&path, pid).expect("attach to sleep");
    assert_eq!(inferior.pid(), pid);
    assert!(!inferior.is_terminated());

    inferior.terminate().expect("terminate");
    let _ = child.wait();
}

#[test]
#[serial]
fn symbol_not_found_is_reported() {
    let path = PathBuf::from("/bin/true");
    let inferior = Inferior::spawn(&path, &[], &[], &HashMap::new()).expect("spawn /bin/true");

    let result = inferior.address_of("definitely_not_a_real_symbol_xyz");
    assert!(matches!(result, Err(InferiorError::SymbolNotFound(_))));

    inferior.terminate().expect("terminate");
}
