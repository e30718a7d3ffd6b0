// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Background reaper for supervised children, grounded in the original
//! `cti_signal.c` SIGCHLD handling (SPEC_FULL.md §2.2): a signal-safe async
//! task drains exited children with `WNOHANG` so zombies never accumulate
//! under the daemon's single-mutex request loop.

use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tokio::signal::unix::{signal, SignalKind};

/// Spawn the background task that reaps any child whose parent is this
/// process, logging each exit. Runs for the daemon's lifetime.
pub fn spawn_reaper() {
    tokio::spawn(async move {
        let mut sigchld = match signal(SignalKind::child()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGCHLD handler");
                return;
            }
        };

        loop {
            sigchld.recv().await;
            reap_available();
        }
    });
}

/// Drain every child that has already exited without blocking.
fn reap_available() {
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(pid, code)) => {
                tracing::debug!(pid = pid.as_raw(), code, "reaped child");
            }
            Ok(WaitStatus::Signaled(pid, sig, _)) => {
                tracing::debug!(pid = pid.as_raw(), ?sig, "reaped child killed by signal");
            }
            Ok(WaitStatus::StillAlive) => break,
            Ok(_) => continue,
            Err(nix::errno::Errno::ECHILD) => break,
            Err(e) => {
                tracing::warn!(error = %e, "waitpid failed in reaper");
                break;
            }
        }
    }
}
