// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Supervision state: every pid the daemon has forked or registered, and
//! every MPIR session it currently holds at (or past) the barrier. Owned
//! behind a single mutex so requests serialize and responses come back in
//! request order (spec.md §4.3 invariant).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use cti_mpir::MpirDriver;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::error::DaemonError;

struct RegisteredApp {
    pid: u32,
    utils: Vec<u32>,
    mpir_id: Option<u64>,
}

/// All state the FE daemon supervises for the lifetime of the process.
#[derive(Default)]
pub struct DaemonState {
    apps: HashMap<u32, RegisteredApp>,
    mpir_sessions: HashMap<u64, MpirDriver>,
}

fn next_mpir_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

impl DaemonState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_app(&mut self, pid: u32) {
        self.apps.entry(pid).or_insert_with(|| RegisteredApp {
            pid,
            utils: Vec::new(),
            mpir_id: None,
        });
    }

    pub fn register_util(&mut self, owner: u32, util_pid: u32) -> Result<(), DaemonError> {
        let app = self
            .apps
            .get_mut(&owner)
            .ok_or(DaemonError::UnknownApp(owner as u64))?;
        app.utils.push(util_pid);
        Ok(())
    }

    pub fn is_running(&self, app: u32) -> bool {
        match self.apps.get(&app) {
            Some(entry) => process_is_alive(entry.pid),
            None => false,
        }
    }

    /// Associate a newly-established MPIR session with its owning app,
    /// registering the app if `RegisterApp` hasn't arrived yet — order
    /// between the two requests isn't guaranteed by spec.md §4.3.
    pub fn attach_mpir_session(&mut self, owner: u32, driver: MpirDriver) -> u64 {
        let id = next_mpir_id();
        let app = self.apps.entry(owner).or_insert_with(|| RegisteredApp {
            pid: owner,
            utils: Vec::new(),
            mpir_id: None,
        });
        app.mpir_id = Some(id);
        self.mpir_sessions.insert(id, driver);
        id
    }

    pub fn take_mpir_session(&mut self, mpir_id: u64) -> Result<MpirDriver, DaemonError> {
        self.mpir_sessions
            .remove(&mpir_id)
            .ok_or(DaemonError::UnknownMpirSession(mpir_id))
    }

    /// Deregister an app: kill every registered util, release its MPIR
    /// session if still held, and drop all bookkeeping (spec.md §4.3
    /// `DeregisterApp`).
    pub fn deregister_app(&mut self, app: u32) -> Result<(), DaemonError> {
        let entry = self
            .apps
            .remove(&app)
            .ok_or(DaemonError::UnknownApp(app as u64))?;

        for util_pid in entry.utils {
            let _ = signal::kill(Pid::from_raw(util_pid as i32), Signal::SIGKILL);
        }

        if let Some(mpir_id) = entry.mpir_id {
            if let Some(driver) = self.mpir_sessions.remove(&mpir_id) {
                let _ = driver.release_barrier();
            }
        }

        Ok(())
    }

    /// Shutdown: terminate every supervised app and util before returning
    /// (spec.md §4.3 `Shutdown`).
    pub fn shutdown_all(&mut self) {
        let app_pids: Vec<u32> = self.apps.keys().copied().collect();
        for pid in app_pids {
            let _ = self.deregister_app(pid);
        }
        for (_, driver) in self.mpir_sessions.drain() {
            let _ = driver.release_barrier();
        }
    }
}

fn process_is_alive(pid: u32) -> bool {
    signal::kill(Pid::from_raw(pid as i32), None).is_ok()
}
