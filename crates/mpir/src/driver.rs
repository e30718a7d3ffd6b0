// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! The MPIR startup-notification protocol driven atop [`cti_inferior::Inferior`]
//! (spec.md §4.2).

use crate::error::MpirError;
use crate::proctable::read_proctable;
use cti_core::{config, ProcTable};
use cti_inferior::{Inferior, RunState};
use std::collections::HashMap;
use std::path::Path;

/// `MPIR_debug_state` value meaning the launcher has spawned its ranks and
/// published a proctable.
const MPIR_DEBUG_SPAWNED: i32 = 1;

const SYM_BEING_DEBUGGED: &str = "MPIR_being_debugged";
const SYM_BREAKPOINT: &str = "MPIR_Breakpoint";
const SYM_DEBUG_STATE: &str = "MPIR_debug_state";
const SYM_PROCTABLE: &str = "MPIR_proctable";
const SYM_PROCTABLE_SIZE: &str = "MPIR_proctable_size";
/// Supplemental symbol carried forward from `original_source/` (SPEC_FULL.md
/// §2.1): distinguishes a direct launch from a hierarchical/proxy one.
const SYM_I_AM_STARTER: &str = "MPIR_i_am_starter";

/// A launcher under MPIR control, holding it at (or past) the startup
/// barrier.
pub struct MpirDriver {
    inferior: Inferior,
}

/// Proctable plus the ambient `MPIR_i_am_starter` flag (SPEC_FULL.md §2.1).
pub struct MpirProctable {
    pub proctable: ProcTable,
    pub is_starter: bool,
}

impl MpirDriver {
    /// Launch a new launcher process and drive it to the MPIR barrier
    /// (spec.md §4.2 steps 1-3, non-attach flavor).
    pub fn launch(
        launcher: &Path,
        argv: &[String],
        env: &[(String, String)],
        fd_remap: &HashMap<i32, i32>,
    ) -> Result<Self, MpirError> {
        let inferior = Inferior::spawn(launcher, argv, env, fd_remap)?;
        let mut driver = Self { inferior };
        driver.setup_mpir_standard()?;
        driver.run_to_mpir_breakpoint()?;
        Ok(driver)
    }

    /// Attach to an already-running launcher (spec.md §4.2 "Attach flavor").
    pub fn attach(launcher: &Path, pid: u32) -> Result<Self, MpirError> {
        let inferior = Inferior::attach(launcher, pid)?;
        let mut driver = Self { inferior };
        driver.setup_mpir_standard()?;

        // Attached launchers may already be past the barrier: poll
        // proctable_size > 0 before starting the normal protocol.
        loop {
            let size_addr = driver.inferior.address_of(SYM_PROCTABLE_SIZE)?;
            if driver.inferior.read_i32(size_addr)? > 0 {
                break;
            }
            driver.inferior.continue_run()?;
            if driver.inferior.is_terminated() {
                return Err(MpirError::LaunchExited);
            }
        }

        driver.run_to_mpir_breakpoint()?;
        Ok(driver)
    }

    fn setup_mpir_standard(&mut self) -> Result<(), MpirError> {
        let being_debugged_addr = self.inferior.address_of(SYM_BEING_DEBUGGED)?;
        self.inferior.write_i32(being_debugged_addr, 1)?;
        self.inferior.set_breakpoint(SYM_BREAKPOINT)?;
        Ok(())
    }

    /// Loop: continue; on stop, check `(MPIR_debug_state ==
    /// DEBUG_SPAWNED) && MPIR_proctable_size > 0`; fail if the inferior
    /// terminates first; otherwise sleep and retry (spec.md §4.2 step 3).
    fn run_to_mpir_breakpoint(&mut self) -> Result<(), MpirError> {
        let debug_state_addr = self.inferior.address_of(SYM_DEBUG_STATE)?;
        let size_addr = self.inferior.address_of(SYM_PROCTABLE_SIZE)?;

        loop {
            self.inferior.continue_run()?;

            if self.inferior.is_terminated() {
                return Err(MpirError::LaunchExited);
            }

            let debug_state = self.inferior.read_i32(debug_state_addr)?;
            let proctable_size = self.inferior.read_i32(size_addr)?;
            tracing::debug!(debug_state, proctable_size, "MPIR barrier poll");

            if debug_state == MPIR_DEBUG_SPAWNED && proctable_size > 0 {
                return Ok(());
            }

            std::thread::sleep(config::MPIR_POLL_INTERVAL);
        }
    }

    /// Read out the proctable (spec.md §4.2 step 4).
    pub fn read_proctable(&self) -> Result<MpirProctable, MpirError> {
        let size_addr = self.inferior.address_of(SYM_PROCTABLE_SIZE)?;
        let size = self.inferior.read_i32(size_addr)?;

        let array_addr = self.inferior.address_of(SYM_PROCTABLE)?;
        let proctable_ptr = self.inferior.read_u64(array_addr)?;

        let proctable = read_proctable(&self.inferior, proctable_ptr, size)?;

        let is_starter = match self.inferior.address_of(SYM_I_AM_STARTER) {
            Ok(addr) => self.inferior.read_i32(addr)? != 0,
            Err(_) => true,
        };

        Ok(MpirProctable {
            proctable,
            is_starter,
        })
    }

    /// Continue the inferior and detach (spec.md §4.2 step 5).
    pub fn release_barrier(self) -> Result<(), MpirError> {
        let mut inferior = self.inferior;
        inferior.continue_run()?;
        if !inferior.is_terminated() {
            inferior.terminate()?;
        }
        Ok(())
    }

    /// Continue until the inferior exits, crashes, or is detached (spec.md
    /// §4.2 `wait_exit`).
    pub fn wait_exit(mut self) -> Result<i32, MpirError> {
        loop {
            match self.inferior.continue_run()? {
                RunState::Exited(code) => return Ok(code),
                RunState::Crashed => return Ok(-1),
                RunState::Detached => return Ok(0),
                RunState::Stopped => continue,
            }
        }
    }

    pub fn launcher_pid(&self) -> u32 {
        self.inferior.pid()
    }
}
