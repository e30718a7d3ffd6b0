// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! The [`App`] data model and its barrier state machine (spec.md §3, §4.11).

use crate::error::CtiError;
use crate::id::AppId;
use crate::proctable::ProcTable;
use crate::wlm::{JobIdentifier, WlmKind};
use std::path::PathBuf;

/// Opaque handle to an MPIR session held by the FE daemon (spec.md §4.3's
/// `LaunchMPIR`/`AttachMPIR` response `mpir_id`). `None` once the barrier has
/// been released — the session is consumed by `ReleaseMPIR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MpirSessionId(pub u64);

/// `App` barrier lifecycle (spec.md §4.11).
///
/// Only `Running` and `Released` are observable through `is_running`.
/// `AtBarrier -> Running` is triggered by releasing the barrier, which must
/// happen at most once per app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierState {
    Launched,
    AtBarrier,
    Running,
    Released,
    Deregistered,
}

/// A parallel job the frontend has launched or attached to (spec.md §3).
#[derive(Debug, Clone)]
pub struct App {
    id: AppId,
    wlm_kind: WlmKind,
    job_id: JobIdentifier,
    launcher_pid: u32,
    mpir_session: Option<MpirSessionId>,
    proctable: ProcTable,
    staging_root: Option<PathBuf>,
    barrier_state: BarrierState,
}

impl App {
    /// Construct an app that was launched and is currently held at the MPIR
    /// barrier (the result of `launch_at_barrier`/`register_job`).
    pub fn at_barrier(
        wlm_kind: WlmKind,
        job_id: JobIdentifier,
        launcher_pid: u32,
        mpir_session: MpirSessionId,
        proctable: ProcTable,
    ) -> Self {
        Self {
            id: AppId::next(),
            wlm_kind,
            job_id,
            launcher_pid,
            mpir_session: Some(mpir_session),
            proctable,
            staging_root: None,
            barrier_state: BarrierState::AtBarrier,
        }
    }

    /// Construct an app that was launched without holding the barrier (a
    /// plain `launch`, with no MPIR session to manage).
    pub fn running(
        wlm_kind: WlmKind,
        job_id: JobIdentifier,
        launcher_pid: u32,
        proctable: ProcTable,
    ) -> Self {
        Self {
            id: AppId::next(),
            wlm_kind,
            job_id,
            launcher_pid,
            mpir_session: None,
            proctable,
            staging_root: None,
            barrier_state: BarrierState::Running,
        }
    }

    pub fn id(&self) -> AppId {
        self.id
    }

    pub fn wlm_kind(&self) -> WlmKind {
        self.wlm_kind
    }

    pub fn job_id(&self) -> &JobIdentifier {
        &self.job_id
    }

    pub fn launcher_pid(&self) -> u32 {
        self.launcher_pid
    }

    pub fn proctable(&self) -> &ProcTable {
        &self.proctable
    }

    pub fn staging_root(&self) -> Option<&PathBuf> {
        self.staging_root.as_ref()
    }

    pub fn set_staging_root(&mut self, path: PathBuf) {
        self.staging_root = Some(path);
    }

    pub fn barrier_state(&self) -> BarrierState {
        self.barrier_state
    }

    /// Whether this app is considered "at barrier": launched with an MPIR
    /// session that has not yet been released (spec.md §3 invariant).
    pub fn is_at_barrier(&self) -> bool {
        matches!(self.barrier_state, BarrierState::AtBarrier) && self.mpir_session.is_some()
    }

    /// Observable liveness per spec.md §4.11: only `Running`/`Released` count.
    pub fn is_running(&self) -> bool {
        matches!(self.barrier_state, BarrierState::Running | BarrierState::Released)
    }

    pub fn mpir_session(&self) -> Option<MpirSessionId> {
        self.mpir_session
    }

    /// Release the MPIR barrier. Monotonic and one-shot (spec.md §3, §4.11,
    /// testable property 1): a second call fails with `BarrierAlreadyReleased`
    /// rather than silently succeeding.
    pub fn release_barrier(&mut self) -> Result<MpirSessionId, CtiError> {
        match self.barrier_state {
            BarrierState::AtBarrier => match self.mpir_session.take() {
                Some(session) => {
                    self.barrier_state = BarrierState::Released;
                    Ok(session)
                }
                None => Err(CtiError::BarrierAlreadyReleased),
            },
            _ => Err(CtiError::BarrierAlreadyReleased),
        }
    }

    pub fn deregister(&mut self) {
        self.barrier_state = BarrierState::Deregistered;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_app() -> App {
        App::at_barrier(
            WlmKind::Localhost,
            JobIdentifier::Localhost { launcher_pid: 123 },
            123,
            MpirSessionId(1),
            ProcTable::default(),
        )
    }

    #[test]
    fn release_barrier_is_one_shot() {
        let mut app = sample_app();
        assert!(app.is_at_barrier());
        assert!(!app.is_running());

        let session = app.release_barrier().unwrap();
        assert_eq!(session, MpirSessionId(1));
        assert!(app.is_running());
        assert!(!app.is_at_barrier());

        match app.release_barrier() {
            Err(CtiError::BarrierAlreadyReleased) => {}
            other => panic!("expected BarrierAlreadyReleased, got {other:?}"),
        }
    }

    #[test]
    fn running_app_has_no_barrier_to_release() {
        let mut app = App::running(
            WlmKind::Localhost,
            JobIdentifier::Localhost { launcher_pid: 1 },
            1,
            ProcTable::default(),
        );
        assert!(app.is_running());
        assert!(matches!(
            app.release_barrier(),
            Err(CtiError::BarrierAlreadyReleased)
        ));
    }
}
