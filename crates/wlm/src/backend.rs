// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! The polymorphic workload-manager interface (spec.md §4.5, component C5).

use std::path::Path;

use async_trait::async_trait;
use cti_core::{JobIdentifier, ProcTable, StepLayout};

use crate::error::WlmError;

/// Outcome of a launch or attach: the job identifier and the resulting
/// process table, from which a [`StepLayout`] is derived.
#[derive(Debug, Clone)]
pub struct LaunchResult {
    pub job_id: JobIdentifier,
    pub launcher_pid: u32,
    pub proctable: ProcTable,
    /// The FE-daemon session handle needed to release or re-target this
    /// MPIR session. `None` for variants (SSH) that don't hold one locally.
    pub mpir_id: Option<u64>,
}

impl LaunchResult {
    pub fn layout(&self) -> StepLayout {
        StepLayout::from_proctable(&self.proctable)
    }
}

/// One running node-level utility spawned alongside an App (e.g. a tool
/// daemon started via `ForkExecvpUtil`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtilId(pub u32);

/// A signal, spelled the way each variant's native kill primitive expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillSignal {
    Term,
    Kill,
    Custom(i32),
}

impl KillSignal {
    pub fn as_raw(self) -> i32 {
        match self {
            KillSignal::Term => 15,
            KillSignal::Kill => 9,
            KillSignal::Custom(n) => n,
        }
    }
}

/// The operations every WLM variant must provide (spec.md §4.5's common
/// capability set). Implementations are plain structs dispatched through
/// [`crate::variant::Variant`] rather than trait objects, since the set of
/// backends is closed and known at compile time.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Launch argv/env under the WLM, returning once the job is parked at
    /// the MPIR barrier.
    async fn launch_at_barrier(
        &self,
        argv: &[String],
        env: &[(String, String)],
    ) -> Result<LaunchResult, WlmError>;

    /// Release a job previously parked by [`Backend::launch_at_barrier`] or
    /// picked up by [`Backend::attach`]. `mpir_id` is the handle returned in
    /// [`LaunchResult::mpir_id`]; `None` only for variants that manage their
    /// own MPIR session out of band (generic SSH).
    async fn release_barrier(
        &self,
        job_id: &JobIdentifier,
        mpir_id: Option<u64>,
    ) -> Result<(), WlmError>;

    /// Attach MPIR to an already-running job.
    async fn attach(&self, pid: u32) -> Result<LaunchResult, WlmError>;

    /// Register a node-level utility under the job so it is reaped with it.
    async fn register_util(&self, owner_pid: u32, util_pid: u32) -> Result<(), WlmError>;

    /// Send a kill signal to the whole job.
    async fn kill(&self, job_id: &JobIdentifier, signal: KillSignal) -> Result<(), WlmError>;

    /// Ship a packed manifest tarball to every compute node of the job.
    async fn ship_package(
        &self,
        job_id: &JobIdentifier,
        local_tar: &Path,
        remote_name: &str,
        tool_path: &str,
    ) -> Result<(), WlmError>;

    /// Fan the BE daemon binary out, one instance per node.
    async fn start_daemon(
        &self,
        job_id: &JobIdentifier,
        args: &[String],
        synchronous: bool,
    ) -> Result<(), WlmError>;

    /// Hostnames of every node in the job's allocation.
    fn list_hosts(&self, job_id: &JobIdentifier) -> Result<Vec<String>, WlmError>;

    /// `(hostname, num_pes)` placement pairs, derived from the last known
    /// [`cti_core::ProcTable`].
    fn list_placement(&self, job_id: &JobIdentifier) -> Result<Vec<(String, u32)>, WlmError>;

    /// The opaque job identifier's canonical string form.
    fn job_id_string(&self, job_id: &JobIdentifier) -> String {
        job_id.apid_string()
    }

    /// The hostname the launcher process itself runs on.
    fn launcher_hostname(&self, job_id: &JobIdentifier) -> Result<String, WlmError>;

    /// Whether the job is still alive from the WLM's point of view.
    async fn is_running(&self, job_id: &JobIdentifier) -> Result<bool, WlmError>;

    /// Extra binaries/libraries this variant's tool ecosystem requires on
    /// every compute node, injected into the first manifest of a Session.
    fn extra_files(&self) -> Vec<std::path::PathBuf> {
        Vec::new()
    }
}
