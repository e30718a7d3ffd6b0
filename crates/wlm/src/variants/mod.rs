// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! One struct per WLM variant, dispatched through the [`Variant`] enum
//! rather than a trait object — the set of backends is closed and known
//! at compile time (spec.md §4.5).

mod alps;
mod flux;
pub(crate) mod launcher;
mod localhost;
mod pals;
mod slurm;
mod ssh;

#[cfg(any(test, feature = "test-support"))]
mod mock;

pub use alps::AlpsBackend;
pub use flux::FluxBackend;
pub use localhost::LocalhostBackend;
pub use pals::PalsBackend;
pub use slurm::SlurmBackend;
pub use ssh::SshBackend;

#[cfg(any(test, feature = "test-support"))]
pub use mock::MockBackend;

use async_trait::async_trait;
use cti_core::JobIdentifier;

use crate::backend::{Backend, KillSignal, LaunchResult};
use crate::error::WlmError;

/// The concrete backend selected for this process, wrapped so callers hold
/// one type regardless of WLM (spec.md §4.5).
pub enum Variant {
    Slurm(SlurmBackend),
    Alps(AlpsBackend),
    Pals(PalsBackend),
    Flux(FluxBackend),
    Ssh(SshBackend),
    Localhost(LocalhostBackend),
    #[cfg(any(test, feature = "test-support"))]
    Mock(MockBackend),
}

macro_rules! dispatch {
    ($self:expr, $method:ident $(, $arg:expr)*) => {
        match $self {
            Variant::Slurm(b) => b.$method($($arg),*),
            Variant::Alps(b) => b.$method($($arg),*),
            Variant::Pals(b) => b.$method($($arg),*),
            Variant::Flux(b) => b.$method($($arg),*),
            Variant::Ssh(b) => b.$method($($arg),*),
            Variant::Localhost(b) => b.$method($($arg),*),
            #[cfg(any(test, feature = "test-support"))]
            Variant::Mock(b) => b.$method($($arg),*),
        }
    };
}

#[async_trait]
impl Backend for Variant {
    async fn launch_at_barrier(
        &self,
        argv: &[String],
        env: &[(String, String)],
    ) -> Result<LaunchResult, WlmError> {
        dispatch!(self, launch_at_barrier, argv, env).await
    }

    async fn release_barrier(
        &self,
        job_id: &JobIdentifier,
        mpir_id: Option<u64>,
    ) -> Result<(), WlmError> {
        dispatch!(self, release_barrier, job_id, mpir_id).await
    }

    async fn attach(&self, pid: u32) -> Result<LaunchResult, WlmError> {
        dispatch!(self, attach, pid).await
    }

    async fn register_util(&self, owner_pid: u32, util_pid: u32) -> Result<(), WlmError> {
        dispatch!(self, register_util, owner_pid, util_pid).await
    }

    async fn kill(&self, job_id: &JobIdentifier, signal: KillSignal) -> Result<(), WlmError> {
        dispatch!(self, kill, job_id, signal).await
    }

    async fn ship_package(
        &self,
        job_id: &JobIdentifier,
        local_tar: &std::path::Path,
        remote_name: &str,
        tool_path: &str,
    ) -> Result<(), WlmError> {
        dispatch!(self, ship_package, job_id, local_tar, remote_name, tool_path).await
    }

    async fn start_daemon(
        &self,
        job_id: &JobIdentifier,
        args: &[String],
        synchronous: bool,
    ) -> Result<(), WlmError> {
        dispatch!(self, start_daemon, job_id, args, synchronous).await
    }

    fn list_hosts(&self, job_id: &JobIdentifier) -> Result<Vec<String>, WlmError> {
        dispatch!(self, list_hosts, job_id)
    }

    fn list_placement(&self, job_id: &JobIdentifier) -> Result<Vec<(String, u32)>, WlmError> {
        dispatch!(self, list_placement, job_id)
    }

    fn launcher_hostname(&self, job_id: &JobIdentifier) -> Result<String, WlmError> {
        dispatch!(self, launcher_hostname, job_id)
    }

    async fn is_running(&self, job_id: &JobIdentifier) -> Result<bool, WlmError> {
        dispatch!(self, is_running, job_id).await
    }

    fn extra_files(&self) -> Vec<std::path::PathBuf> {
        dispatch!(self, extra_files)
    }
}
