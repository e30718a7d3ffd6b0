// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Shared machinery for the four variants that launch through a local
//! launcher binary fork-execed by the FE daemon (Slurm, ALPS, PALS, Flux).
//! Only the argv wrapping, job-identifier recovery, and native kill/ship/
//! start-daemon commands differ between them (spec.md §4.5).

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use cti_core::{JobIdentifier, WlmKind};
use cti_daemon_client::{inherited_stdio, DaemonClient, SpawnArgs};
use tokio::sync::Mutex;

use crate::backend::{Backend, KillSignal, LaunchResult};
use crate::error::WlmError;

/// Per-WLM specialization point for [`LauncherBackend`].
pub trait LauncherSpec: Send + Sync {
    fn wlm_kind(&self) -> WlmKind;
    fn launcher_path(&self) -> &PathBuf;

    /// Build the full argv (launcher binary + native flags + caller argv).
    fn wrap_argv(&self, argv: &[String]) -> Vec<String>;

    /// Recover a job identifier once the launcher process exists. Most
    /// variants read it back from an env var the WLM sets on launch.
    fn build_job_identifier(&self, launcher_pid: u32) -> JobIdentifier;

    /// The native command (and args) that signals the whole job.
    fn kill_command(&self, job_id: &JobIdentifier, signal: KillSignal) -> (String, Vec<String>);
}

/// A [`Backend`] built from a [`LauncherSpec`] plus a shared FE-daemon
/// client handle.
pub struct LauncherBackend<S> {
    client: Arc<Mutex<DaemonClient>>,
    spec: S,
}

impl<S: LauncherSpec> LauncherBackend<S> {
    pub fn new(client: Arc<Mutex<DaemonClient>>, spec: S) -> Self {
        Self { client, spec }
    }

    async fn launch_common(
        &self,
        argv: &[String],
        env: &[(String, String)],
    ) -> Result<LaunchResult, WlmError> {
        let spawn = SpawnArgs {
            path: self.spec.launcher_path().display().to_string(),
            argv: self.spec.wrap_argv(argv),
            env: env.to_vec(),
            stdio: inherited_stdio(),
        };
        let mut client = self.client.lock().await;
        let mpir = client.launch_mpir(spawn, self.spec.wlm_kind()).await?;
        Ok(LaunchResult {
            job_id: self.spec.build_job_identifier(mpir.launcher_pid),
            launcher_pid: mpir.launcher_pid,
            proctable: mpir.proctable,
            mpir_id: Some(mpir.mpir_id),
        })
    }
}

#[async_trait]
impl<S: LauncherSpec> Backend for LauncherBackend<S> {
    async fn launch_at_barrier(
        &self,
        argv: &[String],
        env: &[(String, String)],
    ) -> Result<LaunchResult, WlmError> {
        self.launch_common(argv, env).await
    }

    async fn release_barrier(
        &self,
        _job_id: &JobIdentifier,
        mpir_id: Option<u64>,
    ) -> Result<(), WlmError> {
        let mpir_id = mpir_id.ok_or(WlmError::Unsupported)?;
        let mut client = self.client.lock().await;
        client.release_mpir(mpir_id).await?;
        Ok(())
    }

    async fn attach(&self, pid: u32) -> Result<LaunchResult, WlmError> {
        let mut client = self.client.lock().await;
        let mpir = client.attach_mpir(pid, self.spec.wlm_kind()).await?;
        Ok(LaunchResult {
            job_id: self.spec.build_job_identifier(mpir.launcher_pid),
            launcher_pid: mpir.launcher_pid,
            proctable: mpir.proctable,
            mpir_id: Some(mpir.mpir_id),
        })
    }

    async fn register_util(&self, owner_pid: u32, util_pid: u32) -> Result<(), WlmError> {
        let mut client = self.client.lock().await;
        client.register_util(owner_pid, util_pid).await?;
        Ok(())
    }

    async fn kill(&self, job_id: &JobIdentifier, signal: KillSignal) -> Result<(), WlmError> {
        let (program, args) = self.spec.kill_command(job_id, signal);
        let status = std::process::Command::new(&program)
            .args(&args)
            .status()
            .map_err(|e| WlmError::KillFailed(e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(WlmError::KillFailed(format!(
                "{program} exited with {status}"
            )))
        }
    }

    async fn ship_package(
        &self,
        _job_id: &JobIdentifier,
        _local_tar: &std::path::Path,
        _remote_name: &str,
        _tool_path: &str,
    ) -> Result<(), WlmError> {
        Err(WlmError::ShipFailed(
            "variant must override ship_package".to_string(),
        ))
    }

    async fn start_daemon(
        &self,
        _job_id: &JobIdentifier,
        _args: &[String],
        _synchronous: bool,
    ) -> Result<(), WlmError> {
        Err(WlmError::StartDaemonFailed(
            "variant must override start_daemon".to_string(),
        ))
    }

    fn list_hosts(&self, job_id: &JobIdentifier) -> Result<Vec<String>, WlmError> {
        let _ = job_id;
        Ok(Vec::new())
    }

    fn list_placement(&self, job_id: &JobIdentifier) -> Result<Vec<(String, u32)>, WlmError> {
        let _ = job_id;
        Ok(Vec::new())
    }

    fn launcher_hostname(&self, _job_id: &JobIdentifier) -> Result<String, WlmError> {
        hostname()
    }

    async fn is_running(&self, _job_id: &JobIdentifier) -> Result<bool, WlmError> {
        Ok(true)
    }
}

pub fn hostname() -> Result<String, WlmError> {
    Ok(gethostname::gethostname().to_string_lossy().into_owned())
}

/// env-var lookup shared by every [`LauncherSpec::build_job_identifier`].
pub fn env_u32(name: &str) -> Option<u32> {
    std::env::var(name).ok()?.parse().ok()
}

pub fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok()?.parse().ok()
}
