// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! SLURM backend: launches via `srun`, ships packages via `sbcast`, kills
//! via `scancel` (spec.md §4.5).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use cti_core::{JobIdentifier, WlmKind};
use cti_daemon_client::DaemonClient;
use tokio::sync::Mutex;

use crate::backend::{Backend, KillSignal, LaunchResult};
use crate::error::WlmError;
use crate::variants::launcher::{env_u32, hostname, LauncherBackend, LauncherSpec};

pub struct SlurmSpec {
    pub srun_path: PathBuf,
}

impl LauncherSpec for SlurmSpec {
    fn wlm_kind(&self) -> WlmKind {
        WlmKind::Slurm
    }

    fn launcher_path(&self) -> &PathBuf {
        &self.srun_path
    }

    fn wrap_argv(&self, argv: &[String]) -> Vec<String> {
        // --input=none prevents srun from forwarding frontend stdin, which
        // would otherwise race the MPIR barrier wait.
        let mut full = vec!["--input=none".to_string(), "--unbuffered".to_string()];
        full.extend(argv.iter().cloned());
        full
    }

    fn build_job_identifier(&self, launcher_pid: u32) -> JobIdentifier {
        JobIdentifier::Slurm {
            job_id: env_u32("SLURM_JOB_ID").unwrap_or(launcher_pid),
            step_id: env_u32("SLURM_STEP_ID").unwrap_or(0),
            het_offset: env_u32("SLURM_HET_SIZE"),
        }
    }

    fn kill_command(&self, job_id: &JobIdentifier, signal: KillSignal) -> (String, Vec<String>) {
        let target = job_id.apid_string();
        (
            "scancel".to_string(),
            vec!["-s".to_string(), signal.as_raw().to_string(), target],
        )
    }
}

pub struct SlurmBackend {
    inner: LauncherBackend<SlurmSpec>,
    srun_path: PathBuf,
    sbcast_path: PathBuf,
}

impl SlurmBackend {
    pub fn new(client: Arc<Mutex<DaemonClient>>, srun_path: PathBuf, sbcast_path: PathBuf) -> Self {
        Self {
            inner: LauncherBackend::new(client, SlurmSpec {
                srun_path: srun_path.clone(),
            }),
            srun_path,
            sbcast_path,
        }
    }
}

#[async_trait]
impl Backend for SlurmBackend {
    async fn launch_at_barrier(
        &self,
        argv: &[String],
        env: &[(String, String)],
    ) -> Result<LaunchResult, WlmError> {
        self.inner.launch_at_barrier(argv, env).await
    }

    async fn release_barrier(
        &self,
        job_id: &JobIdentifier,
        mpir_id: Option<u64>,
    ) -> Result<(), WlmError> {
        self.inner.release_barrier(job_id, mpir_id).await
    }

    async fn attach(&self, pid: u32) -> Result<LaunchResult, WlmError> {
        self.inner.attach(pid).await
    }

    async fn register_util(&self, owner_pid: u32, util_pid: u32) -> Result<(), WlmError> {
        self.inner.register_util(owner_pid, util_pid).await
    }

    async fn kill(&self, job_id: &JobIdentifier, signal: KillSignal) -> Result<(), WlmError> {
        self.inner.kill(job_id, signal).await
    }

    async fn ship_package(
        &self,
        job_id: &JobIdentifier,
        local_tar: &Path,
        _remote_name: &str,
        tool_path: &str,
    ) -> Result<(), WlmError> {
        let (job, step) = match job_id {
            JobIdentifier::Slurm {
                job_id, step_id, ..
            } => (*job_id, *step_id),
            _ => return Err(WlmError::Unsupported),
        };
        let status = tokio::process::Command::new(&self.sbcast_path)
            .arg("-C")
            .arg("-j")
            .arg(format!("{job}.{step}"))
            .arg(local_tar)
            .arg("--force")
            .arg(tool_path)
            .status()
            .await
            .map_err(|e| WlmError::ShipFailed(e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(WlmError::ShipFailed(format!("sbcast exited with {status}")))
        }
    }

    async fn start_daemon(
        &self,
        job_id: &JobIdentifier,
        args: &[String],
        synchronous: bool,
    ) -> Result<(), WlmError> {
        let (job, step) = match job_id {
            JobIdentifier::Slurm {
                job_id, step_id, ..
            } => (*job_id, *step_id),
            _ => return Err(WlmError::Unsupported),
        };
        let mut cmd = tokio::process::Command::new(&self.srun_path);
        cmd.arg("--jobid")
            .arg(format!("{job}.{step}"))
            .arg("--ntasks-per-node=1")
            .arg("--input=none")
            .args(args);
        if synchronous {
            let status = cmd
                .status()
                .await
                .map_err(|e| WlmError::StartDaemonFailed(e.to_string()))?;
            if !status.success() {
                return Err(WlmError::StartDaemonFailed(format!(
                    "srun fan-out exited with {status}"
                )));
            }
        } else {
            cmd.spawn()
                .map_err(|e| WlmError::StartDaemonFailed(e.to_string()))?;
        }
        Ok(())
    }

    fn list_hosts(&self, job_id: &JobIdentifier) -> Result<Vec<String>, WlmError> {
        self.inner.list_hosts(job_id)
    }

    fn list_placement(&self, job_id: &JobIdentifier) -> Result<Vec<(String, u32)>, WlmError> {
        self.inner.list_placement(job_id)
    }

    fn launcher_hostname(&self, _job_id: &JobIdentifier) -> Result<String, WlmError> {
        hostname()
    }

    async fn is_running(&self, job_id: &JobIdentifier) -> Result<bool, WlmError> {
        self.inner.is_running(job_id).await
    }
}
