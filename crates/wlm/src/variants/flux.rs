// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Flux backend: launches via `flux run`, ships packages via
//! `flux filemap`, fans the BE daemon out via `flux exec`, kills via
//! `flux cancel` (spec.md §4.5).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use cti_core::{JobIdentifier, WlmKind};
use cti_daemon_client::DaemonClient;
use tokio::sync::Mutex;

use crate::backend::{Backend, KillSignal, LaunchResult};
use crate::error::WlmError;
use crate::variants::launcher::{env_u64, hostname, LauncherBackend, LauncherSpec};

pub struct FluxSpec {
    pub flux_path: PathBuf,
}

impl LauncherSpec for FluxSpec {
    fn wlm_kind(&self) -> WlmKind {
        WlmKind::Flux
    }

    fn launcher_path(&self) -> &PathBuf {
        &self.flux_path
    }

    fn wrap_argv(&self, argv: &[String]) -> Vec<String> {
        let mut full = vec!["run".to_string()];
        full.extend(argv.iter().cloned());
        full
    }

    fn build_job_identifier(&self, launcher_pid: u32) -> JobIdentifier {
        JobIdentifier::Flux {
            job_id: env_u64("FLUX_JOB_ID").unwrap_or(launcher_pid as u64),
        }
    }

    fn kill_command(&self, job_id: &JobIdentifier, signal: KillSignal) -> (String, Vec<String>) {
        let _ = signal;
        (
            "flux".to_string(),
            vec!["cancel".to_string(), job_id.apid_string()],
        )
    }
}

pub struct FluxBackend {
    inner: LauncherBackend<FluxSpec>,
    flux_path: PathBuf,
}

impl FluxBackend {
    pub fn new(client: Arc<Mutex<DaemonClient>>, flux_path: PathBuf) -> Self {
        Self {
            inner: LauncherBackend::new(
                client,
                FluxSpec {
                    flux_path: flux_path.clone(),
                },
            ),
            flux_path,
        }
    }
}

#[async_trait]
impl Backend for FluxBackend {
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
        let job_id = job_id.apid_string();
        let status = tokio::process::Command::new(&self.flux_path)
            .arg("filemap")
            .arg("map")
            .arg("--tags=cti")
            .arg(format!("--jobid={job_id}"))
            .arg("--directory")
            .arg(tool_path)
            .arg(local_tar)
            .status()
            .await
            .map_err(|e| WlmError::ShipFailed(e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(WlmError::ShipFailed(format!(
                "flux filemap exited with {status}"
            )))
        }
    }

    async fn start_daemon(
        &self,
        job_id: &JobIdentifier,
        args: &[String],
        synchronous: bool,
    ) -> Result<(), WlmError> {
        let job_id = job_id.apid_string();
        let mut cmd = tokio::process::Command::new(&self.flux_path);
        cmd.arg("exec").arg(format!("--jobid={job_id}")).args(args);
        if synchronous {
            let status = cmd
                .status()
                .await
                .map_err(|e| WlmError::StartDaemonFailed(e.to_string()))?;
            if !status.success() {
                return Err(WlmError::StartDaemonFailed(format!(
                    "flux exec fan-out exited with {status}"
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
