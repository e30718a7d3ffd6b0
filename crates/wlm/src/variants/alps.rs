// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Cray ALPS backend: launches via `aprun`, ships packages through
//! `alps_launch_tool_helper`, kills via `apkill` (spec.md §4.5).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use cti_core::{JobIdentifier, WlmKind};
use cti_daemon_client::DaemonClient;
use tokio::sync::Mutex;

use crate::backend::{Backend, KillSignal, LaunchResult};
use crate::error::WlmError;
use crate::variants::launcher::{env_u64, hostname, LauncherBackend, LauncherSpec};

pub struct AlpsSpec {
    pub aprun_path: PathBuf,
}

impl LauncherSpec for AlpsSpec {
    fn wlm_kind(&self) -> WlmKind {
        WlmKind::Alps
    }

    fn launcher_path(&self) -> &PathBuf {
        &self.aprun_path
    }

    fn wrap_argv(&self, argv: &[String]) -> Vec<String> {
        argv.to_vec()
    }

    fn build_job_identifier(&self, launcher_pid: u32) -> JobIdentifier {
        JobIdentifier::Alps {
            apid: env_u64("ALPS_APP_ID").unwrap_or(launcher_pid as u64),
        }
    }

    fn kill_command(&self, job_id: &JobIdentifier, signal: KillSignal) -> (String, Vec<String>) {
        (
            "apkill".to_string(),
            vec![
                "-s".to_string(),
                signal.as_raw().to_string(),
                job_id.apid_string(),
            ],
        )
    }
}

pub struct AlpsBackend {
    inner: LauncherBackend<AlpsSpec>,
    alps_launch_tool_helper: PathBuf,
}

impl AlpsBackend {
    pub fn new(
        client: Arc<Mutex<DaemonClient>>,
        aprun_path: PathBuf,
        alps_launch_tool_helper: PathBuf,
    ) -> Self {
        Self {
            inner: LauncherBackend::new(client, AlpsSpec { aprun_path }),
            alps_launch_tool_helper,
        }
    }
}

#[async_trait]
impl Backend for AlpsBackend {
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
        let apid = match job_id {
            JobIdentifier::Alps { apid } => *apid,
            _ => return Err(WlmError::Unsupported),
        };
        let status = tokio::process::Command::new(&self.alps_launch_tool_helper)
            .arg(apid.to_string())
            .arg(local_tar)
            .arg(tool_path)
            .status()
            .await
            .map_err(|e| WlmError::ShipFailed(e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(WlmError::ShipFailed(format!(
                "alps_launch_tool_helper exited with {status}"
            )))
        }
    }

    async fn start_daemon(
        &self,
        job_id: &JobIdentifier,
        args: &[String],
        synchronous: bool,
    ) -> Result<(), WlmError> {
        let apid = match job_id {
            JobIdentifier::Alps { apid } => *apid,
            _ => return Err(WlmError::Unsupported),
        };
        let mut cmd = tokio::process::Command::new(&self.alps_launch_tool_helper);
        cmd.arg(apid.to_string()).args(args);
        if synchronous {
            let status = cmd
                .status()
                .await
                .map_err(|e| WlmError::StartDaemonFailed(e.to_string()))?;
            if !status.success() {
                return Err(WlmError::StartDaemonFailed(format!(
                    "tool helper fan-out exited with {status}"
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
