// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! HPE PALS backend: launches via `mpiexec`, ships packages by PUTting the
//! tarball to the PALS REST endpoint on every node, kills via the PALS
//! job-delete endpoint (spec.md §4.5).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use cti_core::{JobIdentifier, WlmKind};
use cti_daemon_client::DaemonClient;
use tokio::sync::Mutex;

use crate::backend::{Backend, KillSignal, LaunchResult};
use crate::error::WlmError;
use crate::variants::launcher::{hostname, LauncherBackend, LauncherSpec};

pub struct PalsSpec {
    pub mpiexec_path: PathBuf,
}

impl LauncherSpec for PalsSpec {
    fn wlm_kind(&self) -> WlmKind {
        WlmKind::Pals
    }

    fn launcher_path(&self) -> &PathBuf {
        &self.mpiexec_path
    }

    fn wrap_argv(&self, argv: &[String]) -> Vec<String> {
        argv.to_vec()
    }

    fn build_job_identifier(&self, launcher_pid: u32) -> JobIdentifier {
        JobIdentifier::Pals {
            apid: std::env::var("PALS_APID").unwrap_or_else(|_| launcher_pid.to_string()),
        }
    }

    fn kill_command(&self, job_id: &JobIdentifier, signal: KillSignal) -> (String, Vec<String>) {
        let _ = signal;
        (
            "palscmd".to_string(),
            vec!["delete".to_string(), job_id.apid_string()],
        )
    }
}

/// `PALS_APID`'s corresponding REST endpoint, e.g. `http://localhost:5689`.
fn pals_endpoint() -> String {
    std::env::var("PALS_APIGW").unwrap_or_else(|_| "http://localhost:5689".to_string())
}

pub struct PalsBackend {
    inner: LauncherBackend<PalsSpec>,
    http: reqwest::blocking::Client,
}

impl PalsBackend {
    pub fn new(client: Arc<Mutex<DaemonClient>>, mpiexec_path: PathBuf) -> Self {
        Self {
            inner: LauncherBackend::new(client, PalsSpec { mpiexec_path }),
            http: reqwest::blocking::Client::new(),
        }
    }
}

#[async_trait]
impl Backend for PalsBackend {
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
        remote_name: &str,
        tool_path: &str,
    ) -> Result<(), WlmError> {
        let apid = job_id.apid_string();
        let data = tokio::fs::read(local_tar)
            .await
            .map_err(|e| WlmError::ShipFailed(e.to_string()))?;
        let hosts = self.list_hosts(job_id)?;
        let endpoint = pals_endpoint();
        for host in hosts {
            let url = format!(
                "{endpoint}/apis/v1/apps/{apid}/nodes/{host}/files{tool_path}/{remote_name}"
            );
            let http = self.http.clone();
            let body = data.clone();
            tokio::task::spawn_blocking(move || http.put(url).body(body).send())
                .await
                .map_err(|e| WlmError::ShipFailed(e.to_string()))?
                .map_err(|e| WlmError::ShipFailed(e.to_string()))?
                .error_for_status()
                .map_err(|e| WlmError::ShipFailed(e.to_string()))?;
        }
        Ok(())
    }

    async fn start_daemon(
        &self,
        job_id: &JobIdentifier,
        args: &[String],
        synchronous: bool,
    ) -> Result<(), WlmError> {
        let _ = synchronous;
        let apid = job_id.apid_string();
        let endpoint = pals_endpoint();
        let url = format!("{endpoint}/apis/v1/apps/{apid}/start");
        let http = self.http.clone();
        let args = args.to_vec();
        tokio::task::spawn_blocking(move || http.post(url).json(&args).send())
            .await
            .map_err(|e| WlmError::StartDaemonFailed(e.to_string()))?
            .map_err(|e| WlmError::StartDaemonFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| WlmError::StartDaemonFailed(e.to_string()))?;
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
