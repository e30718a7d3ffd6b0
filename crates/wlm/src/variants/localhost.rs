// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Localhost backend: the caller's binary *is* the launcher (one rank, one
//! node), packages are staged with a plain file copy, the BE daemon runs
//! in-place without a WLM fan-out primitive (spec.md §4.5).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use cti_core::{JobIdentifier, WlmKind};
use cti_daemon_client::DaemonClient;
use tokio::sync::Mutex;

use crate::backend::{Backend, KillSignal, LaunchResult};
use crate::error::WlmError;
use crate::variants::launcher::{hostname, LauncherBackend, LauncherSpec};

#[derive(Default)]
pub struct LocalhostSpec {
    /// Unused: Localhost's binary differs per launch, substituted directly
    /// in [`LocalhostBackend::launch_at_barrier`] instead of here.
    unused_path: PathBuf,
}

impl LauncherSpec for LocalhostSpec {
    fn wlm_kind(&self) -> WlmKind {
        WlmKind::Localhost
    }

    fn launcher_path(&self) -> &PathBuf {
        &self.unused_path
    }

    fn wrap_argv(&self, argv: &[String]) -> Vec<String> {
        argv.to_vec()
    }

    fn build_job_identifier(&self, launcher_pid: u32) -> JobIdentifier {
        JobIdentifier::Localhost { launcher_pid }
    }

    fn kill_command(&self, job_id: &JobIdentifier, signal: KillSignal) -> (String, Vec<String>) {
        let pid = match job_id {
            JobIdentifier::Localhost { launcher_pid } => launcher_pid.to_string(),
            _ => job_id.apid_string(),
        };
        (
            "kill".to_string(),
            vec![format!("-{}", signal.as_raw()), pid],
        )
    }
}

/// The Localhost [`LauncherSpec::launcher_path`] is unused: each launch
/// supplies its own binary as argv[0], so [`LocalhostBackend`] builds
/// [`cti_daemon_client::SpawnArgs`] directly instead of going through
/// [`LauncherBackend::launch_at_barrier`].
pub struct LocalhostBackend {
    client: Arc<Mutex<DaemonClient>>,
    inner: LauncherBackend<LocalhostSpec>,
}

impl LocalhostBackend {
    pub fn new(client: Arc<Mutex<DaemonClient>>) -> Self {
        Self {
            inner: LauncherBackend::new(client.clone(), LocalhostSpec::default()),
            client,
        }
    }
}

#[async_trait]
impl Backend for LocalhostBackend {
    async fn launch_at_barrier(
        &self,
        argv: &[String],
        env: &[(String, String)],
    ) -> Result<LaunchResult, WlmError> {
        let Some((binary, rest)) = argv.split_first() else {
            return Err(WlmError::LauncherNotFound("<empty argv>".to_string()));
        };
        let spawn = cti_daemon_client::SpawnArgs {
            path: binary.clone(),
            argv: rest.to_vec(),
            env: env.to_vec(),
            stdio: cti_daemon_client::inherited_stdio(),
        };
        let mut client = self.client.lock().await;
        let mpir = client.launch_mpir(spawn, WlmKind::Localhost).await?;
        Ok(LaunchResult {
            job_id: JobIdentifier::Localhost {
                launcher_pid: mpir.launcher_pid,
            },
            launcher_pid: mpir.launcher_pid,
            proctable: mpir.proctable,
            mpir_id: Some(mpir.mpir_id),
        })
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
        _job_id: &JobIdentifier,
        local_tar: &Path,
        remote_name: &str,
        tool_path: &str,
    ) -> Result<(), WlmError> {
        let dest = Path::new(tool_path).join(remote_name);
        tokio::fs::copy(local_tar, &dest)
            .await
            .map_err(|e| WlmError::ShipFailed(e.to_string()))?;
        Ok(())
    }

    async fn start_daemon(
        &self,
        job_id: &JobIdentifier,
        args: &[String],
        synchronous: bool,
    ) -> Result<(), WlmError> {
        let owner_pid = match job_id {
            JobIdentifier::Localhost { launcher_pid } => *launcher_pid,
            _ => return Err(WlmError::Unsupported),
        };
        let Some((binary, rest)) = args.split_first() else {
            return Err(WlmError::StartDaemonFailed("empty be-daemon argv".to_string()));
        };
        let spawn = cti_daemon_client::SpawnArgs {
            path: binary.clone(),
            argv: rest.to_vec(),
            env: Vec::new(),
            stdio: cti_daemon_client::inherited_stdio(),
        };
        let wait = if synchronous {
            cti_daemon_client::WaitMode::Sync
        } else {
            cti_daemon_client::WaitMode::Async
        };
        let mut client = self.client.lock().await;
        client
            .fork_execvp_util(owner_pid, wait, spawn)
            .await
            .map_err(|e| WlmError::StartDaemonFailed(e.to_string()))?;
        Ok(())
    }

    fn list_hosts(&self, _job_id: &JobIdentifier) -> Result<Vec<String>, WlmError> {
        Ok(vec![hostname()?])
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
