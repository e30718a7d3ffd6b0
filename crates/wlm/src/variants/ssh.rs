// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Generic-SSH backend (spec.md §4.5, §4.10). Unlike the other variants,
//! the launcher runs on a remote login node: a small helper binary is
//! started over SSH, drives the MPIR protocol there, and streams the
//! resulting proctable back over the channel. Shipping and BE-daemon
//! start-up reuse the same [`SshSession`] via SCP and `executeRemoteCommand`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cti_core::{JobIdentifier, ProcTable, ProcTableEntry};
use cti_ssh::{SshConfig, SshSession};

use crate::backend::{Backend, KillSignal, LaunchResult};
use crate::error::WlmError;

/// Name of the helper binary this variant expects at
/// `$CTI_INSTALL_DIR/libexec/cti_mpir_shim` on the remote host. It plants
/// the MPIR breakpoint on the launcher it execs and prints the proctable
/// as plain text once the barrier is reached: one `launcher_pid` line,
/// then `num_entries`, then one `host pid exe` line per rank.
const MPIR_SHIM_NAME: &str = "cti_mpir_shim";

pub struct SshBackend {
    host: String,
    port: u16,
    remote_install_dir: String,
    config: SshConfig,
}

impl SshBackend {
    pub fn new(host: String, port: u16, remote_install_dir: String, config: SshConfig) -> Self {
        Self {
            host,
            port,
            remote_install_dir,
            config,
        }
    }

    fn connect(&self) -> Result<SshSession, WlmError> {
        Ok(SshSession::connect(&self.host, self.port, &self.config)?)
    }

    fn shim_path(&self) -> String {
        format!("{}/libexec/{MPIR_SHIM_NAME}", self.remote_install_dir)
    }

    fn parse_proctable(output: &str) -> Result<(u32, ProcTable), WlmError> {
        let mut lines = output.lines();
        let launcher_pid: u32 = lines
            .next()
            .and_then(|l| l.trim().parse().ok())
            .ok_or_else(|| WlmError::ShipFailed("cti_mpir_shim: missing launcher pid".into()))?;
        let count: usize = lines
            .next()
            .and_then(|l| l.trim().parse().ok())
            .ok_or_else(|| WlmError::ShipFailed("cti_mpir_shim: missing rank count".into()))?;

        let mut entries = Vec::with_capacity(count);
        for line in lines.take(count) {
            let mut parts = line.splitn(3, ' ');
            let host = parts.next().unwrap_or_default().to_string();
            let pid: u32 = parts
                .next()
                .and_then(|p| p.parse().ok())
                .ok_or_else(|| WlmError::ShipFailed("cti_mpir_shim: bad pid field".into()))?;
            let executable = parts.next().unwrap_or_default().to_string();
            entries.push(ProcTableEntry {
                pid,
                hostname: host,
                executable_path: executable,
            });
        }
        Ok((launcher_pid, ProcTable::new(entries)))
    }
}

#[async_trait]
impl Backend for SshBackend {
    async fn launch_at_barrier(
        &self,
        argv: &[String],
        env: &[(String, String)],
    ) -> Result<LaunchResult, WlmError> {
        let session = self.connect()?;
        let shim = self.shim_path();
        let mut full_argv = vec![shim];
        full_argv.extend(argv.iter().cloned());
        let (status, output) =
            session.execute_remote_command_capturing(&full_argv, env, true)?;
        if status != 0 {
            return Err(WlmError::StartDaemonFailed(format!(
                "{MPIR_SHIM_NAME} exited with {status}"
            )));
        }
        let (launcher_pid, proctable) = Self::parse_proctable(&output)?;
        Ok(LaunchResult {
            job_id: JobIdentifier::Ssh {
                host: self.host.clone(),
                launcher_pid,
            },
            launcher_pid,
            proctable,
            mpir_id: None,
        })
    }

    async fn release_barrier(
        &self,
        job_id: &JobIdentifier,
        _mpir_id: Option<u64>,
    ) -> Result<(), WlmError> {
        let launcher_pid = match job_id {
            JobIdentifier::Ssh { launcher_pid, .. } => *launcher_pid,
            _ => return Err(WlmError::Unsupported),
        };
        let session = self.connect()?;
        session.execute_remote_command(
            &[self.shim_path(), "--release".to_string(), launcher_pid.to_string()],
            &[],
            true,
        )?;
        Ok(())
    }

    async fn attach(&self, pid: u32) -> Result<LaunchResult, WlmError> {
        let session = self.connect()?;
        let argv = vec![self.shim_path(), "--attach".to_string(), pid.to_string()];
        let (status, output) = session.execute_remote_command_capturing(&argv, &[], true)?;
        if status != 0 {
            return Err(WlmError::StartDaemonFailed(format!(
                "{MPIR_SHIM_NAME} --attach exited with {status}"
            )));
        }
        let (launcher_pid, proctable) = Self::parse_proctable(&output)?;
        Ok(LaunchResult {
            job_id: JobIdentifier::Ssh {
                host: self.host.clone(),
                launcher_pid,
            },
            launcher_pid,
            proctable,
            mpir_id: None,
        })
    }

    async fn register_util(&self, _owner_pid: u32, _util_pid: u32) -> Result<(), WlmError> {
        // Utilities spawned on the remote host are tracked by the shim
        // process itself, which exits when its parent session closes.
        Ok(())
    }

    async fn kill(&self, job_id: &JobIdentifier, signal: KillSignal) -> Result<(), WlmError> {
        let launcher_pid = match job_id {
            JobIdentifier::Ssh { launcher_pid, .. } => *launcher_pid,
            _ => return Err(WlmError::Unsupported),
        };
        let session = self.connect()?;
        let status = session.execute_remote_command(
            &[
                "kill".to_string(),
                format!("-{}", signal.as_raw()),
                launcher_pid.to_string(),
            ],
            &[],
            true,
        )?;
        if status == 0 {
            Ok(())
        } else {
            Err(WlmError::KillFailed(format!(
                "remote kill exited with {status}"
            )))
        }
    }

    async fn ship_package(
        &self,
        _job_id: &JobIdentifier,
        local_tar: &Path,
        remote_name: &str,
        tool_path: &str,
    ) -> Result<(), WlmError> {
        let session = self.connect()?;
        let dest = PathBuf::from(tool_path).join(remote_name);
        session.send_remote_file(local_tar, &dest, 0o644)?;
        Ok(())
    }

    async fn start_daemon(
        &self,
        _job_id: &JobIdentifier,
        args: &[String],
        synchronous: bool,
    ) -> Result<(), WlmError> {
        let session = self.connect()?;
        session.execute_remote_command(args, &[], synchronous)?;
        Ok(())
    }

    fn list_hosts(&self, _job_id: &JobIdentifier) -> Result<Vec<String>, WlmError> {
        Ok(vec![self.host.clone()])
    }

    fn list_placement(&self, _job_id: &JobIdentifier) -> Result<Vec<(String, u32)>, WlmError> {
        Ok(Vec::new())
    }

    fn launcher_hostname(&self, _job_id: &JobIdentifier) -> Result<String, WlmError> {
        Ok(self.host.clone())
    }

    async fn is_running(&self, job_id: &JobIdentifier) -> Result<bool, WlmError> {
        let launcher_pid = match job_id {
            JobIdentifier::Ssh { launcher_pid, .. } => *launcher_pid,
            _ => return Ok(false),
        };
        let session = self.connect()?;
        let status = session.execute_remote_command(
            &["kill".to_string(), "-0".to_string(), launcher_pid.to_string()],
            &[],
            true,
        )?;
        Ok(status == 0)
    }

    fn extra_files(&self) -> Vec<PathBuf> {
        vec![PathBuf::from(self.shim_path())]
    }
}
