// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

use cti_core::CtiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WlmError {
    #[error("unsupported workload manager")]
    Unsupported,
    #[error("launcher binary not found: {0}")]
    LauncherNotFound(String),
    #[error("failed to ship package: {0}")]
    ShipFailed(String),
    #[error("failed to start daemon: {0}")]
    StartDaemonFailed(String),
    #[error("kill failed: {0}")]
    KillFailed(String),
    #[error(transparent)]
    DaemonClient(#[from] cti_daemon_client::ClientError),
    #[error(transparent)]
    Ssh(#[from] cti_ssh::SshError),
}

impl From<WlmError> for CtiError {
    fn from(e: WlmError) -> Self {
        match e {
            WlmError::Unsupported => CtiError::WlmUnsupported,
            WlmError::LauncherNotFound(name) => CtiError::LauncherNotFound(name),
            WlmError::ShipFailed(msg) => CtiError::ShipFailed(msg),
            WlmError::StartDaemonFailed(msg) => CtiError::DaemonProtocolError(msg),
            WlmError::KillFailed(msg) => CtiError::Terminated(msg),
            WlmError::DaemonClient(inner) => inner.into(),
            WlmError::Ssh(inner) => inner.into(),
        }
    }
}
