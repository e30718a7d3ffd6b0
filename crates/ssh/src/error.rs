// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

use cti_core::CtiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SshError {
    #[error("DNS resolution failed for {0}")]
    ResolveFailed(String),
    #[error("TCP connect failed: {0}")]
    Connect(std::io::Error),
    #[error("SSH handshake failed: {0}")]
    Handshake(ssh2::Error),
    #[error("host key verification failed for {0}")]
    KnownHostsRejected(String),
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    #[error("channel operation failed: {0}")]
    Channel(ssh2::Error),
    #[error("remote command exited with status {0}")]
    RemoteNonZero(i32),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<SshError> for CtiError {
    fn from(e: SshError) -> Self {
        match e {
            SshError::ResolveFailed(_) | SshError::Connect(_) | SshError::Handshake(_) => {
                CtiError::SshTransportFailed(e.to_string())
            }
            SshError::KnownHostsRejected(_) | SshError::AuthFailed(_) => {
                CtiError::SshAuthFailed(e.to_string())
            }
            SshError::Channel(_) | SshError::RemoteNonZero(_) | SshError::Io(_) => {
                CtiError::SshTransportFailed(e.to_string())
            }
        }
    }
}
