// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

use cti_core::CtiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to spawn FE daemon: {0}")]
    SpawnFailed(std::io::Error),
    #[error("FE daemon connection lost: {0}")]
    DaemonLost(#[from] cti_fe_daemon::protocol_wire::ProtocolError),
    #[error("FE daemon returned an error: {0}")]
    Remote(String),
    #[error("unexpected response variant for this request")]
    UnexpectedResponse,
}

impl From<ClientError> for CtiError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::SpawnFailed(io) => CtiError::SpawnFailed(io.to_string()),
            ClientError::DaemonLost(_) => CtiError::DaemonLost,
            ClientError::Remote(msg) => CtiError::DaemonProtocolError(msg),
            ClientError::UnexpectedResponse => {
                CtiError::DaemonProtocolError("unexpected response variant".to_string())
            }
        }
    }
}
