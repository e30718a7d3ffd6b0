// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

use cti_core::CtiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("protocol error: {0}")]
    Protocol(#[from] crate::protocol_wire::ProtocolError),
    #[error("spawn failed: {0}")]
    SpawnFailed(std::io::Error),
    #[error("app {0} is not registered")]
    UnknownApp(u64),
    #[error("mpir session {0} is not held")]
    UnknownMpirSession(u64),
    #[error(transparent)]
    Mpir(#[from] cti_mpir::MpirError),
}

impl From<DaemonError> for CtiError {
    fn from(e: DaemonError) -> Self {
        match e {
            DaemonError::Protocol(inner) => CtiError::DaemonProtocolError(inner.to_string()),
            DaemonError::SpawnFailed(io) => CtiError::SpawnFailed(io.to_string()),
            DaemonError::UnknownApp(id) => {
                CtiError::DaemonProtocolError(format!("unknown app {id}"))
            }
            DaemonError::UnknownMpirSession(id) => {
                CtiError::DaemonProtocolError(format!("unknown mpir session {id}"))
            }
            DaemonError::Mpir(inner) => inner.into(),
        }
    }
}
