// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

use cti_core::{AppId, CtiError};
use thiserror::Error;

/// Errors raised at the facade boundary itself, rolled up with every
/// downstream crate's error into the one sum type callers see.
#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("no such app: {0}")]
    UnknownApp(AppId),
    #[error("app {0} has no staging session yet; call Frontend::ensure_session first")]
    NoSession(AppId),
    #[error(transparent)]
    Core(#[from] CtiError),
}

impl From<FrontendError> for CtiError {
    fn from(e: FrontendError) -> Self {
        match e {
            FrontendError::UnknownApp(id) => CtiError::DaemonProtocolError(format!("no such app: {id}")),
            FrontendError::NoSession(id) => {
                CtiError::DaemonProtocolError(format!("app {id} has no staging session yet"))
            }
            FrontendError::Core(inner) => inner,
        }
    }
}

impl From<cti_session::SessionError> for FrontendError {
    fn from(e: cti_session::SessionError) -> Self {
        FrontendError::Core(e.into())
    }
}

impl From<cti_wlm::WlmError> for FrontendError {
    fn from(e: cti_wlm::WlmError) -> Self {
        FrontendError::Core(e.into())
    }
}

impl From<cti_daemon_client::ClientError> for FrontendError {
    fn from(e: cti_daemon_client::ClientError) -> Self {
        FrontendError::Core(e.into())
    }
}
