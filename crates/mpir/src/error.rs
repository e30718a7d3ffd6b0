// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! MPIR driver errors (spec.md §4.2, §7).

use cti_core::CtiError;
use cti_inferior::InferiorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MpirError {
    #[error(transparent)]
    Inferior(#[from] InferiorError),
    #[error("MPIR handshake timed out")]
    Timeout,
    #[error("launcher exited before reaching the MPIR barrier")]
    LaunchExited,
}

impl From<MpirError> for CtiError {
    fn from(err: MpirError) -> Self {
        match err {
            MpirError::Inferior(e) => e.into(),
            MpirError::Timeout => CtiError::MpirTimeout,
            MpirError::LaunchExited => CtiError::MpirLaunchExited,
        }
    }
}
