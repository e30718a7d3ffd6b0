// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Errors from process-control and symbol-table operations (spec.md §4.1).

use cti_core::CtiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InferiorError {
    #[error("failed to spawn inferior: {0}")]
    SpawnFailed(String),
    #[error("failed to attach to pid {pid}: {reason}")]
    AttachFailed { pid: u32, reason: String },
    #[error("symbol not found: {0}")]
    SymbolNotFound(String),
    #[error("memory access failed: {0}")]
    MemoryAccessFailed(String),
    #[error("inferior has terminated")]
    Terminated,
}

impl From<InferiorError> for CtiError {
    fn from(err: InferiorError) -> Self {
        match err {
            InferiorError::SpawnFailed(msg) => CtiError::SpawnFailed(msg),
            InferiorError::AttachFailed { pid, reason } => CtiError::AttachFailed { pid, reason },
            InferiorError::SymbolNotFound(name) => CtiError::SymbolNotFound(name),
            InferiorError::MemoryAccessFailed(msg) => CtiError::MemoryAccessFailed(msg),
            InferiorError::Terminated => CtiError::Terminated("inferior exited".to_string()),
        }
    }
}
