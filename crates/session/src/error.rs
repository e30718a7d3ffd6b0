// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

use cti_core::{CtiError, FolderKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("manifest is sealed and cannot be modified")]
    ManifestSealed,
    #[error("conflicting file in folder {folder}: {name}")]
    Conflict { folder: FolderKind, name: String },
    #[error("binary not found on PATH: {0}")]
    BinaryNotFound(String),
    #[error("library not found: {0}")]
    LibraryNotFound(String),
    #[error("binary lacks execute or read permission: {0}")]
    PermissionDenied(std::path::PathBuf),
    #[error("library dependency discovery failed: {0}")]
    LibDepsFailed(String),
    #[error("environment misconfigured: {0}")]
    EnvMisconfigured(String),
    #[error(transparent)]
    Archive(#[from] cti_archive::ArchiveError),
    #[error(transparent)]
    Wlm(#[from] cti_wlm::WlmError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SessionError> for CtiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::ManifestSealed => CtiError::ManifestSealed,
            SessionError::Conflict { folder, name } => CtiError::SessionConflict {
                folder: folder.to_string(),
                name,
            },
            SessionError::BinaryNotFound(name) => CtiError::FileNotFound(name),
            SessionError::LibraryNotFound(name) => CtiError::FileNotFound(name),
            SessionError::PermissionDenied(path) => {
                CtiError::SpawnFailed(format!("permission denied: {}", path.display()))
            }
            SessionError::LibDepsFailed(msg) => CtiError::ArchiveFailed(msg),
            SessionError::EnvMisconfigured(var) => CtiError::EnvMisconfigured(var),
            SessionError::Archive(inner) => inner.into(),
            SessionError::Wlm(inner) => inner.into(),
            SessionError::Io(e) => CtiError::ArchiveFailed(e.to_string()),
        }
    }
}
