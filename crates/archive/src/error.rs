// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

use cti_core::CtiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error packing {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported file kind at {0} (neither regular file nor directory)")]
    UnsupportedFileKind(std::path::PathBuf),
}

impl From<ArchiveError> for CtiError {
    fn from(e: ArchiveError) -> Self {
        match e {
            ArchiveError::Io { path, source } => {
                CtiError::ArchiveFailed(format!("{}: {source}", path.display()))
            }
            ArchiveError::UnsupportedFileKind(path) => {
                CtiError::ArchiveFailed(format!("unsupported file kind: {}", path.display()))
            }
        }
    }
}
