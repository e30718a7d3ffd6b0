// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

use thiserror::Error;

use crate::cli::CliError;

#[derive(Debug, Error)]
pub enum BeDaemonError {
    #[error("argument error: {0}")]
    Args(#[from] CliError),
    #[error("unrecognized --wlm value: {0}")]
    UnknownWlm(u8),
    #[error("io error at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("failed to extract manifest {0}")]
    ExtractFailed(std::path::PathBuf),
}

pub(crate) fn io_err(path: impl Into<std::path::PathBuf>) -> impl FnOnce(std::io::Error) -> BeDaemonError {
    let path = path.into();
    move |source| BeDaemonError::Io { path, source }
}
