// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! The unified error sum type returned to callers (spec.md §7).
//!
//! Each downstream crate defines its own `thiserror` enum for the failures
//! particular to its layer (`InferiorError`, `MpirError`, `WlmError`, ...)
//! and implements `From<TheirError> for CtiError` at the point where that
//! crate's result crosses into a caller-facing API — `cti-core` itself has
//! no dependency on those crates, so the conversions live downstream, not
//! here. This mirrors how the teacher rolls `SessionError`, `RuntimeError`,
//! etc. up into one daemon-facing error at the process boundary.

use thiserror::Error;

/// A single sum type covering every failure mode reachable from the public
/// API, matching the error kinds enumerated in spec.md §7.
#[derive(Debug, Error)]
pub enum CtiError {
    #[error("environment variable not configured: {0}")]
    EnvMisconfigured(String),

    #[error("unsupported workload manager")]
    WlmUnsupported,

    #[error("launcher binary not found: {0}")]
    LauncherNotFound(String),

    #[error("failed to spawn inferior: {0}")]
    SpawnFailed(String),

    #[error("failed to attach to pid {pid}: {reason}")]
    AttachFailed { pid: u32, reason: String },

    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("memory access failed: {0}")]
    MemoryAccessFailed(String),

    #[error("MPIR handshake timed out")]
    MpirTimeout,

    #[error("launcher exited before reaching the MPIR barrier")]
    MpirLaunchExited,

    #[error("the barrier for this app was already released")]
    BarrierAlreadyReleased,

    #[error("FE daemon connection lost")]
    DaemonLost,

    #[error("FE daemon protocol error: {0}")]
    DaemonProtocolError(String),

    #[error("manifest is sealed and cannot be modified")]
    ManifestSealed,

    #[error("conflicting file in folder {folder:?}: {name}")]
    SessionConflict { folder: String, name: String },

    #[error("failed to ship package: {0}")]
    ShipFailed(String),

    #[error("failed to extract package: {0}")]
    ExtractFailed(String),

    #[error("failed to pack archive: {0}")]
    ArchiveFailed(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("SSH authentication failed: {0}")]
    SshAuthFailed(String),

    #[error("SSH transport failed: {0}")]
    SshTransportFailed(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("process terminated: {0}")]
    Terminated(String),
}

/// Convenience alias used throughout the workspace's public APIs.
pub type CtiResult<T> = Result<T, CtiError>;
