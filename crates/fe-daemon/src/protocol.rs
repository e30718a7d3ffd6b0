// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Request/response types exchanged between the FE daemon and its client
//! (spec.md §4.3). The wire format itself (length-prefixed JSON) lives in
//! [`crate::protocol_wire`]; these types are what gets serialized.

use cti_core::{ProcTable, WlmKind};
use serde::{Deserialize, Serialize};

/// Whether a `ForkExecvpUtil` caller wants to block until the helper exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitMode {
    Sync,
    Async,
}

/// Inherited stdio, passed to the daemon as duplicated fds over the control
/// socket's ancillary (`SCM_RIGHTS`) channel. The numbers carried here are
/// placeholders substituted with the real fd once `SCM_RIGHTS` payload is
/// received; see `listener.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdioFds {
    pub stdin: i32,
    pub stdout: i32,
    pub stderr: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnArgs {
    pub path: String,
    pub argv: Vec<String>,
    pub env: Vec<(String, String)>,
    pub stdio: StdioFds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    ForkExecvpApp {
        spawn: SpawnArgs,
    },
    ForkExecvpUtil {
        /// The registered app pid this helper belongs to (spec.md §4.3:
        /// utils are killed when their owning app deregisters).
        owner: u32,
        wait: WaitMode,
        spawn: SpawnArgs,
    },
    LaunchMPIR {
        spawn: SpawnArgs,
        wlm_kind: WlmKind,
    },
    AttachMPIR {
        pid: u32,
        wlm_kind: WlmKind,
    },
    ReleaseMPIR {
        mpir_id: u64,
    },
    RegisterApp {
        pid: u32,
    },
    RegisterUtil {
        owner: u32,
        util_pid: u32,
    },
    DeregisterApp {
        app: u32,
    },
    CheckApp {
        app: u32,
    },
    Shutdown,
}

/// `MPIRResp` from spec.md §4.3: launcher pid, mpir session handle, and the
/// proctable read out at the barrier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MpirResponse {
    pub mpir_id: u64,
    pub launcher_pid: u32,
    pub proctable: ProcTable,
    pub is_starter: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Pid { pid: u32 },
    Mpir(MpirResponse),
    Ok,
    Running { running: bool },
    Error { message: String },
}

impl Response {
    pub fn error(err: impl std::fmt::Display) -> Self {
        Response::Error {
            message: err.to_string(),
        }
    }
}
