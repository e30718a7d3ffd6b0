// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! FE-daemon client (spec.md §4.4, component C4).

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod error;

pub use client::{inherited_stdio, DaemonClient};
pub use error::ClientError;

pub use cti_fe_daemon::protocol::{SpawnArgs, StdioFds, WaitMode};
