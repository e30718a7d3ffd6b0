// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod backend;
mod error;
mod probe;
mod variants;

pub use backend::{Backend, KillSignal, LaunchResult, UtilId};
pub use error::WlmError;
pub use probe::{build_variant, select_wlm_kind};
pub use variants::{
    AlpsBackend, FluxBackend, LocalhostBackend, PalsBackend, SlurmBackend, SshBackend, Variant,
};

#[cfg(any(test, feature = "test-support"))]
pub use variants::MockBackend;
