// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Top-level facade tying the WLM backend (C5), FE-daemon client (C4), and
//! Session/Manifest staging model (C6/C7) into the API a tool writer's Rust
//! code drives directly (spec.md §2, §3).

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod error;
mod frontend;

pub use error::FrontendError;
pub use frontend::Frontend;

pub use cti_core::{App, AppId, BarrierState, CtiError, JobIdentifier, MpirSessionId, WlmKind};
pub use cti_session::{Manifest, ManifestState, Session};
pub use cti_wlm::{KillSignal, UtilId};
