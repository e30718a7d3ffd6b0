// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Thin ptrace + ELF-symbol-table handle around a traced process
//! (spec.md §4.1, component C1).

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod elf;
mod error;
mod inferior;

pub use error::InferiorError;
pub use inferior::{disable_follow_fork, Address, Inferior, RunState};
