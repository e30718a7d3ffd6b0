// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Opaque identifier types.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Define a newtype ID wrapper around a `u64`, unique within a process.
///
/// Generates `new()`, `get()`, `Display`, and the common derives. Mirrors the
/// `define_id!` pattern used for string-backed ids elsewhere in this crate,
/// but `App`s are process-local and never serialized across a daemon
/// restart, so a monotonic counter is enough and avoids a UUID dependency
/// in the leaf crate.
macro_rules! define_counter_id {
    ($(#[$meta:meta])* pub struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            /// Allocate the next id from a process-global counter.
            pub fn next() -> Self {
                static COUNTER: AtomicU64 = AtomicU64::new(1);
                Self(COUNTER.fetch_add(1, Ordering::Relaxed))
            }

            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_counter_id! {
    /// Identifies an [`crate::App`] for the lifetime of the owning frontend process.
    pub struct AppId;
}

define_counter_id! {
    /// Identifies a [`crate::Session`][session]'s owning app, reused for manifest
    /// instance bookkeeping that needs to namespace by app without holding one.
    ///
    /// [session]: https://docs.rs/cti-session
    pub struct SessionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_monotonic() {
        let a = AppId::next();
        let b = AppId::next();
        assert!(b.get() > a.get());
    }
}
