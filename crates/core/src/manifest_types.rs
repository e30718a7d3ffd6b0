// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Shared vocabulary for manifest file entries (spec.md §3).
//!
//! Lives in `cti-core` rather than `cti-session` because `cti-wlm`'s
//! "extra files" hook (spec.md §4.5) also needs to name folders and
//! construct conflict-free entries without depending on the session crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The folder a staged file lands under on the compute node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FolderKind {
    Bin,
    Lib,
    /// Private per-manifest library override folder (`lib.<instance>`),
    /// created to resolve a same-name/different-content library conflict.
    LibOverride(u64),
    /// The stage root itself (empty folder name in spec.md §3).
    Root,
}

impl fmt::Display for FolderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bin => write!(f, "bin"),
            Self::Lib => write!(f, "lib"),
            Self::LibOverride(instance) => write!(f, "lib.{instance}"),
            Self::Root => write!(f, ""),
        }
    }
}

/// Result of checking a candidate `(folder, realname)` file entry against a
/// session's existing registry (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileConflict {
    /// The pair is absent; adding is unconditionally safe.
    None,
    /// Present, and the candidate's real path matches the recorded one.
    AlreadyAdded,
    /// Present with a different real path. Libraries resolve via a private
    /// override folder; other kinds are a hard error (spec.md §3).
    NameOverwrite,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_kind_display_matches_stage_layout() {
        assert_eq!(FolderKind::Bin.to_string(), "bin");
        assert_eq!(FolderKind::Lib.to_string(), "lib");
        assert_eq!(FolderKind::LibOverride(2).to_string(), "lib.2");
        assert_eq!(FolderKind::Root.to_string(), "");
    }
}
