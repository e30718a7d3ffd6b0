// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! The `(folder, realname) -> source_path` registry shared by [`crate::Session`]
//! and [`crate::Manifest`], with conflict classification per spec.md §3.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use cti_core::{FileConflict, FolderKind};

#[derive(Debug, Clone, Default)]
pub struct FileRegistry {
    folders: HashMap<FolderKind, HashSet<String>>,
    source_paths: HashMap<(FolderKind, String), PathBuf>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a candidate entry against what's already recorded.
    pub fn classify(&self, folder: &FolderKind, realname: &str, source: &Path) -> FileConflict {
        match self.source_paths.get(&(folder.clone(), realname.to_string())) {
            None => FileConflict::None,
            Some(existing) if existing == source => FileConflict::AlreadyAdded,
            Some(_) => FileConflict::NameOverwrite,
        }
    }

    /// Record an entry unconditionally (caller has already resolved any
    /// conflict, e.g. by picking an override folder).
    pub fn insert(&mut self, folder: FolderKind, realname: String, source: PathBuf) {
        self.folders.entry(folder.clone()).or_default().insert(realname.clone());
        self.source_paths.insert((folder, realname), source);
    }

    pub fn folders(&self) -> impl Iterator<Item = (&FolderKind, &HashSet<String>)> {
        self.folders.iter()
    }

    pub fn source_paths(&self) -> impl Iterator<Item = (&(FolderKind, String), &PathBuf)> {
        self.source_paths.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.source_paths.is_empty()
    }

    /// Merge `other` into `self`, returning the `(folder, realname)` pairs
    /// that were byte-for-byte duplicates already present in `self` (spec.md
    /// §4.6 step 2 — these are dropped from the archive before packing).
    pub fn merge_dropping_duplicates(
        &mut self,
        other: &FileRegistry,
    ) -> Vec<(FolderKind, String)> {
        let mut duplicates = Vec::new();
        for ((folder, realname), source) in &other.source_paths {
            match self.source_paths.get(&(folder.clone(), realname.clone())) {
                Some(existing) if existing == source => {
                    duplicates.push((folder.clone(), realname.clone()));
                }
                _ => {
                    self.insert(folder.clone(), realname.clone(), source.clone());
                }
            }
        }
        duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_detects_already_added_and_overwrite() {
        let mut reg = FileRegistry::new();
        let path_a = PathBuf::from("/opt/a/libfoo.so");
        reg.insert(FolderKind::Lib, "libfoo.so".to_string(), path_a.clone());

        assert_eq!(
            reg.classify(&FolderKind::Lib, "libfoo.so", &path_a),
            FileConflict::AlreadyAdded
        );
        assert_eq!(
            reg.classify(&FolderKind::Lib, "libfoo.so", Path::new("/opt/b/libfoo.so")),
            FileConflict::NameOverwrite
        );
        assert_eq!(
            reg.classify(&FolderKind::Bin, "libfoo.so", &path_a),
            FileConflict::None
        );
    }

    #[test]
    fn merge_drops_byte_identical_duplicates() {
        let mut session_reg = FileRegistry::new();
        let path = PathBuf::from("/opt/libfoo.so");
        session_reg.insert(FolderKind::Lib, "libfoo.so".to_string(), path.clone());

        let mut manifest_reg = FileRegistry::new();
        manifest_reg.insert(FolderKind::Lib, "libfoo.so".to_string(), path.clone());
        manifest_reg.insert(FolderKind::Bin, "tool".to_string(), PathBuf::from("/opt/tool"));

        let duplicates = session_reg.merge_dropping_duplicates(&manifest_reg);
        assert_eq!(
            duplicates,
            vec![(FolderKind::Lib, "libfoo.so".to_string())]
        );
        assert!(session_reg
            .source_paths()
            .any(|((f, n), _)| *f == FolderKind::Bin && n == "tool"));
    }
}
