// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Pre-ship file accumulator (spec.md §4.7, component C7).

use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use cti_core::{FileConflict, FolderKind};

use crate::error::SessionError;
use crate::registry::FileRegistry;
use crate::session::Session;

const DEFAULT_BLACKLIST: &[&str] = &["/lib", "/lib64", "/usr/lib", "/usr/lib64"];
const DEFAULT_LIB_DIRS: &[&str] = &["/lib", "/lib64", "/usr/lib", "/usr/lib64"];

/// Manifest lifecycle (spec.md §4.11): files may only be added in `Open`;
/// `Shipping` brackets the pack+ship transaction; `Sealed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestState {
    Open,
    Shipping,
    Sealed,
}

/// A Manifest's directory-only entry (spec.md §4.7 `addLibDir`): the whole
/// directory is staged as one opaque tree rather than enumerated file by file.
#[derive(Debug, Clone)]
pub struct LibDirEntry {
    pub realname: String,
    pub source: PathBuf,
}

/// Pre-ship accumulator owned by a [`Session`] (spec.md §4.7).
#[derive(Debug, Clone)]
pub struct Manifest {
    instance_number: u64,
    registry: FileRegistry,
    lib_dirs: Vec<LibDirEntry>,
    ld_library_override: Option<FolderKind>,
    blacklist: Vec<PathBuf>,
    state: ManifestState,
}

impl Manifest {
    pub(crate) fn new(instance_number: u64) -> Self {
        Self {
            instance_number,
            registry: FileRegistry::new(),
            lib_dirs: Vec::new(),
            ld_library_override: None,
            blacklist: DEFAULT_BLACKLIST.iter().map(PathBuf::from).collect(),
            state: ManifestState::Open,
        }
    }

    pub fn instance_number(&self) -> u64 {
        self.instance_number
    }

    pub fn state(&self) -> ManifestState {
        self.state
    }

    pub fn registry(&self) -> &FileRegistry {
        &self.registry
    }

    pub fn lib_dirs(&self) -> &[LibDirEntry] {
        &self.lib_dirs
    }

    /// The override folder created by a library `NameOverwrite` conflict, if
    /// any (spec.md §3) — prepended to the session's `LD_LIBRARY_PATH` on ship.
    pub fn ld_library_override(&self) -> Option<&FolderKind> {
        self.ld_library_override.as_ref()
    }

    /// Override the default blacklist used by [`Manifest::add_lib_deps`].
    pub fn set_blacklist(&mut self, blacklist: Vec<PathBuf>) {
        self.blacklist = blacklist;
    }

    pub(crate) fn seal(&mut self) {
        self.state = ManifestState::Sealed;
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        match self.state {
            ManifestState::Open => Ok(()),
            ManifestState::Shipping | ManifestState::Sealed => Err(SessionError::ManifestSealed),
        }
    }

    /// `addBinary(name)` — resolve via `PATH`, check X+R permission, record
    /// under folder `bin`, then transitively [`Manifest::add_lib_deps`].
    pub fn add_binary(&mut self, name: &str, session: &Session) -> Result<(), SessionError> {
        self.ensure_open()?;
        let resolved = resolve_on_path(name).ok_or_else(|| SessionError::BinaryNotFound(name.to_string()))?;
        check_exec_read(&resolved)?;

        match session.registry().classify(&FolderKind::Bin, name, &resolved) {
            FileConflict::NameOverwrite => {
                return Err(SessionError::Conflict {
                    folder: FolderKind::Bin,
                    name: name.to_string(),
                })
            }
            FileConflict::None | FileConflict::AlreadyAdded => {
                self.registry.insert(FolderKind::Bin, name.to_string(), resolved.clone());
            }
        }

        self.add_lib_deps(&resolved, session)
    }

    /// `addLibrary(name)` — resolve via `LD_LIBRARY_PATH` and the default lib
    /// directories; a `NameOverwrite` conflict resolves into a private
    /// `lib.<instance>` folder rather than failing (spec.md §3).
    pub fn add_library(&mut self, name: &str, session: &Session) -> Result<(), SessionError> {
        self.ensure_open()?;
        let resolved = resolve_library(name).ok_or_else(|| SessionError::LibraryNotFound(name.to_string()))?;

        let folder = match session.registry().classify(&FolderKind::Lib, name, &resolved) {
            FileConflict::None | FileConflict::AlreadyAdded => FolderKind::Lib,
            FileConflict::NameOverwrite => {
                let override_folder = FolderKind::LibOverride(self.instance_number);
                self.ld_library_override = Some(override_folder.clone());
                override_folder
            }
        };
        self.registry.insert(folder, name.to_string(), resolved.clone());
        self.add_lib_deps(&resolved, session)
    }

    /// `addLibDir(path)` — record the real path as a single directory entry
    /// under `lib`.
    pub fn add_lib_dir(&mut self, path: &Path) -> Result<(), SessionError> {
        self.ensure_open()?;
        let realname = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| SessionError::LibraryNotFound(path.display().to_string()))?;
        self.lib_dirs.push(LibDirEntry {
            realname,
            source: path.to_path_buf(),
        });
        Ok(())
    }

    /// `addFile(name)` — record under the stage root folder.
    pub fn add_file(&mut self, path: &Path, session: &Session) -> Result<(), SessionError> {
        self.ensure_open()?;
        let realname = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| SessionError::BinaryNotFound(path.display().to_string()))?;

        match session.registry().classify(&FolderKind::Root, &realname, path) {
            FileConflict::NameOverwrite => {
                return Err(SessionError::Conflict {
                    folder: FolderKind::Root,
                    name: realname,
                })
            }
            FileConflict::None | FileConflict::AlreadyAdded => {
                self.registry.insert(FolderKind::Root, realname, path.to_path_buf());
            }
        }
        Ok(())
    }

    /// Transitive dependency discovery: spawn `binary` with the audit shim
    /// attached via `LD_AUDIT`/`CRAY_LD_VAL_LIBRARY`, read the NUL-delimited
    /// list of loaded object paths from its stderr, drop the loader itself
    /// (the first entry) and anything under the blacklist, then add each
    /// survivor as a library (spec.md §4.7).
    fn add_lib_deps(&mut self, binary: &Path, session: &Session) -> Result<(), SessionError> {
        let audit_lib = cti_core::config::ld_val_library()
            .map_err(|e| SessionError::LibDepsFailed(e.to_string()))?;

        let output = Command::new(binary)
            .env("LD_AUDIT", &audit_lib)
            .env("CRAY_LD_VAL_LIBRARY", &audit_lib)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match output {
            Ok(child) => child,
            Err(e) => return Err(SessionError::LibDepsFailed(e.to_string())),
        };

        let mut raw = Vec::new();
        if let Some(mut stderr) = child.stderr.take() {
            stderr
                .read_to_end(&mut raw)
                .map_err(|e| SessionError::LibDepsFailed(e.to_string()))?;
        }
        let _ = child.wait();

        for dep in parse_audit_entries(&raw, &self.blacklist) {
            let name = dep
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| dep.display().to_string());

            let folder = match session.registry().classify(&FolderKind::Lib, &name, &dep) {
                FileConflict::None | FileConflict::AlreadyAdded => FolderKind::Lib,
                FileConflict::NameOverwrite => {
                    let override_folder = FolderKind::LibOverride(self.instance_number);
                    self.ld_library_override = Some(override_folder.clone());
                    override_folder
                }
            };
            self.registry.insert(folder, name, dep);
        }
        Ok(())
    }
}

/// Parse the audit shim's NUL-delimited stderr stream: drop the first entry
/// (the dynamic loader itself) and anything matching the blacklist.
fn parse_audit_entries(raw: &[u8], blacklist: &[PathBuf]) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = raw
        .split(|&b| b == 0)
        .filter(|segment| !segment.is_empty())
        .map(|segment| PathBuf::from(String::from_utf8_lossy(segment).into_owned()))
        .collect();

    if !paths.is_empty() {
        paths.remove(0);
    }

    paths
        .into_iter()
        .filter(|p| !blacklist.iter().any(|prefix| p.starts_with(prefix)))
        .collect()
}

fn check_exec_read(path: &Path) -> Result<(), SessionError> {
    let metadata = std::fs::metadata(path).map_err(|_| SessionError::PermissionDenied(path.to_path_buf()))?;
    let mode = metadata.permissions().mode();
    const EXEC_BITS: u32 = 0o111;
    const READ_BITS: u32 = 0o444;
    if mode & EXEC_BITS == 0 || mode & READ_BITS == 0 {
        return Err(SessionError::PermissionDenied(path.to_path_buf()));
    }
    Ok(())
}

fn resolve_on_path(name: &str) -> Option<PathBuf> {
    if name.contains('/') {
        let candidate = PathBuf::from(name);
        return candidate.is_file().then_some(candidate);
    }
    std::env::var_os("PATH").and_then(|path| {
        std::env::split_paths(&path)
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

fn resolve_library(name: &str) -> Option<PathBuf> {
    if name.contains('/') {
        let candidate = PathBuf::from(name);
        return candidate.is_file().then_some(candidate);
    }
    let ld_library_path = std::env::var("LD_LIBRARY_PATH").unwrap_or_default();
    let search_dirs = std::env::split_paths(&ld_library_path)
        .chain(DEFAULT_LIB_DIRS.iter().map(PathBuf::from));
    search_dirs
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_entries_drop_loader_and_blacklisted() {
        let raw = b"/lib64/ld-linux-x86-64.so.2\0/opt/app/libfoo.so\0/usr/lib64/libc.so.6\0";
        let blacklist: Vec<PathBuf> = DEFAULT_BLACKLIST.iter().map(PathBuf::from).collect();
        let entries = parse_audit_entries(raw, &blacklist);
        assert_eq!(entries, vec![PathBuf::from("/opt/app/libfoo.so")]);
    }

    #[test]
    fn audit_entries_empty_input_yields_empty_output() {
        assert!(parse_audit_entries(b"", &[]).is_empty());
    }

    #[test]
    fn manifest_starts_open_and_seals() {
        let mut manifest = Manifest::new(1);
        assert_eq!(manifest.state(), ManifestState::Open);
        manifest.seal();
        assert_eq!(manifest.state(), ManifestState::Sealed);
        assert!(matches!(
            manifest.ensure_open(),
            Err(SessionError::ManifestSealed)
        ));
    }
}
