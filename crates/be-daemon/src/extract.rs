// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Manifest tarball extraction (spec.md §4.9 step 5): restore permissions,
//! then unlink the tarball so a repeated run does not re-extract it.

use std::path::Path;

use crate::error::{io_err, BeDaemonError};

/// Extract `tarball` into `dest_dir`, then remove it. `tar::Archive::unpack`
/// already restores each entry's mode from the header (spec.md §4.8 writes
/// real permissions into the gnutar header), matching the "restoring perms"
/// requirement; ACLs/file-flags are not representable in a plain tar stream
/// and are out of scope here.
pub fn extract_and_unlink(tarball: &Path, dest_dir: &Path) -> Result<(), BeDaemonError> {
    std::fs::create_dir_all(dest_dir).map_err(io_err(dest_dir))?;

    let file = std::fs::File::open(tarball).map_err(io_err(tarball))?;
    let mut archive = tar::Archive::new(file);
    archive
        .unpack(dest_dir)
        .map_err(|_| BeDaemonError::ExtractFailed(tarball.to_path_buf()))?;

    std::fs::remove_file(tarball).map_err(io_err(tarball))?;
    Ok(())
}

/// Trim a trailing `.tar` extension to recover the stage directory basename.
pub fn stage_dir_name(manifest_basename: &str) -> &str {
    manifest_basename.strip_suffix(".tar").unwrap_or(manifest_basename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_dir_name_trims_tar_suffix() {
        assert_eq!(stage_dir_name("abc123_1.tar"), "abc123_1");
        assert_eq!(stage_dir_name("abc123_1"), "abc123_1");
    }

    #[test]
    fn extract_and_unlink_restores_files_and_removes_tarball() {
        let dir = tempfile::tempdir().unwrap();
        let tarball = dir.path().join("stage.tar");

        {
            let file = std::fs::File::create(&tarball).unwrap();
            let mut builder = tar::Builder::new(file);
            let data = b"hello";
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, "bin/tool", &data[..]).unwrap();
            builder.finish().unwrap();
        }

        let dest = dir.path().join("stage");
        extract_and_unlink(&tarball, &dest).unwrap();

        assert!(dest.join("bin/tool").is_file());
        assert!(!tarball.exists());
    }

    #[test]
    fn missing_tarball_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = extract_and_unlink(&dir.path().join("missing.tar"), &dir.path().join("stage"));
        assert!(result.is_err());
    }
}
