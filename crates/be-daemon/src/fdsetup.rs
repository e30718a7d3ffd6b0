// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Standard fd hygiene and working-directory setup (spec.md §4.9 steps 1, 4).

use std::os::unix::io::AsRawFd;
use std::path::Path;

use crate::error::{io_err, BeDaemonError};

/// Highest fd number this daemon ever expects to find open (stdin/out/err
/// plus whatever the launching shell passed down incidentally).
const MAX_SCAN_FD: i32 = 1024;

/// Close every fd >= 3, then reopen 0/1/2 onto `/dev/null` (or, in `--debug`,
/// redirect 1/2 onto `log_path`).
pub fn reset_stdio(log_path: Option<&Path>) -> Result<(), BeDaemonError> {
    for fd in 3..MAX_SCAN_FD {
        // SAFETY: closing an fd we don't own is a documented no-op failure
        // (EBADF), not unsound; we're deliberately sweeping the whole range.
        unsafe {
            libc::close(fd);
        }
    }

    let devnull = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/null")
        .map_err(io_err("/dev/null"))?;
    dup2_onto(&devnull, 0)?;

    match log_path {
        Some(path) => {
            let log_file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(io_err(path))?;
            dup2_onto(&log_file, 1)?;
            dup2_onto(&log_file, 2)?;
        }
        None => {
            dup2_onto(&devnull, 1)?;
            dup2_onto(&devnull, 2)?;
        }
    }
    Ok(())
}

fn dup2_onto(file: &std::fs::File, target_fd: i32) -> Result<(), BeDaemonError> {
    // SAFETY: `file` owns a valid, open fd for the lifetime of this call;
    // dup2 onto a small well-known target is the standard stdio-redirect idiom.
    let rc = unsafe { libc::dup2(file.as_raw_fd(), target_fd) };
    if rc < 0 {
        return Err(io_err(format!("dup2 -> fd {target_fd}"))(std::io::Error::last_os_error()));
    }
    Ok(())
}

/// `chdir(toolPath)` then `chmod u+rwx` (preserving existing group/other bits).
pub fn enter_tool_path(tool_path: &Path) -> Result<(), BeDaemonError> {
    std::env::set_current_dir(tool_path).map_err(io_err(tool_path))?;

    let metadata = std::fs::metadata(tool_path).map_err(io_err(tool_path))?;
    let mut perms = metadata.permissions();
    use std::os::unix::fs::PermissionsExt;
    let mode = perms.mode() | 0o700;
    perms.set_mode(mode);
    std::fs::set_permissions(tool_path, perms).map_err(io_err(tool_path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn enter_tool_path_sets_owner_rwx() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o000)).unwrap();

        enter_tool_path(dir.path()).unwrap();

        let mode = std::fs::metadata(dir.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o700, 0o700);
    }
}
