// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Per-instance lock files that enforce manifest ship ordering within a
//! Session (spec.md §4.9 steps 6-7, §5 "Ordering guarantees").

use std::path::{Path, PathBuf};
use std::time::Duration;

use cti_core::config::BE_DAEMON_LOCK_POLL_INTERVAL;

use crate::error::{io_err, BeDaemonError};

pub fn lock_file_path(tool_path: &Path, stage_name: &str, instance: u32) -> PathBuf {
    tool_path.join(format!(".lock_{stage_name}_{instance}"))
}

/// Create this instance's lock file. Must only be called after its manifest
/// has been fully extracted (spec.md §4.9 invariant).
pub fn create(tool_path: &Path, stage_name: &str, instance: u32) -> Result<(), BeDaemonError> {
    let path = lock_file_path(tool_path, stage_name, instance);
    std::fs::File::create(&path).map_err(io_err(path))?;
    Ok(())
}

/// Busy-wait (10ms poll) until every prior instance's lock file exists.
pub fn wait_for_predecessors(tool_path: &Path, stage_name: &str, instance: u32) {
    wait_for_predecessors_with(tool_path, stage_name, instance, BE_DAEMON_LOCK_POLL_INTERVAL, |p| p.exists());
}

fn wait_for_predecessors_with(
    tool_path: &Path,
    stage_name: &str,
    instance: u32,
    poll_interval: Duration,
    exists: impl Fn(&Path) -> bool,
) {
    for predecessor in 1..instance {
        let path = lock_file_path(tool_path, stage_name, predecessor);
        while !exists(&path) {
            std::thread::sleep(poll_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn lock_file_path_matches_naming_scheme() {
        let path = lock_file_path(Path::new("/scratch/tool"), "abc123", 2);
        assert_eq!(path, PathBuf::from("/scratch/tool/.lock_abc123_2"));
    }

    #[test]
    fn wait_for_predecessors_polls_until_all_exist() {
        let calls = AtomicUsize::new(0);
        wait_for_predecessors_with(
            Path::new("/scratch/tool"),
            "abc123",
            3,
            Duration::from_millis(0),
            |path| {
                let n = calls.fetch_add(1, Ordering::Relaxed);
                // Predecessor 1 exists immediately; predecessor 2 appears on its
                // second poll.
                path.ends_with(".lock_abc123_1") || n >= 2
            },
        );
        assert!(calls.load(Ordering::Relaxed) >= 2);
    }

    #[test]
    fn no_predecessors_for_first_instance() {
        wait_for_predecessors_with(Path::new("/scratch/tool"), "abc123", 1, Duration::from_millis(0), |_| {
            false
        });
    }
}
