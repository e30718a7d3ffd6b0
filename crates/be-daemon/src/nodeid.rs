// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Stable per-node identifier used in `--debug` log file names (spec.md §4.9
//! step 2): the Cray XT node id where available, else a hash of the hostname.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

const CRAY_XT_NID_PATH: &str = "/proc/cray_xt/nid";

pub fn node_id() -> String {
    if let Ok(contents) = std::fs::read_to_string(CRAY_XT_NID_PATH) {
        let trimmed = contents.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    hash_hostname()
}

fn hash_hostname() -> String {
    let hostname = gethostname_lossy();
    let mut hasher = DefaultHasher::new();
    hostname.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}

fn gethostname_lossy() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_hostname_is_deterministic() {
        assert_eq!(hash_hostname(), hash_hostname());
    }
}
