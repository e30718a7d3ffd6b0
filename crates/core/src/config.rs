// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Environment variables consumed by the frontend (spec.md §6).
//!
//! Mirrors the teacher's `crates/daemon/src/env.rs`: one function per
//! variable, returning `Option`/`Result` rather than reading `std::env`
//! ad-hoc throughout the codebase.

use crate::error::CtiError;
use std::path::PathBuf;
use std::time::Duration;

/// Root of the library install (BE daemon, audit `.so`, stop shim).
pub fn install_dir() -> Result<PathBuf, CtiError> {
    std::env::var("CTI_INSTALL_DIR")
        .map(PathBuf::from)
        .map_err(|_| CtiError::EnvMisconfigured("CTI_INSTALL_DIR".to_string()))
}

/// Optional relocation root when the install isn't at build-time paths.
pub fn base_dir() -> Option<PathBuf> {
    std::env::var("CTI_BASE_DIR").ok().map(PathBuf::from)
}

/// Where BE daemons write logs in `--debug` mode.
pub fn log_dir() -> Option<PathBuf> {
    std::env::var("CTI_LOG_DIR").ok().map(PathBuf::from)
}

/// Whether `CTI_DEBUG` is set: enables BE-daemon log redirection and
/// frontend trace output.
pub fn debug_enabled() -> bool {
    std::env::var_os("CTI_DEBUG").is_some()
}

/// Local tar/staging scratch directory: `CTI_CFG_DIR`, else `$TMPDIR`,
/// else `/tmp`, else `$HOME`.
pub fn cfg_dir() -> Result<PathBuf, CtiError> {
    if let Ok(dir) = std::env::var("CTI_CFG_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(dir) = std::env::var("TMPDIR") {
        return Ok(PathBuf::from(dir));
    }
    if PathBuf::from("/tmp").is_dir() {
        return Ok(PathBuf::from("/tmp"));
    }
    std::env::var("HOME")
        .map(PathBuf::from)
        .map_err(|_| CtiError::EnvMisconfigured("CTI_CFG_DIR".to_string()))
}

/// Overrides the WLM-default launcher binary name (`srun`, `aprun`, `flux`, ...).
pub fn launcher_name_override() -> Option<String> {
    std::env::var("CTI_LAUNCHER_NAME").ok()
}

/// Forces the WLM variant, bypassing the filesystem/binary probe.
pub fn wlm_impl_override() -> Option<String> {
    std::env::var("CTI_WLM_IMPL").ok()
}

/// Path to the `LD_AUDIT` shim used for transitive library dependency discovery.
pub fn ld_val_library() -> Result<PathBuf, CtiError> {
    std::env::var("CRAY_LD_VAL_LIBRARY")
        .map(PathBuf::from)
        .map_err(|_| CtiError::EnvMisconfigured("CRAY_LD_VAL_LIBRARY".to_string()))
}

/// SSH transport tuning knobs (spec.md §6).
pub mod ssh {
    use std::path::PathBuf;

    pub fn dir() -> Option<PathBuf> {
        std::env::var("SSH_DIR").ok().map(PathBuf::from)
    }

    pub fn known_hosts_path() -> Option<PathBuf> {
        std::env::var("SSH_KNOWNHOSTS_PATH").ok().map(PathBuf::from)
    }

    pub fn pubkey_path() -> Option<PathBuf> {
        std::env::var("SSH_PUBKEY_PATH").ok().map(PathBuf::from)
    }

    pub fn prikey_path() -> Option<PathBuf> {
        std::env::var("SSH_PRIKEY_PATH").ok().map(PathBuf::from)
    }

    pub fn passphrase() -> Option<String> {
        std::env::var("SSH_PASSPHRASE").ok()
    }
}

/// BE-daemon lock-file poll interval (spec.md §4.9, §9): fixed at 10ms, not
/// configurable — the spec calls out the constant explicitly as a deliberate
/// simplicity/scale tradeoff.
pub const BE_DAEMON_LOCK_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// MPIR retry sleep between barrier polls (spec.md §4.2 step 3).
pub const MPIR_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variable tests mutate global process state, so they must
    // not run concurrently with each other.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn cfg_dir_prefers_explicit_override() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("CTI_CFG_DIR", "/tmp/explicit-cti-cfg");
        assert_eq!(cfg_dir().unwrap(), PathBuf::from("/tmp/explicit-cti-cfg"));
        std::env::remove_var("CTI_CFG_DIR");
    }

    #[test]
    fn debug_enabled_reflects_env() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("CTI_DEBUG");
        assert!(!debug_enabled());
        std::env::set_var("CTI_DEBUG", "1");
        assert!(debug_enabled());
        std::env::remove_var("CTI_DEBUG");
    }
}
