// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! The BE-daemon startup sequence (spec.md §4.9), steps 2-11. Step 1 (fd
//! hygiene) runs before logging is set up and lives in [`crate::fdsetup`],
//! invoked directly from `main`.

use std::ffi::CString;
use std::path::PathBuf;

use cti_core::WlmKind;

use crate::cli::Args;
use crate::error::BeDaemonError;
use crate::{environment, extract, fdsetup, lockfile, nodeid};

/// Run steps 2-11 of the startup sequence. Returns `Ok(None)` when the
/// process should exit 0 without exec'ing anything (stage-only or `--clean`
/// mode); `Ok(Some(..))` carries the `execv` argv for the caller to hand to
/// `nix::unistd::execv`, since `execv` never returns on success and this
/// function stays fully testable without actually replacing the process image.
pub fn run(args: &Args) -> Result<Option<(CString, Vec<CString>)>, BeDaemonError> {
    let wlm = WlmKind::from_wire_value(args.wlm).ok_or(BeDaemonError::UnknownWlm(args.wlm))?;
    environment::run_wlm_init_hook(wlm);
    let node = nodeid::node_id();
    tracing::info!(node_id = %node, wlm = %wlm, apid = %args.apid, "be daemon starting");

    fdsetup::enter_tool_path(&args.path)?;

    let stage_dir = args.path.join(&args.directory);
    environment::ToolEnv {
        apid: args.apid.clone(),
        wlm,
        root_dir: args.path.clone(),
        stage_dir: stage_dir.clone(),
        apath: args.apath.clone(),
    }
    .apply();

    for (key, value) in &args.env {
        std::env::set_var(key, value);
    }

    if let Some(manifest) = &args.manifest {
        let tarball = args.path.join(manifest);
        let dir_name = extract::stage_dir_name(manifest);
        extract::extract_and_unlink(&tarball, &args.path.join(dir_name))?;
    }

    lockfile::create(&args.path, &args.directory, args.inst)?;
    lockfile::wait_for_predecessors(&args.path, &args.directory, args.inst);

    environment::prepend_search_paths(&stage_dir, args.ldlibrarypath.as_deref());

    if args.clean {
        let _ = std::fs::remove_dir_all(&stage_dir);
        return Ok(None);
    }

    let Some(binary) = &args.binary else {
        return Ok(None);
    };

    let exec_path = stage_dir.join("bin").join(binary);
    let argv0 = path_to_cstring(&exec_path)?;
    let mut argv = vec![argv0.clone()];
    for arg in &args.trailing_args {
        argv.push(str_to_cstring(arg)?);
    }
    Ok(Some((argv0, argv)))
}

pub fn debug_log_path(log_dir: &std::path::Path, node_id: &str, apid: &str) -> PathBuf {
    log_dir.join(format!("cti_be_daemon_{node_id}_{apid}.log"))
}

fn path_to_cstring(path: &std::path::Path) -> Result<CString, BeDaemonError> {
    CString::new(path.as_os_str().as_encoded_bytes())
        .map_err(|_| BeDaemonError::ExtractFailed(path.to_path_buf()))
}

fn str_to_cstring(s: &str) -> Result<CString, BeDaemonError> {
    CString::new(s).map_err(|_| BeDaemonError::ExtractFailed(PathBuf::from(s)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // `run` calls `std::env::set_current_dir`, which is process-global state;
    // tests exercising it must not run concurrently with each other.
    static CWD_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn debug_log_path_includes_node_and_apid() {
        let path = debug_log_path(std::path::Path::new("/var/log"), "nid001", "42.0");
        assert_eq!(path, PathBuf::from("/var/log/cti_be_daemon_nid001_42.0.log"));
    }

    #[test]
    fn clean_mode_removes_stage_and_exits_without_exec() {
        let _guard = CWD_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let stage = dir.path().join("abc123");
        std::fs::create_dir_all(&stage).unwrap();

        let args = Args {
            apid: "1".to_string(),
            wlm: 6,
            path: dir.path().to_path_buf(),
            directory: "abc123".to_string(),
            inst: 1,
            manifest: None,
            binary: None,
            env: vec![],
            apath: None,
            ldlibrarypath: None,
            clean: true,
            debug: false,
            trailing_args: vec![],
        };

        let result = run(&args).unwrap();
        assert!(result.is_none());
        assert!(!stage.exists());
    }

    #[test]
    fn no_binary_is_stage_only_mode() {
        let _guard = CWD_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let args = Args {
            apid: "1".to_string(),
            wlm: 6,
            path: dir.path().to_path_buf(),
            directory: "abc123".to_string(),
            inst: 1,
            manifest: None,
            binary: None,
            env: vec![],
            apath: None,
            ldlibrarypath: None,
            clean: false,
            debug: false,
            trailing_args: vec![],
        };

        let result = run(&args).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn binary_given_returns_execv_argv() {
        let _guard = CWD_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let args = Args {
            apid: "1".to_string(),
            wlm: 6,
            path: dir.path().to_path_buf(),
            directory: "abc123".to_string(),
            inst: 1,
            manifest: None,
            binary: Some("mytool".to_string()),
            env: vec![],
            apath: None,
            ldlibrarypath: None,
            clean: false,
            debug: false,
            trailing_args: vec!["--flag".to_string()],
        };

        let (argv0, argv) = run(&args).unwrap().unwrap();
        assert_eq!(
            argv0.to_str().unwrap(),
            dir.path().join("abc123/bin/mytool").to_str().unwrap()
        );
        assert_eq!(argv.len(), 2);
    }
}
