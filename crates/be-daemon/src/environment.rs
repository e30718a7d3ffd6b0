// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Environment variables and `PATH`/`LD_LIBRARY_PATH` adjustment
//! (spec.md §4.9 steps 2-3, 8).

use cti_core::WlmKind;

/// WLM init hook: `LC_ALL=POSIX` unconditionally, plus `SHELL=/bin/sh` on
/// ALPS (Cray's native WLM).
pub fn run_wlm_init_hook(wlm: WlmKind) {
    std::env::set_var("LC_ALL", "POSIX");
    if wlm == WlmKind::Alps {
        std::env::set_var("SHELL", "/bin/sh");
    }
}

/// Tool-facing environment variables set before exec (spec.md §4.9 step 3).
pub struct ToolEnv {
    pub apid: String,
    pub wlm: WlmKind,
    pub root_dir: std::path::PathBuf,
    pub stage_dir: std::path::PathBuf,
    /// PMI attribs file passthrough, exported as `PMI_ATTRIBS_DIR` for PMI
    /// implementations that expect it (`--apath`).
    pub apath: Option<std::path::PathBuf>,
}

impl ToolEnv {
    pub fn apply(&self) {
        std::env::set_var("APID", &self.apid);
        std::env::set_var("WLM", self.wlm.to_string());
        std::env::set_var("ROOT_DIR", &self.root_dir);

        let scratch = self.stage_dir.join("tmp");
        if let Ok(old_tmpdir) = std::env::var("TMPDIR") {
            std::env::set_var("OLD_SCRATCH", old_tmpdir);
        }
        std::env::set_var("SCRATCH", &scratch);
        std::env::set_var("TMPDIR", &scratch);
        std::env::set_var("BIN_DIR", self.stage_dir.join("bin"));
        std::env::set_var("LIB_DIR", self.stage_dir.join("lib"));

        if let Some(apath) = &self.apath {
            std::env::set_var("PMI_ATTRIBS_DIR", apath);
        }
    }
}

/// Prepend the staging `bin`/`lib` directories to `PATH`/`LD_LIBRARY_PATH`,
/// after any manifest-supplied override (spec.md §4.9 step 8).
pub fn prepend_search_paths(stage_dir: &std::path::Path, ldlibrarypath_override: Option<&str>) {
    prepend_env_path("PATH", &stage_dir.join("bin").to_string_lossy());

    let lib_prefix = match ldlibrarypath_override {
        Some(overridden) => format!("{overridden}:{}", stage_dir.join("lib").display()),
        None => stage_dir.join("lib").display().to_string(),
    };
    prepend_env_path("LD_LIBRARY_PATH", &lib_prefix);
}

fn prepend_env_path(var: &str, prefix: &str) {
    match std::env::var(var) {
        Ok(existing) if !existing.is_empty() => {
            std::env::set_var(var, format!("{prefix}:{existing}"));
        }
        _ => std::env::set_var(var, prefix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variable tests mutate global process state.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn alps_init_hook_sets_shell() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("SHELL");
        run_wlm_init_hook(WlmKind::Alps);
        assert_eq!(std::env::var("SHELL").unwrap(), "/bin/sh");
        assert_eq!(std::env::var("LC_ALL").unwrap(), "POSIX");
    }

    #[test]
    fn localhost_init_hook_leaves_shell_alone() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("SHELL", "/bin/bash");
        run_wlm_init_hook(WlmKind::Localhost);
        assert_eq!(std::env::var("SHELL").unwrap(), "/bin/bash");
    }

    #[test]
    fn prepend_search_paths_prefixes_existing_path() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("PATH", "/usr/bin");
        std::env::remove_var("LD_LIBRARY_PATH");
        prepend_search_paths(std::path::Path::new("/scratch/tool/abc123"), None);
        assert_eq!(std::env::var("PATH").unwrap(), "/scratch/tool/abc123/bin:/usr/bin");
        assert_eq!(std::env::var("LD_LIBRARY_PATH").unwrap(), "/scratch/tool/abc123/lib");
    }

    #[test]
    fn prepend_search_paths_respects_override() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("LD_LIBRARY_PATH");
        prepend_search_paths(std::path::Path::new("/scratch/tool/abc123"), Some("/scratch/tool/abc123/lib.1"));
        assert_eq!(
            std::env::var("LD_LIBRARY_PATH").unwrap(),
            "/scratch/tool/abc123/lib.1:/scratch/tool/abc123/lib"
        );
    }
}
