// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! WLM variant selection: `CTI_WLM_IMPL` env override, else a filesystem/
//! binary probe (spec.md §4.5, §6).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cti_core::WlmKind;
use cti_daemon_client::DaemonClient;
use cti_ssh::SshConfig;
use tokio::sync::Mutex;

use crate::error::WlmError;
use crate::variants::{AlpsBackend, FluxBackend, LocalhostBackend, PalsBackend, SlurmBackend, SshBackend, Variant};

/// Candidate launcher binary paths, most to least specific, as `which`
/// would try them.
fn find_on_path(names: &[&str]) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        for name in names {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

fn launcher_name(default: &str) -> String {
    std::env::var("CTI_LAUNCHER_NAME").unwrap_or_else(|_| default.to_string())
}

/// Probe the filesystem for WLM fingerprints, in the same priority order
/// the original frontend selection logic used: Cray ALPS, PALS, Flux,
/// SLURM, falling back to Localhost when nothing else is detected.
fn probe_filesystem() -> WlmKind {
    if Path::new("/proc/cray_xt/nid").exists() && find_on_path(&["aprun"]).is_some() {
        return WlmKind::Alps;
    }
    let pals_present = find_on_path(&["mpiexec"]).is_some() && Path::new("/etc/pals").exists();
    if std::env::var_os("PALS_APID").is_some() || pals_present {
        return WlmKind::Pals;
    }
    if find_on_path(&["flux"]).is_some() && std::env::var_os("FLUX_URI").is_some() {
        return WlmKind::Flux;
    }
    if find_on_path(&["srun"]).is_some() {
        return WlmKind::Slurm;
    }
    WlmKind::Localhost
}

/// Resolve which [`WlmKind`] this process should use: explicit override via
/// `CTI_WLM_IMPL`, else a probe.
pub fn select_wlm_kind() -> WlmKind {
    std::env::var("CTI_WLM_IMPL")
        .ok()
        .and_then(|s| WlmKind::parse(&s))
        .unwrap_or_else(probe_filesystem)
}

/// Build the concrete [`Variant`] for `kind`, sharing one FE-daemon client
/// handle across the variants that need it.
pub fn build_variant(
    kind: WlmKind,
    client: Arc<Mutex<DaemonClient>>,
) -> Result<Variant, WlmError> {
    match kind {
        WlmKind::Slurm => {
            let srun = find_on_path(&[&launcher_name("srun")])
                .ok_or_else(|| WlmError::LauncherNotFound("srun".to_string()))?;
            let sbcast = find_on_path(&["sbcast"])
                .ok_or_else(|| WlmError::LauncherNotFound("sbcast".to_string()))?;
            Ok(Variant::Slurm(SlurmBackend::new(client, srun, sbcast)))
        }
        WlmKind::Alps => {
            let aprun = find_on_path(&[&launcher_name("aprun")])
                .ok_or_else(|| WlmError::LauncherNotFound("aprun".to_string()))?;
            let helper = find_on_path(&["alps_launch_tool_helper"])
                .ok_or_else(|| WlmError::LauncherNotFound("alps_launch_tool_helper".to_string()))?;
            Ok(Variant::Alps(AlpsBackend::new(client, aprun, helper)))
        }
        WlmKind::Pals => {
            let mpiexec = find_on_path(&[&launcher_name("mpiexec")])
                .ok_or_else(|| WlmError::LauncherNotFound("mpiexec".to_string()))?;
            Ok(Variant::Pals(PalsBackend::new(client, mpiexec)))
        }
        WlmKind::Flux => {
            let flux = find_on_path(&[&launcher_name("flux")])
                .ok_or_else(|| WlmError::LauncherNotFound("flux".to_string()))?;
            Ok(Variant::Flux(FluxBackend::new(client, flux)))
        }
        WlmKind::Localhost => Ok(Variant::Localhost(LocalhostBackend::new(client))),
        WlmKind::Ssh => {
            let host = std::env::var("CTI_SSH_HOST")
                .map_err(|_| WlmError::LauncherNotFound("CTI_SSH_HOST unset".to_string()))?;
            let port: u16 = std::env::var("CTI_SSH_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(22);
            let install_dir =
                std::env::var("CTI_INSTALL_DIR").unwrap_or_else(|_| "/opt/cti".to_string());
            Ok(Variant::Ssh(SshBackend::new(
                host,
                port,
                install_dir,
                SshConfig::from_env(),
            )))
        }
        WlmKind::Mock => {
            #[cfg(any(test, feature = "test-support"))]
            {
                Ok(Variant::Mock(crate::variants::MockBackend::new(1)))
            }
            #[cfg(not(any(test, feature = "test-support")))]
            {
                Err(WlmError::Unsupported)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_override_wins_over_probe() {
        std::env::set_var("CTI_WLM_IMPL", "localhost");
        assert_eq!(select_wlm_kind(), WlmKind::Localhost);
        std::env::remove_var("CTI_WLM_IMPL");
    }
}
