// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! SSH transport configuration resolved from the `SSH_*` env vars
//! (spec.md §6).

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct SshConfig {
    pub key_dir: PathBuf,
    pub known_hosts_path: PathBuf,
    pub pubkey_path: PathBuf,
    pub prikey_path: PathBuf,
    pub passphrase: Option<String>,
}

impl SshConfig {
    /// Resolve from env, falling back to the conventional `~/.ssh` layout.
    pub fn from_env() -> Self {
        let home = std::env::var("HOME").unwrap_or_default();
        let key_dir = cti_core::config::ssh::dir()
            .unwrap_or_else(|| PathBuf::from(&home).join(".ssh"));

        let known_hosts_path = cti_core::config::ssh::known_hosts_path()
            .unwrap_or_else(|| key_dir.join("known_hosts"));
        let pubkey_path = cti_core::config::ssh::pubkey_path()
            .unwrap_or_else(|| key_dir.join("id_rsa.pub"));
        let prikey_path = cti_core::config::ssh::prikey_path()
            .unwrap_or_else(|| key_dir.join("id_rsa"));
        let passphrase = cti_core::config::ssh::passphrase();

        Self {
            key_dir,
            known_hosts_path,
            pubkey_path,
            prikey_path,
            passphrase,
        }
    }
}
