// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Per-App staging session (spec.md §4.6, component C6).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::{Rng, SeedableRng};

use cti_core::{FolderKind, JobIdentifier, SessionId};
use cti_wlm::Backend;

use crate::error::SessionError;
use crate::manifest::{Manifest, ManifestState};
use crate::registry::FileRegistry;

const STAGE_NAME_LEN: usize = 16;
const STAGE_NAME_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// One staging area per App (spec.md §3, §4.6). Owns the growing registry of
/// already-shipped files and the monotonic manifest instance counter.
///
/// Holds [`SessionId`] rather than a weak back-reference to its owning App:
/// both resolve "is my App still alive" to a lookup the caller already has to
/// do (the Frontend owns the App table), so the extra indirection of a true
/// weak pointer buys nothing in a single-threaded, non-GC'd frontend.
#[derive(Clone)]
pub struct Session {
    id: SessionId,
    backend: Arc<dyn Backend>,
    job_id: JobIdentifier,
    tool_path: PathBuf,
    stage_name: String,
    seq_num: u64,
    requirements_sent: bool,
    registry: FileRegistry,
    ld_library_override: String,
    shipped_any: bool,
}

impl Session {
    pub fn new(backend: Arc<dyn Backend>, job_id: JobIdentifier, tool_path: PathBuf) -> Self {
        Self {
            id: SessionId::next(),
            backend,
            job_id,
            tool_path,
            stage_name: generate_stage_name(),
            seq_num: 0,
            requirements_sent: false,
            registry: FileRegistry::new(),
            ld_library_override: String::new(),
            shipped_any: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    /// Absolute stage path on compute nodes: `<toolPath>/<stage_name>`.
    pub fn stage_path(&self) -> PathBuf {
        self.tool_path.join(&self.stage_name)
    }

    pub fn tool_path(&self) -> &PathBuf {
        &self.tool_path
    }

    pub fn seq_num(&self) -> u64 {
        self.seq_num
    }

    pub fn registry(&self) -> &FileRegistry {
        &self.registry
    }

    pub fn ld_library_override(&self) -> &str {
        &self.ld_library_override
    }

    /// `createManifest()` — instance number is the current `seq_num`; it is
    /// only consumed (incremented) by a successful [`Session::ship_manifest`].
    pub fn create_manifest(&self) -> Manifest {
        Manifest::new(self.seq_num)
    }

    /// `shipManifest(m)` — the transactional body of spec.md §4.6.
    pub async fn ship_manifest(&mut self, manifest: &mut Manifest) -> Result<(), SessionError> {
        self.ship_manifest_inner(manifest, None, &[], &[]).await
    }

    /// `execManifest(m, daemon, args, env)` — like `shipManifest` but also
    /// execs `binary` on every node after staging completes.
    pub async fn exec_manifest(
        &mut self,
        manifest: &mut Manifest,
        binary: &str,
        args: &[String],
        env: &[(String, String)],
    ) -> Result<(), SessionError> {
        self.ship_manifest_inner(manifest, Some(binary), args, env).await
    }

    async fn ship_manifest_inner(
        &mut self,
        manifest: &mut Manifest,
        binary: Option<&str>,
        args: &[String],
        env: &[(String, String)],
    ) -> Result<(), SessionError> {
        if manifest.state() != ManifestState::Open {
            return Err(SessionError::ManifestSealed);
        }

        // Step 1: inject the WLM variant's extra files into the first manifest.
        if !self.requirements_sent {
            for path in self.backend.extra_files() {
                manifest.add_file(&path, self)?;
            }
            self.requirements_sent = true;
        }

        // Step 2: merge the manifest's registry into the session's, dropping
        // byte-identical duplicates from what gets archived.
        let incoming = manifest.registry().clone();
        let duplicates = self.registry.merge_dropping_duplicates(&incoming);

        // Step 3: a library override folder widens LD_LIBRARY_PATH.
        if let Some(folder) = manifest.ld_library_override() {
            let prefix = format!("{}/{}:", self.stage_path().display(), folder);
            self.ld_library_override = format!("{prefix}{}", self.ld_library_override);
        }

        // Step 5: build the tar. Directory skeleton plus every non-duplicate file.
        let instance = manifest.instance_number();
        let local_tar = self.build_archive(manifest, &duplicates, instance)?;

        // Step 6: ship, then fan the BE daemon out.
        self.backend
            .ship_package(
                &self.job_id,
                &local_tar,
                &archive_remote_name(&self.stage_name, instance),
                &self.tool_path.to_string_lossy(),
            )
            .await
            .map_err(SessionError::Wlm)?;
        let _ = std::fs::remove_file(&local_tar);

        let daemon_args = self.be_daemon_args(instance, binary, args, env)?;
        self.backend
            .start_daemon(&self.job_id, &daemon_args, binary.is_none())
            .await
            .map_err(SessionError::Wlm)?;

        // Step 7.
        manifest.seal();
        self.seq_num += 1;
        self.shipped_any = true;
        Ok(())
    }

    fn build_archive(
        &self,
        manifest: &Manifest,
        duplicates: &[(FolderKind, String)],
        instance: u64,
    ) -> Result<PathBuf, SessionError> {
        let scratch = cti_core::config::cfg_dir().map_err(|e| SessionError::EnvMisconfigured(e.to_string()))?;
        let local_tar = scratch.join(archive_remote_name(&self.stage_name, instance));

        let mut dirs = vec![
            cti_archive::DirEntry { archive_path: "bin".to_string() },
            cti_archive::DirEntry { archive_path: "lib".to_string() },
            cti_archive::DirEntry { archive_path: "tmp".to_string() },
        ];
        if let Some(folder) = manifest.ld_library_override() {
            dirs.push(cti_archive::DirEntry { archive_path: folder.to_string() });
        }
        for lib_dir in manifest.lib_dirs() {
            dirs.push(cti_archive::DirEntry {
                archive_path: format!("lib/{}", lib_dir.realname),
            });
        }

        let mut files = Vec::new();
        for ((folder, realname), source) in manifest.registry().source_paths() {
            if duplicates.contains(&(folder.clone(), realname.clone())) {
                continue;
            }
            let archive_path = if matches!(folder, FolderKind::Root) {
                realname.clone()
            } else {
                format!("{folder}/{realname}")
            };
            files.push(cti_archive::FileEntry {
                source: source.clone(),
                archive_path,
            });
        }

        cti_archive::pack(&local_tar, &dirs, &files).map_err(SessionError::Archive)?;
        Ok(local_tar)
    }

    fn be_daemon_args(
        &self,
        instance: u64,
        binary: Option<&str>,
        args: &[String],
        env: &[(String, String)],
    ) -> Result<Vec<String>, SessionError> {
        let mut out = vec![
            be_daemon_binary_path()?.to_string_lossy().into_owned(),
            format!("--apid={}", self.job_id.apid_string()),
            format!("--wlm={}", self.backend_wlm_wire_value()),
            format!("--path={}", self.tool_path.display()),
            format!("--directory={}", self.stage_name),
            format!("--inst={instance}"),
            format!("--manifest={}", archive_remote_name(&self.stage_name, instance)),
        ];
        if let Some(binary) = binary {
            out.push(format!("--binary={binary}"));
        }
        for (key, value) in env {
            out.push(format!("--env={key}={value}"));
        }
        if !self.ld_library_override.is_empty() {
            out.push(format!("--ldlibrarypath={}", self.ld_library_override));
        }
        out.push("--".to_string());
        out.extend(args.iter().cloned());
        Ok(out)
    }

    fn backend_wlm_wire_value(&self) -> u8 {
        self.job_id.wlm_kind().wire_value()
    }

    /// `finalize()` — if any manifest was shipped, tell every node's BE
    /// daemon to remove the staging tree.
    pub async fn finalize(&mut self) -> Result<(), SessionError> {
        if self.seq_num == 0 {
            return Ok(());
        }
        let args = vec![
            be_daemon_binary_path()?.to_string_lossy().into_owned(),
            format!("--apid={}", self.job_id.apid_string()),
            format!("--wlm={}", self.backend_wlm_wire_value()),
            format!("--path={}", self.tool_path.display()),
            format!("--directory={}", self.stage_name),
            format!("--inst={}", self.seq_num),
            "--clean".to_string(),
        ];
        self.backend
            .start_daemon(&self.job_id, &args, true)
            .await
            .map_err(SessionError::Wlm)
    }

    pub fn shipped_any(&self) -> bool {
        self.shipped_any
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("stage_name", &self.stage_name)
            .field("seq_num", &self.seq_num)
            .field("requirements_sent", &self.requirements_sent)
            .finish()
    }
}

fn archive_remote_name(stage_name: &str, instance: u64) -> String {
    format!("{stage_name}_{instance}.tar")
}

/// Path to the `cti_be_daemon` binary the WLM fan-out invokes, installed
/// alongside the rest of the library (spec.md §6 `CTI_INSTALL_DIR`).
fn be_daemon_binary_path() -> Result<PathBuf, SessionError> {
    Ok(cti_core::config::install_dir()
        .map_err(|e| SessionError::EnvMisconfigured(e.to_string()))?
        .join("cti_be_daemon"))
}

fn generate_stage_name() -> String {
    if let Ok(name) = std::env::var("CTI_STAGE_NAME") {
        return name;
    }
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
        ^ (std::process::id() as u64);
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..STAGE_NAME_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..STAGE_NAME_ALPHABET.len());
            STAGE_NAME_ALPHABET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cti_wlm::MockBackend;
    use std::sync::Mutex;

    // Tests that ship a manifest read `CTI_CFG_DIR`/`CTI_INSTALL_DIR`, which
    // are process-global state.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn sample_session() -> Session {
        Session::new(
            Arc::new(MockBackend::default()),
            JobIdentifier::Localhost { launcher_pid: 1 },
            PathBuf::from("/tmp/tool"),
        )
    }

    #[test]
    fn stage_name_is_sixteen_chars() {
        let session = sample_session();
        assert_eq!(session.stage_name().len(), STAGE_NAME_LEN);
    }

    #[test]
    fn create_manifest_instance_tracks_seq_num() {
        let session = sample_session();
        assert_eq!(session.create_manifest().instance_number(), 0);
    }

    #[test]
    fn stage_path_joins_tool_path_and_stage_name() {
        let session = sample_session();
        assert_eq!(
            session.stage_path(),
            PathBuf::from("/tmp/tool").join(session.stage_name())
        );
    }

    #[tokio::test]
    async fn ship_manifest_increments_seq_num_and_seals() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let payload = dir.path().join("payload.txt");
        std::fs::write(&payload, b"staged data").unwrap();

        std::env::set_var("CTI_CFG_DIR", dir.path());
        std::env::set_var("CTI_INSTALL_DIR", dir.path());

        let mut session = sample_session();
        let mut manifest = session.create_manifest();
        manifest.add_file(&payload, &session).unwrap();

        session.ship_manifest(&mut manifest).await.unwrap();

        assert_eq!(session.seq_num(), 1);
        assert!(session.shipped_any());
        assert_eq!(manifest.state(), ManifestState::Sealed);

        std::env::remove_var("CTI_CFG_DIR");
        std::env::remove_var("CTI_INSTALL_DIR");
    }
}
