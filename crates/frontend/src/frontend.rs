// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! [`Frontend`]: the facade a tool writer's Rust code drives (spec.md §2's
//! "WLM-abstract application control plane", built on top of C3-C7).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use cti_core::{App, AppId, WlmKind};
use cti_daemon_client::DaemonClient;
use cti_session::{Manifest, Session};
use cti_wlm::{Backend, KillSignal, UtilId};

use crate::error::FrontendError;

/// Sentinel stored in an [`cti_core::MpirSessionId`] for variants whose
/// `LaunchResult::mpir_id` is `None` because they manage MPIR release out of
/// band (generic SSH, spec.md §4.5/§4.10). Keeps the barrier-monotonicity
/// invariant enforced locally for every variant while still forwarding
/// `None` on to [`Backend::release_barrier`] for these.
const OUT_OF_BAND_MPIR_SESSION: u64 = u64::MAX;

struct AppEntry {
    app: App,
    session: Option<Session>,
    utils: Vec<UtilId>,
}

/// Owns the WLM backend, the FE-daemon client connection, and every `App`
/// launched or attached to in this process (spec.md §3, §4.11).
pub struct Frontend {
    backend: Arc<dyn Backend>,
    wlm_kind: WlmKind,
    daemon_client: Arc<Mutex<DaemonClient>>,
    apps: HashMap<AppId, AppEntry>,
}

impl Frontend {
    /// Select a WLM variant (`CTI_WLM_IMPL` or a filesystem probe) and fork
    /// the FE daemon.
    pub async fn new() -> Result<Self, FrontendError> {
        let wlm_kind = cti_wlm::select_wlm_kind();
        let install_dir = cti_core::config::install_dir().map_err(FrontendError::from)?;
        let daemon_binary = install_dir.join("cti_fe_daemon");
        let client = DaemonClient::spawn(&daemon_binary)?;
        let daemon_client = Arc::new(Mutex::new(client));
        let variant = cti_wlm::build_variant(wlm_kind, daemon_client.clone())?;
        Ok(Self::from_parts(Arc::new(variant), wlm_kind, daemon_client))
    }

    /// Build a `Frontend` from an already-constructed backend and daemon
    /// client. Used directly by tests (with [`cti_wlm::MockBackend`]) and by
    /// [`Frontend::new`] for the real WLM variants.
    pub fn from_parts(
        backend: Arc<dyn Backend>,
        wlm_kind: WlmKind,
        daemon_client: Arc<Mutex<DaemonClient>>,
    ) -> Self {
        Self {
            backend,
            wlm_kind,
            daemon_client,
            apps: HashMap::new(),
        }
    }

    fn entry(&self, app_id: AppId) -> Result<&AppEntry, FrontendError> {
        self.apps.get(&app_id).ok_or(FrontendError::UnknownApp(app_id))
    }

    fn entry_mut(&mut self, app_id: AppId) -> Result<&mut AppEntry, FrontendError> {
        self.apps.get_mut(&app_id).ok_or(FrontendError::UnknownApp(app_id))
    }

    fn app_from_launch(&self, result: cti_wlm::LaunchResult) -> App {
        let session_id = cti_core::MpirSessionId(result.mpir_id.unwrap_or(OUT_OF_BAND_MPIR_SESSION));
        App::at_barrier(self.wlm_kind, result.job_id, result.launcher_pid, session_id, result.proctable)
    }

    async fn track_new_app(&mut self, app: App) -> Result<AppId, FrontendError> {
        let id = app.id();
        let launcher_pid = app.launcher_pid();
        self.apps.insert(
            id,
            AppEntry {
                app,
                session: None,
                utils: Vec::new(),
            },
        );
        let mut client = self.daemon_client.lock().await;
        client.register_app(launcher_pid).await.map_err(FrontendError::from)?;
        Ok(id)
    }

    /// `launchBarrier`: launch `argv` and hold it at the MPIR barrier.
    pub async fn launch_at_barrier(
        &mut self,
        argv: &[String],
        env: &[(String, String)],
    ) -> Result<AppId, FrontendError> {
        let result = self.backend.launch_at_barrier(argv, env).await.map_err(FrontendError::from)?;
        let app = self.app_from_launch(result);
        self.track_new_app(app).await
    }

    /// `launch`: launch `argv` and release the barrier immediately, so the
    /// caller gets an already-running app.
    pub async fn launch(&mut self, argv: &[String], env: &[(String, String)]) -> Result<AppId, FrontendError> {
        let id = self.launch_at_barrier(argv, env).await?;
        if self.entry(id)?.app.is_at_barrier() {
            self.release_barrier(id).await?;
        }
        Ok(id)
    }

    /// `registerJob`: attach MPIR to an already-running launcher.
    pub async fn register_job(&mut self, pid: u32) -> Result<AppId, FrontendError> {
        let result = self.backend.attach(pid).await.map_err(FrontendError::from)?;
        let app = self.app_from_launch(result);
        self.track_new_app(app).await
    }

    /// Release the MPIR barrier for `app_id`. One-shot: a second call fails
    /// with `BarrierAlreadyReleased` (spec.md testable property 1).
    pub async fn release_barrier(&mut self, app_id: AppId) -> Result<(), FrontendError> {
        let entry = self.entry_mut(app_id)?;
        let session_id = entry.app.release_barrier().map_err(FrontendError::from)?;
        let job_id = entry.app.job_id().clone();
        let forwarded = (session_id.0 != OUT_OF_BAND_MPIR_SESSION).then_some(session_id.0);
        self.backend
            .release_barrier(&job_id, forwarded)
            .await
            .map_err(FrontendError::from)
    }

    pub fn is_at_barrier(&self, app_id: AppId) -> Result<bool, FrontendError> {
        Ok(self.entry(app_id)?.app.is_at_barrier())
    }

    /// Liveness from the WLM's point of view (spec.md §4.5 `is-running`).
    pub async fn is_running(&self, app_id: AppId) -> Result<bool, FrontendError> {
        let entry = self.entry(app_id)?;
        if !entry.app.is_running() {
            return Ok(false);
        }
        self.backend.is_running(entry.app.job_id()).await.map_err(FrontendError::from)
    }

    pub async fn kill(&mut self, app_id: AppId, signal: KillSignal) -> Result<(), FrontendError> {
        let job_id = self.entry(app_id)?.app.job_id().clone();
        self.backend.kill(&job_id, signal).await.map_err(FrontendError::from)
    }

    pub fn list_hosts(&self, app_id: AppId) -> Result<Vec<String>, FrontendError> {
        let job_id = self.entry(app_id)?.app.job_id();
        self.backend.list_hosts(job_id).map_err(FrontendError::from)
    }

    pub fn list_placement(&self, app_id: AppId) -> Result<Vec<(String, u32)>, FrontendError> {
        let job_id = self.entry(app_id)?.app.job_id();
        self.backend.list_placement(job_id).map_err(FrontendError::from)
    }

    pub fn launcher_hostname(&self, app_id: AppId) -> Result<String, FrontendError> {
        let job_id = self.entry(app_id)?.app.job_id();
        self.backend.launcher_hostname(job_id).map_err(FrontendError::from)
    }

    /// Register a node-level utility under `app_id` so it is killed when the
    /// app deregisters (spec.md §4.3 `RegisterUtil`).
    pub async fn register_util(&mut self, app_id: AppId, util_pid: u32) -> Result<UtilId, FrontendError> {
        let owner_pid = self.entry(app_id)?.app.launcher_pid();
        self.backend.register_util(owner_pid, util_pid).await.map_err(FrontendError::from)?;
        self.entry_mut(app_id)?.utils.push(UtilId(util_pid));
        Ok(UtilId(util_pid))
    }

    /// Lazily create this app's staging [`Session`] rooted at `tool_path`.
    /// A no-op if the session already exists.
    pub fn ensure_session(&mut self, app_id: AppId, tool_path: PathBuf) -> Result<(), FrontendError> {
        let backend = self.backend.clone();
        let job_id = self.entry(app_id)?.app.job_id().clone();
        let entry = self.entry_mut(app_id)?;
        if entry.session.is_none() {
            entry.session = Some(Session::new(backend, job_id, tool_path.clone()));
            entry.app.set_staging_root(tool_path);
        }
        Ok(())
    }

    fn session_mut(&mut self, app_id: AppId) -> Result<&mut Session, FrontendError> {
        self.entry_mut(app_id)?.session.as_mut().ok_or(FrontendError::NoSession(app_id))
    }

    /// The app's staging session, needed by `Manifest::add_binary`/
    /// `add_library`/`add_file` to classify a candidate against what the
    /// session has already shipped (spec.md §3, §4.7).
    pub fn session(&self, app_id: AppId) -> Result<&Session, FrontendError> {
        self.entry(app_id)?.session.as_ref().ok_or(FrontendError::NoSession(app_id))
    }

    pub fn create_manifest(&mut self, app_id: AppId) -> Result<Manifest, FrontendError> {
        Ok(self.session_mut(app_id)?.create_manifest())
    }

    pub async fn ship_manifest(&mut self, app_id: AppId, manifest: &mut Manifest) -> Result<(), FrontendError> {
        self.session_mut(app_id)?.ship_manifest(manifest).await.map_err(FrontendError::from)
    }

    pub async fn exec_manifest(
        &mut self,
        app_id: AppId,
        manifest: &mut Manifest,
        binary: &str,
        args: &[String],
        env: &[(String, String)],
    ) -> Result<(), FrontendError> {
        self.session_mut(app_id)?
            .exec_manifest(manifest, binary, args, env)
            .await
            .map_err(FrontendError::from)
    }

    /// Tear down `app_id`: release the barrier if still held, tell the FE
    /// daemon to deregister it (killing every registered util), then — the
    /// deferred-cleanup resolution of spec.md §9's open question — finalize
    /// its staging session so the remote tree is removed.
    pub async fn deregister(&mut self, app_id: AppId) -> Result<(), FrontendError> {
        if self.is_at_barrier(app_id)? {
            self.release_barrier(app_id).await?;
        }

        let launcher_pid = self.entry(app_id)?.app.launcher_pid();
        {
            let mut client = self.daemon_client.lock().await;
            client.deregister_app(launcher_pid).await.map_err(FrontendError::from)?;
        }

        if let Some(session) = self.entry_mut(app_id)?.session.as_mut() {
            session.finalize().await.map_err(FrontendError::from)?;
        }

        if let Some(entry) = self.apps.get_mut(&app_id) {
            entry.app.deregister();
        }
        self.apps.remove(&app_id);
        Ok(())
    }

    /// Tell the FE daemon to tear down every app and utility it supervises,
    /// then close the connection (spec.md §4.3 `Shutdown`).
    pub async fn shutdown(mut self) -> Result<(), FrontendError> {
        let mut client = self.daemon_client.lock().await;
        client.shutdown().await.map_err(FrontendError::from)?;
        drop(client);
        self.apps.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cti_core::CtiError;
    use cti_daemon_client::DaemonClient;
    use cti_fe_daemon::protocol::Response;
    use cti_fe_daemon::protocol_wire::{read_request, write_response, DEFAULT_TIMEOUT};
    use cti_wlm::MockBackend;

    /// Spawn a task that answers every request with `Ok`/`Running{true}` so
    /// tests can drive a real `Frontend` without a live `cti_fe_daemon`
    /// process. Mirrors spec.md §4.3's request/response shapes closely
    /// enough for the facade-level behavior under test.
    fn spawn_stub_daemon(mut server: tokio::net::UnixStream) {
        tokio::spawn(async move {
            loop {
                let (mut reader, mut writer) = server.split();
                let request = match read_request(&mut reader, DEFAULT_TIMEOUT).await {
                    Ok(r) => r,
                    Err(_) => break,
                };
                let response = match request {
                    cti_fe_daemon::protocol::Request::CheckApp { .. } => Response::Running { running: true },
                    _ => Response::Ok,
                };
                if write_response(&mut writer, &response, DEFAULT_TIMEOUT).await.is_err() {
                    break;
                }
            }
        });
    }

    async fn test_frontend() -> Frontend {
        let (client_half, server_half) = tokio::net::UnixStream::pair().expect("socketpair");
        spawn_stub_daemon(server_half);
        let client = Arc::new(Mutex::new(DaemonClient::from_stream(client_half)));
        let backend: Arc<dyn Backend> = Arc::new(MockBackend::new(4));
        Frontend::from_parts(backend, WlmKind::Mock, client)
    }

    #[tokio::test]
    async fn launch_at_barrier_then_release_is_one_shot() {
        let mut fe = test_frontend().await;
        let app_id = fe
            .launch_at_barrier(&["/bin/app".to_string()], &[])
            .await
            .expect("launch");

        assert!(fe.is_at_barrier(app_id).expect("tracked"));
        fe.release_barrier(app_id).await.expect("release");
        assert!(!fe.is_at_barrier(app_id).expect("tracked"));

        match fe.release_barrier(app_id).await {
            Err(FrontendError::Core(CtiError::BarrierAlreadyReleased)) => {}
            other => panic!("expected BarrierAlreadyReleased, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn launch_releases_barrier_immediately() {
        let mut fe = test_frontend().await;
        let app_id = fe.launch(&["/bin/app".to_string()], &[]).await.expect("launch");
        assert!(!fe.is_at_barrier(app_id).expect("tracked"));
        assert!(fe.is_running(app_id).await.expect("running"));
    }

    #[tokio::test]
    async fn unknown_app_operations_fail() {
        let fe = test_frontend().await;
        let bogus = AppId::next();
        match fe.list_hosts(bogus) {
            Err(FrontendError::UnknownApp(id)) if id == bogus => {}
            other => panic!("expected UnknownApp, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn manifest_operations_require_a_session() {
        let mut fe = test_frontend().await;
        let app_id = fe
            .launch_at_barrier(&["/bin/app".to_string()], &[])
            .await
            .expect("launch");

        match fe.create_manifest(app_id) {
            Err(FrontendError::NoSession(id)) if id == app_id => {}
            other => panic!("expected NoSession, got {other:?}"),
        }

        let dir = tempfile::tempdir().expect("tempdir");
        fe.ensure_session(app_id, dir.path().to_path_buf()).expect("session");
        let manifest = fe.create_manifest(app_id).expect("manifest");
        assert_eq!(manifest.state(), cti_session::ManifestState::Open);
    }

    #[tokio::test]
    async fn register_util_tracks_it_on_the_app_entry() {
        let mut fe = test_frontend().await;
        let app_id = fe
            .launch_at_barrier(&["/bin/app".to_string()], &[])
            .await
            .expect("launch");

        let util_id = fe.register_util(app_id, 4242).await.expect("register_util");
        assert_eq!(util_id, UtilId(4242));
        assert_eq!(fe.entry(app_id).expect("entry").utils, vec![UtilId(4242)]);
    }

    #[tokio::test]
    async fn deregister_removes_the_app() {
        let mut fe = test_frontend().await;
        let app_id = fe
            .launch_at_barrier(&["/bin/app".to_string()], &[])
            .await
            .expect("launch");

        fe.deregister(app_id).await.expect("deregister");
        assert!(matches!(fe.entry(app_id), Err(FrontendError::UnknownApp(_))));
    }
}
