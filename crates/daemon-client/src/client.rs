// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! In-library request/response codec for the FE daemon (spec.md §4.4,
//! component C4): thin by design, no retries, no multiplexing, no threads.
//! One [`DaemonClient`] per library instance, wrapping the one socket pair
//! established at [`DaemonClient::spawn`] time.

use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream as StdUnixStream;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;

use cti_fe_daemon::protocol::{MpirResponse, Request, Response, SpawnArgs, StdioFds, WaitMode};
use cti_fe_daemon::protocol_wire::{
    read_response, write_request, DEFAULT_TIMEOUT, MPIR_REQUEST_TIMEOUT,
};
use cti_core::WlmKind;
use nix::sys::socket::{socketpair, AddressFamily, SockFlag, SockType};
use nix::unistd::dup2;
use tokio::net::UnixStream;

use crate::error::ClientError;

/// A live connection to a forked `cti_fe_daemon` process.
pub struct DaemonClient {
    stream: UnixStream,
}

impl DaemonClient {
    /// Fork and exec `cti_fe_daemon`, handing it one end of a fresh
    /// `socketpair` on fd 3; keep the other end as the client channel.
    pub fn spawn(daemon_binary: &PathBuf) -> Result<Self, ClientError> {
        let (client_sock, daemon_sock) = socketpair(
            AddressFamily::Unix,
            SockType::Stream,
            None,
            SockFlag::empty(),
        )
        .map_err(|e| ClientError::SpawnFailed(std::io::Error::from_raw_os_error(e as i32)))?;

        let daemon_fd: RawFd = daemon_sock.as_raw_fd();
        let mut cmd = std::process::Command::new(daemon_binary);

        // SAFETY: async-signal-safe operations only (dup2); runs in the
        // forked child before exec, per the `pre_exec` contract.
        unsafe {
            cmd.pre_exec(move || {
                dup2(daemon_fd, 3).map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;
                Ok(())
            });
        }

        // The daemon becomes its own session leader in all but name: we never
        // wait() on it, relying on its own PR_SET_PDEATHSIG guard plus
        // whatever reaps orphans at this process's level (spec.md §4.3).
        let _child = cmd.spawn().map_err(ClientError::SpawnFailed)?;
        drop(daemon_sock);

        let std_stream: StdUnixStream = client_sock.into();
        std_stream
            .set_nonblocking(true)
            .map_err(ClientError::SpawnFailed)?;
        let stream = UnixStream::from_std(std_stream).map_err(ClientError::SpawnFailed)?;

        Ok(Self { stream })
    }

    /// Wrap an already-connected stream (used by tests with a socketpair
    /// talking to an in-process mock server).
    pub fn from_stream(stream: UnixStream) -> Self {
        Self { stream }
    }

    async fn roundtrip(
        &mut self,
        request: Request,
        timeout: std::time::Duration,
    ) -> Result<Response, ClientError> {
        let (mut reader, mut writer) = self.stream.split();
        write_request(&mut writer, &request, timeout).await?;
        let response = read_response(&mut reader, timeout).await?;
        Ok(response)
    }

    fn ok_or_remote(response: Response) -> Result<(), ClientError> {
        match response {
            Response::Ok => Ok(()),
            Response::Error { message } => Err(ClientError::Remote(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    fn pid_or_remote(response: Response) -> Result<u32, ClientError> {
        match response {
            Response::Pid { pid } => Ok(pid),
            Response::Error { message } => Err(ClientError::Remote(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    fn mpir_or_remote(response: Response) -> Result<MpirResponse, ClientError> {
        match response {
            Response::Mpir(resp) => Ok(resp),
            Response::Error { message } => Err(ClientError::Remote(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn fork_execvp_app(&mut self, spawn: SpawnArgs) -> Result<u32, ClientError> {
        let response = self
            .roundtrip(Request::ForkExecvpApp { spawn }, DEFAULT_TIMEOUT)
            .await?;
        Self::pid_or_remote(response)
    }

    pub async fn fork_execvp_util(
        &mut self,
        owner: u32,
        wait: WaitMode,
        spawn: SpawnArgs,
    ) -> Result<u32, ClientError> {
        let response = self
            .roundtrip(Request::ForkExecvpUtil { owner, wait, spawn }, DEFAULT_TIMEOUT)
            .await?;
        Self::pid_or_remote(response)
    }

    pub async fn launch_mpir(
        &mut self,
        spawn: SpawnArgs,
        wlm_kind: WlmKind,
    ) -> Result<MpirResponse, ClientError> {
        let response = self
            .roundtrip(Request::LaunchMPIR { spawn, wlm_kind }, MPIR_REQUEST_TIMEOUT)
            .await?;
        Self::mpir_or_remote(response)
    }

    pub async fn attach_mpir(
        &mut self,
        pid: u32,
        wlm_kind: WlmKind,
    ) -> Result<MpirResponse, ClientError> {
        let response = self
            .roundtrip(Request::AttachMPIR { pid, wlm_kind }, MPIR_REQUEST_TIMEOUT)
            .await?;
        Self::mpir_or_remote(response)
    }

    pub async fn release_mpir(&mut self, mpir_id: u64) -> Result<(), ClientError> {
        let response = self
            .roundtrip(Request::ReleaseMPIR { mpir_id }, DEFAULT_TIMEOUT)
            .await?;
        Self::ok_or_remote(response)
    }

    pub async fn register_app(&mut self, pid: u32) -> Result<(), ClientError> {
        let response = self
            .roundtrip(Request::RegisterApp { pid }, DEFAULT_TIMEOUT)
            .await?;
        Self::ok_or_remote(response)
    }

    pub async fn register_util(&mut self, owner: u32, util_pid: u32) -> Result<(), ClientError> {
        let response = self
            .roundtrip(Request::RegisterUtil { owner, util_pid }, DEFAULT_TIMEOUT)
            .await?;
        Self::ok_or_remote(response)
    }

    pub async fn deregister_app(&mut self, app: u32) -> Result<(), ClientError> {
        let response = self
            .roundtrip(Request::DeregisterApp { app }, DEFAULT_TIMEOUT)
            .await?;
        Self::ok_or_remote(response)
    }

    pub async fn check_app(&mut self, app: u32) -> Result<bool, ClientError> {
        let response = self
            .roundtrip(Request::CheckApp { app }, DEFAULT_TIMEOUT)
            .await?;
        match response {
            Response::Running { running } => Ok(running),
            Response::Error { message } => Err(ClientError::Remote(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn shutdown(&mut self) -> Result<(), ClientError> {
        let response = self.roundtrip(Request::Shutdown, DEFAULT_TIMEOUT).await?;
        Self::ok_or_remote(response)
    }
}

/// Build the ancillary stdio payload for a spawn request. The real fds are
/// passed out of band over `SCM_RIGHTS` by the caller before issuing the
/// request that references them; see `cti_fe_daemon::listener::recv_ancillary_fds`.
pub fn inherited_stdio() -> StdioFds {
    StdioFds {
        stdin: 0,
        stdout: 1,
        stderr: 2,
    }
}

