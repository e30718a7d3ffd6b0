// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Serves one FE-daemon connection: the single bidirectional socket pair
//! established between the forking library and the daemon at startup
//! (spec.md §4.3). Requests are handled one at a time off a single state
//! mutex so responses come back in request order.

use std::collections::HashMap;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::Arc;

use nix::sys::socket::{recvmsg, ControlMessageOwned, MsgFlags};
use nix::sys::uio::IoSliceMut;
use parking_lot::Mutex;
use tokio::io::Interest;
use tokio::net::UnixStream;

use crate::protocol::{Request, Response, StdioFds, WaitMode};
use crate::protocol_wire::{read_request, write_response, DEFAULT_TIMEOUT, MPIR_REQUEST_TIMEOUT};
use crate::state::DaemonState;

/// Serve requests on `stream` until the peer disconnects or a `Shutdown`
/// request is answered. Returns once the connection is done; the caller
/// then exits the process (spec.md §4.3: an I/O error on this socket is
/// fatal to the daemon).
pub async fn serve(mut stream: UnixStream, state: Arc<Mutex<DaemonState>>) {
    loop {
        let timeout = DEFAULT_TIMEOUT;
        let (mut reader, mut writer) = stream.split();
        let request = match read_request(&mut reader, timeout).await {
            Ok(req) => req,
            Err(e) => {
                tracing::info!(error = %e, "FE daemon connection closed");
                return;
            }
        };

        let is_shutdown = matches!(request, Request::Shutdown);
        let response_timeout = match &request {
            Request::LaunchMPIR { .. } | Request::AttachMPIR { .. } => MPIR_REQUEST_TIMEOUT,
            _ => DEFAULT_TIMEOUT,
        };
        let response = handle_request(request, &state);

        if let Err(e) = write_response(&mut writer, &response, response_timeout).await {
            tracing::warn!(error = %e, "failed writing response, closing connection");
            return;
        }

        if is_shutdown {
            tracing::info!("shutdown request served, exiting");
            return;
        }
    }
}

fn handle_request(request: Request, state: &Arc<Mutex<DaemonState>>) -> Response {
    match request {
        Request::ForkExecvpApp { spawn } => match fork_exec(&spawn) {
            Ok(pid) => Response::Pid { pid },
            Err(e) => Response::error(e),
        },

        Request::ForkExecvpUtil { owner, wait, spawn } => match fork_exec(&spawn) {
            Ok(pid) => {
                if matches!(wait, WaitMode::Sync) {
                    let _ = nix::sys::wait::waitpid(nix::unistd::Pid::from_raw(pid as i32), None);
                }
                let _ = state.lock().register_util(owner, pid);
                Response::Pid { pid }
            }
            Err(e) => Response::error(e),
        },

        Request::LaunchMPIR { spawn, wlm_kind: _ } => {
            let argv = spawn.argv.clone();
            let env = spawn.env.clone();
            let path = std::path::PathBuf::from(&spawn.path);
            let fd_remap = stdio_remap(&spawn.stdio);

            match cti_mpir::MpirDriver::launch(&path, &argv, &env, &fd_remap) {
                Ok(driver) => mpir_response(driver, state),
                Err(e) => Response::error(e),
            }
        }

        Request::AttachMPIR { pid, wlm_kind: _ } => {
            let launcher = proc_exe_path(pid);
            match cti_mpir::MpirDriver::attach(&launcher, pid) {
                Ok(driver) => mpir_response(driver, state),
                Err(e) => Response::error(e),
            }
        }

        Request::ReleaseMPIR { mpir_id } => {
            let driver = match state.lock().take_mpir_session(mpir_id) {
                Ok(d) => d,
                Err(e) => return Response::error(e),
            };
            match driver.release_barrier() {
                Ok(()) => Response::Ok,
                Err(e) => Response::error(e),
            }
        }

        Request::RegisterApp { pid } => {
            state.lock().register_app(pid);
            Response::Ok
        }

        Request::RegisterUtil { owner, util_pid } => match state.lock().register_util(owner, util_pid) {
            Ok(()) => Response::Ok,
            Err(e) => Response::error(e),
        },

        Request::DeregisterApp { app } => match state.lock().deregister_app(app) {
            Ok(()) => Response::Ok,
            Err(e) => Response::error(e),
        },

        Request::CheckApp { app } => Response::Running {
            running: state.lock().is_running(app),
        },

        Request::Shutdown => {
            state.lock().shutdown_all();
            Response::Ok
        }
    }
}

fn mpir_response(driver: cti_mpir::MpirDriver, state: &Arc<Mutex<DaemonState>>) -> Response {
    let launcher_pid = driver.launcher_pid();
    let proctable = match driver.read_proctable() {
        Ok(pt) => pt,
        Err(e) => return Response::error(e),
    };

    let mpir_id = state.lock().attach_mpir_session(launcher_pid, driver);

    Response::Mpir(crate::protocol::MpirResponse {
        mpir_id,
        launcher_pid,
        proctable: proctable.proctable,
        is_starter: proctable.is_starter,
    })
}

/// Remap the ancillary-passed stdio fds onto 0/1/2 in the child.
fn stdio_remap(stdio: &StdioFds) -> HashMap<i32, i32> {
    let mut map = HashMap::new();
    map.insert(stdio.stdin, 0);
    map.insert(stdio.stdout, 1);
    map.insert(stdio.stderr, 2);
    map
}

fn fork_exec(spawn: &crate::protocol::SpawnArgs) -> std::io::Result<u32> {
    use std::process::Command;

    let mut cmd = Command::new(&spawn.path);
    cmd.args(&spawn.argv);
    cmd.env_clear();
    for (k, v) in &spawn.env {
        cmd.env(k, v);
    }

    let child = cmd.spawn()?;
    Ok(child.id())
}

fn proc_exe_path(pid: u32) -> std::path::PathBuf {
    std::fs::read_link(format!("/proc/{pid}/exe"))
        .unwrap_or_else(|_| std::path::PathBuf::from(format!("/proc/{pid}/exe")))
}

/// Receive stdio fds passed over `SCM_RIGHTS` ahead of a spawn request,
/// used by the client before issuing `ForkExecvpApp`/`ForkExecvpUtil`
/// (spec.md §4.3: "a file-descriptor-passing ancillary message is used
/// when the client needs to hand stdin/out/err fds to the daemon").
pub async fn recv_ancillary_fds(stream: &UnixStream) -> std::io::Result<[RawFd; 3]> {
    loop {
        stream.readable().await?;
        match stream.try_io(Interest::READABLE, || recv_fds_once(stream.as_raw_fd())) {
            Ok(fds) => return Ok(fds),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(e),
        }
    }
}

fn recv_fds_once(raw_fd: RawFd) -> std::io::Result<[RawFd; 3]> {
    let mut cmsg_buf = nix::cmsg_space!([RawFd; 3]);
    let mut iov_buf = [0u8; 1];
    let mut iov = [IoSliceMut::new(&mut iov_buf)];

    let msg = recvmsg::<()>(raw_fd, &mut iov, Some(&mut cmsg_buf), MsgFlags::empty())
        .map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;

    for cmsg in msg.cmsgs().map_err(|e| std::io::Error::from_raw_os_error(e as i32))? {
        if let ControlMessageOwned::ScmRights(fds) = cmsg {
            if fds.len() == 3 {
                return Ok([fds[0], fds[1], fds[2]]);
            }
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        "expected 3 fds in SCM_RIGHTS ancillary message",
    ))
}
