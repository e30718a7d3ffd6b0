// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! `cti_fe_daemon`: the persistent per-session frontend daemon (spec.md
//! §4.3). Forked from the library at session start with fd
//! `CTI_FE_DAEMON_FD` (default 3) already holding one end of the control
//! socket pair; the library keeps the other end as the C4 client.
//!
//! Architecture:
//! - a single connection is served for the whole process lifetime (there is
//!   exactly one client, the forking library)
//! - a background reaper drains any child whose parent-death this process
//!   did not itself initiate, so library crashes cannot orphan launchers

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::os::fd::FromRawFd;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::UnixStream;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cti_fe_daemon::{listener, spawn_reaper, DaemonState};

const DEFAULT_CONTROL_FD: i32 = 3;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    install_parent_death_signal();

    let _log_guard = setup_logging()?;
    info!("cti_fe_daemon starting");

    let control_fd = std::env::var("CTI_FE_DAEMON_FD")
        .ok()
        .and_then(|s| s.parse::<i32>().ok())
        .unwrap_or(DEFAULT_CONTROL_FD);

    // SAFETY: the forking library is contractually required to have left an
    // already-connected socket at this fd before exec'ing us.
    let std_stream = unsafe { StdUnixStream::from_raw_fd(control_fd) };
    std_stream.set_nonblocking(true)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let stream = UnixStream::from_std(std_stream)?;
        let state = Arc::new(Mutex::new(DaemonState::new()));

        spawn_reaper();
        listener::serve(stream, state).await;

        info!("cti_fe_daemon exiting");
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

/// Ask the kernel to SIGKILL this process if its parent dies first (spec.md
/// §4.3: "the daemon reaps them on its own exit ... via
/// `prctl(PR_SET_PDEATHSIG)` or equivalent parent-death detection"). This is
/// the FE daemon's own parent-death guard, separate from the PIDs it
/// supervises.
fn install_parent_death_signal() {
    // SAFETY: PR_SET_PDEATHSIG takes no pointer arguments; passing a bad
    // option value is the only misuse and SIGKILL is a valid signal number.
    let rc = unsafe { libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL) };
    if rc != 0 {
        error!(
            errno = std::io::Error::last_os_error().raw_os_error(),
            "failed to install PR_SET_PDEATHSIG"
        );
    }
}

fn setup_logging() -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    let log_dir = cti_core::config::log_dir()
        .or_else(|| cti_core::config::base_dir())
        .unwrap_or_else(|| std::path::PathBuf::from("/tmp"));
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(&log_dir, "cti_fe_daemon.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
