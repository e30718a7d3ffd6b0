// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! `cti_be_daemon`: thin process entry point. All of the real startup logic
//! lives in [`cti_be_daemon::sequence::run`]; this binary only parses argv,
//! gets fd 0/1/2 into a sane state before anything else touches them, wires
//! up logging, and performs the final `execv`.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::ffi::CString;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cti_be_daemon::{cli, fdsetup, nodeid, sequence};

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = match cli::parse(&argv) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("cti_be_daemon: {e}");
            return 1;
        }
    };

    let log_path = if args.debug {
        let log_dir = cti_core::config::log_dir()
            .or_else(cti_core::config::base_dir)
            .unwrap_or_else(|| std::path::PathBuf::from("/tmp"));
        let node = nodeid::node_id();
        Some(sequence::debug_log_path(&log_dir, &node, &args.apid))
    } else {
        None
    };

    if let Some(path) = &log_path {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    if let Err(e) = fdsetup::reset_stdio(log_path.as_deref()) {
        eprintln!("cti_be_daemon: failed to reset stdio: {e}");
        return 1;
    }

    let _log_guard = args.debug.then(setup_logging);

    match sequence::run(&args) {
        Ok(Some((argv0, exec_argv))) => exec(&argv0, &exec_argv),
        Ok(None) => 0,
        Err(e) => {
            tracing::error!(error = %e, "be daemon init failed");
            1
        }
    }
}

fn exec(argv0: &CString, argv: &[CString]) -> i32 {
    match nix::unistd::execv(argv0, argv) {
        Ok(_) => 0,
        Err(errno) => {
            tracing::error!(%errno, path = ?argv0, "execv failed");
            1
        }
    }
}

fn setup_logging() -> tracing_appender::non_blocking::WorkerGuard {
    let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    guard
}
