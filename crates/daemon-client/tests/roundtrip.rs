// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Exercises the C4 client against an in-process C3 server over a real
//! socketpair, without forking the `cti_fe_daemon` binary.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use cti_fe_daemon::{listener, DaemonState};
use parking_lot::Mutex;
use tokio::net::UnixStream;

#[tokio::test]
async fn register_check_and_shutdown_round_trip() {
    let (client_sock, server_sock) = UnixStream::pair().expect("socketpair");

    let state = Arc::new(Mutex::new(DaemonState::new()));
    let server = tokio::spawn(listener::serve(server_sock, state));

    let mut client = cti_daemon_client::DaemonClient::from_stream(client_sock);

    client.register_app(4242).await.expect("register_app");
    assert!(client.check_app(4242).await.expect("check_app"));

    client.shutdown().await.expect("shutdown");
    server.await.expect("server task");
}

#[tokio::test]
async fn check_unregistered_app_is_not_running() {
    let (client_sock, server_sock) = UnixStream::pair().expect("socketpair");

    let state = Arc::new(Mutex::new(DaemonState::new()));
    tokio::spawn(listener::serve(server_sock, state));

    let mut client = cti_daemon_client::DaemonClient::from_stream(client_sock);
    assert!(!client.check_app(99).await.expect("check_app"));

    client.shutdown().await.expect("shutdown");
}
