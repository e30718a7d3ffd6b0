// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! An SSH session to a single remote host (spec.md §4.10, component C10).

use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};

use ssh2::{KnownHostFileKind, KnownHostKeyFormat, Session as RawSession};

use crate::config::SshConfig;
use crate::error::SshError;

/// One connected, authenticated SSH session.
pub struct SshSession {
    session: RawSession,
    host: String,
}

impl SshSession {
    /// DNS-resolve, connect, handshake, verify host key, then authenticate.
    pub fn connect(host: &str, port: u16, config: &SshConfig) -> Result<Self, SshError> {
        let addr = format!("{host}:{port}")
            .to_socket_addrs()
            .map_err(|_| SshError::ResolveFailed(host.to_string()))?
            .next()
            .ok_or_else(|| SshError::ResolveFailed(host.to_string()))?;

        let tcp = TcpStream::connect(addr).map_err(SshError::Connect)?;

        let mut session = RawSession::new().map_err(SshError::Handshake)?;
        session.set_tcp_stream(tcp);
        session.handshake().map_err(SshError::Handshake)?;

        verify_known_host(&session, host, port, config)?;
        authenticate(&session, config)?;

        Ok(Self {
            session,
            host: host.to_string(),
        })
    }

    /// Run `argv` with `env` set, prefixed with `nohup`. If `synchronous`,
    /// block until the channel closes and return its exit status; otherwise
    /// send the command and return immediately with status `0`.
    pub fn execute_remote_command(
        &self,
        argv: &[String],
        env: &[(String, String)],
        synchronous: bool,
    ) -> Result<i32, SshError> {
        Ok(self
            .execute_remote_command_capturing(argv, env, synchronous)?
            .0)
    }

    /// Same as [`Self::execute_remote_command`], but also returns the
    /// channel's combined stdout. Ignored (empty string) when `synchronous`
    /// is false, since the command is fired and forgotten.
    pub fn execute_remote_command_capturing(
        &self,
        argv: &[String],
        env: &[(String, String)],
        synchronous: bool,
    ) -> Result<(i32, String), SshError> {
        let command = build_shell_command(argv, env);

        let mut channel = self.session.channel_session().map_err(SshError::Channel)?;
        channel.exec(&command).map_err(SshError::Channel)?;

        if !synchronous {
            return Ok((0, String::new()));
        }

        let mut output = String::new();
        channel
            .read_to_string(&mut output)
            .map_err(SshError::Io)?;
        channel.wait_close().map_err(SshError::Channel)?;
        let status = channel.exit_status().map_err(SshError::Channel)?;

        tracing::debug!(host = %self.host, status, "remote command completed");
        Ok((status, output))
    }

    /// SCP a local file to `dst` on the remote host with the given mode.
    pub fn send_remote_file(
        &self,
        src: &std::path::Path,
        dst: &std::path::Path,
        mode: i32,
    ) -> Result<(), SshError> {
        let data = std::fs::read(src)?;
        let mut remote = self
            .session
            .scp_send(dst, mode, data.len() as u64, None)
            .map_err(SshError::Channel)?;

        std::io::Write::write_all(&mut remote, &data).map_err(SshError::Io)?;
        remote.send_eof().map_err(SshError::Channel)?;
        remote.wait_eof().map_err(SshError::Channel)?;
        remote.close().map_err(SshError::Channel)?;
        remote.wait_close().map_err(SshError::Channel)?;
        Ok(())
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

fn verify_known_host(
    session: &RawSession,
    host: &str,
    port: u16,
    config: &SshConfig,
) -> Result<(), SshError> {
    let mut known_hosts = session.known_hosts().map_err(SshError::Handshake)?;
    let _ = known_hosts.read_file(&config.known_hosts_path, KnownHostFileKind::OpenSSH);

    let (key, key_type) = session
        .host_key()
        .ok_or_else(|| SshError::KnownHostsRejected(host.to_string()))?;

    match known_hosts.check_port(host, port, key) {
        ssh2::CheckResult::Match => {}
        ssh2::CheckResult::NotFound => {
            let format = match key_type {
                ssh2::HostKeyType::Rsa => KnownHostKeyFormat::SshRsa,
                ssh2::HostKeyType::Dss => KnownHostKeyFormat::SshDss,
                _ => KnownHostKeyFormat::SshRsa,
            };
            known_hosts
                .add(host, key, "", format)
                .map_err(SshError::Handshake)?;
            let _ = known_hosts.write_file(&config.known_hosts_path, KnownHostFileKind::OpenSSH);
        }
        ssh2::CheckResult::Mismatch | ssh2::CheckResult::Failure => {
            return Err(SshError::KnownHostsRejected(host.to_string()));
        }
    }

    Ok(())
}

fn authenticate(session: &RawSession, config: &SshConfig) -> Result<(), SshError> {
    let username = std::env::var("USER").unwrap_or_else(|_| "root".to_string());

    if let Ok(mut agent) = session.agent() {
        if agent.connect().is_ok() && agent.list_identities().is_ok() {
            if let Ok(identities) = agent.identities() {
                for identity in identities {
                    if agent.userauth(&username, &identity).is_ok() {
                        return Ok(());
                    }
                }
            }
        }
    }

    // Fall back to an RSA keyfile pair. DSA keys are no longer accepted by
    // modern OpenSSH servers, so we don't attempt them.
    session
        .userauth_pubkey_file(
            &username,
            Some(&config.pubkey_path),
            &config.prikey_path,
            config.passphrase.as_deref(),
        )
        .map_err(|e| SshError::AuthFailed(e.to_string()))
}

fn build_shell_command(argv: &[String], env: &[(String, String)]) -> String {
    let mut parts = vec!["nohup".to_string()];
    for (k, v) in env {
        parts.push(format!("{k}={}", shell_quote(v)));
    }
    for arg in argv {
        parts.push(shell_quote(arg));
    }
    parts.join(" ")
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_command_quotes_args_and_env() {
        let cmd = build_shell_command(
            &["/bin/echo".to_string(), "a b".to_string()],
            &[("FOO".to_string(), "bar baz".to_string())],
        );
        assert_eq!(cmd, "nohup FOO='bar baz' '/bin/echo' 'a b'");
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("a'b"), "'a'\\''b'");
    }
}
