// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! In-memory deterministic backend used only by tests (spec.md §4.5).
//! Never compiled into a production binary.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use cti_core::{JobIdentifier, ProcTable, ProcTableEntry};

use crate::backend::{Backend, KillSignal, LaunchResult};
use crate::error::WlmError;

#[derive(Debug, Clone)]
pub struct MockCall {
    pub op: &'static str,
}

#[derive(Default)]
pub struct MockBackend {
    next_pid: AtomicU32,
    calls: Mutex<Vec<MockCall>>,
    num_ranks: u32,
}

impl MockBackend {
    pub fn new(num_ranks: u32) -> Self {
        Self {
            next_pid: AtomicU32::new(1000),
            calls: Mutex::new(Vec::new()),
            num_ranks,
        }
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, op: &'static str) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(MockCall { op });
    }

    fn fresh_pid(&self) -> u32 {
        self.next_pid.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn launch_at_barrier(
        &self,
        argv: &[String],
        _env: &[(String, String)],
    ) -> Result<LaunchResult, WlmError> {
        self.record("launch_at_barrier");
        let launcher_pid = self.fresh_pid();
        let executable = argv.first().cloned().unwrap_or_default();
        let entries = (0..self.num_ranks)
            .map(|_| ProcTableEntry {
                pid: self.fresh_pid(),
                hostname: "localhost".to_string(),
                executable_path: executable.clone(),
            })
            .collect();
        Ok(LaunchResult {
            job_id: JobIdentifier::Mock {
                tag: format!("mock-{launcher_pid}"),
            },
            launcher_pid,
            proctable: ProcTable::new(entries),
            mpir_id: Some(launcher_pid as u64),
        })
    }

    async fn release_barrier(
        &self,
        _job_id: &JobIdentifier,
        _mpir_id: Option<u64>,
    ) -> Result<(), WlmError> {
        self.record("release_barrier");
        Ok(())
    }

    async fn attach(&self, pid: u32) -> Result<LaunchResult, WlmError> {
        self.record("attach");
        Ok(LaunchResult {
            job_id: JobIdentifier::Mock {
                tag: format!("mock-attach-{pid}"),
            },
            launcher_pid: pid,
            proctable: ProcTable::new(vec![ProcTableEntry {
                pid: self.fresh_pid(),
                hostname: "localhost".to_string(),
                executable_path: "attached".to_string(),
            }]),
            mpir_id: Some(pid as u64),
        })
    }

    async fn register_util(&self, _owner_pid: u32, _util_pid: u32) -> Result<(), WlmError> {
        self.record("register_util");
        Ok(())
    }

    async fn kill(&self, _job_id: &JobIdentifier, _signal: KillSignal) -> Result<(), WlmError> {
        self.record("kill");
        Ok(())
    }

    async fn ship_package(
        &self,
        _job_id: &JobIdentifier,
        _local_tar: &std::path::Path,
        _remote_name: &str,
        _tool_path: &str,
    ) -> Result<(), WlmError> {
        self.record("ship_package");
        Ok(())
    }

    async fn start_daemon(
        &self,
        _job_id: &JobIdentifier,
        _args: &[String],
        _synchronous: bool,
    ) -> Result<(), WlmError> {
        self.record("start_daemon");
        Ok(())
    }

    fn list_hosts(&self, _job_id: &JobIdentifier) -> Result<Vec<String>, WlmError> {
        Ok(vec!["localhost".to_string()])
    }

    fn list_placement(&self, _job_id: &JobIdentifier) -> Result<Vec<(String, u32)>, WlmError> {
        Ok(vec![("localhost".to_string(), self.num_ranks)])
    }

    fn launcher_hostname(&self, _job_id: &JobIdentifier) -> Result<String, WlmError> {
        Ok("localhost".to_string())
    }

    async fn is_running(&self, _job_id: &JobIdentifier) -> Result<bool, WlmError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn launch_records_call_and_builds_proctable() {
        let backend = MockBackend::new(4);
        let result = backend
            .launch_at_barrier(&["/bin/app".to_string()], &[])
            .await
            .expect("launch");
        assert_eq!(result.proctable.len(), 4);
        assert_eq!(backend.calls().len(), 1);
    }
}
