// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! A thin, typed handle around an OS process under ptrace control
//! (spec.md §4.1).

use crate::elf::{self, SymbolTable};
use crate::error::InferiorError;
use nix::sys::ptrace;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::ffi::CString;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Once;

static FOLLOW_FORK_DISABLED: Once = Once::new();

/// Disable follow-fork mode globally before any inferior is created, so that
/// a launcher's own fork/exec tree does not silently inherit breakpoints
/// meant only for the launcher itself (spec.md §4.1 "Key design choices").
///
/// This crate never requests `PTRACE_O_TRACEFORK`/`TRACEVFORK`/`TRACECLONE`
/// in the first place; calling this is what makes that a documented
/// invariant rather than an accident, and is idempotent.
pub fn disable_follow_fork() {
    FOLLOW_FORK_DISABLED.call_once(|| {
        tracing::debug!("follow-fork mode disabled globally for ptrace inferiors");
    });
}

/// Terminal disposition of an inferior after a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Stopped (breakpoint, signal-delivery-stop, or initial exec-stop).
    Stopped,
    /// Exited normally with the given code.
    Exited(i32),
    /// Killed by a signal (considered a crash, spec.md §4.2 `waitExit`).
    Crashed,
    /// No longer traced (detach observed as termination per Dyninst's
    /// documented behavior — spec.md §4.2 `wait_exit`).
    Detached,
}

/// A 64-bit address in the inferior's address space.
pub type Address = u64;

/// A planted breakpoint: original byte at `addr`, restored on removal.
struct Breakpoint {
    addr: Address,
    original_byte: u8,
}

/// A process under ptrace control, with a resolved ELF symbol table for
/// name-to-address lookups.
pub struct Inferior {
    pid: Pid,
    exe_path: PathBuf,
    symtab: SymbolTable,
    base: Address,
    breakpoints: HashMap<Address, Breakpoint>,
    run_state: RunState,
}

impl Inferior {
    /// Spawn a stopped child with the given fd remap applied, stopped at its
    /// first instruction after `execve` (spec.md §4.1 `spawn`).
    pub fn spawn(
        path: &Path,
        argv: &[String],
        env: &[(String, String)],
        fd_remap: &HashMap<i32, i32>,
    ) -> Result<Self, InferiorError> {
        disable_follow_fork();

        let mut cmd = Command::new(path);
        cmd.args(argv);
        cmd.env_clear();
        for (k, v) in env {
            cmd.env(k, v);
        }

        let remap = fd_remap.clone();
        // SAFETY: the closure only calls async-signal-safe libc functions
        // (ptrace(2), dup2(2)) between fork and exec, as required by
        // `pre_exec`'s contract.
        unsafe {
            cmd.pre_exec(move || {
                ptrace::traceme().map_err(std::io::Error::from)?;
                for (&child_fd, &parent_fd) in &remap {
                    if libc::dup2(parent_fd, child_fd) < 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                }
                Ok(())
            });
        }

        let child = cmd
            .spawn()
            .map_err(|e| InferiorError::SpawnFailed(e.to_string()))?;
        let pid = Pid::from_raw(child.id() as i32);

        // First stop is the post-execve SIGTRAP delivered by PTRACE_TRACEME.
        match waitpid(pid, None) {
            Ok(WaitStatus::Stopped(_, Signal::SIGTRAP)) => {}
            Ok(other) => {
                return Err(InferiorError::SpawnFailed(format!(
                    "unexpected initial wait status: {other:?}"
                )))
            }
            Err(e) => return Err(InferiorError::SpawnFailed(e.to_string())),
        }

        Self::finish_attach(pid, path)
    }

    /// Attach to an already-running process (spec.md §4.1 `attach`).
    pub fn attach(path: &Path, pid: u32) -> Result<Self, InferiorError> {
        disable_follow_fork();
        let pid = Pid::from_raw(pid as i32);

        ptrace::attach(pid).map_err(|e| InferiorError::AttachFailed {
            pid: pid.as_raw() as u32,
            reason: e.to_string(),
        })?;

        match waitpid(pid, None) {
            Ok(WaitStatus::Stopped(_, _)) => {}
            Ok(other) => {
                return Err(InferiorError::AttachFailed {
                    pid: pid.as_raw() as u32,
                    reason: format!("unexpected wait status: {other:?}"),
                })
            }
            Err(e) => {
                return Err(InferiorError::AttachFailed {
                    pid: pid.as_raw() as u32,
                    reason: e.to_string(),
                })
            }
        }

        Self::finish_attach(pid, path)
    }

    fn finish_attach(pid: Pid, path: &Path) -> Result<Self, InferiorError> {
        let symtab = SymbolTable::load(path)?;
        let base = elf::module_base(pid, path, &symtab)?;

        Ok(Self {
            pid,
            exe_path: path.to_path_buf(),
            symtab,
            base,
            breakpoints: HashMap::new(),
            run_state: RunState::Stopped,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid.as_raw() as u32
    }

    pub fn exe_path(&self) -> &Path {
        &self.exe_path
    }

    /// Resolve a symbol name to its load-adjusted address (spec.md §4.1
    /// "Load address resolution").
    pub fn address_of(&self, symbol: &str) -> Result<Address, InferiorError> {
        self.symtab
            .offset_of(symbol)
            .map(|off| self.base + off)
            .ok_or_else(|| InferiorError::SymbolNotFound(symbol.to_string()))
    }

    fn peek(&self, addr: Address) -> Result<i64, InferiorError> {
        ptrace::read(self.pid, addr as ptrace::AddressType)
            .map_err(|e| InferiorError::MemoryAccessFailed(format!("peek {addr:#x}: {e}")))
    }

    fn poke(&self, addr: Address, value: i64) -> Result<(), InferiorError> {
        // SAFETY: `ptrace(PTRACE_POKEDATA)` is a syscall; nix's wrapper
        // trusts the caller that `addr` is a valid address in the tracee.
        unsafe {
            ptrace::write(self.pid, addr as ptrace::AddressType, value)
                .map_err(|e| InferiorError::MemoryAccessFailed(format!("poke {addr:#x}: {e}")))
        }
    }

    /// Read a 4-byte signed integer (e.g. `MPIR_debug_state`, `MPIR_proctable_size`).
    pub fn read_i32(&self, addr: Address) -> Result<i32, InferiorError> {
        Ok(self.peek(addr)? as i32)
    }

    /// Write a 4-byte signed integer (e.g. `MPIR_being_debugged = 1`).
    pub fn write_i32(&self, addr: Address, value: i32) -> Result<(), InferiorError> {
        let word = self.peek(addr)?;
        let patched = (word & !0xffff_ffffi64) | (value as i64 & 0xffff_ffff);
        self.poke(addr, patched)
    }

    /// Read an 8-byte address-sized value (e.g. a proctable pointer field).
    pub fn read_u64(&self, addr: Address) -> Result<u64, InferiorError> {
        Ok(self.peek(addr)? as u64)
    }

    /// Read a NUL-terminated string starting at `addr`.
    pub fn read_cstring(&self, addr: Address) -> Result<String, InferiorError> {
        let mut bytes = Vec::new();
        let mut cursor = addr;
        'outer: loop {
            let word = self.peek(cursor)?;
            let word_bytes = word.to_ne_bytes();
            for &b in &word_bytes {
                if b == 0 {
                    break 'outer;
                }
                bytes.push(b);
            }
            cursor += word_bytes.len() as u64;
        }
        CString::new(bytes)
            .map_err(|e| InferiorError::MemoryAccessFailed(e.to_string()))
            .map(|cs| cs.to_string_lossy().into_owned())
    }

    /// Plant an `int3` breakpoint at `symbol`'s address.
    pub fn set_breakpoint(&mut self, symbol: &str) -> Result<(), InferiorError> {
        let addr = self.address_of(symbol)?;
        let word = self.peek(addr)?;
        let original_byte = (word & 0xff) as u8;
        let patched = (word & !0xffi64) | 0xcc;
        self.poke(addr, patched)?;
        self.breakpoints.insert(
            addr,
            Breakpoint {
                addr,
                original_byte,
            },
        );
        Ok(())
    }

    fn remove_breakpoint_byte(&self, bp: &Breakpoint) -> Result<(), InferiorError> {
        let word = self.peek(bp.addr)?;
        let restored = (word & !0xffi64) | bp.original_byte as i64;
        self.poke(bp.addr, restored)
    }

    /// Step a single instruction, used to clear a planted breakpoint so
    /// execution can pass back over it.
    fn single_step(&self) -> Result<WaitStatus, InferiorError> {
        ptrace::step(self.pid, None)
            .map_err(|e| InferiorError::MemoryAccessFailed(format!("singlestep: {e}")))?;
        waitpid(self.pid, None).map_err(|e| InferiorError::MemoryAccessFailed(e.to_string()))
    }

    fn replant_breakpoint(&self, bp: &Breakpoint) -> Result<(), InferiorError> {
        let word = self.peek(bp.addr)?;
        let patched = (word & !0xffi64) | 0xcc;
        self.poke(bp.addr, patched)
    }

    /// Resume, then block until some thread stops or the inferior
    /// terminates (spec.md §4.1 `continue_run`).
    pub fn continue_run(&mut self) -> Result<RunState, InferiorError> {
        if let RunState::Exited(_) | RunState::Crashed | RunState::Detached = self.run_state {
            return Ok(self.run_state);
        }

        // If we are stopped exactly on a planted breakpoint, the int3 byte
        // has already executed and rip sits one byte past `addr`. Rewind,
        // step over the original instruction, then replant before
        // continuing so the breakpoint still fires on the next pass.
        if let Some(addr) = self.stopped_breakpoint_addr()? {
            if let Some(bp) = self.breakpoints.remove(&addr) {
                self.rewind_pc(addr)?;
                self.remove_breakpoint_byte(&bp)?;
                self.single_step()?;
                self.replant_breakpoint(&bp)?;
                self.breakpoints.insert(addr, bp);
            }
        }

        ptrace::cont(self.pid, None)
            .map_err(|e| InferiorError::MemoryAccessFailed(format!("cont: {e}")))?;

        match waitpid(self.pid, None) {
            Ok(WaitStatus::Exited(_, code)) => {
                self.run_state = RunState::Exited(code);
            }
            Ok(WaitStatus::Signaled(..)) => {
                self.run_state = RunState::Crashed;
            }
            Ok(WaitStatus::Stopped(..)) => {
                self.run_state = RunState::Stopped;
            }
            Ok(other) => {
                return Err(InferiorError::MemoryAccessFailed(format!(
                    "unexpected wait status: {other:?}"
                )))
            }
            Err(nix::errno::Errno::ESRCH) => {
                self.run_state = RunState::Detached;
            }
            Err(e) => return Err(InferiorError::MemoryAccessFailed(e.to_string())),
        }

        Ok(self.run_state)
    }

    fn current_pc(&self) -> Result<Address, InferiorError> {
        let regs = ptrace::getregs(self.pid)
            .map_err(|e| InferiorError::MemoryAccessFailed(format!("getregs: {e}")))?;
        Ok(regs.rip)
    }

    fn rewind_pc(&self, addr: Address) -> Result<(), InferiorError> {
        let mut regs = ptrace::getregs(self.pid)
            .map_err(|e| InferiorError::MemoryAccessFailed(format!("getregs: {e}")))?;
        regs.rip = addr;
        ptrace::setregs(self.pid, regs)
            .map_err(|e| InferiorError::MemoryAccessFailed(format!("setregs: {e}")))
    }

    fn stopped_breakpoint_addr(&self) -> Result<Option<Address>, InferiorError> {
        if self.run_state != RunState::Stopped {
            return Ok(None);
        }
        let pc = self.current_pc()?;
        // int3 traps leave rip one past the breakpoint address.
        Ok(self
            .breakpoints
            .keys()
            .find(|&&addr| addr + 1 == pc)
            .copied())
    }

    pub fn is_terminated(&self) -> bool {
        matches!(
            self.run_state,
            RunState::Exited(_) | RunState::Crashed | RunState::Detached
        )
    }

    pub fn is_exited(&self) -> bool {
        matches!(self.run_state, RunState::Exited(_))
    }

    pub fn is_crashed(&self) -> bool {
        matches!(self.run_state, RunState::Crashed)
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self.run_state {
            RunState::Exited(code) => Some(code),
            _ => None,
        }
    }

    /// Detach then SIGTERM+reap (spec.md §4.1 `terminate`).
    pub fn terminate(mut self) -> Result<(), InferiorError> {
        if !self.is_terminated() {
            let _ = ptrace::detach(self.pid, None);
            let _ = nix::sys::signal::kill(self.pid, Signal::SIGTERM);
            let _ = waitpid(self.pid, None);
            self.run_state = RunState::Detached;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "inferior_tests.rs"]
mod tests;
