// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Reading the MPIR proctable out of a stopped inferior (spec.md §4.2 step 4,
//! §6 "MPIR proctable entry").

use crate::error::MpirError;
use cti_inferior::{Address, Inferior};

/// Size in bytes of one `MPIR_ProcDescElem`: two pointer-sized fields
/// (`host_name`, `executable_name`) followed by a pid, each read as an
/// 8-byte word to sidestep struct-packing assumptions about the target's
/// `pid_t` width (spec.md §6 glossary: "pointer-sized fields").
const PROC_DESC_STRIDE: u64 = 24;

struct ProcDescElem {
    host_name: Address,
    executable_name: Address,
    pid: u32,
}

fn read_proc_desc(inferior: &Inferior, array_base: Address, index: u32) -> Result<ProcDescElem, MpirError> {
    let elem_addr = array_base + u64::from(index) * PROC_DESC_STRIDE;
    let host_name = inferior.read_u64(elem_addr)?;
    let executable_name = inferior.read_u64(elem_addr + 8)?;
    let pid = inferior.read_u64(elem_addr + 16)? as u32;
    Ok(ProcDescElem {
        host_name,
        executable_name,
        pid,
    })
}

/// Read out the full proctable: `MPIR_proctable_size` descriptors at
/// `MPIR_proctable`, each followed by its two NUL-terminated strings
/// (spec.md §4.2 step 4).
pub fn read_proctable(
    inferior: &Inferior,
    proctable_addr: Address,
    size: i32,
) -> Result<cti_core::ProcTable, MpirError> {
    if size == 0 {
        return Err(MpirError::LaunchExited);
    }

    let mut entries = Vec::with_capacity(size as usize);
    for i in 0..size as u32 {
        let desc = read_proc_desc(inferior, proctable_addr, i)?;
        let hostname = inferior.read_cstring(desc.host_name)?;
        let executable_path = inferior.read_cstring(desc.executable_name)?;
        entries.push(cti_core::ProcTableEntry {
            pid: desc.pid,
            hostname,
            executable_path,
        });
    }

    Ok(cti_core::ProcTable::new(entries))
}
