// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! `/bin/true` is not an MPI launcher and exports no `MPIR_*` symbols, so
//! driving it through the MPIR protocol must fail fast with
//! `SymbolNotFound` rather than hanging or silently reporting success.

#![allow(clippy::unwrap_used, clippy::panic)]

use cti_mpir::{MpirDriver, MpirError};
use serial_test::serial;
use std::collections::HashMap;
use std::path::PathBuf;

#[test]
#[serial]
fn launch_fails_with_symbol_not_found() {
    let launcher = PathBuf::from("/bin/true");
    let result = MpirDriver::launch(&launcher, &[], &[], &HashMap::new());

    match result {
        Err(MpirError::Inferior(cti_inferior::InferiorError::SymbolNotFound(sym))) => {
            assert_eq!(sym, "MPIR_being_debugged");
        }
        other => panic!("expected SymbolNotFound, got: {other:?}"),
    }
}
