// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Workload manager identity and per-WLM job identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The concrete workload manager backing an [`crate::App`].
///
/// Numeric values match the `--wlm` encoding the BE daemon CLI accepts
/// (spec.md §6): `slurm=1, alps=2, pals=3, flux=4, ssh=5, localhost=6`.
/// `Mock` has no wire encoding; it only ever exists in-process for tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum WlmKind {
    Slurm = 1,
    Alps = 2,
    Pals = 3,
    Flux = 4,
    Ssh = 5,
    Localhost = 6,
    /// In-memory deterministic backend used only by the test-support feature.
    Mock = 7,
}

impl WlmKind {
    /// Parse the `CTI_WLM_IMPL` env var / `--wlm` CLI spelling.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "slurm" => Some(Self::Slurm),
            "alps" => Some(Self::Alps),
            "pals" => Some(Self::Pals),
            "flux" => Some(Self::Flux),
            "generic" | "ssh" => Some(Self::Ssh),
            "localhost" => Some(Self::Localhost),
            "mock" => Some(Self::Mock),
            _ => None,
        }
    }

    /// The numeric encoding used on the BE-daemon `--wlm` argument.
    pub fn wire_value(self) -> u8 {
        self as u8
    }

    /// Decode a BE-daemon `--wlm` argument back into a [`WlmKind`].
    pub fn from_wire_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Slurm),
            2 => Some(Self::Alps),
            3 => Some(Self::Pals),
            4 => Some(Self::Flux),
            5 => Some(Self::Ssh),
            6 => Some(Self::Localhost),
            7 => Some(Self::Mock),
            _ => None,
        }
    }
}

impl fmt::Display for WlmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Slurm => "slurm",
            Self::Alps => "alps",
            Self::Pals => "pals",
            Self::Flux => "flux",
            Self::Ssh => "generic",
            Self::Localhost => "localhost",
            Self::Mock => "mock",
        };
        write!(f, "{s}")
    }
}

/// WLM-specific job identifiers. Arity varies per variant (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobIdentifier {
    Slurm {
        job_id: u32,
        step_id: u32,
        /// Heterogeneous-job component offset, if the allocation is a het job.
        het_offset: Option<u32>,
    },
    Alps {
        apid: u64,
    },
    Pals {
        apid: String,
    },
    Flux {
        job_id: u64,
    },
    Ssh {
        /// The login host the job was launched/attached through.
        host: String,
        launcher_pid: u32,
    },
    Localhost {
        launcher_pid: u32,
    },
    Mock {
        tag: String,
    },
}

impl JobIdentifier {
    pub fn wlm_kind(&self) -> WlmKind {
        match self {
            Self::Slurm { .. } => WlmKind::Slurm,
            Self::Alps { .. } => WlmKind::Alps,
            Self::Pals { .. } => WlmKind::Pals,
            Self::Flux { .. } => WlmKind::Flux,
            Self::Ssh { .. } => WlmKind::Ssh,
            Self::Localhost { .. } => WlmKind::Localhost,
            Self::Mock { .. } => WlmKind::Mock,
        }
    }

    /// An opaque string form suitable for the BE-daemon `--apid` argument.
    pub fn apid_string(&self) -> String {
        match self {
            Self::Slurm {
                job_id, step_id, ..
            } => format!("{job_id}.{step_id}"),
            Self::Alps { apid } => apid.to_string(),
            Self::Pals { apid } => apid.clone(),
            Self::Flux { job_id } => job_id.to_string(),
            Self::Ssh { host, launcher_pid } => format!("{host}:{launcher_pid}"),
            Self::Localhost { launcher_pid } => launcher_pid.to_string(),
            Self::Mock { tag } => tag.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_through_display() {
        for kind in [
            WlmKind::Slurm,
            WlmKind::Alps,
            WlmKind::Pals,
            WlmKind::Flux,
            WlmKind::Localhost,
        ] {
            assert_eq!(WlmKind::parse(&kind.to_string()), Some(kind));
        }
        assert_eq!(WlmKind::parse("generic"), Some(WlmKind::Ssh));
    }

    #[test]
    fn wire_values_match_be_daemon_encoding() {
        assert_eq!(WlmKind::Slurm.wire_value(), 1);
        assert_eq!(WlmKind::Alps.wire_value(), 2);
        assert_eq!(WlmKind::Pals.wire_value(), 3);
        assert_eq!(WlmKind::Flux.wire_value(), 4);
        assert_eq!(WlmKind::Ssh.wire_value(), 5);
        assert_eq!(WlmKind::Localhost.wire_value(), 6);
    }

    #[test]
    fn wire_value_round_trips_through_from_wire_value() {
        for kind in [
            WlmKind::Slurm,
            WlmKind::Alps,
            WlmKind::Pals,
            WlmKind::Flux,
            WlmKind::Ssh,
            WlmKind::Localhost,
            WlmKind::Mock,
        ] {
            assert_eq!(WlmKind::from_wire_value(kind.wire_value()), Some(kind));
        }
        assert_eq!(WlmKind::from_wire_value(0), None);
    }

    #[test]
    fn slurm_apid_string_includes_step() {
        let id = JobIdentifier::Slurm {
            job_id: 42,
            step_id: 0,
            het_offset: None,
        };
        assert_eq!(id.apid_string(), "42.0");
    }
}
