// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Proctable and derived per-node step layout (spec.md §3).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One MPIR proctable entry: `{ pid, hostname, executable_path }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcTableEntry {
    pub pid: u32,
    pub hostname: String,
    pub executable_path: String,
}

/// Ordered rank-to-(pid, host, executable) mapping. Immutable after
/// extraction from the launcher (spec.md §3).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcTable {
    entries: Vec<ProcTableEntry>,
}

impl ProcTable {
    pub fn new(entries: Vec<ProcTableEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcTableEntry> {
        self.entries.iter()
    }

    pub fn get(&self, rank: usize) -> Option<&ProcTableEntry> {
        self.entries.get(rank)
    }
}

/// Normalize a hostname by truncating at the first `.`, tolerating FQDN
/// inconsistencies between launchers (spec.md §3 StepLayout).
pub fn normalize_hostname(hostname: &str) -> &str {
    hostname.split('.').next().unwrap_or(hostname)
}

/// One compute node's placement within a [`StepLayout`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepLayoutNode {
    pub hostname: String,
    pub local_pids: Vec<u32>,
    pub first_pe: u32,
}

/// Total PE count and per-node placement, derived from a [`ProcTable`].
/// Node order is the order in which each node's first PE appears (spec.md §3).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepLayout {
    pub num_pes: u32,
    pub nodes: Vec<StepLayoutNode>,
}

impl StepLayout {
    /// Build a [`StepLayout`] from a [`ProcTable`], normalizing hostnames and
    /// preserving first-appearance node order.
    pub fn from_proctable(proctable: &ProcTable) -> Self {
        let mut order: Vec<String> = Vec::new();
        let mut by_host: BTreeMap<String, (Vec<u32>, u32)> = BTreeMap::new();

        for (pe_index, entry) in proctable.iter().enumerate() {
            let host = normalize_hostname(&entry.hostname).to_string();
            match by_host.get_mut(&host) {
                Some((pids, _first_pe)) => pids.push(entry.pid),
                None => {
                    by_host.insert(host.clone(), (vec![entry.pid], pe_index as u32));
                    order.push(host);
                }
            }
        }

        let nodes = order
            .into_iter()
            .map(|host| {
                let (local_pids, first_pe) = by_host.remove(&host).unwrap_or_default();
                StepLayoutNode {
                    hostname: host,
                    local_pids,
                    first_pe,
                }
            })
            .collect();

        Self {
            num_pes: proctable.len() as u32,
            nodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pid: u32, host: &str) -> ProcTableEntry {
        ProcTableEntry {
            pid,
            hostname: host.to_string(),
            executable_path: "/bin/true".to_string(),
        }
    }

    #[test]
    fn normalizes_fqdn_hostnames() {
        assert_eq!(normalize_hostname("nid001.us.cray.com"), "nid001");
        assert_eq!(normalize_hostname("nid001"), "nid001");
    }

    #[test]
    fn groups_by_node_preserving_first_appearance_order() {
        let pt = ProcTable::new(vec![
            entry(100, "nid002.cluster"),
            entry(101, "nid001.cluster"),
            entry(102, "nid002.cluster"),
            entry(103, "nid001.cluster"),
        ]);

        let layout = StepLayout::from_proctable(&pt);
        assert_eq!(layout.num_pes, 4);
        assert_eq!(layout.nodes.len(), 2);

        // nid002 appeared first (at PE 0), so it comes first despite sorting
        // alphabetically after nid001.
        assert_eq!(layout.nodes[0].hostname, "nid002");
        assert_eq!(layout.nodes[0].local_pids, vec![100, 102]);
        assert_eq!(layout.nodes[0].first_pe, 0);

        assert_eq!(layout.nodes[1].hostname, "nid001");
        assert_eq!(layout.nodes[1].local_pids, vec![101, 103]);
        assert_eq!(layout.nodes[1].first_pe, 1);
    }

    #[test]
    fn empty_proctable_yields_empty_layout() {
        let layout = StepLayout::from_proctable(&ProcTable::default());
        assert_eq!(layout.num_pes, 0);
        assert!(layout.nodes.is_empty());
    }
}
