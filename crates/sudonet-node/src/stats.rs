// Copyright 2025 sudonet Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Cluster-wide statistics and network view, gossiped through `hello`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sudonet_common::{HelloStats, NodeAddress};

/// Totals across the cluster as served by `GET /stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatsTotals {
    pub solved: u64,
    pub validations: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStats {
    pub address: String,
    pub validations: u64,
}

/// Body of `GET /stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub all: StatsTotals,
    pub nodes: Vec<NodeStats>,
}

/// Approximate cluster counters.
///
/// `solved` only ever grows: a peer reporting a higher count raises ours.
/// Each peer's validation count is replaced by its latest report, and the
/// total is recomputed from the per-node figures.
#[derive(Debug, Clone)]
pub struct ClusterStats {
    self_addr: NodeAddress,
    solved: u64,
    local_validations: u64,
    /// Peers in the order they first reported.
    peers: Vec<(NodeAddress, u64)>,
}

impl ClusterStats {
    pub fn new(self_addr: NodeAddress) -> Self {
        Self {
            self_addr,
            solved: 0,
            local_validations: 0,
            peers: Vec::new(),
        }
    }

    pub fn record_validations(&mut self, count: u64) {
        self.local_validations += count;
    }

    pub fn record_solved(&mut self) {
        self.solved += 1;
    }

    /// Folds a peer's `hello` stats into the cluster view.
    pub fn merge(&mut self, from: &NodeAddress, stats: HelloStats) {
        self.solved = self.solved.max(stats.solved);

        if from == &self.self_addr {
            return;
        }
        match self.peers.iter_mut().find(|(addr, _)| addr == from) {
            Some((_, validations)) => *validations = stats.validations,
            None => self.peers.push((from.clone(), stats.validations)),
        }
    }

    /// What this node advertises in its own `hello`.
    pub fn hello_stats(&self) -> HelloStats {
        HelloStats {
            solved: self.solved,
            validations: self.local_validations,
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let mut nodes = Vec::with_capacity(self.peers.len() + 1);
        nodes.push(NodeStats {
            address: self.self_addr.to_string(),
            validations: self.local_validations,
        });
        nodes.extend(self.peers.iter().map(|(addr, validations)| NodeStats {
            address: addr.to_string(),
            validations: *validations,
        }));

        StatsSnapshot {
            all: StatsTotals {
                solved: self.solved,
                validations: nodes.iter().map(|n| n.validations).sum(),
            },
            nodes,
        }
    }
}

/// Adjacency learned from `hello` gossip, served by `GET /network`.
#[derive(Debug, Clone, Default)]
pub struct NetworkView {
    adjacency: BTreeMap<NodeAddress, Vec<NodeAddress>>,
}

impl NetworkView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, addr: NodeAddress, neighbours: Vec<NodeAddress>) {
        self.adjacency.insert(addr, neighbours);
    }

    pub fn forget(&mut self, addr: &NodeAddress) {
        self.adjacency.remove(addr);
    }

    /// `{"ip:port": ["ip:port", ...]}`, with this node's entry taken from its
    /// live peer list.
    pub fn snapshot(&self, self_addr: &NodeAddress, own_peers: &[NodeAddress]) -> BTreeMap<String, Vec<String>> {
        let mut view: BTreeMap<String, Vec<String>> = self
            .adjacency
            .iter()
            .filter(|(addr, _)| *addr != self_addr)
            .map(|(addr, peers)| (addr.to_string(), peers.iter().map(ToString::to_string).collect()))
            .collect();
        view.insert(
            self_addr.to_string(),
            own_peers.iter().map(ToString::to_string).collect(),
        );
        view
    }
}
