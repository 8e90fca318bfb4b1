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

//! Membership: which peers this node knows and how it reaches them.

use std::collections::BTreeMap;

use sudonet_common::NodeAddress;

use crate::connection::ConnectionId;

/// Known peers and their live connection, if any.
///
/// An address mapped to `None` is known (learned from a `join_ack`) but not
/// yet connected; the connection is opened lazily on the next broadcast.
/// The node's own address is never stored.
#[derive(Debug, Clone)]
pub struct PeerTable {
    self_addr: NodeAddress,
    peers: BTreeMap<NodeAddress, Option<ConnectionId>>,
}

impl PeerTable {
    pub fn new(self_addr: NodeAddress) -> Self {
        Self {
            self_addr,
            peers: BTreeMap::new(),
        }
    }

    /// Records an address without a connection.
    ///
    /// Returns `false` if the address is ours or already known.
    pub fn insert_known(&mut self, addr: NodeAddress) -> bool {
        if addr == self.self_addr || self.peers.contains_key(&addr) {
            return false;
        }
        self.peers.insert(addr, None);
        true
    }

    /// Maps `addr` to `conn`, returning the connection it replaced (if it was
    /// a different one).
    pub fn attach(&mut self, addr: NodeAddress, conn: ConnectionId) -> Option<ConnectionId> {
        if addr == self.self_addr {
            return None;
        }
        match self.peers.insert(addr, Some(conn)) {
            Some(Some(previous)) if previous != conn => Some(previous),
            _ => None,
        }
    }

    /// Forgets a peer. Returns `None` if it was unknown, otherwise its
    /// connection (which may itself be `None`).
    pub fn remove(&mut self, addr: &NodeAddress) -> Option<Option<ConnectionId>> {
        self.peers.remove(addr)
    }

    pub fn connection(&self, addr: &NodeAddress) -> Option<ConnectionId> {
        self.peers.get(addr).copied().flatten()
    }

    pub fn address_of(&self, conn: ConnectionId) -> Option<&NodeAddress> {
        self.peers
            .iter()
            .find(|(_, c)| **c == Some(conn))
            .map(|(addr, _)| addr)
    }

    /// All known peer addresses, in address order.
    pub fn addresses(&self) -> Vec<NodeAddress> {
        self.peers.keys().cloned().collect()
    }

    /// Known peers that still need a connection.
    pub fn unconnected(&self) -> Vec<NodeAddress> {
        self.peers
            .iter()
            .filter(|(_, conn)| conn.is_none())
            .map(|(addr, _)| addr.clone())
            .collect()
    }

    /// Peers with a live connection.
    pub fn connected(&self) -> Vec<(NodeAddress, ConnectionId)> {
        self.peers
            .iter()
            .filter_map(|(addr, conn)| conn.map(|c| (addr.clone(), c)))
            .collect()
    }

    /// Addresses to hand to a joining peer: everything we know except the requester.
    pub fn join_ack_for(&self, requester: &NodeAddress) -> Vec<NodeAddress> {
        self.peers
            .keys()
            .filter(|addr| *addr != requester)
            .cloned()
            .collect()
    }

    /// Records every address from a `join_ack` and returns the ones that were new.
    pub fn absorb(&mut self, addrs: impl IntoIterator<Item = NodeAddress>) -> Vec<NodeAddress> {
        addrs
            .into_iter()
            .filter(|addr| self.insert_known(addr.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
