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

//! Heartbeat bookkeeping for failure detection.
//!
//! The ledger never touches sockets. The event loop asks it whether a `hello`
//! broadcast is due and which peers have gone quiet, then performs the
//! eviction itself.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use sudonet_common::NodeAddress;

#[derive(Debug)]
pub struct HeartbeatLedger {
    last_seen: HashMap<NodeAddress, Instant>,
    interval: Duration,
    timeout: Duration,
    last_broadcast: Instant,
}

impl HeartbeatLedger {
    pub fn new(interval: Duration, timeout: Duration, now: Instant) -> Self {
        Self {
            last_seen: HashMap::new(),
            interval,
            timeout,
            last_broadcast: now,
        }
    }

    /// Records a sign of life from `addr`.
    pub fn record(&mut self, addr: NodeAddress, now: Instant) {
        self.last_seen.insert(addr, now);
    }

    /// Starts tracking `addr` unless it is already tracked.
    pub fn track(&mut self, addr: NodeAddress, now: Instant) {
        self.last_seen.entry(addr).or_insert(now);
    }

    pub fn forget(&mut self, addr: &NodeAddress) {
        self.last_seen.remove(addr);
    }

    /// Peers silent for longer than the timeout, in address order.
    pub fn expired(&self, now: Instant) -> Vec<NodeAddress> {
        let mut expired: Vec<_> = self
            .last_seen
            .iter()
            .filter(|(_, seen)| now.saturating_duration_since(**seen) > self.timeout)
            .map(|(addr, _)| addr.clone())
            .collect();
        expired.sort();
        expired
    }

    /// Returns `true` (and restarts the interval) when a `hello` broadcast is due.
    pub fn heartbeat_due(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_broadcast) >= self.interval {
            self.last_broadcast = now;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> NodeAddress {
        NodeAddress::new("127.0.0.1", port)
    }

    fn ledger(start: Instant) -> HeartbeatLedger {
        HeartbeatLedger::new(Duration::from_secs(5), Duration::from_secs(20), start)
    }

    #[test]
    fn test_expiry_after_timeout() {
        let start = Instant::now();
        let mut ledger = ledger(start);
        ledger.record(addr(2), start);
        ledger.record(addr(3), start + Duration::from_secs(10));

        assert!(ledger.expired(start + Duration::from_secs(20)).is_empty());
        assert_eq!(ledger.expired(start + Duration::from_secs(21)), vec![addr(2)]);
        assert_eq!(ledger.expired(start + Duration::from_secs(31)), vec![addr(2), addr(3)]);
    }

    #[test]
    fn test_record_refreshes() {
        let start = Instant::now();
        let mut ledger = ledger(start);
        ledger.record(addr(2), start);
        ledger.record(addr(2), start + Duration::from_secs(15));

        assert!(ledger.expired(start + Duration::from_secs(30)).is_empty());
    }

    #[test]
    fn test_track_does_not_refresh() {
        let start = Instant::now();
        let mut ledger = ledger(start);
        ledger.track(addr(2), start);
        ledger.track(addr(2), start + Duration::from_secs(15));

        assert_eq!(ledger.expired(start + Duration::from_secs(21)), vec![addr(2)]);
    }

    #[test]
    fn test_forget() {
        let start = Instant::now();
        let mut ledger = ledger(start);
        ledger.record(addr(2), start);
        ledger.forget(&addr(2));

        assert!(ledger.expired(start + Duration::from_secs(60)).is_empty());
        // Tracking again starts a fresh entry
        ledger.track(addr(2), start + Duration::from_secs(50));
        assert!(ledger.expired(start + Duration::from_secs(60)).is_empty());
    }

    #[test]
    fn test_heartbeat_schedule() {
        let start = Instant::now();
        let mut ledger = ledger(start);

        assert!(!ledger.heartbeat_due(start + Duration::from_secs(4)));
        assert!(ledger.heartbeat_due(start + Duration::from_secs(5)));
        assert!(!ledger.heartbeat_due(start + Duration::from_secs(6)));
        assert!(ledger.heartbeat_due(start + Duration::from_secs(10)));
    }
}
