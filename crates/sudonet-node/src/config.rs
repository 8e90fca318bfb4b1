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

//! Node configuration.

use std::time::Duration;

use sudonet_common::transport::DEFAULT_MAX_FRAME_SIZE;
use sudonet_common::NodeAddress;

/// Configuration for a coordination node.
///
/// # Fields
///
/// - `host` - Address advertised to peers and bound by the peer listener (default: `127.0.0.1`)
/// - `p2p_port` - Peer listener port; `0` picks an ephemeral port
/// - `anchor` - Existing peer to join through; `None` starts a new cluster
/// - `handicap` - Artificial delay added to every candidate check (default: none)
/// - `heartbeat_interval` - Period between `hello` broadcasts (default: 5 seconds)
/// - `peer_timeout` - Silence after which a peer is evicted (default: 20 seconds)
/// - `poll_interval` - Upper bound on how long the event loop sleeps between
///   maintenance passes (default: 1 second)
/// - `max_candidates` - Largest candidate list a single job may expand to
/// - `max_frame_size` - Largest accepted peer frame
///
/// # Example
///
/// ```
/// use sudonet_node::NodeConfig;
/// use std::time::Duration;
///
/// let config = NodeConfig::new(9001)
///     .with_handicap(Duration::from_millis(2))
///     .with_peer_timeout(Duration::from_secs(10));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    pub host: String,
    pub p2p_port: u16,
    pub anchor: Option<NodeAddress>,
    pub handicap: Duration,
    pub heartbeat_interval: Duration,
    pub peer_timeout: Duration,
    pub poll_interval: Duration,
    pub max_candidates: usize,
    pub max_frame_size: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            p2p_port: 0,
            anchor: None,
            handicap: Duration::ZERO,
            heartbeat_interval: Duration::from_secs(5),
            peer_timeout: Duration::from_secs(20),
            poll_interval: Duration::from_secs(1),
            max_candidates: 1_000_000,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl NodeConfig {
    /// Creates a configuration listening for peers on `p2p_port` with defaults elsewhere.
    pub fn new(p2p_port: u16) -> Self {
        Self {
            p2p_port,
            ..Self::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_anchor(mut self, anchor: NodeAddress) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn with_handicap(mut self, handicap: Duration) -> Self {
        self.handicap = handicap;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_peer_timeout(mut self, timeout: Duration) -> Self {
        self.peer_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_candidates(mut self, max: usize) -> Self {
        self.max_candidates = max;
        self
    }

    pub fn with_max_frame_size(mut self, max: usize) -> Self {
        self.max_frame_size = max;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The host is empty
    /// - Any interval is zero
    /// - The peer timeout is not longer than the heartbeat interval
    /// - `max_candidates` or `max_frame_size` is zero
    pub fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("host must not be empty".to_string());
        }

        if self.heartbeat_interval.is_zero() {
            return Err("heartbeat interval must be greater than zero".to_string());
        }

        if self.poll_interval.is_zero() {
            return Err("poll interval must be greater than zero".to_string());
        }

        if self.peer_timeout <= self.heartbeat_interval {
            return Err(format!(
                "peer timeout ({}ms) must be longer than the heartbeat interval ({}ms)",
                self.peer_timeout.as_millis(),
                self.heartbeat_interval.as_millis()
            ));
        }

        if self.max_candidates == 0 {
            return Err("max candidates must be greater than zero".to_string());
        }

        if self.max_frame_size == 0 {
            return Err("max frame size must be greater than zero".to_string());
        }

        Ok(())
    }
}
