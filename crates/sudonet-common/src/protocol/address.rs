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

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use crate::protocol::error::{Result, SudonetError};

/// Identity of a peer: the host and port its P2P listener is bound to.
///
/// This is the only key used for peers anywhere in the node. On the wire it
/// appears either as a pair of `node_ip` / `node_port` fields (flattened into
/// a message body) or as a two-element `[ip, port]` array inside address lists;
/// both forms deserialize into this one type so lookups never miss because of
/// representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeAddress {
    #[serde(rename = "node_ip")]
    pub host: String,
    #[serde(rename = "node_port")]
    pub port: u16,
}

impl NodeAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Resolves the address to the first matching socket address.
    pub fn to_socket_addr(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| SudonetError::InvalidAddress(format!("{}: {}", self, e)))?
            .next()
            .ok_or_else(|| SudonetError::InvalidAddress(format!("{} did not resolve", self)))
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for NodeAddress {
    type Err = SudonetError;

    /// Parses `host:port`. The split happens on the last colon.
    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| SudonetError::InvalidAddress(format!("'{}' is not host:port", s)))?;
        if host.is_empty() {
            return Err(SudonetError::InvalidAddress(format!("'{}' has an empty host", s)));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| SudonetError::InvalidAddress(format!("'{}': bad port: {}", s, e)))?;
        Ok(Self::new(host, port))
    }
}

impl From<SocketAddr> for NodeAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

/// Serde helper for address lists encoded as `[[ip, port], ...]`.
pub mod pairs {
    use super::NodeAddress;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(addrs: &[NodeAddress], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let pairs: Vec<(&str, u16)> = addrs.iter().map(|a| (a.host.as_str(), a.port)).collect();
        pairs.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<NodeAddress>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pairs = Vec::<(String, u16)>::deserialize(deserializer)?;
        Ok(pairs
            .into_iter()
            .map(|(host, port)| NodeAddress::new(host, port))
            .collect())
    }
}
