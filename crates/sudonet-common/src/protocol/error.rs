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

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SudonetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Frame too large: {len} bytes (max {max} bytes)")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Unknown message type: {0}")]
    UnknownMessage(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid puzzle: {0}")]
    InvalidPuzzle(String),

    #[error("Too many candidates: {count} (max {max})")]
    TooManyCandidates { count: u128, max: usize },

    #[error("Cannot start a search over an empty candidate list")]
    EmptyJob,

    #[error("Job {0} is still in progress")]
    JobInProgress(u64),

    #[error("Peer unavailable: {0}")]
    PeerUnavailable(String),

    #[error("Node stopped")]
    NodeStopped,
}

impl SudonetError {
    /// Returns `true` for errors that leave the byte stream in an unknown state.
    ///
    /// Framing and socket errors poison the connection; a frame that decoded
    /// into bytes but not into a known message does not.
    pub fn is_fatal_to_connection(&self) -> bool {
        matches!(
            self,
            SudonetError::Io(_) | SudonetError::Connection(_) | SudonetError::FrameTooLarge { .. }
        )
    }
}

impl From<std::net::AddrParseError> for SudonetError {
    fn from(err: std::net::AddrParseError) -> Self {
        SudonetError::InvalidAddress(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SudonetError>;
