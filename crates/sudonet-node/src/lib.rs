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

//! sudonet Coordination Node
//!
//! A node is one equal peer in a search cluster. Nodes find each other
//! through an anchor, split a job's candidate list into ranges, scan them in
//! parallel and reclaim the ranges of peers that stop sending heartbeats.
//!
//! # Components
//!
//! - [`membership`]: the peer table and join protocol bookkeeping
//! - [`distributor`]: range carving, assignment and redistribution
//! - [`failure_detector`]: heartbeat ledger and timeouts
//! - [`worker`]: the local range scanner
//! - [`node`]: the event loop tying them together
//! - [`http_server`]: `/solve`, `/stats` and `/network`

pub mod config;
pub mod connection;
pub mod distributor;
pub mod failure_detector;
pub mod http_server;
pub mod membership;
pub mod node;
pub mod puzzle;
pub mod stats;
pub mod worker;

pub use config::NodeConfig;
pub use distributor::{ratio, WorkDistributor};
pub use http_server::{HttpServer, SolveRequest, SolveResponse};
pub use node::{CoordinationNode, JobOutcome, NodeHandle, NodeSnapshot};
pub use puzzle::{generate_candidates, SudokuValidator};
pub use stats::{ClusterStats, NetworkView, StatsSnapshot};
pub use worker::CandidateValidator;
