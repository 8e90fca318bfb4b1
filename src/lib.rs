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

//! sudonet
//!
//! A peer-to-peer swarm that brute-forces Sudoku completions. Every node is
//! an equal peer: it can accept puzzles over HTTP, split the candidate list
//! into ranges, and scan ranges handed to it by others.
//!
//! This crate re-exports the workspace crates:
//!
//! - [`common`]: wire protocol and TCP framing
//! - [`node`]: the coordination node and its HTTP front-end

pub use sudonet_common as common;
pub use sudonet_node as node;

pub use sudonet_common::{Grid, Message, NodeAddress, Range, Result, SudonetError};
pub use sudonet_node::{
    CandidateValidator, CoordinationNode, HttpServer, JobOutcome, NodeConfig, NodeHandle, NodeSnapshot,
    SudokuValidator,
};
