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

//! Peer-to-peer message types.
//!
//! Every frame body is a JSON object `{"type": <string>, "data": {...}}`.
//! [`Message`] is the closed set of types a node understands; a frame whose
//! `type` is not one of [`MESSAGE_TYPES`] decodes to
//! [`SudonetError::UnknownMessage`](crate::protocol::error::SudonetError::UnknownMessage)
//! instead of being silently dropped.

use serde::{Deserialize, Serialize};

use crate::protocol::address::{pairs, NodeAddress};
use crate::protocol::work::{Grid, JobId, Range};

/// Wire names of all message types, in protocol-table order.
pub const MESSAGE_TYPES: [&str; 8] = [
    "join_request",
    "join_ack",
    "update_nodes",
    "send_work",
    "work_ack",
    "solution_found",
    "work_done",
    "hello",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Message {
    JoinRequest(JoinRequest),
    JoinAck(JoinAck),
    UpdateNodes(UpdateNodes),
    SendWork(SendWork),
    WorkAck(WorkAck),
    SolutionFound(SolutionFound),
    WorkDone(WorkDone),
    Hello(Hello),
}

impl Message {
    /// The wire `type` string of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::JoinRequest(_) => "join_request",
            Message::JoinAck(_) => "join_ack",
            Message::UpdateNodes(_) => "update_nodes",
            Message::SendWork(_) => "send_work",
            Message::WorkAck(_) => "work_ack",
            Message::SolutionFound(_) => "solution_found",
            Message::WorkDone(_) => "work_done",
            Message::Hello(_) => "hello",
        }
    }

    pub fn join_request(node: NodeAddress) -> Self {
        Message::JoinRequest(JoinRequest { node })
    }

    pub fn join_ack(nodes: Vec<NodeAddress>) -> Self {
        Message::JoinAck(JoinAck { nodes })
    }

    pub fn update_nodes(node: NodeAddress, action: UpdateAction) -> Self {
        Message::UpdateNodes(UpdateNodes { node, action })
    }

    pub fn work_ack(node: NodeAddress) -> Self {
        Message::WorkAck(WorkAck { node })
    }
}

/// A new peer asking its anchor for the current peer list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    #[serde(flatten)]
    pub node: NodeAddress,
}

/// The anchor's reply: every address it knows, requester excluded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinAck {
    #[serde(with = "pairs")]
    pub nodes: Vec<NodeAddress>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateAction {
    Insert,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateNodes {
    #[serde(flatten)]
    pub node: NodeAddress,
    pub action: UpdateAction,
}

/// A range of candidates handed to another peer. `node` is the assigner,
/// which is where the outcome must be reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendWork {
    #[serde(flatten)]
    pub node: NodeAddress,
    pub range: Range,
    pub solutions: Vec<Grid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
}

/// Liveness acknowledgement for `send_work`; not a completion signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkAck {
    #[serde(flatten)]
    pub node: NodeAddress,
}

/// A valid candidate was found. `node` is the reporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionFound {
    #[serde(flatten)]
    pub node: NodeAddress,
    pub solution_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
}

/// A range was scanned to the end without a hit. `node` is the reporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkDone {
    #[serde(flatten)]
    pub node: NodeAddress,
    pub range: Range,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HelloStats {
    pub solved: u64,
    pub validations: u64,
}

/// Periodic heartbeat, also gossiping stats and the sender's peer list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hello {
    #[serde(flatten)]
    pub node: NodeAddress,
    pub stats: HelloStats,
    #[serde(with = "pairs")]
    pub network: Vec<NodeAddress>,
}
