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

//! sudonet Common Types and Transport
//!
//! This crate holds the wire protocol and TCP framing shared by every
//! sudonet peer.
//!
//! # Overview
//!
//! A sudonet cluster is a set of equal peers that split the candidate
//! completions of a Sudoku puzzle into index ranges and search them in
//! parallel. This crate contains:
//!
//! - **Protocol Layer**: [`NodeAddress`], [`Range`], [`Grid`], the closed
//!   [`Message`] enum and [`SudonetError`]
//! - **Transport Layer**: length-prefixed JSON frames over TCP
//!
//! # Architecture
//!
//! - **Transport**: TCP, one connection per peer pair
//! - **Serialization**: JSON `{"type": ..., "data": {...}}`
//! - **Message Format**: `[4-byte length prefix as u32 big-endian] + [JSON data]`
//!
//! # Example
//!
//! ```
//! use sudonet_common::{Message, NodeAddress, UpdateAction};
//! use sudonet_common::transport::JsonCodec;
//!
//! let me = NodeAddress::new("127.0.0.1", 9002);
//! let frame = JsonCodec::encode_frame(&Message::update_nodes(me, UpdateAction::Insert)).unwrap();
//! assert_eq!(u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize, frame.len() - 4);
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
