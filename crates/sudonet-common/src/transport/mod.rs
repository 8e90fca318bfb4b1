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

//! Transport layer.
//!
//! # Architecture
//!
//! - **Transport**: plain TCP, one long-lived connection per peer pair
//! - **Codec**: JSON bodies ([`JsonCodec`])
//! - **Wire Format**: `[4-byte length prefix as u32 big-endian] + [JSON body]`
//!
//! Frames larger than the configured maximum are rejected before any body
//! bytes are allocated.

pub mod codec;
pub mod tcp;

pub use codec::{Codec, JsonCodec};
pub use tcp::{TcpTransport, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_FRAME_SIZE};
