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

pub mod address;
pub mod error;
pub mod messages;
pub mod work;

#[cfg(test)]
mod tests;

pub use address::NodeAddress;
pub use error::{Result, SudonetError};
pub use messages::{
    Hello, HelloStats, JoinAck, JoinRequest, Message, SendWork, SolutionFound, UpdateAction,
    UpdateNodes, WorkAck, WorkDone, MESSAGE_TYPES,
};
pub use work::{generate_job_id, Grid, JobId, Range};
