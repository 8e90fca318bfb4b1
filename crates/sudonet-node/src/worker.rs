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

//! Local range scanning.
//!
//! Candidate checks can be slow (see the handicap), so they run on a
//! dedicated thread fed through a channel. The event loop only enqueues
//! [`WorkItem`]s and receives [`WorkOutcome`]s back.

use std::sync::Arc;

use sudonet_common::{Grid, JobId, NodeAddress, Range};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::connection::ConnectionId;

/// Predicate applied to each candidate in a range.
pub trait CandidateValidator: Send + Sync {
    fn is_valid(&self, candidate: &Grid) -> bool;
}

impl<F> CandidateValidator for F
where
    F: Fn(&Grid) -> bool + Send + Sync,
{
    fn is_valid(&self, candidate: &Grid) -> bool {
        self(candidate)
    }
}

/// A range to scan, either assigned by this node or received as `send_work`.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub job_id: Option<JobId>,
    /// The assigner, who receives the outcome.
    pub origin: NodeAddress,
    /// Connection the assignment arrived on, if remote.
    pub reply_via: Option<ConnectionId>,
    pub range: Range,
    pub candidates: Arc<Vec<Grid>>,
    /// Global index of `candidates[0]`.
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanResult {
    Found { index: usize },
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct WorkOutcome {
    pub job_id: Option<JobId>,
    pub origin: NodeAddress,
    pub reply_via: Option<ConnectionId>,
    pub range: Range,
    pub result: ScanResult,
    pub validations: u64,
}

/// Validates the candidates of `item.range` in order, stopping at the first
/// valid one.
///
/// Indices missing from the payload are skipped, so a truncated `send_work`
/// still ends in a report for the whole range.
pub fn scan(item: &WorkItem, validator: &dyn CandidateValidator) -> WorkOutcome {
    let mut validations = 0;
    let mut result = ScanResult::Exhausted;

    for index in item.range.start..=item.range.end {
        let Some(candidate) = index
            .checked_sub(item.offset)
            .and_then(|local| item.candidates.get(local))
        else {
            break;
        };

        validations += 1;
        if validator.is_valid(candidate) {
            result = ScanResult::Found { index };
            break;
        }
    }

    WorkOutcome {
        job_id: item.job_id,
        origin: item.origin.clone(),
        reply_via: item.reply_via,
        range: item.range,
        result,
        validations,
    }
}

/// Starts the worker thread.
///
/// The thread exits once `items` is closed and drained, or when nobody
/// listens for outcomes any more.
pub fn spawn_worker(
    validator: Arc<dyn CandidateValidator>,
    mut items: mpsc::UnboundedReceiver<WorkItem>,
    outcomes: mpsc::UnboundedSender<WorkOutcome>,
) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("sudonet-worker".to_string())
        .spawn(move || {
            while let Some(item) = items.blocking_recv() {
                debug!("Scanning range {} for {}", item.range, item.origin);
                let outcome = scan(&item, validator.as_ref());
                if let ScanResult::Found { index } = outcome.result {
                    info!("Valid candidate at index {} (range {})", index, outcome.range);
                }
                if outcomes.send(outcome).is_err() {
                    return;
                }
            }
        })
}
