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

//! Work distribution.
//!
//! A job's candidate list is carved into contiguous inclusive ranges, one per
//! idle peer at a time. Finished peers come back to the available set and
//! immediately pull the next range; ranges held by evicted peers become
//! pending and go to whoever frees up next.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use sudonet_common::{Grid, JobId, NodeAddress, Range, Result, SudonetError};
use tracing::{debug, warn};

/// Upper bound on the number of candidates in a single range.
pub const MAX_RANGE_LEN: usize = 300;

/// Range length for a job of `count` candidates spread over `peer_count` peers
/// (self included).
///
/// `floor(count / 3^round(log10(count)) / peer_count)`, clamped to `1..=300`.
pub fn ratio(count: usize, peer_count: usize) -> usize {
    if count == 0 {
        return 1;
    }

    let k = (count as f64).log10().round() as i32;
    let raw = (count as f64 / 3f64.powi(k) / peer_count.max(1) as f64).floor();

    (raw as usize).clamp(1, MAX_RANGE_LEN)
}

/// Who holds a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignee {
    Peer(NodeAddress),
    /// Reclaimed from an evicted peer, waiting for an idle one.
    Pending,
}

/// A range handed to a peer, ready to be executed locally or sent as `send_work`.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub assignee: NodeAddress,
    pub job_id: JobId,
    pub range: Range,
    pub candidates: Arc<Vec<Grid>>,
}

impl Dispatch {
    /// The candidates covered by this dispatch's range.
    pub fn slice(&self) -> &[Grid] {
        &self.candidates[self.range.start..=self.range.end]
    }
}

/// Result of a `work_done` report.
#[derive(Debug)]
pub enum Completion {
    /// The job goes on; these ranges were handed out in response.
    Continue(Vec<Dispatch>),
    /// Every range came back empty-handed; the job is closed.
    Exhausted(JobId),
    /// Report for a job that was already closed. The reporter is idle again.
    Stale,
    /// No assignment matches the report.
    Unknown,
}

/// Result of a `solution_found` report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// First hit for the active job; the job is now closed.
    Deliver { job_id: JobId, index: usize, solution: Grid },
    /// The job was already closed or the report does not belong to it.
    Duplicate,
}

#[derive(Debug)]
struct JobState {
    id: JobId,
    candidates: Arc<Vec<Grid>>,
    cursor: usize,
    assignments: BTreeMap<Range, Assignee>,
    completed: Vec<Range>,
}

impl JobState {
    fn total(&self) -> usize {
        self.candidates.len()
    }

    fn carve(&mut self, peer_count: usize) -> Option<Range> {
        if self.cursor >= self.total() {
            return None;
        }
        let len = ratio(self.total(), peer_count);
        let end = (self.cursor + len - 1).min(self.total() - 1);
        let range = Range::new(self.cursor, end);
        self.cursor = end + 1;
        Some(range)
    }

    fn first_pending(&self) -> Option<Range> {
        self.assignments
            .iter()
            .find(|(_, assignee)| **assignee == Assignee::Pending)
            .map(|(range, _)| *range)
    }

    fn is_exhausted(&self) -> bool {
        self.assignments.is_empty() && self.cursor >= self.total()
    }

    fn holds(&self, addr: &NodeAddress) -> bool {
        self.assignments
            .values()
            .any(|assignee| *assignee == Assignee::Peer(addr.clone()))
    }
}

/// Owns the available set and the range assignments of the active job.
///
/// Invariant: an address is either in the available set or holds exactly
/// one outstanding range (of the active job or of a closed job whose report
/// has not arrived yet), never both.
#[derive(Debug)]
pub struct WorkDistributor {
    available: Vec<NodeAddress>,
    job: Option<JobState>,
    /// Ranges still being scanned for jobs that already closed.
    retired: HashMap<(JobId, Range), NodeAddress>,
}

impl WorkDistributor {
    /// Creates a distributor whose only available peer is this node.
    pub fn new(self_addr: NodeAddress) -> Self {
        Self {
            available: vec![self_addr],
            job: None,
            retired: HashMap::new(),
        }
    }

    /// Marks a peer idle. Ignored if it is already available or still holds a range.
    pub fn add_available(&mut self, addr: NodeAddress) -> bool {
        if self.available.contains(&addr) || self.is_busy(&addr) {
            return false;
        }
        self.available.push(addr);
        true
    }

    pub fn available(&self) -> &[NodeAddress] {
        &self.available
    }

    fn is_busy(&self, addr: &NodeAddress) -> bool {
        self.job.as_ref().is_some_and(|job| job.holds(addr)) || self.retired.values().any(|a| a == addr)
    }

    pub fn active_job(&self) -> Option<JobId> {
        self.job.as_ref().map(|job| job.id)
    }

    /// Outstanding ranges of the active job; `None` marks a pending range.
    pub fn assignments(&self) -> Vec<(Range, Option<NodeAddress>)> {
        self.job
            .as_ref()
            .map(|job| {
                job.assignments
                    .iter()
                    .map(|(range, assignee)| match assignee {
                        Assignee::Peer(addr) => (*range, Some(addr.clone())),
                        Assignee::Pending => (*range, None),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every range of the active job in index order: completed, outstanding,
    /// and the not-yet-carved remainder.
    pub fn partition(&self) -> Vec<Range> {
        let Some(job) = &self.job else {
            return Vec::new();
        };

        let mut ranges: Vec<Range> = job
            .completed
            .iter()
            .chain(job.assignments.keys())
            .copied()
            .collect();
        if job.cursor < job.total() {
            ranges.push(Range::new(job.cursor, job.total() - 1));
        }
        ranges.sort();
        ranges
    }

    /// Starts a job and hands one range to every available peer.
    ///
    /// # Errors
    ///
    /// - `EmptyJob` if `candidates` is empty
    /// - `JobInProgress` if another job has not closed yet
    pub fn start_job(&mut self, id: JobId, candidates: Vec<Grid>, peer_count: usize) -> Result<Vec<Dispatch>> {
        if candidates.is_empty() {
            return Err(SudonetError::EmptyJob);
        }
        if let Some(active) = self.active_job() {
            return Err(SudonetError::JobInProgress(active));
        }

        self.job = Some(JobState {
            id,
            candidates: Arc::new(candidates),
            cursor: 0,
            assignments: BTreeMap::new(),
            completed: Vec::new(),
        });

        Ok(self.redistribute(peer_count))
    }

    /// Hands pending ranges, then freshly carved ones, to available peers in order.
    ///
    /// No-op without an active job.
    pub fn redistribute(&mut self, peer_count: usize) -> Vec<Dispatch> {
        let Some(job) = self.job.as_mut() else {
            return Vec::new();
        };

        let mut dispatches = Vec::new();
        let mut still_available = Vec::new();

        for addr in std::mem::take(&mut self.available) {
            let next = job.first_pending().or_else(|| job.carve(peer_count));
            match next {
                Some(range) => {
                    job.assignments.insert(range, Assignee::Peer(addr.clone()));
                    dispatches.push(Dispatch {
                        assignee: addr,
                        job_id: job.id,
                        range,
                        candidates: Arc::clone(&job.candidates),
                    });
                }
                None => still_available.push(addr),
            }
        }

        self.available = still_available;
        dispatches
    }

    /// Handles a `work_done` report.
    ///
    /// The assignment map is authoritative: the holder of `range` goes back to
    /// the available set even if `reporter` names someone else.
    pub fn complete_range(
        &mut self,
        job_id: Option<JobId>,
        range: Range,
        reporter: &NodeAddress,
        peer_count: usize,
    ) -> Completion {
        if let Some(job) = self.job.as_mut().filter(|job| job_id.map_or(true, |id| id == job.id)) {
            if let Some(Assignee::Peer(holder)) = job.assignments.get(&range).cloned() {
                job.assignments.remove(&range);
                job.completed.push(range);
                if &holder != reporter {
                    warn!("Range {} held by {} but reported done by {}", range, holder, reporter);
                }

                if !self.available.contains(&holder) {
                    self.available.push(holder);
                }

                if job.is_exhausted() {
                    let id = job.id;
                    self.job = None;
                    return Completion::Exhausted(id);
                }
                return Completion::Continue(self.redistribute(peer_count));
            }
        }

        match self.take_retired(job_id, |r| *r == range) {
            Some(holder) => {
                debug!("Late work_done for {} from {}", range, holder);
                self.add_available(holder);
                if self.job.is_some() {
                    Completion::Continue(self.redistribute(peer_count))
                } else {
                    Completion::Stale
                }
            }
            None => Completion::Unknown,
        }
    }

    /// Handles a `solution_found` report.
    ///
    /// The first report for the active job closes it. Ranges still out with
    /// other peers are remembered so their late reports free those peers.
    pub fn solution_found(&mut self, job_id: Option<JobId>, index: usize) -> Discovery {
        let matches_active = self
            .job
            .as_ref()
            .is_some_and(|job| job_id.map_or(true, |id| id == job.id) && index < job.total());

        if !matches_active {
            if let Some(holder) = self.take_retired(job_id, |r| r.contains(index)) {
                self.add_available(holder);
            }
            return Discovery::Duplicate;
        }

        let Some(job) = self.job.take() else {
            return Discovery::Duplicate;
        };

        for (range, assignee) in job.assignments {
            if let Assignee::Peer(holder) = assignee {
                if range.contains(index) {
                    if !self.available.contains(&holder) {
                        self.available.push(holder);
                    }
                } else {
                    self.retired.insert((job.id, range), holder);
                }
            }
        }

        Discovery::Deliver {
            job_id: job.id,
            index,
            solution: job.candidates[index],
        }
    }

    /// Drops a peer from the available set and turns any range it holds into
    /// a pending one. Returns the reclaimed ranges.
    pub fn remove_peer(&mut self, addr: &NodeAddress) -> Vec<Range> {
        self.available.retain(|a| a != addr);
        self.retired.retain(|_, holder| holder != addr);

        let Some(job) = self.job.as_mut() else {
            return Vec::new();
        };

        let mut reclaimed = Vec::new();
        for (range, assignee) in job.assignments.iter_mut() {
            if *assignee == Assignee::Peer(addr.clone()) {
                *assignee = Assignee::Pending;
                reclaimed.push(*range);
            }
        }
        reclaimed
    }

    fn take_retired(&mut self, job_id: Option<JobId>, matches: impl Fn(&Range) -> bool) -> Option<NodeAddress> {
        let key = self
            .retired
            .keys()
            .find(|(id, range)| job_id.map_or(true, |j| j == *id) && matches(range))
            .copied()?;
        self.retired.remove(&key)
    }
}
