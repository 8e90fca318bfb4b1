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
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use crate::protocol::error::SudonetError;

pub type JobId = u64;

static JOB_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generates a job id unique within this process and unlikely to collide
/// with ids minted by other nodes.
pub fn generate_job_id() -> JobId {
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    let counter = JOB_ID_COUNTER.fetch_add(1, Ordering::SeqCst);

    // Upper 32 bits from the clock, lower 32 bits from the counter
    (timestamp & 0xFFFF_FFFF_0000_0000) | (counter & 0xFFFF_FFFF)
}

/// Inclusive index range `[start, end]` into a job's candidate list.
///
/// Encoded on the wire as a two-element array. Decoding rejects `start > end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "[usize; 2]", into = "[usize; 2]")]
pub struct Range {
    pub start: usize,
    pub end: usize,
}

impl Range {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "range start {} past end {}", start, end);
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index <= self.end
    }

    pub fn overlaps(&self, other: &Range) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl TryFrom<[usize; 2]> for Range {
    type Error = SudonetError;

    fn try_from([start, end]: [usize; 2]) -> Result<Self, Self::Error> {
        if start > end {
            return Err(SudonetError::MalformedMessage(format!(
                "range [{}, {}] ends before it starts",
                start, end
            )));
        }
        Ok(Self { start, end })
    }
}

impl From<Range> for [usize; 2] {
    fn from(range: Range) -> Self {
        [range.start, range.end]
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// A 9x9 Sudoku board; `0` marks an empty cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid(pub [[u8; 9]; 9]);

impl Grid {
    pub fn empty() -> Self {
        Grid([[0; 9]; 9])
    }

    pub fn cell(&self, row: usize, col: usize) -> u8 {
        self.0[row][col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: u8) {
        self.0[row][col] = value;
    }

    /// Coordinates of the empty cells in row-major order.
    pub fn empty_cells(&self) -> Vec<(usize, usize)> {
        let mut cells = Vec::new();
        for row in 0..9 {
            for col in 0..9 {
                if self.0[row][col] == 0 {
                    cells.push((row, col));
                }
            }
        }
        cells
    }
}
