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

//! Brute-force candidate generation.
//!
//! Every empty cell is filled with each digit 1..=9. Empty cells are taken in
//! row-major order and the last one varies fastest, so candidate `i` is `i`
//! written in base 9 over the empty cells.

use sudonet_common::{Grid, Result, SudonetError};

/// Number of candidates `grid` expands to, saturating at `u128::MAX`.
pub fn candidate_count(grid: &Grid) -> u128 {
    let empty = grid.empty_cells().len() as u32;
    9u128.checked_pow(empty).unwrap_or(u128::MAX)
}

/// Expands `grid` into every completion of its empty cells.
///
/// # Errors
///
/// - `InvalidPuzzle` if a cell holds a value outside `0..=9`
/// - `TooManyCandidates` if the expansion would exceed `max`
pub fn generate_candidates(grid: &Grid, max: usize) -> Result<Vec<Grid>> {
    if let Some((row, col)) = (0..81)
        .map(|i| (i / 9, i % 9))
        .find(|&(row, col)| grid.cell(row, col) > 9)
    {
        return Err(SudonetError::InvalidPuzzle(format!(
            "cell ({}, {}) holds {}, expected 0-9",
            row,
            col,
            grid.cell(row, col)
        )));
    }

    let count = candidate_count(grid);
    if count > max as u128 {
        return Err(SudonetError::TooManyCandidates { count, max });
    }

    let empty = grid.empty_cells();
    let mut candidates = Vec::with_capacity(count as usize);
    let mut digits = vec![0u8; empty.len()];

    loop {
        let mut candidate = *grid;
        for (&(row, col), &digit) in empty.iter().zip(&digits) {
            candidate.set(row, col, digit + 1);
        }
        candidates.push(candidate);

        // Odometer increment, last empty cell first
        let mut position = digits.len();
        loop {
            if position == 0 {
                return Ok(candidates);
            }
            position -= 1;
            digits[position] += 1;
            if digits[position] < 9 {
                break;
            }
            digits[position] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOLVED: [[u8; 9]; 9] = [
        [4, 9, 8, 3, 5, 1, 2, 6, 7],
        [5, 3, 2, 9, 7, 6, 8, 4, 1],
        [6, 1, 7, 8, 4, 2, 5, 3, 9],
        [3, 2, 5, 1, 8, 7, 4, 9, 6],
        [8, 7, 4, 6, 9, 3, 1, 5, 2],
        [1, 6, 9, 5, 2, 4, 3, 7, 8],
        [9, 4, 6, 2, 1, 5, 7, 8, 3],
        [7, 8, 1, 4, 3, 9, 6, 2, 5],
        [2, 5, 3, 7, 6, 8, 9, 1, 4],
    ];

    #[test]
    fn test_full_grid_yields_itself() {
        let grid = Grid(SOLVED);
        let candidates = generate_candidates(&grid, 10).unwrap();
        assert_eq!(candidates, vec![grid]);
    }

    #[test]
    fn test_last_empty_cell_varies_fastest() {
        let mut grid = Grid(SOLVED);
        grid.set(1, 5, 0);
        grid.set(4, 0, 0);

        let candidates = generate_candidates(&grid, 100).unwrap();
        assert_eq!(candidates.len(), 81);

        assert_eq!((candidates[0].cell(1, 5), candidates[0].cell(4, 0)), (1, 1));
        assert_eq!((candidates[1].cell(1, 5), candidates[1].cell(4, 0)), (1, 2));
        assert_eq!((candidates[9].cell(1, 5), candidates[9].cell(4, 0)), (2, 1));
        assert_eq!((candidates[80].cell(1, 5), candidates[80].cell(4, 0)), (9, 9));

        // The only valid completion is (6, 8): index (6-1)*9 + (8-1)
        assert_eq!(candidates[52], Grid(SOLVED));
    }

    #[test]
    fn test_too_many_candidates() {
        let mut grid = Grid(SOLVED);
        for col in 0..7 {
            grid.set(0, col, 0);
        }
        assert_eq!(candidate_count(&grid), 4_782_969);

        match generate_candidates(&grid, 1_000_000) {
            Err(SudonetError::TooManyCandidates { count, max }) => {
                assert_eq!(count, 4_782_969);
                assert_eq!(max, 1_000_000);
            }
            other => panic!("Expected TooManyCandidates, got {:?}", other.map(|c| c.len())),
        }
    }

    #[test]
    fn test_empty_grid_count_saturates() {
        assert_eq!(candidate_count(&Grid::empty()), u128::MAX);
        assert!(generate_candidates(&Grid::empty(), usize::MAX).is_err());
    }

    #[test]
    fn test_out_of_range_cell_rejected() {
        let mut grid = Grid(SOLVED);
        grid.set(2, 3, 12);
        assert!(matches!(generate_candidates(&grid, 10), Err(SudonetError::InvalidPuzzle(_))));
    }
}
