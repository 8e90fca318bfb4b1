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

use std::time::Duration;

use sudonet_common::Grid;

use crate::worker::CandidateValidator;

/// Checks that every row, column and 3x3 box holds the digits 1..=9 once.
///
/// `handicap` is slept before each check to slow a node down on purpose,
/// which makes work redistribution visible on small puzzles.
#[derive(Debug, Clone, Default)]
pub struct SudokuValidator {
    handicap: Duration,
}

impl SudokuValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handicap(handicap: Duration) -> Self {
        Self { handicap }
    }

    pub fn handicap(&self) -> Duration {
        self.handicap
    }

    pub fn check(grid: &Grid) -> bool {
        let complete = |cells: &mut dyn Iterator<Item = u8>| {
            let mut seen = 0u16;
            for value in cells {
                if !(1..=9).contains(&value) {
                    return false;
                }
                seen |= 1 << value;
            }
            seen == 0b11_1111_1110
        };

        (0..9).all(|row| complete(&mut (0..9).map(|col| grid.cell(row, col))))
            && (0..9).all(|col| complete(&mut (0..9).map(|row| grid.cell(row, col))))
            && (0..9).all(|b| {
                let (top, left) = (b / 3 * 3, b % 3 * 3);
                complete(&mut (0..9).map(|i| grid.cell(top + i / 3, left + i % 3)))
            })
    }
}

impl CandidateValidator for SudokuValidator {
    fn is_valid(&self, candidate: &Grid) -> bool {
        if !self.handicap.is_zero() {
            std::thread::sleep(self.handicap);
        }
        Self::check(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn solved() -> Grid {
        Grid([
            [4, 9, 8, 3, 5, 1, 2, 6, 7],
            [5, 3, 2, 9, 7, 6, 8, 4, 1],
            [6, 1, 7, 8, 4, 2, 5, 3, 9],
            [3, 2, 5, 1, 8, 7, 4, 9, 6],
            [8, 7, 4, 6, 9, 3, 1, 5, 2],
            [1, 6, 9, 5, 2, 4, 3, 7, 8],
            [9, 4, 6, 2, 1, 5, 7, 8, 3],
            [7, 8, 1, 4, 3, 9, 6, 2, 5],
            [2, 5, 3, 7, 6, 8, 9, 1, 4],
        ])
    }

    #[test]
    fn test_valid_grid() {
        assert!(SudokuValidator::new().is_valid(&solved()));
    }

    #[test]
    fn test_row_duplicate() {
        let mut grid = solved();
        grid.set(0, 0, 9);
        assert!(!SudokuValidator::check(&grid));
    }

    #[test]
    fn test_box_duplicate_with_valid_rows_and_columns() {
        // Cyclic shifts by one keep every row and column a permutation but
        // break the boxes
        let mut grid = Grid::empty();
        for row in 0..9 {
            for col in 0..9 {
                grid.set(row, col, ((row + col) % 9) as u8 + 1);
            }
        }
        assert!(!SudokuValidator::check(&grid));
    }

    #[test]
    fn test_empty_cell_is_invalid() {
        let mut grid = solved();
        grid.set(4, 4, 0);
        assert!(!SudokuValidator::check(&grid));
    }

    #[test]
    fn test_handicap_delays_check() {
        let validator = SudokuValidator::with_handicap(Duration::from_millis(20));
        let start = Instant::now();
        validator.is_valid(&solved());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
