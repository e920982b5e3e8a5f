//! Chunk iteration.
//!
//! A chunk is a contiguous sub-range `[offset, offset + this_run)` of the
//! problem's conditions, with `this_run = min(max_per_run, remaining)`.
//! Chunks tile `[0, problem_size)` exactly: no overlap, no gap.

/// One contiguous sub-range of conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub offset: usize,
    pub this_run: usize,
}

/// Iterator over the chunks of a problem.
#[derive(Debug, Clone)]
pub struct Chunks {
    problem_size: usize,
    max_per_run: usize,
    offset: usize,
}

impl Iterator for Chunks {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.offset >= self.problem_size {
            return None;
        }
        let this_run = self.max_per_run.min(self.problem_size - self.offset);
        // a zero-length chunk inside the loop is a defect, not a state
        debug_assert!(this_run > 0);
        let chunk = Chunk {
            offset: self.offset,
            this_run,
        };
        self.offset += this_run;
        Some(chunk)
    }
}

/// Iterate the chunks tiling `[0, problem_size)`. `max_per_run` must be at
/// least 1; a problem size of zero yields no chunks.
pub fn chunks(problem_size: usize, max_per_run: usize) -> Chunks {
    debug_assert!(max_per_run >= 1);
    Chunks {
        problem_size,
        max_per_run,
        offset: 0,
    }
}

/// Number of chunks `chunks(problem_size, max_per_run)` will yield.
pub fn chunk_count(problem_size: usize, max_per_run: usize) -> usize {
    debug_assert!(max_per_run >= 1);
    problem_size.div_ceil(max_per_run)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_over_four_splits_4_4_2() {
        let got: Vec<Chunk> = chunks(10, 4).collect();
        assert_eq!(
            got,
            vec![
                Chunk { offset: 0, this_run: 4 },
                Chunk { offset: 4, this_run: 4 },
                Chunk { offset: 8, this_run: 2 },
            ]
        );
        assert_eq!(chunk_count(10, 4), 3);
    }

    #[test]
    fn whole_problem_in_one_chunk() {
        let got: Vec<Chunk> = chunks(10, 10).collect();
        assert_eq!(got, vec![Chunk { offset: 0, this_run: 10 }]);
    }

    #[test]
    fn exact_division_keeps_full_last_chunk() {
        let got: Vec<Chunk> = chunks(8, 4).collect();
        assert_eq!(got.len(), 2);
        assert_eq!(got[1], Chunk { offset: 4, this_run: 4 });
    }

    #[test]
    fn zero_problem_size_yields_no_chunks() {
        assert_eq!(chunks(0, 4).count(), 0);
        assert_eq!(chunk_count(0, 4), 0);
    }

    #[test]
    fn chunks_tile_exactly() {
        for problem_size in 0..50 {
            for max_per_run in 1..12 {
                let mut expected_offset = 0;
                let mut total = 0;
                for chunk in chunks(problem_size, max_per_run) {
                    assert_eq!(chunk.offset, expected_offset, "no gap, no overlap");
                    assert!(chunk.this_run >= 1 && chunk.this_run <= max_per_run);
                    expected_offset += chunk.this_run;
                    total += chunk.this_run;
                }
                assert_eq!(total, problem_size);
                assert_eq!(
                    chunks(problem_size, max_per_run).count(),
                    chunk_count(problem_size, max_per_run)
                );
            }
        }
    }
}
