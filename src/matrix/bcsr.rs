//! Block compressed sparse row storage for the A operand.

use crate::config::{CUBE_M, cube_k, tile_len};
use crate::element::Element;
use crate::error::{Result, SpmmError};
use std::ops::Range;

/// Sparse M×K matrix stored as dense `CUBE_M × CUBE_K` tiles.
///
/// - `row_ptr[w]..row_ptr[w + 1]` are the nonzero blocks of row-window `w`
/// - `col_idx[b]` is the block column of block `b` (in blocks, not elements)
/// - `values[b * tile_len..(b + 1) * tile_len]` is block `b`, row-major
///
/// The last row-window may be partial when `M` is not a multiple of
/// `CUBE_M`; its tiles still carry `CUBE_M` rows and the extra rows are
/// never written to the output.
#[derive(Debug, Clone)]
pub struct BcsrMatrix<T> {
    m: usize,
    k: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<T>,
}

impl<T: Element> BcsrMatrix<T> {
    /// Build from block-column indices, validating every invariant.
    pub fn new(
        m: usize,
        k: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<T>,
    ) -> Result<Self> {
        let matrix = Self {
            m,
            k,
            row_ptr,
            col_idx,
            values,
        };
        matrix.validate()?;
        Ok(matrix)
    }

    /// Build from element column offsets, the form the block extraction
    /// tooling writes to disk: each entry is the first column of its block
    /// and must be a multiple of `CUBE_K`.
    pub fn from_element_columns(
        m: usize,
        k: usize,
        row_ptr: Vec<usize>,
        col_starts: Vec<usize>,
        values: Vec<T>,
    ) -> Result<Self> {
        let ck = cube_k::<T>();
        let col_idx = col_starts
            .into_iter()
            .enumerate()
            .map(|(block, start)| {
                if start % ck == 0 {
                    Ok(start / ck)
                } else {
                    Err(SpmmError::InvalidBcsr(format!(
                        "block {block} starts at column {start}, not a multiple of {ck}"
                    )))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(m, k, row_ptr, col_idx, values)
    }

    fn validate(&self) -> Result<()> {
        let ck = cube_k::<T>();
        if self.k % ck != 0 {
            return Err(SpmmError::KNotAligned { k: self.k, cube_k: ck });
        }

        let windows = self.m.div_ceil(CUBE_M);
        if self.row_ptr.len() != windows + 1 {
            return Err(SpmmError::ShapeMismatch {
                what: "row_ptr length",
                expected: windows + 1,
                actual: self.row_ptr.len(),
            });
        }
        if self.row_ptr[0] != 0 {
            return Err(SpmmError::InvalidBcsr(format!(
                "row_ptr must start at 0, starts at {}",
                self.row_ptr[0]
            )));
        }
        if let Some(w) = self.row_ptr.windows(2).position(|p| p[0] > p[1]) {
            return Err(SpmmError::InvalidBcsr(format!(
                "row_ptr decreases at row-window {w}: {} > {}",
                self.row_ptr[w],
                self.row_ptr[w + 1]
            )));
        }

        let nnz = self.row_ptr[windows];
        if self.col_idx.len() != nnz {
            return Err(SpmmError::ShapeMismatch {
                what: "col_idx length",
                expected: nnz,
                actual: self.col_idx.len(),
            });
        }
        let block_cols = self.k / ck;
        if let Some((b, &c)) = self.col_idx.iter().enumerate().find(|(_, c)| **c >= block_cols) {
            return Err(SpmmError::InvalidBcsr(format!(
                "block {b} has block column {c}, outside [0, {block_cols})"
            )));
        }
        if self.values.len() != nnz * tile_len::<T>() {
            return Err(SpmmError::ShapeMismatch {
                what: "values length",
                expected: nnz * tile_len::<T>(),
                actual: self.values.len(),
            });
        }
        Ok(())
    }

    /// Rows of the logical matrix.
    pub fn m(&self) -> usize {
        self.m
    }

    /// Columns of the logical matrix.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of `CUBE_M`-row windows, including a partial last one.
    pub fn row_windows(&self) -> usize {
        self.row_ptr.len() - 1
    }

    /// Number of stored blocks.
    pub fn nnz_blocks(&self) -> usize {
        self.col_idx.len()
    }

    /// Block offsets of each row-window.
    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    /// Block column of each stored block.
    pub fn col_idx(&self) -> &[usize] {
        &self.col_idx
    }

    /// Tile values of every stored block, back to back.
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Block indices belonging to row-window `w`.
    pub fn block_range(&self, w: usize) -> Range<usize> {
        self.row_ptr[w]..self.row_ptr[w + 1]
    }

    /// Row-major `CUBE_M × CUBE_K` tile of block `b`.
    pub fn tile(&self, b: usize) -> &[T] {
        let len = tile_len::<T>();
        &self.values[b * len..(b + 1) * len]
    }

    /// Output rows covered by row-window `w`, clipped to `M`.
    pub fn window_rows(&self, w: usize) -> usize {
        CUBE_M.min(self.m - w * CUBE_M)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use half::f16;

    fn tiles(count: usize) -> Vec<f16> {
        vec![f16::ONE; count * tile_len::<f16>()]
    }

    #[test]
    fn test_valid_matrix() {
        let a = BcsrMatrix::new(32, 48, vec![0, 2, 3], vec![0, 2, 1], tiles(3)).unwrap();
        assert_eq!(a.row_windows(), 2);
        assert_eq!(a.nnz_blocks(), 3);
        assert_eq!(a.block_range(0), 0..2);
        assert_eq!(a.block_range(1), 2..3);
        assert_eq!(a.tile(1).len(), 256);
    }

    #[test]
    fn test_element_columns() {
        let a = BcsrMatrix::from_element_columns(16, 64, vec![0, 2], vec![0, 48], tiles(2)).unwrap();
        assert_eq!(a.col_idx(), &[0, 3]);

        let err = BcsrMatrix::from_element_columns(16, 64, vec![0, 1], vec![8], tiles(1));
        assert!(matches!(err, Err(SpmmError::InvalidBcsr(_))));
    }

    #[test]
    fn test_rejects_misaligned_k() {
        let err = BcsrMatrix::new(16, 40, vec![0, 0], vec![], tiles(0));
        assert!(matches!(err, Err(SpmmError::KNotAligned { k: 40, cube_k: 16 })));
    }

    #[test]
    fn test_rejects_bad_row_ptr() {
        assert!(BcsrMatrix::new(32, 32, vec![0, 1], vec![0], tiles(1)).is_err());
        assert!(BcsrMatrix::new(32, 32, vec![1, 1, 1], vec![0], tiles(1)).is_err());
        assert!(BcsrMatrix::new(32, 32, vec![0, 2, 1], vec![0], tiles(1)).is_err());
    }

    #[test]
    fn test_rejects_column_out_of_range() {
        let err = BcsrMatrix::new(16, 32, vec![0, 1], vec![2], tiles(1));
        assert!(matches!(err, Err(SpmmError::InvalidBcsr(_))));
    }

    #[test]
    fn test_rejects_value_length() {
        let err = BcsrMatrix::new(16, 32, vec![0, 1], vec![0], tiles(2));
        assert!(matches!(err, Err(SpmmError::ShapeMismatch { what: "values length", .. })));
    }

    #[test]
    fn test_partial_last_window() {
        let a = BcsrMatrix::new(20, 16, vec![0, 0, 1], vec![0], tiles(1)).unwrap();
        assert_eq!(a.window_rows(0), 16);
        assert_eq!(a.window_rows(1), 4);
    }

    #[test]
    fn test_empty_matrix() {
        let a = BcsrMatrix::<f16>::new(0, 16, vec![0], vec![], vec![]).unwrap();
        assert_eq!(a.row_windows(), 0);
    }
}
