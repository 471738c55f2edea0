use crate::config::{CUBE_M, cube_k};
use crate::element::Element;
use crate::matrix::bcsr::BcsrMatrix;

/// Scalar BCSR × dense multiplication, accumulated in `f32`.
///
/// Walks every stored block in i-k-j order, the cache-friendly loop order
/// for row-major B and C, so the innermost loop is stride 1 in both.
/// No tiling, no engine layouts, no threads: this is the correctness
/// baseline the pipelined kernel is compared against.
///
/// # Arguments
///
/// * `a` - Sparse matrix A (m × k) in BCSR form
/// * `b` - Matrix B (k × n), row-major
/// * `c` - Matrix C (m × n), row-major, accumulated into (C += A * B)
/// * `n` - Columns of B and C
pub fn spmm_reference<T: Element>(a: &BcsrMatrix<T>, b: &[T], c: &mut [f32], n: usize) {
    let ck = cube_k::<T>();
    for w in 0..a.row_windows() {
        let rows = a.window_rows(w);
        for block in a.block_range(w) {
            let tile = a.tile(block);
            let k0 = a.col_idx()[block] * ck;
            for i in 0..rows {
                let c_row = &mut c[(w * CUBE_M + i) * n..(w * CUBE_M + i + 1) * n];
                for p in 0..ck {
                    let aip = tile[i * ck + p].to_f32();
                    let b_row = &b[(k0 + p) * n..(k0 + p + 1) * n];
                    for j in 0..n {
                        c_row[j] += aip * b_row[j].to_f32();
                    }
                }
            }
        }
    }
}

/// Dense i-k-j multiplication with `f32` accumulation.
///
/// Used by tests to check the BCSR reference itself against a fully
/// materialized A.
pub fn dense_reference<T: Element>(a: &[T], b: &[T], c: &mut [f32], m: usize, n: usize, k: usize) {
    for i in 0..m {
        for p in 0..k {
            let aip = a[i * k + p].to_f32();
            for j in 0..n {
                c[i * n + j] += aip * b[p * n + j].to_f32();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_matches_dense() {
        // 16×16 A holding one f32 block (CUBE_K = 8) at block column 1.
        let (m, k, n) = (16, 16, 5);
        let tile: Vec<f32> = (0..16 * 8).map(|i| (i % 7) as f32 - 3.0).collect();
        let a = BcsrMatrix::new(m, k, vec![0, 1], vec![1], tile.clone()).unwrap();

        let mut dense = vec![0.0f32; m * k];
        for r in 0..16 {
            for p in 0..8 {
                dense[r * k + 8 + p] = tile[r * 8 + p];
            }
        }
        let b: Vec<f32> = (0..k * n).map(|i| (i % 5) as f32).collect();

        let mut expected = vec![0.0; m * n];
        let mut actual = vec![0.0; m * n];
        dense_reference(&dense, &b, &mut expected, m, n, k);
        spmm_reference(&a, &b, &mut actual, n);
        assert_eq!(expected, actual);
    }
}
