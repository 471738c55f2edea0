//! Fixed-shape block multiply-accumulate.

use crate::element::Element;
use crate::layout::{FractalShape, nz_offset, zn_offset, zz_offset};

/// Extent of one multiply-accumulate call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmaShape {
    pub m: usize,
    pub k: usize,
    pub n: usize,
}

/// Computes one engine tile: C[0:m, 0:n] += A[0:m, 0:k] × B[0:k, 0:n]
///
/// Operands arrive in engine layouts: `a` is Zz with `a_frac` fractals,
/// `b` is Zn (every column of B one contiguous run along K) with `b_frac`
/// fractals, and `acc` is Nz with [`FractalShape::accumulator`] fractals
/// and `shape.m` rows. Products are widened to `f32` before accumulation.
///
/// Both operands are first unpacked into contiguous `f32` panels (A by
/// row, B by column) so the inner loop is a straight dot product. Four
/// output columns are produced per pass, keeping four accumulators live
/// the way a 4-wide register tile would.
pub fn block_mma<T: Element>(
    a: &[T],
    a_frac: FractalShape,
    b: &[T],
    b_frac: FractalShape,
    acc: &mut [f32],
    shape: MmaShape,
) {
    let MmaShape { m, k, n } = shape;
    let c_frac = FractalShape::accumulator();

    let mut a_panel = vec![0.0f32; m * k];
    for r in 0..m {
        for p in 0..k {
            a_panel[r * k + p] = a[zz_offset(a_frac, k, r, p)].to_f32();
        }
    }
    let mut b_panel = vec![0.0f32; n * k];
    for j in 0..n {
        for p in 0..k {
            b_panel[j * k + p] = b[zn_offset(b_frac, p, j)].to_f32();
        }
    }

    let n_main = (n / 4) * 4;
    for r in 0..m {
        let a_row = &a_panel[r * k..(r + 1) * k];

        for j in (0..n_main).step_by(4) {
            let b0 = &b_panel[j * k..(j + 1) * k];
            let b1 = &b_panel[(j + 1) * k..(j + 2) * k];
            let b2 = &b_panel[(j + 2) * k..(j + 3) * k];
            let b3 = &b_panel[(j + 3) * k..(j + 4) * k];

            let (mut c0, mut c1, mut c2, mut c3) = (0.0f32, 0.0f32, 0.0f32, 0.0f32);
            for p in 0..k {
                let av = a_row[p];
                c0 += av * b0[p];
                c1 += av * b1[p];
                c2 += av * b2[p];
                c3 += av * b3[p];
            }

            acc[nz_offset(c_frac, m, r, j)] += c0;
            acc[nz_offset(c_frac, m, r, j + 1)] += c1;
            acc[nz_offset(c_frac, m, r, j + 2)] += c2;
            acc[nz_offset(c_frac, m, r, j + 3)] += c3;
        }

        // Leftover columns that don't fill a group of 4
        for j in n_main..n {
            let bj = &b_panel[j * k..(j + 1) * k];
            let dot: f32 = a_row.iter().zip(bj).map(|(x, y)| x * y).sum();
            acc[nz_offset(c_frac, m, r, j)] += dot;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{TransposeMode, nd_to_nz, nz_to_zz, transpose_fractals};
    use crate::matrix::reference::dense_reference;
    use half::f16;

    #[test]
    fn test_block_mma_matches_dense() {
        let (m, k, n): (usize, usize, usize) = (16, 16, 21);
        let a_frac = FractalShape::sparse::<f16>();
        let b_frac = FractalShape::dense::<f16>();
        let c_frac = FractalShape::accumulator();
        let blocks = n.div_ceil(16);

        let a_nd: Vec<f16> = (0..m * k).map(|i| f16::from_f32((i % 5) as f32 - 2.0)).collect();
        let b_nd: Vec<f16> = (0..k * n).map(|i| f16::from_f32((i % 3) as f32)).collect();

        let mut a_nz = vec![f16::ZERO; m * k];
        let mut a_zz = vec![f16::ZERO; m * k];
        nd_to_nz(&a_nd, k, m, k, a_frac, &mut a_nz);
        nz_to_zz(&a_nz, m, k, a_frac, &mut a_zz);

        let mut b_nz = vec![f16::ZERO; k * blocks * 16];
        let mut b_zn = vec![f16::ZERO; k * blocks * 16];
        nd_to_nz(&b_nd, n, k, n, b_frac, &mut b_nz);
        transpose_fractals(&b_nz, b_frac, blocks, TransposeMode::Dense, &mut b_zn);

        let mut acc = vec![0.0f32; m * blocks * 16];
        block_mma(&a_zz, a_frac, &b_zn, b_frac, &mut acc, MmaShape { m, k, n });

        let mut expected = vec![0.0f32; m * n];
        dense_reference(&a_nd, &b_nd, &mut expected, m, n, k);
        for r in 0..m {
            for j in 0..n {
                assert_eq!(acc[nz_offset(c_frac, m, r, j)], expected[r * n + j], "({r}, {j})");
            }
        }
        // Padding columns of the last fractal stay untouched.
        for r in 0..m {
            for j in n..blocks * 16 {
                assert_eq!(acc[nz_offset(c_frac, m, r, j)], 0.0);
            }
        }
    }

    #[test]
    fn test_block_mma_accumulates() {
        let (m, k, n) = (16, 8, 4);
        let a = vec![1.0f32; m * k];
        let b = vec![1.0f32; k * 16];
        let mut acc = vec![1.0f32; m * 16];
        block_mma(
            &a,
            FractalShape::sparse::<f32>(),
            &b,
            FractalShape::dense::<f32>(),
            &mut acc,
            MmaShape { m, k, n },
        );
        let c_frac = FractalShape::accumulator();
        assert_eq!(acc[nz_offset(c_frac, m, 3, 2)], 9.0);
        assert_eq!(acc[nz_offset(c_frac, m, 3, 5)], 1.0);
    }
}
