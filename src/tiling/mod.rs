//! Host-side work partitioning.
//!
//! The planner runs once per invocation, before any core starts. It
//! decides how many cores to activate, which contiguous run of
//! row-windows each core owns, and how the N dimension is cut so that
//! one multiply-accumulate never exceeds the engine's operand width. The
//! resulting [`TilingParams`] is immutable and shared by every core.

use crate::config::{EngineConfig, FRACTAL_N, cube_k};
use crate::element::Element;
use crate::error::{Result, SpmmError};
use crate::matrix::bcsr::BcsrMatrix;
use std::ops::Range;
use tracing::{debug, warn};

/// Operand shapes the planner reads. `None` marks an absent input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilingInput {
    /// `[M, K]` of the sparse operand.
    pub a_shape: Option<[usize; 2]>,
    /// `[K, N]` of the dense operand.
    pub b_shape: Option<[usize; 2]>,
    /// Length of the row pointer array (row-windows + 1).
    pub row_ptr_len: Option<usize>,
    /// Block column width of the element type.
    pub cube_k: usize,
}

impl TilingInput {
    /// Shapes of a BCSR operand `a` times a dense `K × n` operand, with the
    /// block width of `a`'s element type.
    pub fn for_operands<T: Element>(a: &BcsrMatrix<T>, n: usize) -> Self {
        Self {
            a_shape: Some([a.m(), a.k()]),
            b_shape: Some([a.k(), n]),
            row_ptr_len: Some(a.row_ptr().len()),
            cube_k: cube_k::<T>(),
        }
    }
}

/// Tiling record consumed verbatim by every core.
///
/// The first `former_count` cores own `former_length` row-windows each,
/// the remaining `tail_count` cores own `tail_length` each; the groups
/// are laid out back to back in row-window order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilingParams {
    pub m: usize,
    pub n: usize,
    pub k: usize,

    /// Row-windows in the whole matrix.
    pub total_row_windows: usize,
    /// Cores the launch uses; zero makes the launch a no-op.
    pub active_cores: usize,

    pub former_count: usize,
    pub former_length: usize,
    pub tail_count: usize,
    pub tail_length: usize,

    /// Multiply calls needed to cover N for one block.
    pub sub_tile_count: usize,
    pub sub_tile_width: usize,
    /// Fractals spanned by a full-width sub-tile.
    pub sub_tile_block_count: usize,
    pub last_sub_tile_width: usize,
    /// Fractals spanned by the last sub-tile.
    pub last_sub_tile_block_count: usize,
}

/// Contiguous row-windows owned by one core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreSlice {
    pub core: usize,
    pub first_row_window: usize,
    pub row_windows: usize,
}

impl CoreSlice {
    /// Row-window indices owned by this core, in processing order.
    pub fn range(&self) -> Range<usize> {
        self.first_row_window..self.first_row_window + self.row_windows
    }
}

/// One slice of N handled by a single multiply call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubTile {
    pub index: usize,
    /// First output column.
    pub offset: usize,
    pub width: usize,
    /// Whole fractals the transpose stage must move for this sub-tile.
    pub block_count: usize,
}

impl TilingParams {
    /// Row-windows owned by `core`. Cores at or past `active_cores` own
    /// nothing.
    pub fn core_slice(&self, core: usize) -> CoreSlice {
        let (first_row_window, row_windows) = if core < self.former_count {
            (core * self.former_length, self.former_length)
        } else if core < self.former_count + self.tail_count {
            (
                self.former_count * self.former_length + (core - self.former_count) * self.tail_length,
                self.tail_length,
            )
        } else {
            (self.total_row_windows, 0)
        };
        CoreSlice {
            core,
            first_row_window,
            row_windows,
        }
    }

    /// Slices of the active cores, in core order. Together they cover
    /// every row-window exactly once.
    pub fn core_slices(&self) -> impl Iterator<Item = CoreSlice> + '_ {
        (0..self.active_cores).map(|core| self.core_slice(core))
    }

    /// Extent of sub-tile `index`; the last one may be narrower.
    pub fn sub_tile(&self, index: usize) -> SubTile {
        let last = index + 1 == self.sub_tile_count;
        SubTile {
            index,
            offset: index * self.sub_tile_width,
            width: if last { self.last_sub_tile_width } else { self.sub_tile_width },
            block_count: if last {
                self.last_sub_tile_block_count
            } else {
                self.sub_tile_block_count
            },
        }
    }

    /// All sub-tiles of N, left to right.
    pub fn sub_tiles(&self) -> impl Iterator<Item = SubTile> + '_ {
        (0..self.sub_tile_count).map(|j| self.sub_tile(j))
    }

    /// Padded width of the dense staging buffers, in elements.
    pub fn staging_width(&self) -> usize {
        self.sub_tile_block_count * FRACTAL_N
    }
}

/// Compute the tiling record for one invocation.
///
/// Fails on absent shapes, an invalid configuration, disagreeing K, or a
/// K that is not a whole number of engine blocks. Zero row-windows or
/// zero cores are not errors: the plan simply activates no cores.
pub fn plan_tiling(input: &TilingInput, config: &EngineConfig) -> Result<TilingParams> {
    let [m, k] = input.a_shape.ok_or(SpmmError::MissingInput("a_shape"))?;
    let [b_rows, n] = input.b_shape.ok_or(SpmmError::MissingInput("b"))?;
    let row_ptr_len = input.row_ptr_len.ok_or(SpmmError::MissingInput("row_ptr"))?;
    config.validate()?;

    if b_rows != k {
        return Err(SpmmError::ShapeMismatch {
            what: "rows of B",
            expected: k,
            actual: b_rows,
        });
    }
    if input.cube_k == 0 || k % input.cube_k != 0 {
        return Err(SpmmError::KNotAligned {
            k,
            cube_k: input.cube_k,
        });
    }

    let total = row_ptr_len.saturating_sub(1);
    let active = config.core_count.min(total);
    let (former_count, former_length, tail_count, tail_length) = if active == 0 {
        (0, 0, 0, 0)
    } else {
        let former_count = total % active;
        (former_count, total.div_ceil(active), active - former_count, total / active)
    };

    let sub_tile_count = n.div_ceil(config.max_engine_n);
    let sub_tile_width = if sub_tile_count > 1 { config.max_engine_n } else { n };
    let last_sub_tile_width = n - sub_tile_count.saturating_sub(1) * sub_tile_width;

    let params = TilingParams {
        m,
        n,
        k,
        total_row_windows: total,
        active_cores: active,
        former_count,
        former_length,
        tail_count,
        tail_length,
        sub_tile_count,
        sub_tile_width,
        sub_tile_block_count: sub_tile_width.div_ceil(FRACTAL_N),
        last_sub_tile_width,
        last_sub_tile_block_count: last_sub_tile_width.div_ceil(FRACTAL_N),
    };

    if active == 0 {
        warn!(
            row_windows = total,
            cores = config.core_count,
            "degenerate tiling, no cores will be launched"
        );
    }
    debug!(?params, "tiling planned");
    Ok(params)
}

/// Output shape `[M, N]` from the `a_shape` tensor and B's shape.
pub fn infer_output_shape(a_shape: Option<&[i64]>, b_shape: Option<&[usize]>) -> Result<[usize; 2]> {
    let a_shape = a_shape.ok_or(SpmmError::MissingInput("a_shape"))?;
    let b_shape = b_shape.ok_or(SpmmError::MissingInput("b"))?;
    if a_shape.len() < 2 {
        return Err(SpmmError::ShapeMismatch {
            what: "a_shape length",
            expected: 2,
            actual: a_shape.len(),
        });
    }
    if b_shape.len() < 2 {
        return Err(SpmmError::ShapeMismatch {
            what: "rank of B",
            expected: 2,
            actual: b_shape.len(),
        });
    }
    let m = usize::try_from(a_shape[0])
        .map_err(|_| SpmmError::InvalidConfig(format!("negative M in a_shape: {}", a_shape[0])))?;
    Ok([m, b_shape[1]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(m: usize, k: usize, n: usize) -> TilingInput {
        TilingInput {
            a_shape: Some([m, k]),
            b_shape: Some([k, n]),
            row_ptr_len: Some(m.div_ceil(16) + 1),
            cube_k: 16,
        }
    }

    #[test]
    fn test_balanced_partition() {
        let config = EngineConfig::single_core().with_core_count(4);
        let p = plan_tiling(&input(16 * 10, 32, 16), &config).unwrap();
        assert_eq!(p.active_cores, 4);
        assert_eq!((p.former_count, p.former_length), (2, 3));
        assert_eq!((p.tail_count, p.tail_length), (2, 2));
        let ranges: Vec<_> = p.core_slices().map(|s| s.range()).collect();
        assert_eq!(ranges, vec![0..3, 3..6, 6..8, 8..10]);
    }

    #[test]
    fn test_even_partition_has_no_former_group() {
        let config = EngineConfig::single_core().with_core_count(4);
        let p = plan_tiling(&input(16 * 8, 32, 16), &config).unwrap();
        assert_eq!(p.former_count, 0);
        assert_eq!((p.tail_count, p.tail_length), (4, 2));
    }

    #[test]
    fn test_cores_capped_by_row_windows() {
        let config = EngineConfig::single_core().with_core_count(24);
        let p = plan_tiling(&input(40, 16, 16), &config).unwrap();
        assert_eq!(p.active_cores, 3);
        assert_eq!(p.core_slice(5).row_windows, 0);
    }

    #[test]
    fn test_single_sub_tile_uses_full_n() {
        let p = plan_tiling(&input(16, 16, 40), &EngineConfig::single_core()).unwrap();
        assert_eq!(p.sub_tile_count, 1);
        assert_eq!(p.sub_tile_width, 40);
        assert_eq!(p.last_sub_tile_width, 40);
        assert_eq!(p.last_sub_tile_block_count, 3);
        assert_eq!(p.staging_width(), 48);
    }

    #[test]
    fn test_zero_row_windows_is_noop_plan() {
        let p = plan_tiling(&input(0, 16, 16), &EngineConfig::single_core()).unwrap();
        assert_eq!(p.active_cores, 0);
        assert_eq!(p.core_slices().count(), 0);
    }

    #[test]
    fn test_missing_inputs() {
        let config = EngineConfig::single_core();
        let mut i = input(16, 16, 16);
        i.a_shape = None;
        assert!(matches!(plan_tiling(&i, &config), Err(SpmmError::MissingInput("a_shape"))));
        let mut i = input(16, 16, 16);
        i.b_shape = None;
        assert!(matches!(plan_tiling(&i, &config), Err(SpmmError::MissingInput("b"))));
        let mut i = input(16, 16, 16);
        i.row_ptr_len = None;
        assert!(matches!(plan_tiling(&i, &config), Err(SpmmError::MissingInput("row_ptr"))));
    }

    #[test]
    fn test_infer_output_shape() {
        let a: &[i64] = &[64, 32];
        let b: &[usize] = &[32, 48];
        assert_eq!(infer_output_shape(Some(a), Some(b)).unwrap(), [64, 48]);
        assert!(infer_output_shape(None, Some(b)).is_err());
        assert!(infer_output_shape(Some(a), None).is_err());
        assert!(infer_output_shape(Some(&a[..1]), Some(b)).is_err());
        assert!(infer_output_shape(Some(&[-1, 32][..]), Some(b)).is_err());
    }
}
