//! Compute kernels for the inner loop of the block multiply.
//!
//! The engine's multiply-accumulate consumes operands already in fractal
//! layouts and produces an `f32` tile in the accumulator layout. The
//! blocked pipeline calls it once per (nonzero block, N-sub-tile).

pub mod block_mma;
