//! Element types the block engine accepts for A and B.
//!
//! The engine reads reduced-precision operands and always accumulates in
//! `f32`. The element width decides the block geometry: an engine block row
//! is [`ENGINE_ALIGN_BYTES`](crate::config::ENGINE_ALIGN_BYTES) wide, so
//! 2-byte types get 16 columns per block and `f32` gets 8.

use bytemuck::{Pod, Zeroable};
use std::fmt::Debug;

/// Operand element for the sparse and dense inputs.
///
/// `Pod` lets the host harness read tensors straight out of raw files;
/// `Default` must be zero, since it is used for padding.
pub trait Element: Copy + Default + Debug + Send + Sync + Pod + Zeroable + 'static {
    /// Short dtype name used in logs.
    const NAME: &'static str;

    /// Widen to the accumulator type.
    fn to_f32(self) -> f32;

    /// Narrow from `f32` (round to nearest).
    fn from_f32(v: f32) -> Self;

    /// Width of one element in bytes.
    #[inline]
    fn bytes() -> usize {
        std::mem::size_of::<Self>()
    }
}

impl Element for half::f16 {
    const NAME: &'static str = "f16";

    #[inline]
    fn to_f32(self) -> f32 {
        half::f16::to_f32(self)
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        half::f16::from_f32(v)
    }
}

impl Element for half::bf16 {
    const NAME: &'static str = "bf16";

    #[inline]
    fn to_f32(self) -> f32 {
        half::bf16::to_f32(self)
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        half::bf16::from_f32(v)
    }
}

impl Element for f32 {
    const NAME: &'static str = "f32";

    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        v
    }
}
