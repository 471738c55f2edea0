//! Sparse operand storage and scalar baselines.
//!
//! These provide the BCSR container the kernel consumes, the correctness
//! baselines it is compared against, and the transpose routine the
//! engine's layout stages are built on.

pub mod bcsr;
pub mod reference;
pub mod transpose;
