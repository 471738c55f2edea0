//! Multi-core launch.
//!
//! One scoped thread per active core, each running the block-multiply
//! pipeline over its own row-windows. Cores share nothing but the read-only
//! operands and the atomic output, so the launch returns only once every
//! core has finished.

pub mod launch;

pub use launch::{LaunchReport, launch};
