//! Engine geometry constants and launch configuration.

use crate::element::Element;
use crate::error::{Result, SpmmError};

/// Rows in one sparse block (the height of a row-window).
pub const CUBE_M: usize = 16;

/// Width in bytes of one engine block row. The block column count of an
/// element type is this divided by the element width.
pub const ENGINE_ALIGN_BYTES: usize = 32;

/// Columns of one output/dense fractal along N. The dense transform stage
/// works in whole fractals of this width, never in raw elements.
pub const FRACTAL_N: usize = 16;

/// Default cap on N per multiply-accumulate call.
pub const DEFAULT_MAX_ENGINE_N: usize = 256;

/// Block column width (`CUBE_K`) for element type `T`.
#[inline]
pub fn cube_k<T: Element>() -> usize {
    ENGINE_ALIGN_BYTES / T::bytes()
}

/// Elements in one `CUBE_M x CUBE_K` sparse tile.
#[inline]
pub fn tile_len<T: Element>() -> usize {
    CUBE_M * cube_k::<T>()
}

/// How the stages of one core are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
    /// All six stages run in program order on the core's thread.
    Sequential,
    /// Load, transform, compute and writeback run as separate threads per
    /// core, handing buffers through single-slot queues.
    Overlapped,
}

impl std::str::FromStr for PipelineMode {
    type Err = SpmmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" | "seq" => Ok(Self::Sequential),
            "overlapped" | "overlap" => Ok(Self::Overlapped),
            other => Err(SpmmError::InvalidConfig(format!(
                "unknown pipeline mode {other:?} (expected sequential or overlapped)"
            ))),
        }
    }
}

/// Launch configuration for one SpMM invocation.
///
/// # Example
///
/// ```
/// use bcsr_spmm::{EngineConfig, PipelineMode};
///
/// let config = EngineConfig::default()
///     .with_core_count(4)
///     .with_max_engine_n(64)
///     .with_pipeline(PipelineMode::Sequential);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Cores available to the planner. The planner never activates more
    /// cores than there are row-windows. Zero makes every launch a no-op.
    pub core_count: usize,

    /// Largest N one multiply-accumulate call may cover. Must be a
    /// non-zero multiple of [`FRACTAL_N`].
    pub max_engine_n: usize,

    /// Stage scheduling within a core.
    pub pipeline: PipelineMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            core_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            max_engine_n: DEFAULT_MAX_ENGINE_N,
            pipeline: PipelineMode::Overlapped,
        }
    }
}

impl EngineConfig {
    /// One core, sequential stages. Useful as a deterministic baseline.
    #[must_use]
    pub fn single_core() -> Self {
        Self {
            core_count: 1,
            max_engine_n: DEFAULT_MAX_ENGINE_N,
            pipeline: PipelineMode::Sequential,
        }
    }

    /// Defaults overridden from `BCSR_SPMM_CORES`, `BCSR_SPMM_MAX_ENGINE_N`
    /// and `BCSR_SPMM_PIPELINE` where set.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(cores) = env_usize("BCSR_SPMM_CORES")? {
            config.core_count = cores;
        }
        if let Some(max_n) = env_usize("BCSR_SPMM_MAX_ENGINE_N")? {
            config.max_engine_n = max_n;
        }
        if let Ok(mode) = std::env::var("BCSR_SPMM_PIPELINE") {
            config.pipeline = mode.parse()?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Set the cores available to the planner.
    #[must_use]
    pub const fn with_core_count(mut self, core_count: usize) -> Self {
        self.core_count = core_count;
        self
    }

    /// Set the widest N slice one multiply-accumulate may cover.
    #[must_use]
    pub const fn with_max_engine_n(mut self, max_engine_n: usize) -> Self {
        self.max_engine_n = max_engine_n;
        self
    }

    /// Set how the stages of each core are scheduled.
    #[must_use]
    pub const fn with_pipeline(mut self, pipeline: PipelineMode) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Check the configuration against the engine's fixed geometry.
    pub fn validate(&self) -> Result<()> {
        if self.max_engine_n == 0 {
            return Err(SpmmError::InvalidConfig(
                "max_engine_n must be greater than 0".to_string(),
            ));
        }
        if self.max_engine_n % FRACTAL_N != 0 {
            return Err(SpmmError::InvalidConfig(format!(
                "max_engine_n={} must be a multiple of {FRACTAL_N}",
                self.max_engine_n
            )));
        }
        Ok(())
    }
}

fn env_usize(key: &str) -> Result<Option<usize>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| SpmmError::InvalidConfig(format!("{key}={raw:?}: {e}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use half::f16;

    #[test]
    fn test_block_geometry() {
        assert_eq!(cube_k::<f16>(), 16);
        assert_eq!(cube_k::<f32>(), 8);
        assert_eq!(tile_len::<f16>(), 256);
        assert_eq!(tile_len::<f32>(), 128);
    }

    #[test]
    fn test_validate() {
        assert!(EngineConfig::single_core().validate().is_ok());
        assert!(EngineConfig::single_core().with_max_engine_n(0).validate().is_err());
        assert!(EngineConfig::single_core().with_max_engine_n(24).validate().is_err());
        assert!(EngineConfig::single_core().with_max_engine_n(32).validate().is_ok());
    }

    #[test]
    fn test_pipeline_mode_parse() {
        assert_eq!("Sequential".parse::<PipelineMode>().unwrap(), PipelineMode::Sequential);
        assert_eq!("overlap".parse::<PipelineMode>().unwrap(), PipelineMode::Overlapped);
        assert!("fast".parse::<PipelineMode>().is_err());
    }

    #[test]
    fn test_default_has_cores() {
        assert!(EngineConfig::default().core_count >= 1);
    }
}
