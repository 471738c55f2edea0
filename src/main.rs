//! Host harness for the BCSR SpMM kernel.
//!
//! ```text
//! bcsr-spmm <M> <K> <N> <NNZ> <row_ptr.bin> <col.bin> <values.bin> <b.bin> <c.bin> <category> <sample_name>
//! ```
//!
//! Timings are appended to `$BCSR_SPMM_OUTPUT_DIR/<category>.txt`
//! (default `../output`). Engine settings come from `BCSR_SPMM_CORES`,
//! `BCSR_SPMM_MAX_ENGINE_N` and `BCSR_SPMM_PIPELINE`.

use anyhow::Context;
use bcsr_spmm::EngineConfig;
use bcsr_spmm::host::args::{HarnessArgs, USAGE};
use bcsr_spmm::host::run_harness;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let program = std::env::args().next().unwrap_or_else(|| "bcsr-spmm".to_string());
    let args = match HarnessArgs::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Usage: {program} {USAGE}");
            return Err(e.into());
        }
    };

    let output_dir = std::env::var_os("BCSR_SPMM_OUTPUT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("../output"));
    let config = EngineConfig::from_env().context("reading engine configuration")?;

    run_harness(&args, &output_dir, &config)
        .with_context(|| format!("running sample {}", args.sample_name))
}
