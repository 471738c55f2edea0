//! Positional command line of the host harness.

use crate::error::{Result, SpmmError};
use std::path::PathBuf;

pub const USAGE: &str =
    "<M> <K> <N> <NNZ> <row_ptr.bin> <col.bin> <values.bin> <b.bin> <c.bin> <category> <sample_name>";

/// One harness invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessArgs {
    pub m: usize,
    pub k: usize,
    pub n: usize,
    /// Scalar nonzeros of the source matrix. Only reported.
    pub nnz: usize,
    pub row_ptr: PathBuf,
    pub col: PathBuf,
    pub values: PathBuf,
    pub b: PathBuf,
    pub c: PathBuf,
    pub category: String,
    pub sample_name: String,
}

impl HarnessArgs {
    /// Parse the arguments after the program name. Exactly eleven are
    /// required.
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let [m, k, n, nnz, row_ptr, col, values, b, c, category, sample_name]: [String; 11] = args
            .try_into()
            .map_err(|args: Vec<String>| {
                SpmmError::Usage(format!("expected 11 arguments, got {}: {USAGE}", args.len()))
            })?;

        Ok(Self {
            m: dimension("M", &m)?,
            k: dimension("K", &k)?,
            n: dimension("N", &n)?,
            nnz: dimension("NNZ", &nnz)?,
            row_ptr: row_ptr.into(),
            col: col.into(),
            values: values.into(),
            b: b.into(),
            c: c.into(),
            category,
            sample_name,
        })
    }
}

fn dimension(name: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse()
        .map_err(|e| SpmmError::Usage(format!("{name}={raw:?} is not a non-negative integer: {e}")))
}
