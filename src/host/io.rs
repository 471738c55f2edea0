//! Raw operand files and the timing log.
//!
//! Operand files are bare little-endian element arrays with no header, the
//! format the block extraction script writes.

use crate::error::{Result, SpmmError};
use bytemuck::Pod;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

const LOG_RULE: &str = "----------------------------------------";

/// Read a whole file as an array of `T`.
pub fn read_raw<T: Pod>(path: &Path) -> Result<Vec<T>> {
    let bytes = fs::read(path).map_err(|e| SpmmError::io(path, e))?;
    let size = std::mem::size_of::<T>();
    if bytes.len() % size != 0 {
        return Err(SpmmError::InvalidBcsr(format!(
            "{}: {} bytes is not a whole number of {size}-byte elements",
            path.display(),
            bytes.len()
        )));
    }
    Ok(bytemuck::pod_collect_to_vec(&bytes))
}

/// Write `data` as raw bytes, replacing the file.
pub fn write_raw<T: Pod>(path: &Path, data: &[T]) -> Result<()> {
    fs::write(path, bytemuck::cast_slice::<T, u8>(data)).map_err(|e| SpmmError::io(path, e))
}

/// Convert on-disk `i32` indices, rejecting negatives.
pub fn indices(raw: &[i32], what: &str) -> Result<Vec<usize>> {
    raw.iter()
        .enumerate()
        .map(|(i, &v)| {
            usize::try_from(v)
                .map_err(|_| SpmmError::InvalidBcsr(format!("{what}[{i}] is negative: {v}")))
        })
        .collect()
}

/// Create `dir` if missing, owner-only on unix.
pub fn ensure_output_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir).map_err(|e| SpmmError::io(dir, e))
}

/// Render one sample's timings as a log block.
pub fn format_log_entry(sample_name: &str, timings: &BTreeMap<String, Vec<f64>>) -> String {
    let mut entry = format!("Sample: {sample_name}\n");
    for (name, runs) in timings {
        entry.push_str(&format!("  {name}:\n"));
        for (i, ms) in runs.iter().enumerate() {
            entry.push_str(&format!("    Run {}: {ms:.6} ms\n", i + 1));
        }
    }
    entry.push_str(LOG_RULE);
    entry.push('\n');
    entry
}

/// Append one block to `<dir>/<category>.txt`.
pub fn append_log(
    dir: &Path,
    category: &str,
    sample_name: &str,
    timings: &BTreeMap<String, Vec<f64>>,
) -> Result<()> {
    let path = dir.join(format!("{category}.txt"));
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| SpmmError::io(&path, e))?;
    file.write_all(format_log_entry(sample_name, timings).as_bytes())
        .map_err(|e| SpmmError::io(&path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_entry_format() {
        let mut timings = BTreeMap::new();
        timings.insert("opRunner.RunOp".to_string(), vec![12.3456789, 0.5]);
        assert_eq!(
            format_log_entry("web-Google", &timings),
            "Sample: web-Google\n  opRunner.RunOp:\n    Run 1: 12.345679 ms\n    Run 2: 0.500000 ms\n\
             ----------------------------------------\n"
        );
    }

    #[test]
    fn test_negative_index_rejected() {
        assert_eq!(indices(&[0, 3, 7], "row_ptr").unwrap(), vec![0, 3, 7]);
        assert!(indices(&[0, -1], "col").is_err());
    }
}
