//! JSON output
//!
//! Writes reports as pretty-printed JSON for downstream tooling

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

/// Serialize `value` to `output_path`
pub fn write_json<T: Serialize>(value: &T, output_path: &Path) -> Result<()> {
    info!("Writing JSON report: {}", output_path.display());

    let file = File::create(output_path)
        .with_context(|| format!("Failed to create output file: {}", output_path.display()))?;

    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, value).context("Failed to serialize report to JSON")?;

    info!("JSON report written to {}", output_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kcorpus_shared::types::report::{CheckReport, Inventory};
    use std::path::PathBuf;

    #[test]
    fn test_write_json() {
        let report = CheckReport::new(PathBuf::from("corpus"), Inventory::default());

        let temp_dir = tempfile::tempdir().unwrap();
        let output_path = temp_dir.path().join("report.json");

        write_json(&report, &output_path).unwrap();
        assert!(output_path.exists());

        let contents = std::fs::read_to_string(&output_path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["corpus_root"], "corpus");
        assert!(parsed["findings"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_write_json_bad_path() {
        let report = CheckReport::new(PathBuf::from("corpus"), Inventory::default());
        assert!(write_json(&report, Path::new("/nonexistent/dir/report.json")).is_err());
    }
}
