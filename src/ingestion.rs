//! Catalog file ingestion
//!
//! CLI-side collaborator: loads already-structured catalog files into
//! DataFrames for the core, which never parses files itself. The source id
//! handed to the normalizer is the file stem.

use crate::error::{AnalysisError, Result};
use polars::prelude::*;
use std::path::Path;

pub fn load_catalog(path: &Path) -> Result<(String, DataFrame)> {
    let source_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("catalog")
        .to_string();

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let df = match extension.to_lowercase().as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_infer_schema_length(Some(1000))
            .finish()
            .map_err(|e| {
                AnalysisError::Catalog(format!("Failed to read CSV {}: {}", path.display(), e))
            })?
            .collect()
            .map_err(|e| {
                AnalysisError::Catalog(format!("Failed to load {}: {}", path.display(), e))
            })?,
        "parquet" => LazyFrame::scan_parquet(path, ScanArgsParquet::default())
            .map_err(|e| {
                AnalysisError::Catalog(format!("Failed to scan parquet {}: {}", path.display(), e))
            })?
            .collect()
            .map_err(|e| {
                AnalysisError::Catalog(format!("Failed to load {}: {}", path.display(), e))
            })?,
        other => {
            return Err(AnalysisError::Catalog(format!(
                "Unsupported catalog format '{}' for {}",
                other,
                path.display()
            )))
        }
    };

    Ok((source_id, df))
}

pub fn load_catalogs(paths: &[impl AsRef<Path>]) -> Result<Vec<(String, DataFrame)>> {
    paths.iter().map(|p| load_catalog(p.as_ref())).collect()
}
