//! Catalog normalization
//!
//! Turns heterogeneous tabular catalogs (unknown, possibly Arabic column
//! names) into uniform records.

use crate::error::Result;
use lazy_static::lazy_static;
use polars::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    /// First numeric run in a price cell; tolerates currency text around it.
    static ref PRICE_RE: Regex = Regex::new(r"-?\d+(?:\.\d+)?").unwrap();
}

/// One product row from either the merchant or a competitor catalog.
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub display_name: String,
    /// Lower-cased form of `display_name`, used only internally.
    pub normalized_name: String,
    /// Non-negative; absent or unparseable values degrade to 0.
    pub price: f64,
    /// Which catalog file this record came from.
    pub source_id: String,
    /// Original column name -> original value, in column order. Preserved
    /// for downstream consumers, never interpreted by the core.
    pub raw_attributes: Vec<(String, String)>,
}

/// Column resolution rules. These are configuration, not inference: the
/// first header containing one of the tokens (case-insensitive) wins.
#[derive(Debug, Clone)]
pub struct ColumnRules {
    pub name_tokens: Vec<String>,
    pub price_tokens: Vec<String>,
}

impl Default for ColumnRules {
    fn default() -> Self {
        Self {
            name_tokens: vec!["name".to_string(), "اسم".to_string()],
            price_tokens: vec!["price".to_string(), "سعر".to_string()],
        }
    }
}

pub struct CatalogNormalizer {
    rules: ColumnRules,
}

impl Default for CatalogNormalizer {
    fn default() -> Self {
        Self::new(ColumnRules::default())
    }
}

impl CatalogNormalizer {
    pub fn new(rules: ColumnRules) -> Self {
        Self { rules }
    }

    /// Convert one catalog frame into records. Pure transform: data quality
    /// problems degrade to safe defaults (empty name, zero price) instead
    /// of failing, because catalog files are uncontrolled user uploads.
    pub fn normalize(&self, df: &DataFrame, source_id: &str) -> Result<Vec<CatalogRecord>> {
        let headers: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();

        let name_col = self
            .resolve_column(&headers, &self.rules.name_tokens)
            .or_else(|| headers.first().cloned());
        let price_col = self
            .resolve_column(&headers, &self.rules.price_tokens)
            .or_else(|| headers.get(1).cloned());

        let mut records = Vec::with_capacity(df.height());
        for row_idx in 0..df.height() {
            let display_name = match &name_col {
                Some(col) => cell_to_string(df.column(col)?, row_idx),
                None => String::new(),
            };
            let price = match &price_col {
                Some(col) => cell_to_price(df.column(col)?, row_idx),
                None => 0.0,
            };

            let mut raw_attributes = Vec::with_capacity(headers.len());
            for header in &headers {
                raw_attributes.push((
                    header.clone(),
                    cell_to_string(df.column(header)?, row_idx),
                ));
            }

            records.push(CatalogRecord {
                normalized_name: display_name.to_lowercase(),
                display_name,
                price,
                source_id: source_id.to_string(),
                raw_attributes,
            });
        }

        Ok(records)
    }

    fn resolve_column(&self, headers: &[String], tokens: &[String]) -> Option<String> {
        headers
            .iter()
            .find(|h| {
                let lower = h.to_lowercase();
                tokens.iter().any(|t| lower.contains(t.as_str()))
            })
            .cloned()
    }
}

fn cell_to_string(series: &Series, row_idx: usize) -> String {
    match series.dtype() {
        DataType::String => series
            .str()
            .unwrap()
            .get(row_idx)
            .unwrap_or("")
            .to_string(),
        DataType::Int64 => series
            .i64()
            .unwrap()
            .get(row_idx)
            .map(|v| v.to_string())
            .unwrap_or_default(),
        DataType::Float64 => series
            .f64()
            .unwrap()
            .get(row_idx)
            .map(|v| v.to_string())
            .unwrap_or_default(),
        _ => series
            .get(row_idx)
            .map(|v| v.to_string())
            .unwrap_or_default(),
    }
}

fn cell_to_price(series: &Series, row_idx: usize) -> f64 {
    let parsed = match series.dtype() {
        DataType::Float64 => series.f64().unwrap().get(row_idx),
        DataType::Int64 => series.i64().unwrap().get(row_idx).map(|v| v as f64),
        DataType::String => series.str().unwrap().get(row_idx).and_then(parse_price_text),
        _ => series.get(row_idx).ok().and_then(|v| v.extract::<f64>()),
    };
    // Prices are non-negative; anything else counts as unparseable.
    parsed
        .filter(|p| p.is_finite() && *p >= 0.0)
        .unwrap_or(0.0)
}

fn parse_price_text(text: &str) -> Option<f64> {
    let cleaned = text.replace(',', "");
    PRICE_RE
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}
