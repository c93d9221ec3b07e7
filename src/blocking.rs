//! Blocking index
//!
//! Partitions competitor records into buckets keyed by the first token of
//! the normalized name, so candidate lookup stays sub-quadratic. Every
//! record also lands in a catch-all bucket: when a query key has no bucket,
//! recall degrades to brute force instead of to zero matches. Precision is
//! deliberately sacrificed for speed; false negatives from the shared-first-
//! token heuristic are a known limitation.

use crate::catalog::CatalogRecord;
use std::collections::HashMap;

pub const CATCH_ALL_KEY: &str = "all";
pub const EMPTY_NAME_KEY: &str = "other";

/// First whitespace-delimited token of a normalized name, or the sentinel
/// for empty names. Many records share a key.
pub fn block_key(normalized_name: &str) -> &str {
    normalized_name
        .split_whitespace()
        .next()
        .unwrap_or(EMPTY_NAME_KEY)
}

/// Read-only after `build`; requires no synchronization for the rest of a
/// run. Bucket order preserves record insertion order, which the scorer's
/// tie-break relies on.
pub struct BlockingIndex {
    records: Vec<CatalogRecord>,
    buckets: HashMap<String, Vec<usize>>,
}

impl BlockingIndex {
    pub fn build(records: Vec<CatalogRecord>) -> Self {
        let mut buckets: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, record) in records.iter().enumerate() {
            let key = block_key(&record.normalized_name);
            buckets.entry(key.to_string()).or_default().push(idx);
            buckets
                .entry(CATCH_ALL_KEY.to_string())
                .or_default()
                .push(idx);
        }
        Self { records, buckets }
    }

    /// Likely-similar competitor records for a normalized query name: the
    /// keyed bucket, or the catch-all when the keyed bucket is absent.
    pub fn lookup(&self, normalized_query: &str) -> Vec<&CatalogRecord> {
        let key = block_key(normalized_query);
        self.buckets
            .get(key)
            .filter(|bucket| !bucket.is_empty())
            .or_else(|| self.buckets.get(CATCH_ALL_KEY))
            .map(|bucket| bucket.iter().map(|&i| &self.records[i]).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
