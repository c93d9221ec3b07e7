//! Similarity scorer
//!
//! Token-order-insensitive string similarity in [0, 100], plus best-candidate
//! selection over a blocking bucket.

use crate::catalog::CatalogRecord;
use strsim::{normalized_levenshtein, sorensen_dice};

/// A competitor record paired with its similarity score against one merchant
/// query. Transient; never persisted standalone.
#[derive(Debug, Clone, Copy)]
pub struct MatchCandidate<'a> {
    pub record: &'a CatalogRecord,
    pub score: u8,
}

/// Token-order-insensitive similarity. Two comparisons, best one wins:
/// normalized Levenshtein over the sorted-token join, and a bigram overlap
/// over the whitespace-stripped string. The second rescues spacing variants
/// ("No5" vs "No 5") that tokenization splits apart, without rewarding
/// unrelated names that merely share letters. 100 for an identical token
/// multiset. No normalization beyond lower-casing; diacritics, punctuation
/// and digit variants pass through as-is.
pub fn similarity(a: &str, b: &str) -> u8 {
    let token_score = normalized_levenshtein(&sort_tokens(a), &sort_tokens(b));
    let bigram_score = sorensen_dice(&strip_spaces(a), &strip_spaces(b));
    (token_score.max(bigram_score) * 100.0).round() as u8
}

fn sort_tokens(s: &str) -> String {
    let lower = s.to_lowercase();
    let mut tokens: Vec<&str> = lower.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn strip_spaces(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Best-scoring candidate for a query, scanning in input order. Ties keep
/// the first-encountered candidate: only a strictly greater score replaces
/// the current best, so results are deterministic for a given candidate
/// order.
pub fn best_match<'a>(
    query_name: &str,
    candidates: &[&'a CatalogRecord],
) -> Option<MatchCandidate<'a>> {
    let mut best: Option<MatchCandidate<'a>> = None;
    for record in candidates {
        let score = similarity(query_name, &record.normalized_name);
        if best.map_or(true, |b| score > b.score) {
            best = Some(MatchCandidate { record, score });
        }
    }
    best
}
