//! Resumable run controller
//!
//! Orchestrates one full catalog pass: normalize -> block lookup -> score
//! -> (maybe) adjudicate -> classify -> persist, one merchant record at a
//! time. Each decision is persisted immediately so progress survives a
//! crash at any point; a resumed session skips the records already counted
//! by the store. Resumption requires merchant-catalog row order to be
//! stable across runs.

use crate::adjudicator::Adjudicator;
use crate::blocking::BlockingIndex;
use crate::catalog::{CatalogNormalizer, CatalogRecord};
use crate::decision::{
    AdjudicationOutcome, Category, DecisionClassifier, MatchDecision, RiskLevel, Thresholds,
};
use crate::error::Result;
use crate::scorer::{self, MatchCandidate};
use crate::store::DecisionStore;
use itertools::Itertools;
use polars::prelude::DataFrame;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    NotStarted,
    Running,
    Completed,
    Failed,
}

/// Explicit per-session state threaded through the controller; there is no
/// ambient process-wide session.
#[derive(Debug)]
pub struct RunState {
    /// Opaque token, generated once per run, stable across resumptions.
    pub session_id: String,
    /// Count of records durably decided, not a highest-index watermark.
    pub processed_count: u64,
    pub status: RunStatus,
    pub decisions: Vec<MatchDecision>,
}

impl RunState {
    pub fn new() -> Self {
        Self::resume(new_session_id())
    }

    /// Continue a previous session; the store decides how many leading
    /// records to skip.
    pub fn resume(session_id: String) -> Self {
        Self {
            session_id,
            processed_count: 0,
            status: RunStatus::NotStarted,
            decisions: Vec::new(),
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

fn new_session_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Per-category and per-risk counts over a decision set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub raise_count: usize,
    pub lower_count: usize,
    pub approved_count: usize,
    pub missing_count: usize,
    pub normal_count: usize,
    pub medium_count: usize,
    pub critical_count: usize,
}

impl Summary {
    pub fn from_decisions(decisions: &[MatchDecision]) -> Self {
        let categories = decisions.iter().counts_by(|d| d.category);
        let risks = decisions.iter().counts_by(|d| d.risk);
        Self {
            total: decisions.len(),
            raise_count: categories.get(&Category::Raise).copied().unwrap_or(0),
            lower_count: categories.get(&Category::Lower).copied().unwrap_or(0),
            approved_count: categories.get(&Category::Approved).copied().unwrap_or(0),
            missing_count: categories.get(&Category::Missing).copied().unwrap_or(0),
            normal_count: risks.get(&RiskLevel::Normal).copied().unwrap_or(0),
            medium_count: risks.get(&RiskLevel::Medium).copied().unwrap_or(0),
            critical_count: risks.get(&RiskLevel::Critical).copied().unwrap_or(0),
        }
    }
}

/// What a completed (or partially completed) run hands to the consumer.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub session_id: String,
    pub processed_count: u64,
    pub decisions: Vec<MatchDecision>,
    pub summary: Summary,
}

pub struct AnalysisRunner {
    classifier: DecisionClassifier,
    normalizer: CatalogNormalizer,
    adjudicator: Arc<dyn Adjudicator>,
    store: Arc<dyn DecisionStore>,
}

impl AnalysisRunner {
    pub fn new(
        thresholds: Thresholds,
        adjudicator: Arc<dyn Adjudicator>,
        store: Arc<dyn DecisionStore>,
    ) -> Self {
        Self {
            classifier: DecisionClassifier::new(thresholds),
            normalizer: CatalogNormalizer::default(),
            adjudicator,
            store,
        }
    }

    /// Run the full pass. `progress` is called with `(index, total)` after
    /// every record, on the controller's own task. Records are processed
    /// strictly sequentially; the blocking index is read-only once built.
    ///
    /// Nothing terminates the run except merchant-catalog exhaustion:
    /// adjudicator and persistence failures degrade per record. The one
    /// exception is an unreadable processed-count at startup, which would
    /// break resumption idempotence if guessed at.
    pub async fn run<F>(
        &self,
        merchant_df: &DataFrame,
        competitor_dfs: &[(String, DataFrame)],
        state: &mut RunState,
        mut progress: F,
    ) -> Result<AnalysisReport>
    where
        F: FnMut(usize, usize),
    {
        state.status = RunStatus::Running;

        // Step 1: normalize the merchant catalog.
        let merchant_records = self.normalizer.normalize(merchant_df, "merchant")?;

        // Step 2: normalize competitor catalogs and build the blocking index.
        let mut competitor_records = Vec::new();
        for (source_id, df) in competitor_dfs {
            competitor_records.extend(self.normalizer.normalize(df, source_id)?);
        }
        info!(
            "Indexing {} competitor records from {} catalogs",
            competitor_records.len(),
            competitor_dfs.len()
        );
        let index = BlockingIndex::build(competitor_records);

        // Step 3: ask the store how far a previous run got.
        let already = match self.store.get_processed_count(&state.session_id).await {
            Ok(n) => n,
            Err(e) => {
                state.status = RunStatus::Failed;
                return Err(e);
            }
        };
        if already > 0 {
            info!(
                "Resuming session {}: skipping {} already-processed records",
                state.session_id, already
            );
        }
        state.processed_count = already;

        // Step 4: per-record pipeline.
        let total = merchant_records.len();
        for (idx, merchant) in merchant_records.iter().enumerate().skip(already as usize) {
            let candidates = index.lookup(&merchant.normalized_name);
            let best = scorer::best_match(&merchant.normalized_name, &candidates);

            let adjudication = match best {
                Some(c)
                    if c.score >= self.classifier.thresholds().match_threshold
                        && self.classifier.needs_adjudication(c.score) =>
                {
                    Some(self.consult_adjudicator(merchant, &c).await)
                }
                _ => None,
            };

            let decision = self.classifier.classify(merchant, best.as_ref(), adjudication);

            // Persist immediately; a lost write must not lose the run, and
            // the decision still joins the in-memory result set.
            if let Err(e) = self.store.put_decision(&state.session_id, &decision).await {
                warn!(
                    "Failed to persist decision for '{}': {}",
                    merchant.display_name, e
                );
            }

            state.decisions.push(decision);
            state.processed_count += 1;
            progress(idx + 1, total);
        }

        state.status = RunStatus::Completed;

        // Step 5: aggregate for the consumer.
        let summary = Summary::from_decisions(&state.decisions);
        info!(
            "Session {} completed: {} decisions ({} raise, {} lower, {} approved, {} missing)",
            state.session_id,
            summary.total,
            summary.raise_count,
            summary.lower_count,
            summary.approved_count,
            summary.missing_count
        );

        Ok(AnalysisReport {
            session_id: state.session_id.clone(),
            processed_count: state.processed_count,
            decisions: state.decisions.clone(),
            summary,
        })
    }

    async fn consult_adjudicator(
        &self,
        merchant: &CatalogRecord,
        candidate: &MatchCandidate<'_>,
    ) -> AdjudicationOutcome {
        match self.adjudicator.adjudicate(merchant, candidate.record).await {
            Ok(verdict) => AdjudicationOutcome::Verdict(verdict),
            Err(e) => {
                warn!(
                    "Adjudicator unavailable for '{}': {}",
                    merchant.display_name, e
                );
                AdjudicationOutcome::Unavailable(e.to_string())
            }
        }
    }
}
