//! Decision classification
//!
//! Maps (similarity confidence, price delta) to a pricing category and an
//! orthogonal risk level. Pure: the adjudicator outcome for ambiguous-band
//! matches is computed by the run controller and passed in.

use crate::adjudicator::MatchVerdict;
use crate::catalog::CatalogRecord;
use crate::scorer::MatchCandidate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Raise,
    Lower,
    Approved,
    Missing,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Raise => "raise",
            Category::Lower => "lower",
            Category::Approved => "approved",
            Category::Missing => "missing",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence-derived flag for manual review. Reported alongside the
/// category, never folded into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Normal,
    Medium,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Normal => "normal",
            RiskLevel::Medium => "medium",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification thresholds. All caller-configurable; the defaults are the
/// tuned production values.
#[derive(Debug, Clone)]
pub struct Thresholds {
    /// Minimum confidence to consider any match.
    pub match_threshold: u8,
    /// Confidence band `[low, high)` requiring adjudication.
    pub ambiguous_low: u8,
    pub ambiguous_high: u8,
    /// Merchant price below competitor by more than this fraction -> Raise.
    pub raise_pct: f64,
    /// Merchant price above competitor by more than this fraction -> Lower.
    pub lower_pct: f64,
    /// Confidence below this -> risk Medium.
    pub review_threshold: u8,
    /// Confidence below this -> risk Critical.
    pub critical_threshold: u8,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            match_threshold: 60,
            ambiguous_low: 60,
            ambiguous_high: 85,
            raise_pct: 0.10,
            lower_pct: 0.05,
            review_threshold: 85,
            critical_threshold: 70,
        }
    }
}

impl Thresholds {
    pub fn needs_adjudication(&self, confidence: u8) -> bool {
        confidence >= self.ambiguous_low && confidence < self.ambiguous_high
    }

    /// Conservative acceptance floor when the adjudicator is unavailable:
    /// the midpoint of the ambiguous band, rounded up.
    pub fn fallback_accept_threshold(&self) -> u8 {
        ((self.ambiguous_low as u16 + self.ambiguous_high as u16 + 1) / 2) as u8
    }
}

/// What the run controller learned from the adjudicator for an
/// ambiguous-band match.
#[derive(Debug, Clone)]
pub enum AdjudicationOutcome {
    Verdict(MatchVerdict),
    /// Gateway unreachable, timed out, or returned unparseable output.
    Unavailable(String),
}

/// The unit of output and persistence. Created once per merchant record per
/// run; never mutated, superseded by re-running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchDecision {
    pub merchant_record: CatalogRecord,
    /// Absent when no candidate cleared the minimum threshold.
    pub matched_competitor: Option<CatalogRecord>,
    /// Similarity score of the accepted match, 0 when unmatched.
    pub confidence: u8,
    /// competitor price - merchant price; only meaningful when matched.
    pub price_delta: f64,
    pub category: Category,
    pub risk: RiskLevel,
    /// Present only for Raise and Lower.
    pub recommended_price: Option<f64>,
    /// Present only when the adjudicator gateway was consulted.
    pub adjudication_reason: Option<String>,
}

pub struct DecisionClassifier {
    thresholds: Thresholds,
}

impl DecisionClassifier {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn needs_adjudication(&self, confidence: u8) -> bool {
        self.thresholds.needs_adjudication(confidence)
    }

    /// Classify one merchant record against its best candidate.
    ///
    /// `adjudication` must carry the gateway outcome whenever the candidate
    /// confidence falls inside the ambiguous band; a caller that skipped the
    /// gateway gets the same conservative fallback as an unreachable one.
    pub fn classify(
        &self,
        merchant: &CatalogRecord,
        candidate: Option<&MatchCandidate<'_>>,
        adjudication: Option<AdjudicationOutcome>,
    ) -> MatchDecision {
        let t = &self.thresholds;

        // Step 1: no candidate cleared the minimum threshold.
        let candidate = match candidate {
            Some(c) if c.score >= t.match_threshold => c,
            _ => return self.missing(merchant, RiskLevel::Normal, None),
        };
        let confidence = candidate.score;

        // Step 2: ambiguous band verdict, or the corrected failure fallback.
        let mut adjudication_reason = None;
        let mut fallback_degraded = false;
        if t.needs_adjudication(confidence) {
            let outcome = adjudication.unwrap_or_else(|| {
                AdjudicationOutcome::Unavailable("adjudication was not performed".to_string())
            });
            match outcome {
                AdjudicationOutcome::Verdict(verdict) => {
                    if !verdict.is_match {
                        return self.missing(merchant, RiskLevel::Normal, Some(verdict.reason));
                    }
                    adjudication_reason = Some(verdict.reason);
                }
                AdjudicationOutcome::Unavailable(cause) => {
                    // Never silently accept on gateway failure: accept only
                    // above the midpoint of the band, and flag as critical
                    // either way.
                    fallback_degraded = true;
                    if confidence >= t.fallback_accept_threshold() {
                        adjudication_reason = Some(format!(
                            "adjudicator unavailable ({}); accepted at confidence {}",
                            cause, confidence
                        ));
                    } else {
                        return self.missing(
                            merchant,
                            RiskLevel::Critical,
                            Some(format!(
                                "adjudicator unavailable ({}); rejected at confidence {}",
                                cause, confidence
                            )),
                        );
                    }
                }
            }
        }

        // Steps 3-4: price delta, category, one-unit undercut.
        let competitor_price = candidate.record.price;
        let price_delta = competitor_price - merchant.price;
        let pct = price_delta / merchant.price.max(f64::EPSILON);

        let (category, recommended_price) = if pct > t.raise_pct {
            (Category::Raise, Some(competitor_price - 1.0))
        } else if pct < -t.lower_pct {
            (Category::Lower, Some(competitor_price - 1.0))
        } else {
            (Category::Approved, None)
        };

        // Step 5: risk is orthogonal to category.
        let risk = if fallback_degraded || confidence < t.critical_threshold {
            RiskLevel::Critical
        } else if confidence < t.review_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Normal
        };

        MatchDecision {
            merchant_record: merchant.clone(),
            matched_competitor: Some(candidate.record.clone()),
            confidence,
            price_delta,
            category,
            risk,
            recommended_price,
            adjudication_reason,
        }
    }

    fn missing(
        &self,
        merchant: &CatalogRecord,
        risk: RiskLevel,
        adjudication_reason: Option<String>,
    ) -> MatchDecision {
        MatchDecision {
            merchant_record: merchant.clone(),
            matched_competitor: None,
            confidence: 0,
            price_delta: 0.0,
            category: Category::Missing,
            risk,
            recommended_price: None,
            adjudication_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, price: f64) -> CatalogRecord {
        CatalogRecord {
            display_name: name.to_string(),
            normalized_name: name.to_lowercase(),
            price,
            source_id: "test".to_string(),
            raw_attributes: Vec::new(),
        }
    }

    fn candidate<'a>(record: &'a CatalogRecord, score: u8) -> MatchCandidate<'a> {
        MatchCandidate { record, score }
    }

    fn verdict(is_match: bool, reason: &str) -> AdjudicationOutcome {
        AdjudicationOutcome::Verdict(MatchVerdict {
            is_match,
            reason: reason.to_string(),
        })
    }

    #[test]
    fn test_no_candidate_is_missing_normal() {
        let classifier = DecisionClassifier::new(Thresholds::default());
        let merchant = record("Chanel No5", 450.0);

        let decision = classifier.classify(&merchant, None, None);
        assert_eq!(decision.category, Category::Missing);
        assert_eq!(decision.risk, RiskLevel::Normal);
        assert_eq!(decision.confidence, 0);
        assert!(decision.matched_competitor.is_none());
        assert!(decision.recommended_price.is_none());
    }

    #[test]
    fn test_below_match_threshold_is_missing() {
        let classifier = DecisionClassifier::new(Thresholds::default());
        let merchant = record("Dior Sauvage", 520.0);
        let competitor = record("Versace Eros", 300.0);

        let decision = classifier.classify(&merchant, Some(&candidate(&competitor, 40)), None);
        assert_eq!(decision.category, Category::Missing);
        assert!(decision.matched_competitor.is_none());
    }

    #[test]
    fn test_cheaper_than_competitor_raises_with_undercut() {
        let classifier = DecisionClassifier::new(Thresholds::default());
        let merchant = record("Chanel No5 EDP 100ml", 400.0);
        let competitor = record("Chanel No5 EDP 100ml", 480.0);

        let decision = classifier.classify(&merchant, Some(&candidate(&competitor, 95)), None);
        assert_eq!(decision.category, Category::Raise);
        assert_eq!(decision.recommended_price, Some(479.0));
        assert_eq!(decision.price_delta, 80.0);
        assert_eq!(decision.risk, RiskLevel::Normal);
    }

    #[test]
    fn test_pricier_than_competitor_lowers_with_undercut() {
        let classifier = DecisionClassifier::new(Thresholds::default());
        let merchant = record("Oud Royal", 200.0);
        let competitor = record("Oud Royal", 150.0);

        let decision = classifier.classify(&merchant, Some(&candidate(&competitor, 95)), None);
        assert_eq!(decision.category, Category::Lower);
        assert_eq!(decision.recommended_price, Some(149.0));
        assert_eq!(decision.price_delta, -50.0);
    }

    #[test]
    fn test_equal_price_is_approved_normal() {
        let classifier = DecisionClassifier::new(Thresholds::default());
        let merchant = record("Tom Ford Noir", 300.0);
        let competitor = record("Tom Ford Noir", 300.0);

        let decision = classifier.classify(&merchant, Some(&candidate(&competitor, 92)), None);
        assert_eq!(decision.category, Category::Approved);
        assert_eq!(decision.risk, RiskLevel::Normal);
        assert!(decision.recommended_price.is_none());
    }

    #[test]
    fn test_within_tolerance_is_approved() {
        let classifier = DecisionClassifier::new(Thresholds::default());
        let merchant = record("Creed Aventus", 1000.0);
        let competitor = record("Creed Aventus", 1040.0);

        // +4% sits under the 10% raise threshold.
        let decision = classifier.classify(&merchant, Some(&candidate(&competitor, 95)), None);
        assert_eq!(decision.category, Category::Approved);
    }

    #[test]
    fn test_zero_merchant_price_raises_on_any_positive_competitor() {
        let classifier = DecisionClassifier::new(Thresholds::default());
        let merchant = record("Mystery Item", 0.0);
        let competitor = record("Mystery Item", 50.0);

        let decision = classifier.classify(&merchant, Some(&candidate(&competitor, 95)), None);
        assert_eq!(decision.category, Category::Raise);
        assert_eq!(decision.recommended_price, Some(49.0));
    }

    #[test]
    fn test_ambiguous_band_rejection_wins_over_price_delta() {
        let classifier = DecisionClassifier::new(Thresholds::default());
        let merchant = record("Armani Code", 100.0);
        let competitor = record("Armani Code Profumo", 900.0);

        let decision = classifier.classify(
            &merchant,
            Some(&candidate(&competitor, 72)),
            Some(verdict(false, "different concentration")),
        );
        assert_eq!(decision.category, Category::Missing);
        assert!(decision.matched_competitor.is_none());
        assert_eq!(
            decision.adjudication_reason.as_deref(),
            Some("different concentration")
        );
    }

    #[test]
    fn test_ambiguous_band_confirmation_keeps_match() {
        let classifier = DecisionClassifier::new(Thresholds::default());
        let merchant = record("YSL Libre", 300.0);
        let competitor = record("Libre YSL EDP", 360.0);

        let decision = classifier.classify(
            &merchant,
            Some(&candidate(&competitor, 72)),
            Some(verdict(true, "same product")),
        );
        assert_eq!(decision.category, Category::Raise);
        assert_eq!(decision.confidence, 72);
        assert_eq!(decision.adjudication_reason.as_deref(), Some("same product"));
        assert_eq!(decision.risk, RiskLevel::Medium);
    }

    #[test]
    fn test_gateway_failure_accepts_above_band_midpoint() {
        let classifier = DecisionClassifier::new(Thresholds::default());
        let merchant = record("Lattafa Khamrah", 80.0);
        let competitor = record("Khamrah Lattafa", 100.0);

        let decision = classifier.classify(
            &merchant,
            Some(&candidate(&competitor, 80)),
            Some(AdjudicationOutcome::Unavailable("timeout".to_string())),
        );
        assert_eq!(decision.category, Category::Raise);
        assert_eq!(decision.risk, RiskLevel::Critical);
        let reason = decision.adjudication_reason.unwrap();
        assert!(reason.contains("unavailable"), "reason: {}", reason);
    }

    #[test]
    fn test_gateway_failure_rejects_below_band_midpoint() {
        let classifier = DecisionClassifier::new(Thresholds::default());
        let merchant = record("Lattafa Khamrah", 80.0);
        let competitor = record("Khamrah Qahwa", 100.0);

        let decision = classifier.classify(
            &merchant,
            Some(&candidate(&competitor, 65)),
            Some(AdjudicationOutcome::Unavailable("timeout".to_string())),
        );
        assert_eq!(decision.category, Category::Missing);
        assert_eq!(decision.risk, RiskLevel::Critical);
        assert!(decision.adjudication_reason.is_some());
    }

    #[test]
    fn test_skipped_adjudication_falls_back_conservatively() {
        let classifier = DecisionClassifier::new(Thresholds::default());
        let merchant = record("Ajmal Amber", 60.0);
        let competitor = record("Amber Ajmal", 70.0);

        let decision = classifier.classify(&merchant, Some(&candidate(&competitor, 62)), None);
        assert_eq!(decision.category, Category::Missing);
        assert_eq!(decision.risk, RiskLevel::Critical);
    }

    #[test]
    fn test_risk_bands() {
        let classifier = DecisionClassifier::new(Thresholds::default());
        let merchant = record("X", 100.0);
        let competitor = record("X", 100.0);

        let at_review = classifier.classify(&merchant, Some(&candidate(&competitor, 85)), None);
        assert_eq!(at_review.risk, RiskLevel::Normal);

        let medium = classifier.classify(
            &merchant,
            Some(&candidate(&competitor, 80)),
            Some(verdict(true, "ok")),
        );
        assert_eq!(medium.risk, RiskLevel::Medium);

        let critical = classifier.classify(
            &merchant,
            Some(&candidate(&competitor, 65)),
            Some(verdict(true, "ok")),
        );
        assert_eq!(critical.risk, RiskLevel::Critical);
    }

    #[test]
    fn test_fallback_accept_threshold_is_band_midpoint() {
        let t = Thresholds::default();
        assert_eq!(t.fallback_accept_threshold(), 73);
        assert!(t.needs_adjudication(60));
        assert!(t.needs_adjudication(84));
        assert!(!t.needs_adjudication(85));
        assert!(!t.needs_adjudication(59));
    }

    #[test]
    fn test_recommended_price_only_for_raise_and_lower() {
        let classifier = DecisionClassifier::new(Thresholds::default());
        let merchant = record("A", 100.0);

        let raised = classifier.classify(&merchant, Some(&candidate(&record("A", 200.0), 95)), None);
        assert_eq!(raised.recommended_price, Some(199.0));

        let lowered = classifier.classify(&merchant, Some(&candidate(&record("A", 50.0), 95)), None);
        assert_eq!(lowered.recommended_price, Some(49.0));

        let approved = classifier.classify(&merchant, Some(&candidate(&record("A", 101.0), 95)), None);
        assert!(approved.recommended_price.is_none());

        let missing = classifier.classify(&merchant, None, None);
        assert!(missing.recommended_price.is_none());
    }
}
