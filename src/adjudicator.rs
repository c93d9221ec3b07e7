//! Adjudicator gateway
//!
//! External capability consulted only for ambiguous-confidence matches,
//! where pure string similarity is not decisive. The transport (endpoint,
//! model, credentials) is the collaborator's concern; the core only depends
//! on the verdict contract.

use crate::catalog::CatalogRecord;
use crate::error::{AnalysisError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Boolean verdict plus a short human-readable justification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchVerdict {
    pub is_match: bool,
    pub reason: String,
}

/// An `Err` return means the gateway is unavailable (unreachable, timed
/// out, or unparseable output); the classifier applies its conservative
/// fallback, never a silent accept.
#[async_trait]
pub trait Adjudicator: Send + Sync {
    async fn adjudicate(
        &self,
        query: &CatalogRecord,
        candidate: &CatalogRecord,
    ) -> Result<MatchVerdict>;
}

/// Chat-completions adjudicator. Works against any OpenAI-compatible
/// endpoint; the request carries a bounded timeout so a hung gateway
/// becomes a failure instead of a stalled run.
pub struct LlmAdjudicator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl LlmAdjudicator {
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AnalysisError::Adjudicator(format!("Failed to build HTTP client: {}", e))
            })?;
        Ok(Self {
            client,
            api_key,
            base_url,
            model,
        })
    }

    fn build_prompt(query: &CatalogRecord, candidate: &CatalogRecord) -> String {
        format!(
            r#"You are a product matching expert for a fragrance retailer.
Compare these two listings:

Ours: "{}" priced at {}
Competitor: "{}" priced at {}

Are they exactly the same product (same brand, same concentration EDP/EDT, same size)?
Return ONLY JSON in this exact format:
{{"is_match": true, "reason": "short explanation"}}

Only return the JSON, no other text."#,
            query.display_name, query.price, candidate.display_name, candidate.price
        )
    }

    /// Models occasionally wrap the JSON in a markdown fence despite the
    /// instructions; tolerate that before parsing.
    fn strip_code_fences(content: &str) -> &str {
        let trimmed = content.trim();
        let Some(rest) = trimmed.strip_prefix("```") else {
            return trimmed;
        };
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        let rest = rest.strip_suffix("```").unwrap_or(rest);
        rest.trim()
    }
}

#[async_trait]
impl Adjudicator for LlmAdjudicator {
    async fn adjudicate(
        &self,
        query: &CatalogRecord,
        candidate: &CatalogRecord,
    ) -> Result<MatchVerdict> {
        let prompt = Self::build_prompt(query, candidate);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": "You are a precise JSON-only responder. Always return valid JSON, no other text."},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.1,
            "max_tokens": 300
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::Adjudicator(format!("Gateway call failed: {}", e)))?;

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AnalysisError::Adjudicator(format!("Failed to parse response: {}", e)))?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                AnalysisError::Adjudicator("No content in gateway response".to_string())
            })?;

        let verdict: MatchVerdict = serde_json::from_str(Self::strip_code_fences(content))
            .map_err(|e| AnalysisError::Adjudicator(format!("Unparseable verdict: {}", e)))?;

        Ok(verdict)
    }
}

/// Stand-in when no gateway is configured. Every call reports
/// unavailability, which routes ambiguous matches through the classifier's
/// conservative fallback.
pub struct OfflineAdjudicator;

#[async_trait]
impl Adjudicator for OfflineAdjudicator {
    async fn adjudicate(
        &self,
        _query: &CatalogRecord,
        _candidate: &CatalogRecord,
    ) -> Result<MatchVerdict> {
        Err(AnalysisError::Adjudicator(
            "no adjudicator configured".to_string(),
        ))
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

    #[test]
    fn test_prompt_carries_both_listings() {
        let prompt = LlmAdjudicator::build_prompt(
            &record("Chanel No5 EDP 100ml", 450.0),
            &record("Chanel No 5 EDP 100 ml", 480.0),
        );
        assert!(prompt.contains("Chanel No5 EDP 100ml"));
        assert!(prompt.contains("Chanel No 5 EDP 100 ml"));
        assert!(prompt.contains("450"));
        assert!(prompt.contains("480"));
    }

    #[test]
    fn test_strip_code_fences() {
        let fenced = "```json\n{\"is_match\": true, \"reason\": \"same\"}\n```";
        assert_eq!(
            LlmAdjudicator::strip_code_fences(fenced),
            "{\"is_match\": true, \"reason\": \"same\"}"
        );

        let bare = "{\"is_match\": false, \"reason\": \"size differs\"}";
        assert_eq!(LlmAdjudicator::strip_code_fences(bare), bare);
    }

    #[test]
    fn test_verdict_tolerates_extra_fields() {
        // Models often add a confidence field; the contract only needs the
        // verdict and the reason.
        let verdict: MatchVerdict = serde_json::from_str(
            r#"{"is_match": true, "confidence": 90, "reason": "same brand and size"}"#,
        )
        .unwrap();
        assert!(verdict.is_match);
        assert_eq!(verdict.reason, "same brand and size");
    }

    #[tokio::test]
    async fn test_offline_adjudicator_reports_unavailable() {
        let result = OfflineAdjudicator
            .adjudicate(&record("A", 1.0), &record("B", 2.0))
            .await;
        assert!(result.is_err());
    }
}
