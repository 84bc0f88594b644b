//! Blocking Gemini REST client plus the optional model tier/pricing table.
//! Kept deliberately thin: list models, generate, count tokens. Everything
//! user-facing (cost confirmation, caching) lives in the session layer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no API key configured; set GEMINI_API_KEY (or GOOGLE_API_KEY)")]
    MissingApiKey,
    #[error("request to Gemini failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Gemini returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("prompt blocked by Gemini: {reason}")]
    Blocked { reason: String },
    #[error("Gemini returned no usable text ({detail})")]
    EmptyResponse { detail: String },
}

/// Read the API key from the environment. Never stored in the config file.
pub fn api_key_from_env() -> Option<String> {
    std::env::var("GEMINI_API_KEY")
        .or_else(|_| std::env::var("GOOGLE_API_KEY"))
        .ok()
        .filter(|k| !k.trim().is_empty())
}

// ── Tier / pricing table ────────────────────────────────────

/// Per-model pricing in USD per 1M tokens. Only the generic rates are
/// modeled; tiered context-length pricing collapses to the base rate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaidRates {
    #[serde(default)]
    pub input_per_1m_tokens_usd: Option<f64>,
    #[serde(default)]
    pub output_per_1m_tokens_usd: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierInfo {
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub paid_tier: Option<PaidRates>,
}

impl TierInfo {
    pub fn tier_label(&self) -> &str {
        self.tier.as_deref().unwrap_or("unknown")
    }

    /// Whether using this model may incur charges. Unknown tiers are treated
    /// as potentially paid so the user gets a confirmation prompt.
    pub fn potentially_paid(&self) -> bool {
        let tier = self.tier_label();
        tier.contains("paid") || !(tier.starts_with("free") || tier.contains("gemma"))
    }
}

pub type TierTable = HashMap<String, TierInfo>;

pub fn default_tier_table_path() -> PathBuf {
    crate::config::config_base_dir().join("model_tiers.json")
}

/// Load the tier table; a missing or malformed file is simply no pricing
/// info, not an error.
pub fn load_tier_table(path: &Path) -> TierTable {
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
        Err(_) => TierTable::default(),
    }
}

/// Estimated USD cost of a call, or None when no rates are known.
pub fn estimate_cost(rates: &PaidRates, input_tokens: u64, output_tokens: u64) -> Option<f64> {
    const TOKENS_1M: f64 = 1_000_000.0;
    let mut cost = 0.0;
    if let Some(rate) = rates.input_per_1m_tokens_usd {
        cost += input_tokens as f64 / TOKENS_1M * rate;
    }
    if let Some(rate) = rates.output_per_1m_tokens_usd {
        cost += output_tokens as f64 / TOKENS_1M * rate;
    }
    if cost > 0.0 {
        Some(cost)
    } else {
        None
    }
}

// ── Client ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub display_name: String,
    pub tier: TierInfo,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub response_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct GenerateReply {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

#[derive(Debug)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    http: reqwest::blocking::Client,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, base_url: &str) -> Result<Self, LlmError> {
        let api_key = api_key.ok_or(LlmError::MissingApiKey)?;
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Models usable for text generation, annotated from the tier table and
    /// sorted cheapest-tier-first.
    pub fn available_models(&self, tiers: &TierTable) -> Result<Vec<ModelInfo>, LlmError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("pageSize", "1000")])
            .send()?;
        let response = check_status(response)?;
        let listing: ModelListing = response.json()?;

        let mut models: Vec<ModelInfo> = listing
            .models
            .into_iter()
            .filter(|m| {
                m.supported_generation_methods
                    .iter()
                    .any(|method| method == "generateContent")
                    && !m.name.contains("vision")
            })
            .map(|m| {
                let tier = tiers.get(&m.name).cloned().unwrap_or_default();
                ModelInfo {
                    display_name: m.display_name.unwrap_or_else(|| m.name.clone()),
                    name: m.name,
                    tier,
                }
            })
            .collect();

        models.sort_by(|a, b| {
            (tier_rank(a.tier.tier_label()), a.name.as_str())
                .cmp(&(tier_rank(b.tier.tier_label()), b.name.as_str()))
        });
        Ok(models)
    }

    pub fn generate(&self, model: &str, prompt: &str) -> Result<GenerateReply, LlmError> {
        let url = format!("{}/{}:generateContent", self.base_url, model);
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![TextPart {
                    text: prompt.to_string(),
                }],
            }],
        };
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()?;
        let response = check_status(response)?;
        let reply: GenerateResponse = response.json()?;

        if let Some(feedback) = &reply.prompt_feedback {
            if let Some(reason) = &feedback.block_reason {
                return Err(LlmError::Blocked {
                    reason: feedback
                        .block_reason_message
                        .clone()
                        .unwrap_or_else(|| reason.clone()),
                });
            }
        }

        let text = reply
            .candidates
            .iter()
            .flat_map(|c| c.content.iter())
            .flat_map(|content| content.parts.iter())
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            let detail = reply
                .candidates
                .first()
                .and_then(|c| c.finish_reason.clone())
                .map(|r| format!("candidate finished with: {r}"))
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(LlmError::EmptyResponse { detail });
        }

        let usage = reply.usage_metadata.map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count.unwrap_or(0),
            response_tokens: u.candidates_token_count.unwrap_or(0),
            total_tokens: u.total_token_count.unwrap_or(0),
        });

        Ok(GenerateReply { text, usage })
    }

    pub fn count_tokens(&self, model: &str, prompt: &str) -> Result<u64, LlmError> {
        let url = format!("{}/{}:countTokens", self.base_url, model);
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![TextPart {
                    text: prompt.to_string(),
                }],
            }],
        };
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()?;
        let response = check_status(response)?;
        let counted: CountTokensResponse = response.json()?;
        Ok(counted.total_tokens.unwrap_or(0))
    }
}

fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(LlmError::Api {
        status: status.as_u16(),
        body: crate::util::truncate(&body, 300),
    })
}

/// Ordering weight for the tier label: free first, opaque tiers in the
/// middle, paid previews last.
fn tier_rank(tier: &str) -> u8 {
    if tier.starts_with("free") || tier.contains("gemma") {
        0
    } else if tier == "unknown" {
        2
    } else if tier == "paid_preview_only" {
        5
    } else if tier == "paid_preview" {
        4
    } else if tier.contains("paid") {
        3
    } else {
        2
    }
}

// ── Wire types ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelListing {
    #[serde(default)]
    models: Vec<RawModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawModel {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplyPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u64>,
    #[serde(default)]
    candidates_token_count: Option<u64>,
    #[serde(default)]
    total_token_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountTokensResponse {
    #[serde(default)]
    total_tokens: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_an_error() {
        let err = GeminiClient::new(None, "https://example.invalid").unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey));
    }

    #[test]
    fn tier_rank_orders_free_before_paid() {
        assert!(tier_rank("free") < tier_rank("unknown"));
        assert!(tier_rank("unknown") < tier_rank("paid"));
        assert!(tier_rank("paid") < tier_rank("paid_preview"));
        assert!(tier_rank("paid_preview") < tier_rank("paid_preview_only"));
        assert_eq!(tier_rank("free_gemma"), 0);
    }

    #[test]
    fn unknown_tier_counts_as_potentially_paid() {
        assert!(TierInfo::default().potentially_paid());
        let free = TierInfo {
            tier: Some("free".into()),
            ..Default::default()
        };
        assert!(!free.potentially_paid());
        let paid = TierInfo {
            tier: Some("paid".into()),
            ..Default::default()
        };
        assert!(paid.potentially_paid());
    }

    #[test]
    fn cost_estimate_uses_both_rates() {
        let rates = PaidRates {
            input_per_1m_tokens_usd: Some(0.50),
            output_per_1m_tokens_usd: Some(1.50),
        };
        let cost = estimate_cost(&rates, 1_000_000, 2_000_000).unwrap();
        assert!((cost - 3.50).abs() < 1e-9);
        assert!(estimate_cost(&PaidRates::default(), 100, 100).is_none());
    }

    #[test]
    fn tier_table_tolerates_missing_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_tier_table(&dir.path().join("absent.json")).is_empty());

        let path = dir.path().join("tiers.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(load_tier_table(&path).is_empty());

        std::fs::write(
            &path,
            r#"{"models/gemini-x": {"tier": "free", "notes": "n"}}"#,
        )
        .unwrap();
        let table = load_tier_table(&path);
        assert_eq!(table["models/gemini-x"].tier_label(), "free");
    }

    #[test]
    fn generate_response_parses_candidate_text() {
        let raw = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "hello "}, {"text": "world"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 5, "candidatesTokenCount": 2, "totalTokenCount": 7}
        }"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        let text: String = parsed
            .candidates
            .iter()
            .flat_map(|c| c.content.iter())
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .collect();
        assert_eq!(text, "hello world");
        assert_eq!(parsed.usage_metadata.unwrap().total_token_count, Some(7));
    }
}
