//! Per-invocation model session. Built once from config + saved state, owns
//! the client, the resolved model, its tier info, and the response cache;
//! there is no process-global model instance to invalidate.

use anyhow::{Context, Result};
use colored::Colorize;
use std::io::Write;

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::llm::{self, estimate_cost, GeminiClient, LlmError, TierInfo, TierTable};
use crate::state::AgentState;

/// Outcome of sending a prompt. Hard failures (transport, blocked prompt,
/// empty reply) surface as errors; `Declined` is the recoverable
/// user-message case.
#[derive(Debug)]
pub enum PromptOutcome {
    /// Fresh answer from the model.
    Answer(String),
    /// Answer served from the response cache; no API call was made.
    Cached(String),
    /// The user declined the cost confirmation.
    Declined(String),
}

impl PromptOutcome {
    pub fn text(&self) -> &str {
        match self {
            PromptOutcome::Answer(t) | PromptOutcome::Cached(t) | PromptOutcome::Declined(t) => t,
        }
    }
}

pub struct Session {
    client: GeminiClient,
    pub model: String,
    tier: TierInfo,
    cache: Option<ResponseCache>,
    assume_yes: bool,
    verbose: u8,
}

impl Session {
    /// Resolve the model (saved selection, configured default, or the first
    /// free-tier model from the API — persisted for next time) and build the
    /// session.
    pub fn open(
        config: &Config,
        state: &mut AgentState,
        assume_yes: bool,
        verbose: u8,
    ) -> Result<Self> {
        let client = GeminiClient::new(llm::api_key_from_env(), &config.llm.api_base)?;
        let tiers = llm::load_tier_table(&llm::default_tier_table_path());

        let model = match state
            .selected_model
            .clone()
            .or_else(|| config.llm.default_model.clone())
        {
            Some(model) => model,
            None => {
                let model = auto_select_model(&client, &tiers)?;
                println!(
                    "{}",
                    format!("No model selected; using '{model}' automatically.").yellow()
                );
                state.selected_model = Some(model.clone());
                state
                    .save()
                    .context("Failed to persist the auto-selected model")?;
                model
            }
        };

        let tier = tiers.get(&model).cloned().unwrap_or_default();
        let cache = config.cache.enabled.then(|| {
            ResponseCache::new(
                ResponseCache::default_store_path(),
                config.cache.expiration_seconds,
            )
        });

        Ok(Self {
            client,
            model,
            tier,
            cache,
            assume_yes,
            verbose,
        })
    }

    /// Send a prompt, bracketed by a cache lookup and store. Potentially-paid
    /// models trigger a cost warning and confirmation first.
    pub fn send(&self, prompt: &str) -> Result<PromptOutcome, LlmError> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(prompt, &self.model) {
                if self.verbose > 0 {
                    eprintln!("{}", "response served from cache".dimmed());
                }
                return Ok(PromptOutcome::Cached(hit));
            }
        }

        if self.tier.potentially_paid() && !self.assume_yes {
            self.print_cost_warning(prompt);
            if !confirm("Continue and potentially incur costs?") {
                return Ok(PromptOutcome::Declined(
                    "Operation cancelled to avoid costs.".to_string(),
                ));
            }
        }

        println!("{}", "Querying Gemini...".blue().italic());
        let reply = self.client.generate(&self.model, prompt)?;

        if let Some(usage) = reply.usage {
            println!(
                "Token usage: {} prompt + {} response = {} total",
                usage.prompt_tokens, usage.response_tokens, usage.total_tokens
            );
            if self.tier.potentially_paid() {
                if let Some(rates) = &self.tier.paid_tier {
                    if let Some(cost) =
                        estimate_cost(rates, usage.prompt_tokens, usage.response_tokens)
                    {
                        println!("{}", format!("Estimated cost: ${cost:.6}").red());
                    }
                }
            }
        }

        if let Some(cache) = &self.cache {
            cache.set(prompt, &self.model, &reply.text);
        }
        Ok(PromptOutcome::Answer(reply.text))
    }

    fn print_cost_warning(&self, prompt: &str) {
        println!();
        println!("{}", "⚠ potential cost warning".yellow().bold());
        println!("  Model: {}", self.model.cyan());
        println!("  Tier : {}", self.tier.tier_label());
        if let Some(notes) = &self.tier.notes {
            println!("  Notes: {notes}");
        }

        // Prefer the API's count; fall back to the chars/4 estimate.
        let tokens = self
            .client
            .count_tokens(&self.model, prompt)
            .unwrap_or_else(|_| crate::prompt::estimate_tokens(prompt) as u64);
        println!("  Estimated prompt tokens: {tokens}");
        if let Some(rates) = &self.tier.paid_tier {
            if let Some(cost) = estimate_cost(rates, tokens, 0) {
                println!(
                    "  {}",
                    format!("Minimum estimated cost (input only): ${cost:.6}").red()
                );
            }
        }
    }
}

/// Pick the first free-tier model from the API listing, or the overall first
/// when no free one exists.
fn auto_select_model(client: &GeminiClient, tiers: &TierTable) -> Result<String, LlmError> {
    let models = client.available_models(tiers)?;
    let chosen = models
        .iter()
        .find(|m| m.tier.tier_label().starts_with("free"))
        .or_else(|| models.first())
        .ok_or_else(|| LlmError::EmptyResponse {
            detail: "model listing came back empty".to_string(),
        })?;
    Ok(chosen.name.clone())
}

fn confirm(question: &str) -> bool {
    print!("{question} [y/N] ");
    let _ = std::io::stdout().flush();
    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
