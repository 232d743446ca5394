use crate::analysis::monitor_validators;
use crate::engine_config::ModelConfig;
use crate::error::StrategyFailure;
use crate::recommendation::{
    ExpectedImpact, NakamotoProjection, RecommendationDraft, RecommendationSource, RiskLevel,
    StakeDistributionProjection,
};
use crate::strategies::{
    top10_description, validator_recommendation, RecommendationStrategy, StrategyContext,
    StrategyFuture,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;
use std::fmt::Write;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use validator_pulse_common::utils::lamports_to_sol;

const MIN_PROMPTED_VALIDATORS: usize = 5;

pub type CompletionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, StrategyFailure>> + Send + 'a>>;

/// A text completion backend: prompt in, raw model text out.
pub trait CompletionService: Send + Sync {
    fn complete<'a>(&'a self, prompt: &'a str) -> CompletionFuture<'a>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completions over HTTP against an OpenAI compatible endpoint.
pub struct OpenAiCompletionService {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl OpenAiCompletionService {
    pub fn new(config: &ModelConfig, api_key: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// `None` when the configured environment variable holds no usable key.
    pub fn from_env(config: &ModelConfig) -> anyhow::Result<Option<Self>> {
        match config.api_key_from_env() {
            Some(api_key) => Ok(Some(Self::new(config, api_key)?)),
            None => Ok(None),
        }
    }
}

impl CompletionService for OpenAiCompletionService {
    fn complete<'a>(&'a self, prompt: &'a str) -> CompletionFuture<'a> {
        Box::pin(async move {
            let request = ChatCompletionRequest {
                model: &self.model,
                messages: vec![ChatMessage {
                    role: "user",
                    content: prompt,
                }],
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            };
            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
                .map_err(|e| StrategyFailure::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let body: String = body.chars().take(200).collect();
                return Err(StrategyFailure::Transport(format!("HTTP {status}: {body}")));
            }

            let completion: ChatCompletionResponse = response
                .json()
                .await
                .map_err(|e| StrategyFailure::MalformedResponse(e.to_string()))?;
            completion
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .filter(|content| !content.trim().is_empty())
                .ok_or_else(|| {
                    StrategyFailure::MalformedResponse("completion has no content".to_string())
                })
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelValidator {
    #[serde(alias = "pubkey", alias = "votePubkey")]
    vote_account: String,
    recommended_stake: f64,
    reason: String,
    #[serde(default)]
    risk_level: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelResponse {
    validators: Vec<ModelValidator>,
    reasoning: String,
    confidence: f64,
    #[serde(default)]
    expected_nakamoto: Option<u32>,
    #[serde(default)]
    expected_impact: Option<String>,
}

/// Asks the completion service for a delegation plan and validates it
/// against the snapshot. Any deviation fails the whole attempt.
pub struct LanguageModelStrategy {
    service: Arc<dyn CompletionService>,
    timeout: Duration,
}

impl LanguageModelStrategy {
    pub fn new(service: Arc<dyn CompletionService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }
}

impl RecommendationStrategy for LanguageModelStrategy {
    fn name(&self) -> &'static str {
        "language-model"
    }

    fn attempt<'a>(&'a self, context: &'a StrategyContext<'a>) -> StrategyFuture<'a> {
        Box::pin(async move {
            if context.pool.is_empty() {
                return Err(StrategyFailure::Unavailable(
                    "no candidates to present to the model".to_string(),
                ));
            }
            let prompt = build_prompt(context);
            debug!("Language model prompt:\n{prompt}");
            let raw = tokio::time::timeout(self.timeout, self.service.complete(&prompt))
                .await
                .map_err(|_| StrategyFailure::Timeout(self.timeout))??;
            let draft = parse_model_response(&raw, context)?;
            info!(
                "Language model recommended {} validators",
                draft.validators.len()
            );
            Ok(draft)
        })
    }
}

/// Renders network state, candidates and the expected answer format.
pub fn build_prompt(context: &StrategyContext) -> String {
    let metrics = context.metrics;
    let model = &context.config.model;
    let bands = &metrics.top_validator_concentration;
    let mut prompt = String::new();

    // writing into a String cannot fail
    let _ = writeln!(
        prompt,
        "You are an expert in Solana network decentralization. Recommend how to delegate stake so the network becomes more decentralized."
    );
    let _ = writeln!(prompt, "\nCurrent network metrics:");
    let _ = writeln!(prompt, "- Nakamoto coefficient: {}", metrics.nakamoto_coefficient);
    let _ = writeln!(prompt, "- Herfindahl index: {:.6}", metrics.herfindahl_index);
    let _ = writeln!(prompt, "- Gini coefficient: {:.4}", metrics.gini_coefficient);
    let _ = writeln!(
        prompt,
        "- Stake held by top 10 / 20 / 50 validators: {:.2}% / {:.2}% / {:.2}%",
        bands.top10_percentage, bands.top20_percentage, bands.top50_percentage
    );
    let _ = writeln!(
        prompt,
        "- Countries: {} (unknown for {} validators), datacenters: {}",
        metrics.geographic_diversity.countries,
        metrics.geographic_diversity.unknown_country,
        metrics.geographic_diversity.datacenters
    );
    let clients = &metrics.client_diversity;
    let _ = writeln!(
        prompt,
        "- Clients: agave {}, jito {}, firedancer {}, unknown {}",
        clients.agave, clients.jito, clients.firedancer, clients.unknown
    );
    let _ = writeln!(prompt, "- Validators: {}", metrics.validator_count);

    let report = monitor_validators(context.validators, metrics);
    if !report.alerts.is_empty() {
        let _ = writeln!(prompt, "\nCritical issues:");
        for alert in &report.alerts {
            let _ = writeln!(prompt, "- {alert}");
        }
    }

    let _ = writeln!(
        prompt,
        "\nStake budget: {} lamports ({:.2} SOL)",
        context.budget_lamports,
        lamports_to_sol(context.budget_lamports)
    );

    let _ = writeln!(prompt, "\nCandidate validators (ranked):");
    for (rank, candidate) in context
        .pool
        .candidates
        .iter()
        .take(model.prompt_candidates)
        .enumerate()
    {
        let validator = candidate.validator;
        let _ = writeln!(
            prompt,
            "{}. voteAccount={} stake={:.2} SOL ({:.4}%) commission={}% credits={} country={} client={}{}",
            rank + 1,
            validator.vote_account,
            lamports_to_sol(validator.activated_stake),
            validator.stake_percentage,
            validator.commission,
            validator.vote_credits,
            validator.known_country().unwrap_or("unknown"),
            validator.client_type,
            if candidate.allow_listed {
                " community=true"
            } else {
                ""
            }
        );
    }

    let _ = writeln!(
        prompt,
        "\nChoose between {} and {} of the candidates. Allocations are whole lamports and must sum to exactly {}.",
        MIN_PROMPTED_VALIDATORS.min(context.pool.len()),
        model.max_recommended_validators.min(context.pool.len()),
        context.budget_lamports
    );
    let _ = writeln!(
        prompt,
        "Answer with a single JSON object and nothing else:\n{{\"validators\": [{{\"voteAccount\": \"<base58 vote account>\", \"recommendedStake\": <lamports>, \"reason\": \"<why>\", \"riskLevel\": \"low|medium|high\"}}], \"reasoning\": \"<overall strategy>\", \"confidence\": <0..1>, \"expectedNakamoto\": <integer>, \"expectedImpact\": \"<expected top 10 concentration after delegation>\"}}"
    );
    prompt
}

/// Slice from the first `{` to the last `}`, skipping markdown fences and chatter.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

fn malformed(message: impl Into<String>) -> StrategyFailure {
    StrategyFailure::MalformedResponse(message.into())
}

/// Validates a model answer against the snapshot and the budget.
pub fn parse_model_response(
    raw: &str,
    context: &StrategyContext,
) -> Result<RecommendationDraft, StrategyFailure> {
    let config = context.config;
    let json = extract_json_object(raw).ok_or_else(|| malformed("no JSON object in response"))?;
    let response: ModelResponse =
        serde_json::from_str(json).map_err(|e| malformed(format!("invalid JSON: {e}")))?;

    if response.validators.is_empty() {
        return Err(malformed("no validators recommended"));
    }
    if response.validators.len() > config.model.max_recommended_validators {
        return Err(malformed(format!(
            "{} validators recommended, at most {} allowed",
            response.validators.len(),
            config.model.max_recommended_validators
        )));
    }
    if !(0.0..=1.0).contains(&response.confidence) {
        return Err(malformed(format!(
            "confidence {} outside [0, 1]",
            response.confidence
        )));
    }
    if response.reasoning.trim().is_empty() {
        return Err(malformed("empty reasoning"));
    }

    let expected = context.budget_lamports;
    let tolerance =
        expected as u128 * config.impact.model_allocation_tolerance_bps as u128 / 10_000;
    let max_single_stake = (expected as u128 + tolerance) as f64;

    let mut seen = HashSet::new();
    let mut validators = Vec::with_capacity(response.validators.len());
    for entry in &response.validators {
        let pubkey = Pubkey::from_str(entry.vote_account.trim())
            .map_err(|e| malformed(format!("invalid pubkey '{}': {e}", entry.vote_account)))?;
        let validator = context
            .validators
            .iter()
            .find(|v| v.vote_account == pubkey || v.identity == pubkey)
            .ok_or(StrategyFailure::UnknownValidator(pubkey))?;
        if !seen.insert(validator.vote_account) {
            return Err(malformed(format!(
                "validator {} recommended twice",
                validator.vote_account
            )));
        }
        if validator.delinquent {
            return Err(malformed(format!(
                "delinquent validator {} recommended",
                validator.vote_account
            )));
        }
        if !context
            .pool
            .candidates
            .iter()
            .any(|c| c.validator.vote_account == validator.vote_account)
        {
            return Err(StrategyFailure::IneligibleValidator(validator.vote_account));
        }
        if !entry.recommended_stake.is_finite()
            || entry.recommended_stake < 0.0
            || entry.recommended_stake > max_single_stake
        {
            return Err(malformed(format!(
                "invalid stake {} for {}",
                entry.recommended_stake, validator.vote_account
            )));
        }
        if entry.reason.trim().is_empty() {
            return Err(malformed(format!(
                "empty reason for {}",
                validator.vote_account
            )));
        }
        let risk_level = match &entry.risk_level {
            Some(level) => RiskLevel::from_str(level).map_err(|e| malformed(e.to_string()))?,
            None => RiskLevel::classify(validator.stake_percentage, &config.risk),
        };
        validators.push(validator_recommendation(
            validator,
            entry.recommended_stake.round() as u64,
            entry.reason.trim().to_string(),
            risk_level,
            context.allow_list.entry_for(validator),
            config,
        ));
    }

    let actual: u128 = validators
        .iter()
        .map(|v| v.recommended_stake as u128)
        .sum();
    if actual.abs_diff(expected as u128) > tolerance {
        return Err(StrategyFailure::AllocationMismatch {
            expected,
            actual: u64::try_from(actual).unwrap_or(u64::MAX),
        });
    }

    let current = context.metrics.nakamoto_coefficient;
    Ok(RecommendationDraft {
        validators,
        reasoning: response.reasoning.trim().to_string(),
        confidence: response.confidence,
        expected_impact: ExpectedImpact {
            nakamoto_coefficient: NakamotoProjection {
                current,
                projected: response
                    .expected_nakamoto
                    .unwrap_or_else(|| current.saturating_add(1)),
            },
            stake_distribution: StakeDistributionProjection {
                before: top10_description(context.metrics),
                after: response
                    .expected_impact
                    .filter(|text| !text.trim().is_empty())
                    .unwrap_or_else(|| "Improved distribution".to_string()),
            },
        },
        source: RecommendationSource::LanguageModel,
        selection_mode: context.pool.mode,
    })
}
