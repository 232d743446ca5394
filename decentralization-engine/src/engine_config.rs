use anyhow::{anyhow, ensure};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use validator_pulse_common::utils::{read_from_yaml_file, LAMPORTS_PER_SOL};

pub const PLACEHOLDER_API_KEY: &str = "your_openai_key_here";

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub selection: SelectionConfig,
    pub risk: RiskThresholds,
    pub scoring: ScoreConfig,
    pub impact: ImpactConfig,
    pub model: ModelConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.selection.validate()?;
        self.risk.validate()?;
        self.scoring.validate()?;
        self.impact.validate()?;
        self.model.validate()
    }
}

pub fn load_engine_config<P: AsRef<Path>>(path: &P) -> anyhow::Result<EngineConfig> {
    let config: EngineConfig = read_from_yaml_file(path)?;
    config.validate()?;
    info!("Loaded engine configuration from {}", path.as_ref().display());
    Ok(config)
}

/// Point budget of the four ranking factors.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ScoringWeights {
    pub decentralization: f64,
    pub performance: f64,
    pub geographic: f64,
    pub client: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            decentralization: 40.0,
            performance: 30.0,
            geographic: 15.0,
            client: 15.0,
        }
    }
}

impl ScoringWeights {
    pub fn total(&self) -> f64 {
        self.decentralization + self.performance + self.geographic + self.client
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SelectionConfig {
    /// validators at or below this stake are considered dust and skipped
    pub min_activated_stake_lamports: u64,
    /// stake share (in percent) at or above which a validator is already too big
    pub max_stake_percentage: f64,
    /// inclusive
    pub max_commission: u8,
    pub candidate_pool_size: usize,
    pub min_quota_fraction: f64,
    pub weights: ScoringWeights,
    /// vote credits at which the performance term is saturated
    pub performance_credits_cap: u64,
    pub over_represented_region_threshold: f64,
    pub dominant_client_threshold: f64,
    pub allow_list_bonus: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_activated_stake_lamports: LAMPORTS_PER_SOL,
            max_stake_percentage: 1.0,
            max_commission: 10,
            candidate_pool_size: 10,
            min_quota_fraction: 0.2,
            weights: ScoringWeights::default(),
            performance_credits_cap: 200_000,
            over_represented_region_threshold: 0.30,
            dominant_client_threshold: 0.60,
            allow_list_bonus: 10.0,
        }
    }
}

impl SelectionConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.max_stake_percentage > 0.0 && self.max_stake_percentage <= 100.0,
            "selection.max_stake_percentage must be within (0, 100], got {}",
            self.max_stake_percentage
        );
        ensure!(
            self.max_commission <= 100,
            "selection.max_commission must be a percentage, got {}",
            self.max_commission
        );
        ensure!(
            self.candidate_pool_size > 0,
            "selection.candidate_pool_size must be positive"
        );
        ensure!(
            (0.0..=1.0).contains(&self.min_quota_fraction),
            "selection.min_quota_fraction must be within [0, 1], got {}",
            self.min_quota_fraction
        );
        ensure!(
            (0.0..=1.0).contains(&self.over_represented_region_threshold),
            "selection.over_represented_region_threshold must be within [0, 1], got {}",
            self.over_represented_region_threshold
        );
        ensure!(
            (0.0..=1.0).contains(&self.dominant_client_threshold),
            "selection.dominant_client_threshold must be within [0, 1], got {}",
            self.dominant_client_threshold
        );
        ensure!(
            self.performance_credits_cap > 0,
            "selection.performance_credits_cap must be positive"
        );
        ensure!(
            self.allow_list_bonus >= 0.0,
            "selection.allow_list_bonus must not be negative"
        );
        let weights = &self.weights;
        ensure!(
            [
                weights.decentralization,
                weights.performance,
                weights.geographic,
                weights.client
            ]
            .iter()
            .all(|w| w.is_finite() && *w >= 0.0),
            "selection.weights must be finite and non-negative: {weights:?}"
        );
        ensure!(
            weights.total() > 0.0,
            "selection.weights must not all be zero"
        );
        Ok(())
    }

    /// Number of allow-listed validators a pool of `pool_size` has to contain.
    pub fn required_quota(&self, pool_size: usize) -> usize {
        // epsilon keeps 0.1 * 30 style float products from rounding up to an extra slot
        let required = (pool_size as f64 * self.min_quota_fraction - 1e-9).ceil();
        if required <= 0.0 {
            0
        } else {
            (required as usize).min(pool_size)
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RiskThresholds {
    pub low_below_percentage: f64,
    pub medium_below_percentage: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low_below_percentage: 0.1,
            medium_below_percentage: 0.5,
        }
    }
}

impl RiskThresholds {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.low_below_percentage > 0.0
                && self.low_below_percentage <= self.medium_below_percentage,
            "risk thresholds must satisfy 0 < low_below_percentage ({}) <= medium_below_percentage ({})",
            self.low_below_percentage,
            self.medium_below_percentage
        );
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ScoreConfig {
    /// highest performance score a validator can be given
    pub performance_score_cap: f64,
    /// vote credits mapped to a score of 100 before the cap applies
    pub reference_vote_credits: u64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            performance_score_cap: 95.0,
            reference_vote_credits: 200_000,
        }
    }
}

impl ScoreConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            (0.0..=100.0).contains(&self.performance_score_cap),
            "scoring.performance_score_cap must be within [0, 100], got {}",
            self.performance_score_cap
        );
        ensure!(
            self.reference_vote_credits > 0,
            "scoring.reference_vote_credits must be positive"
        );
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ImpactConfig {
    pub fallback_nakamoto_increment: u32,
    pub fallback_confidence: f64,
    pub relaxed_confidence: f64,
    /// how far a model allocation may drift from the budget
    pub model_allocation_tolerance_bps: u64,
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self {
            fallback_nakamoto_increment: 2,
            fallback_confidence: 0.75,
            relaxed_confidence: 0.5,
            model_allocation_tolerance_bps: 10,
        }
    }
}

impl ImpactConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("fallback_confidence", self.fallback_confidence),
            ("relaxed_confidence", self.relaxed_confidence),
        ] {
            ensure!(
                (0.0..=1.0).contains(&value),
                "impact.{name} must be within [0, 1], got {value}"
            );
        }
        ensure!(
            self.model_allocation_tolerance_bps <= 10_000,
            "impact.model_allocation_tolerance_bps must not exceed 10000"
        );
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// OpenAI compatible chat completions endpoint
    pub endpoint: String,
    pub model: String,
    /// environment variable holding the API key
    pub api_key_env: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub prompt_candidates: usize,
    pub max_recommended_validators: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.8,
            max_tokens: 1500,
            timeout_secs: 30,
            prompt_candidates: 15,
            max_recommended_validators: 15,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.timeout_secs > 0,
            "model.timeout_secs must be positive, a language model call has to be bounded"
        );
        ensure!(
            self.max_recommended_validators > 0,
            "model.max_recommended_validators must be positive"
        );
        ensure!(
            (0.0..=2.0).contains(&self.temperature),
            "model.temperature must be within [0, 2], got {}",
            self.temperature
        );
        reqwest::Url::parse(&self.endpoint)
            .map_err(|e| anyhow!("model.endpoint '{}' is not a valid URL: {e}", self.endpoint))?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Reads the API key from the configured environment variable.
    /// Missing, blank and placeholder keys all mean no model is available.
    pub fn api_key_from_env(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| is_usable_api_key(key))
    }
}

pub fn is_usable_api_key(key: &str) -> bool {
    let key = key.trim();
    !key.is_empty() && key != PLACEHOLDER_API_KEY
}
