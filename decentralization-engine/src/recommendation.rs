use crate::engine_config::{RiskThresholds, ScoreConfig};
use crate::selection::SelectionMode;
use anyhow::bail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::str::FromStr;
use validator_pulse_common::serde_serialize::pubkey_string_conversion;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum RiskLevel {
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "medium")]
    Medium,
    #[serde(rename = "high")]
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    pub fn parse_from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            _ => bail!("Unknown risk level: {s}"),
        }
    }

    pub fn classify(stake_percentage: f64, thresholds: &RiskThresholds) -> Self {
        if stake_percentage < thresholds.low_below_percentage {
            RiskLevel::Low
        } else if stake_percentage < thresholds.medium_below_percentage {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

impl FromStr for RiskLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RiskLevel::parse_from_str(s)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `round((1 - stake_percentage / 100) * 100)`, clamped to 0..=100
pub fn decentralization_score(stake_percentage: f64) -> u8 {
    ((1.0 - stake_percentage / 100.0) * 100.0)
        .round()
        .clamp(0.0, 100.0) as u8
}

/// Linear in vote credits, `reference_vote_credits` maps to 100, capped at `performance_score_cap`.
pub fn performance_score(vote_credits: u64, config: &ScoreConfig) -> u8 {
    (vote_credits as f64 * 100.0 / config.reference_vote_credits as f64)
        .min(config.performance_score_cap)
        .round()
        .clamp(0.0, 100.0) as u8
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorRecommendation {
    #[serde(with = "pubkey_string_conversion")]
    pub vote_account: Pubkey,
    #[serde(with = "pubkey_string_conversion")]
    pub identity: Pubkey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub recommended_stake: u64,
    pub current_stake: u64,
    pub stake_percentage: f64,
    pub reason: String,
    pub risk_level: RiskLevel,
    pub decentralization_score: u8,
    pub performance_score: u8,
    pub allow_listed: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct NakamotoProjection {
    pub current: u32,
    pub projected: u32,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct StakeDistributionProjection {
    pub before: String,
    pub after: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedImpact {
    pub nakamoto_coefficient: NakamotoProjection,
    pub stake_distribution: StakeDistributionProjection,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum RecommendationSource {
    #[serde(rename = "language_model")]
    LanguageModel,
    #[serde(rename = "rule_based")]
    RuleBased,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum RecommendationStatus {
    #[default]
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "approved")]
    Approved,
    #[serde(rename = "rejected")]
    Rejected,
}

/// Community votes on a recommendation, maintained by the voting service.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct VoteTally {
    pub approve: u64,
    pub reject: u64,
    pub total: u64,
}

/// What a strategy produces. Identity and time are stamped when it becomes a [`Recommendation`].
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationDraft {
    pub validators: Vec<ValidatorRecommendation>,
    pub reasoning: String,
    pub confidence: f64,
    pub expected_impact: ExpectedImpact,
    pub source: RecommendationSource,
    pub selection_mode: SelectionMode,
}

impl RecommendationDraft {
    pub fn total_recommended_stake(&self) -> u64 {
        self.validators.iter().map(|v| v.recommended_stake).sum()
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub validators: Vec<ValidatorRecommendation>,
    pub reasoning: String,
    pub confidence: f64,
    pub expected_impact: ExpectedImpact,
    pub source: RecommendationSource,
    pub selection_mode: SelectionMode,
    pub status: RecommendationStatus,
    pub votes: VoteTally,
}

impl Recommendation {
    pub fn from_draft(draft: RecommendationDraft, id: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            timestamp,
            validators: draft.validators,
            reasoning: draft.reasoning,
            confidence: draft.confidence,
            expected_impact: draft.expected_impact,
            source: draft.source,
            selection_mode: draft.selection_mode,
            status: RecommendationStatus::Pending,
            votes: VoteTally::default(),
        }
    }

    pub fn total_recommended_stake(&self) -> u64 {
        self.validators.iter().map(|v| v.recommended_stake).sum()
    }
}
