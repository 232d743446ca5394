pub mod language_model;
pub mod rule_based;

#[cfg(test)]
mod tests;

use crate::engine_config::EngineConfig;
use crate::error::StrategyFailure;
use crate::metrics::DecentralizationMetrics;
use crate::recommendation::{
    decentralization_score, performance_score, RecommendationDraft, RiskLevel,
    ValidatorRecommendation,
};
use crate::selection::CandidatePool;
use std::future::Future;
use std::pin::Pin;
use validator_pulse_common::allow_list::{AllowList, AllowListEntry};
use validator_pulse_common::validator_record::ValidatorRecord;

/// Everything a strategy may look at while building a recommendation.
pub struct StrategyContext<'a> {
    pub validators: &'a [ValidatorRecord],
    pub metrics: &'a DecentralizationMetrics,
    pub budget_lamports: u64,
    pub pool: &'a CandidatePool<'a>,
    pub allow_list: &'a AllowList,
    pub config: &'a EngineConfig,
}

pub type StrategyFuture<'a> =
    Pin<Box<dyn Future<Output = Result<RecommendationDraft, StrategyFailure>> + Send + 'a>>;

pub trait RecommendationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn attempt<'a>(&'a self, context: &'a StrategyContext<'a>) -> StrategyFuture<'a>;
}

/// Fills in the fields every strategy derives the same way from the validator record.
/// Allow-listed validators carry the community name from their allow-list entry.
pub fn validator_recommendation(
    validator: &ValidatorRecord,
    recommended_stake: u64,
    reason: String,
    risk_level: RiskLevel,
    allow_list_entry: Option<&AllowListEntry>,
    config: &EngineConfig,
) -> ValidatorRecommendation {
    ValidatorRecommendation {
        vote_account: validator.vote_account,
        identity: validator.identity,
        name: allow_list_entry
            .map(|entry| entry.name.clone())
            .or_else(|| validator.name.clone()),
        recommended_stake,
        current_stake: validator.activated_stake,
        stake_percentage: validator.stake_percentage,
        reason,
        risk_level,
        decentralization_score: decentralization_score(validator.stake_percentage),
        performance_score: performance_score(validator.vote_credits, &config.scoring),
        allow_listed: allow_list_entry.is_some(),
    }
}

pub fn top10_description(metrics: &DecentralizationMetrics) -> String {
    format!(
        "Top 10: {:.1}%",
        metrics.top_validator_concentration.top10_percentage
    )
}
