use crate::error::StrategyFailure;
use crate::recommendation::{
    ExpectedImpact, NakamotoProjection, RecommendationDraft, RecommendationSource, RiskLevel,
    StakeDistributionProjection,
};
use crate::selection::{Candidate, SelectionMode};
use crate::strategies::{
    top10_description, validator_recommendation, RecommendationStrategy, StrategyContext,
    StrategyFuture,
};
use log::info;
use validator_pulse_common::utils::lamports_to_sol;

/// Splits `budget` into `parts` equal shares, the remainder goes one lamport each
/// to the first shares so the sum is exactly `budget`.
pub fn equal_split(budget: u64, parts: usize) -> Vec<u64> {
    if parts == 0 {
        return vec![];
    }
    let parts_u64 = parts as u64;
    let base = budget / parts_u64;
    let remainder = (budget % parts_u64) as usize;
    (0..parts)
        .map(|index| if index < remainder { base + 1 } else { base })
        .collect()
}

fn candidate_reason(candidate: &Candidate, mode: SelectionMode) -> String {
    let validator = candidate.validator;
    let mut reasons = vec![match mode {
        SelectionMode::Ranked => format!(
            "Low stake concentration ({:.3}% of network)",
            validator.stake_percentage
        ),
        SelectionMode::Relaxed => format!(
            "Among the lowest stake shares of active validators ({:.3}% of network)",
            validator.stake_percentage
        ),
    }];
    reasons.push(format!("{}% commission", validator.commission));
    if candidate.score.geographic_bonus > 0.0 {
        if let Some(country) = validator.known_country() {
            reasons.push(format!("adds geographic diversity ({country})"));
        }
    }
    if candidate.score.client_bonus > 0.0 {
        reasons.push(format!("runs the less common {} client", validator.client_type));
    }
    if candidate.allow_listed {
        reasons.push("community validator".to_string());
    }
    reasons.join(", ")
}

/// Top-10 concentration once the budget is staked outside the top 10.
fn diluted_top10_percentage(top10_percentage: f64, total_stake: u64, budget: u64) -> f64 {
    let total = total_stake as f64;
    let diluted_total = total + budget as f64;
    if diluted_total <= 0.0 {
        return 0.0;
    }
    top10_percentage * total / diluted_total
}

/// Deterministic recommendation: equal split of the budget over the candidate pool.
/// Same context in, same draft out.
pub fn build_rule_based_recommendation(context: &StrategyContext) -> RecommendationDraft {
    let config = context.config;
    let metrics = context.metrics;
    let pool = context.pool;
    let allocations = equal_split(context.budget_lamports, pool.len());

    let validators = pool
        .candidates
        .iter()
        .zip(allocations)
        .map(|(candidate, recommended_stake)| {
            validator_recommendation(
                candidate.validator,
                recommended_stake,
                candidate_reason(candidate, pool.mode),
                RiskLevel::classify(candidate.validator.stake_percentage, &config.risk),
                context.allow_list.entry_for(candidate.validator),
                config,
            )
        })
        .collect::<Vec<_>>();

    let current = metrics.nakamoto_coefficient;
    let projected = current.saturating_add(config.impact.fallback_nakamoto_increment);
    let top10 = metrics.top_validator_concentration.top10_percentage;
    let top10_after = diluted_top10_percentage(top10, metrics.total_stake, context.budget_lamports);

    let mut reasoning = format!(
        "Distributing {:.2} SOL evenly across {} validators with low stake concentration to improve decentralization.",
        lamports_to_sol(context.budget_lamports),
        validators.len()
    );
    let allow_listed = pool.allow_listed_count();
    if allow_listed > 0 {
        reasoning.push_str(&format!(
            " {allow_listed} of them are community validators."
        ));
    }
    if pool.mode == SelectionMode::Relaxed {
        reasoning.push_str(
            " No validator met the standard eligibility criteria, candidates are the active validators with the lowest stake share.",
        );
    }
    reasoning.push_str(&format!(
        " Projected Nakamoto coefficient: {current} -> {projected}."
    ));

    let confidence = match pool.mode {
        SelectionMode::Ranked => config.impact.fallback_confidence,
        SelectionMode::Relaxed => config.impact.relaxed_confidence,
    };

    info!(
        "Rule-based recommendation over {} validators ({:?} selection)",
        validators.len(),
        pool.mode
    );
    RecommendationDraft {
        validators,
        reasoning,
        confidence,
        expected_impact: ExpectedImpact {
            nakamoto_coefficient: NakamotoProjection { current, projected },
            stake_distribution: StakeDistributionProjection {
                before: top10_description(metrics),
                after: format!("Top 10: {top10_after:.1}% (estimated)"),
            },
        },
        source: RecommendationSource::RuleBased,
        selection_mode: pool.mode,
    }
}

/// The rule-based builder behind the strategy interface.
pub struct RuleBasedStrategy;

impl RecommendationStrategy for RuleBasedStrategy {
    fn name(&self) -> &'static str {
        "rule-based"
    }

    fn attempt<'a>(&'a self, context: &'a StrategyContext<'a>) -> StrategyFuture<'a> {
        Box::pin(async move { Ok::<_, StrategyFailure>(build_rule_based_recommendation(context)) })
    }
}
