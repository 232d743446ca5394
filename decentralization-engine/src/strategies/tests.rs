use crate::engine_config::EngineConfig;
use crate::error::StrategyFailure;
use crate::orchestrator::RecommendationOrchestrator;
use crate::metrics::{compute_metrics, DecentralizationMetrics};
use crate::recommendation::{RecommendationSource, RiskLevel};
use crate::selection::{select_candidates, CandidatePool, SelectionMode};
use crate::strategies::language_model::{
    build_prompt, parse_model_response, LanguageModelStrategy,
};
use crate::strategies::rule_based::{
    build_rule_based_recommendation, equal_split, RuleBasedStrategy,
};
use crate::strategies::{RecommendationStrategy, StrategyContext};
use crate::test_utils::{
    model_answer, snapshot, test_network, test_vote_account, CannedCompletion,
    FailingCompletion, HangingCompletion, RecordingCompletion, ValidatorParams, SOL,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use validator_pulse_common::allow_list::{AllowList, AllowListEntry};
use validator_pulse_common::validator_record::ValidatorRecord;

const BUDGET: u64 = 1_000_000;

struct Fixture {
    validators: Vec<ValidatorRecord>,
    metrics: DecentralizationMetrics,
    config: EngineConfig,
    allow_list: AllowList,
}

impl Fixture {
    fn new(validators: Vec<ValidatorRecord>) -> Self {
        let metrics = compute_metrics(&validators);
        Self {
            validators,
            metrics,
            config: EngineConfig::default(),
            allow_list: AllowList::default(),
        }
    }

    fn pool(&self) -> CandidatePool<'_> {
        select_candidates(&self.validators, &self.allow_list, &self.config.selection)
    }

    fn context<'a>(&'a self, pool: &'a CandidatePool<'a>, budget_lamports: u64) -> StrategyContext<'a> {
        StrategyContext {
            validators: &self.validators,
            metrics: &self.metrics,
            budget_lamports,
            pool,
            allow_list: &self.allow_list,
            config: &self.config,
        }
    }
}

#[test]
fn test_equal_split() {
    assert_eq!(equal_split(1_000_000, 10), vec![100_000; 10]);
    assert_eq!(equal_split(10, 3), vec![4, 3, 3]);
    assert_eq!(equal_split(2, 5), vec![1, 1, 0, 0, 0]);
    assert!(equal_split(5, 0).is_empty());
    let split = equal_split(u64::MAX, 7);
    assert_eq!(split.iter().map(|s| *s as u128).sum::<u128>(), u64::MAX as u128);
}

#[test]
fn test_rule_based_recommendation() {
    // -- SETUP
    let fixture = Fixture::new(test_network());
    let pool = fixture.pool();
    let context = fixture.context(&pool, BUDGET);

    // -- TEST
    let draft = build_rule_based_recommendation(&context);

    // -- VERIFY
    assert_eq!(draft.validators.len(), 10);
    assert!(draft
        .validators
        .iter()
        .all(|v| v.recommended_stake == 100_000));
    assert_eq!(draft.total_recommended_stake(), BUDGET);
    assert_eq!(draft.source, RecommendationSource::RuleBased);
    assert_eq!(draft.selection_mode, SelectionMode::Ranked);
    assert_eq!(draft.confidence, 0.75);
    assert_eq!(draft.expected_impact.nakamoto_coefficient.current, 1);
    assert_eq!(draft.expected_impact.nakamoto_coefficient.projected, 3);
    assert!(draft
        .expected_impact
        .stake_distribution
        .after
        .ends_with("(estimated)"));

    let candidates = pool.validators();
    for (recommendation, validator) in draft.validators.iter().zip(candidates) {
        assert_eq!(recommendation.vote_account, validator.vote_account);
        assert_eq!(recommendation.current_stake, validator.activated_stake);
        assert_eq!(recommendation.risk_level, RiskLevel::Low);
        assert_eq!(recommendation.decentralization_score, 100);
        assert!(recommendation.performance_score <= 95);
        assert!(recommendation.reason.starts_with("Low stake concentration"));
        assert!(!validator.delinquent);
    }
}

#[test]
fn test_rule_based_is_deterministic() {
    let fixture = Fixture::new(test_network());
    let first_pool = fixture.pool();
    let first = build_rule_based_recommendation(&fixture.context(&first_pool, 7_777_777));

    let second_fixture = Fixture::new(test_network());
    let second_pool = second_fixture.pool();
    let second =
        build_rule_based_recommendation(&second_fixture.context(&second_pool, 7_777_777));

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_eq!(first.total_recommended_stake(), 7_777_777);
}

#[test]
fn test_rule_based_risk_levels_follow_stake_share() {
    let fixture = Fixture::new(snapshot(vec![
        ValidatorParams::new(1).stake(600 * SOL),
        ValidatorParams::new(2).stake(300 * SOL),
        ValidatorParams::new(3).stake(100 * SOL),
    ]));
    let pool = fixture.pool();
    assert!(pool.is_relaxed());

    let draft = build_rule_based_recommendation(&fixture.context(&pool, 3 * SOL));

    assert_eq!(draft.selection_mode, SelectionMode::Relaxed);
    assert_eq!(draft.confidence, 0.5);
    assert!(draft.reasoning.contains("lowest stake share"));
    assert!(draft
        .validators
        .iter()
        .all(|v| v.risk_level == RiskLevel::High));
    assert_eq!(draft.validators[0].vote_account, test_vote_account(3));
    assert_eq!(draft.validators[0].decentralization_score, 90);
    assert!(draft
        .validators
        .iter()
        .all(|v| v.reason.starts_with("Among the lowest stake shares")));
}

#[tokio::test]
async fn test_rule_based_strategy_interface() {
    let fixture = Fixture::new(test_network());
    let pool = fixture.pool();
    let context = fixture.context(&pool, BUDGET);

    let draft = RuleBasedStrategy.attempt(&context).await.unwrap();

    assert_eq!(draft, build_rule_based_recommendation(&context));
}

#[tokio::test]
async fn test_language_model_recommendation() {
    // -- SETUP
    let fixture = Fixture::new(test_network());
    let pool = fixture.pool();
    let context = fixture.context(&pool, BUDGET);
    let candidates = pool.validators();
    let picked = &candidates[..6];
    let service = Arc::new(RecordingCompletion::new(model_answer(picked, BUDGET, 4)));
    let strategy = LanguageModelStrategy::new(service.clone(), Duration::from_secs(5));

    // -- TEST
    let draft = strategy.attempt(&context).await.unwrap();

    // -- VERIFY
    assert_eq!(draft.source, RecommendationSource::LanguageModel);
    assert_eq!(draft.validators.len(), 6);
    assert_eq!(draft.total_recommended_stake(), BUDGET);
    assert_eq!(draft.confidence, 0.82);
    assert_eq!(draft.expected_impact.nakamoto_coefficient.projected, 4);
    assert_eq!(
        draft.expected_impact.stake_distribution.after,
        "Top 10 concentration drops slightly"
    );
    for (recommendation, validator) in draft.validators.iter().zip(picked) {
        assert_eq!(recommendation.vote_account, validator.vote_account);
        assert_eq!(recommendation.risk_level, RiskLevel::Low);
    }

    let prompts = service.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains(&format!("must sum to exactly {BUDGET}")));
    for validator in pool.validators() {
        assert!(prompts[0].contains(&validator.vote_account.to_string()));
    }
}

#[tokio::test]
async fn test_language_model_transport_failure() {
    let fixture = Fixture::new(test_network());
    let pool = fixture.pool();
    let context = fixture.context(&pool, BUDGET);
    let strategy = LanguageModelStrategy::new(Arc::new(FailingCompletion), Duration::from_secs(5));

    let result = strategy.attempt(&context).await;

    assert!(matches!(result, Err(StrategyFailure::Transport(_))));
}

#[tokio::test]
async fn test_language_model_timeout() {
    let fixture = Fixture::new(test_network());
    let pool = fixture.pool();
    let context = fixture.context(&pool, BUDGET);
    let timeout = Duration::from_millis(50);
    let strategy = LanguageModelStrategy::new(Arc::new(HangingCompletion), timeout);

    let result = strategy.attempt(&context).await;

    assert!(matches!(result, Err(StrategyFailure::Timeout(t)) if t == timeout));
}

#[tokio::test]
async fn test_language_model_garbage_answer() {
    let fixture = Fixture::new(test_network());
    let pool = fixture.pool();
    let context = fixture.context(&pool, BUDGET);
    let strategy = LanguageModelStrategy::new(
        Arc::new(CannedCompletion(
            "I think you should stake with the smaller validators.".to_string(),
        )),
        Duration::from_secs(5),
    );

    let result = strategy.attempt(&context).await;

    assert!(matches!(result, Err(StrategyFailure::MalformedResponse(_))));
}

#[test]
fn test_parse_rejects_unknown_validator() {
    let fixture = Fixture::new(test_network());
    let pool = fixture.pool();
    let context = fixture.context(&pool, BUDGET);
    let stranger = ValidatorParams::new(777).build();
    let mut picked = pool.validators()[..4].to_vec();
    picked.push(&stranger);

    let result = parse_model_response(&model_answer(&picked, BUDGET, 3), &context);

    assert!(
        matches!(result, Err(StrategyFailure::UnknownValidator(pubkey)) if pubkey == stranger.vote_account)
    );
}

#[test]
fn test_parse_rejects_allocation_mismatch() {
    let fixture = Fixture::new(test_network());
    let pool = fixture.pool();
    let context = fixture.context(&pool, BUDGET);
    let candidates = pool.validators();
    let picked = &candidates[..5];

    let result = parse_model_response(&model_answer(picked, BUDGET / 2, 3), &context);

    assert!(matches!(
        result,
        Err(StrategyFailure::AllocationMismatch {
            expected: BUDGET,
            actual
        }) if actual == BUDGET / 2
    ));

    // drift within 10 bps is accepted
    let result = parse_model_response(&model_answer(picked, BUDGET - 1_000, 3), &context);
    assert!(result.is_ok());
}

#[test]
fn test_parse_rejects_invalid_fields() {
    let fixture = Fixture::new(test_network());
    let pool = fixture.pool();
    let context = fixture.context(&pool, BUDGET);
    let vote_account = pool.validators()[0].vote_account.to_string();
    let delinquent = fixture
        .validators
        .iter()
        .find(|v| v.delinquent)
        .unwrap()
        .vote_account
        .to_string();

    let entry = |account: &str, stake: serde_json::Value, reason: &str, risk: &str| {
        json!({"voteAccount": account, "recommendedStake": stake, "reason": reason, "riskLevel": risk})
    };
    let answer = |validators: Vec<serde_json::Value>, confidence: f64| {
        json!({"validators": validators, "reasoning": "because", "confidence": confidence})
            .to_string()
    };

    let cases = vec![
        ("confidence", answer(vec![entry(&vote_account, json!(BUDGET), "ok", "low")], 1.5)),
        ("empty", answer(vec![], 0.5)),
        ("reason", answer(vec![entry(&vote_account, json!(BUDGET), " ", "low")], 0.5)),
        ("risk", answer(vec![entry(&vote_account, json!(BUDGET), "ok", "extreme")], 0.5)),
        ("negative", answer(vec![entry(&vote_account, json!(-5), "ok", "low")], 0.5)),
        ("pubkey", answer(vec![entry("not-a-key", json!(BUDGET), "ok", "low")], 0.5)),
        (
            "duplicate",
            answer(
                vec![
                    entry(&vote_account, json!(BUDGET / 2), "ok", "low"),
                    entry(&vote_account, json!(BUDGET / 2), "ok", "low"),
                ],
                0.5,
            ),
        ),
        ("delinquent", answer(vec![entry(&delinquent, json!(BUDGET), "ok", "low")], 0.5)),
        (
            "missing reasoning",
            json!({"validators": [entry(&vote_account, json!(BUDGET), "ok", "low")], "confidence": 0.5})
                .to_string(),
        ),
    ];

    for (name, raw) in cases {
        let result = parse_model_response(&raw, &context);
        assert!(
            matches!(result, Err(StrategyFailure::MalformedResponse(_))),
            "case '{name}' should be malformed"
        );
    }
}

#[test]
fn test_parse_defaults_optional_fields() {
    let fixture = Fixture::new(test_network());
    let pool = fixture.pool();
    let context = fixture.context(&pool, BUDGET);
    let validator = pool.validators()[0];
    let raw = json!({
        "validators": [{"pubkey": validator.vote_account.to_string(), "recommendedStake": 1e6, "reason": "small"}],
        "reasoning": "single pick",
        "confidence": 0.4,
    })
    .to_string();

    let draft = parse_model_response(&raw, &context).unwrap();

    assert_eq!(draft.validators[0].recommended_stake, BUDGET);
    assert_eq!(draft.validators[0].risk_level, RiskLevel::Low);
    assert_eq!(draft.expected_impact.nakamoto_coefficient.projected, 2);
    assert_eq!(
        draft.expected_impact.stake_distribution.after,
        "Improved distribution"
    );
}

#[test]
fn test_prompt_lists_critical_issues() {
    let fixture = Fixture::new(test_network());
    let pool = fixture.pool();
    let context = fixture.context(&pool, BUDGET);

    let prompt = build_prompt(&context);

    assert!(prompt.contains("Nakamoto coefficient: 1"));
    assert!(prompt.contains("Critical issues:"));
    assert!(prompt.contains("Nakamoto coefficient 1 is below 30"));
    assert!(prompt.contains("\"voteAccount\""));
}

#[tokio::test]
async fn test_oversized_allocations_fall_back() {
    // -- SETUP
    let validators = test_network();
    let metrics = compute_metrics(&validators);
    let fixture = Fixture::new(test_network());
    let pool = fixture.pool();
    let context = fixture.context(&pool, BUDGET);
    let candidates = pool.validators();
    let raw = json!({
        "validators": [
            {"voteAccount": candidates[0].vote_account.to_string(), "recommendedStake": 1e19, "reason": "big"},
            {"voteAccount": candidates[1].vote_account.to_string(), "recommendedStake": 1e19, "reason": "big"},
        ],
        "reasoning": "everything everywhere",
        "confidence": 0.9,
    })
    .to_string();

    // -- TEST
    let parsed = parse_model_response(&raw, &context);
    let recommendation = RecommendationOrchestrator::new(EngineConfig::default(), AllowList::default())
        .unwrap()
        .with_completion_service(Arc::new(CannedCompletion(raw)))
        .generate_recommendation(&validators, &metrics, BUDGET)
        .await
        .unwrap();

    // -- VERIFY
    assert!(matches!(parsed, Err(StrategyFailure::MalformedResponse(_))));
    assert_eq!(recommendation.source, RecommendationSource::RuleBased);
    assert_eq!(recommendation.total_recommended_stake(), BUDGET);
}

#[tokio::test]
async fn test_model_pick_outside_pool_falls_back() {
    // -- SETUP
    let validators = test_network();
    let metrics = compute_metrics(&validators);
    let fixture = Fixture::new(test_network());
    let pool = fixture.pool();
    let context = fixture.context(&pool, BUDGET);
    let whale = fixture
        .validators
        .iter()
        .max_by_key(|v| v.activated_stake)
        .unwrap();
    let raw = model_answer(&[whale], BUDGET, 2);

    // -- TEST
    let parsed = parse_model_response(&raw, &context);
    let recommendation = RecommendationOrchestrator::new(EngineConfig::default(), AllowList::default())
        .unwrap()
        .with_completion_service(Arc::new(CannedCompletion(raw)))
        .generate_recommendation(&validators, &metrics, BUDGET)
        .await
        .unwrap();

    // -- VERIFY
    assert!(
        matches!(parsed, Err(StrategyFailure::IneligibleValidator(pubkey)) if pubkey == whale.vote_account)
    );
    assert_eq!(recommendation.source, RecommendationSource::RuleBased);
    assert!(recommendation
        .validators
        .iter()
        .all(|v| v.vote_account != whale.vote_account));
}

#[test]
fn test_allow_listed_recommendation_carries_community_name() {
    // -- SETUP
    let mut fixture = Fixture::new(test_network());
    let community_vote_account = {
        let pool = fixture.pool();
        pool.validators()[3].vote_account
    };
    fixture.allow_list = AllowList::new(vec![AllowListEntry {
        pubkey: community_vote_account,
        name: "Community Node".to_string(),
        region: None,
        specialty: None,
        joined_date: None,
        website: None,
    }]);
    let pool = fixture.pool();
    let context = fixture.context(&pool, BUDGET);

    // -- TEST
    let draft = build_rule_based_recommendation(&context);

    // -- VERIFY
    let community = draft
        .validators
        .iter()
        .find(|v| v.vote_account == community_vote_account)
        .unwrap();
    assert!(community.allow_listed);
    assert_eq!(community.name.as_deref(), Some("Community Node"));
    let others: Vec<_> = draft
        .validators
        .iter()
        .filter(|v| v.vote_account != community_vote_account)
        .collect();
    assert!(others.iter().all(|v| !v.allow_listed));
    assert!(others
        .iter()
        .all(|v| v.name.as_deref().is_some_and(|n| n.starts_with("Validator "))));
}
