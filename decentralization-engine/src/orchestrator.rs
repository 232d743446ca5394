use crate::engine_config::EngineConfig;
use crate::error::EngineError;
use crate::metrics::DecentralizationMetrics;
use crate::recommendation::Recommendation;
use crate::selection::select_candidates;
use crate::strategies::language_model::{
    CompletionService, LanguageModelStrategy, OpenAiCompletionService,
};
use crate::strategies::rule_based::build_rule_based_recommendation;
use crate::strategies::{RecommendationStrategy, StrategyContext};
use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;
use uuid::Uuid;
use validator_pulse_common::allow_list::AllowList;
use validator_pulse_common::validator_record::ValidatorRecord;

pub fn new_recommendation_id() -> String {
    format!("rec_{}", Uuid::new_v4().simple())
}

/// Rejects inputs no recommendation can be built from.
pub fn validate_request(
    validators: &[ValidatorRecord],
    budget_lamports: u64,
) -> Result<(), EngineError> {
    if validators.is_empty() {
        return Err(EngineError::EmptyValidatorSet);
    }
    if budget_lamports == 0 {
        return Err(EngineError::ZeroBudget);
    }
    if validators.iter().all(|v| v.delinquent) {
        return Err(EngineError::NoActiveValidators(validators.len()));
    }
    if validators.iter().all(|v| v.activated_stake == 0) {
        return Err(EngineError::ZeroTotalStake);
    }
    Ok(())
}

/// Single entry point for recommendations.
///
/// Tries the primary strategy when one is configured and falls back to the
/// deterministic rule-based builder on any failure. Once the request passes
/// [`validate_request`] a recommendation is always returned.
pub struct RecommendationOrchestrator {
    config: EngineConfig,
    allow_list: AllowList,
    primary_strategy: Option<Box<dyn RecommendationStrategy>>,
}

impl RecommendationOrchestrator {
    /// Rule-based only, until a strategy is attached. Fails on an invalid configuration.
    pub fn new(config: EngineConfig, allow_list: AllowList) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            allow_list,
            primary_strategy: None,
        })
    }

    pub fn with_strategy(mut self, strategy: Box<dyn RecommendationStrategy>) -> Self {
        self.primary_strategy = Some(strategy);
        self
    }

    pub fn with_completion_service(self, service: Arc<dyn CompletionService>) -> Self {
        let timeout = self.config.model.timeout();
        self.with_strategy(Box::new(LanguageModelStrategy::new(service, timeout)))
    }

    /// Attaches the HTTP language model when an API key is found in the environment.
    pub fn from_env(config: EngineConfig, allow_list: AllowList) -> anyhow::Result<Self> {
        let service = OpenAiCompletionService::from_env(&config.model)?;
        let orchestrator = Self::new(config, allow_list)?;
        Ok(match service {
            Some(service) => {
                info!(
                    "Language model {} enabled for recommendations",
                    orchestrator.config.model.model
                );
                orchestrator.with_completion_service(Arc::new(service))
            }
            None => {
                info!(
                    "No API key in ${}, recommendations will be rule-based",
                    orchestrator.config.model.api_key_env
                );
                orchestrator
            }
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    pub async fn generate_recommendation(
        &self,
        validators: &[ValidatorRecord],
        metrics: &DecentralizationMetrics,
        budget_lamports: u64,
    ) -> Result<Recommendation, EngineError> {
        validate_request(validators, budget_lamports)?;

        let pool = select_candidates(validators, &self.allow_list, &self.config.selection);
        let context = StrategyContext {
            validators,
            metrics,
            budget_lamports,
            pool: &pool,
            allow_list: &self.allow_list,
            config: &self.config,
        };

        let draft = match &self.primary_strategy {
            Some(strategy) => match strategy.attempt(&context).await {
                Ok(draft) => draft,
                Err(failure) => {
                    warn!(
                        "Strategy {} failed, falling back to rule-based recommendation: {failure}",
                        strategy.name()
                    );
                    build_rule_based_recommendation(&context)
                }
            },
            None => build_rule_based_recommendation(&context),
        };

        let recommendation = Recommendation::from_draft(draft, new_recommendation_id(), Utc::now());
        info!(
            "Recommendation {} ({:?}): {} validators, confidence {:.2}",
            recommendation.id,
            recommendation.source,
            recommendation.validators.len(),
            recommendation.confidence
        );
        Ok(recommendation)
    }
}
