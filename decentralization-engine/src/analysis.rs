use crate::metrics::DecentralizationMetrics;
use log::info;
use serde::{Deserialize, Serialize};
use validator_pulse_common::validator_record::ValidatorRecord;

const BASE_SCORE: u32 = 50;
const MAX_SCORE: u32 = 100;
const HIGH_VOTE_CREDITS: u64 = 100_000;
const HOME_COUNTRY: &str = "United States";

pub const DELINQUENCY_ALERT_COUNT: usize = 10;
pub const TOP10_CONCENTRATION_ALERT_PERCENTAGE: f64 = 40.0;
pub const NAKAMOTO_ALERT_BELOW: u32 = 30;
pub const COUNTRIES_ALERT_BELOW: usize = 15;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ValidatorAnalysis {
    pub analysis: String,
    pub score: u32,
    pub risks: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Heuristic health score of a single validator, 0..=100.
pub fn analyze_validator(validator: &ValidatorRecord) -> ValidatorAnalysis {
    let mut score = BASE_SCORE;
    let mut risks = vec![];
    let mut recommendations = vec![];
    let foreign_country = validator
        .known_country()
        .filter(|country| !country.eq_ignore_ascii_case(HOME_COUNTRY));

    if !validator.delinquent {
        score += 20;
    }
    if validator.commission < 10 {
        score += 10;
    }
    if validator.vote_credits > HIGH_VOTE_CREDITS {
        score += 10;
    }
    if validator.stake_percentage < 0.5 {
        score += 10;
    }
    if foreign_country.is_some() {
        score += 5;
    }

    if validator.stake_percentage > 2.0 {
        risks.push("High stake concentration".to_string());
    }
    if validator.delinquent {
        risks.push("Currently delinquent".to_string());
    }
    if validator.commission > 10 {
        risks.push("High commission rate".to_string());
    }

    if validator.stake_percentage < 0.1 {
        recommendations.push("Good candidate for increased delegation".to_string());
    }
    if foreign_country.is_some() {
        recommendations.push("Helps geographic decentralization".to_string());
    }

    let analysis = format!(
        "{} holds {:.3}% of stake at {}% commission and is {}.",
        validator.display_name(),
        validator.stake_percentage,
        validator.commission,
        if validator.delinquent {
            "delinquent"
        } else {
            "actively voting"
        }
    );

    ValidatorAnalysis {
        analysis,
        score: score.min(MAX_SCORE),
        risks,
        recommendations,
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct MonitoringReport {
    pub alerts: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Network level alerts for a snapshot and its metrics.
/// The country alert only fires when at least one validator carries a location.
pub fn monitor_validators(
    validators: &[ValidatorRecord],
    metrics: &DecentralizationMetrics,
) -> MonitoringReport {
    let mut report = MonitoringReport::default();

    let delinquent = validators.iter().filter(|v| v.delinquent).count();
    if delinquent > DELINQUENCY_ALERT_COUNT {
        report
            .alerts
            .push(format!("{delinquent} validators are currently delinquent"));
    }

    let top10 = metrics.top_validator_concentration.top10_percentage;
    if top10 > TOP10_CONCENTRATION_ALERT_PERCENTAGE {
        report.alerts.push(format!(
            "Top 10 validators control {top10:.1}% of stake"
        ));
        report
            .recommendations
            .push("Consider delegating to validators outside the top 50 by stake".to_string());
    }

    if !metrics.is_degenerate() && metrics.nakamoto_coefficient < NAKAMOTO_ALERT_BELOW {
        report.alerts.push(format!(
            "Nakamoto coefficient {} is below {NAKAMOTO_ALERT_BELOW}",
            metrics.nakamoto_coefficient
        ));
    }

    let geography = &metrics.geographic_diversity;
    if geography.countries > 0 && geography.countries < COUNTRIES_ALERT_BELOW {
        report.alerts.push(format!(
            "Validators are located in only {} countries",
            geography.countries
        ));
    }

    info!(
        "Monitoring found {} alerts for {} validators",
        report.alerts.len(),
        validators.len()
    );
    report
}
