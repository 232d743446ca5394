use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use validator_pulse_common::validator_record::{ClientType, ValidatorRecord};

/// Share of total stake (in percent) a coalition has to exceed to halt consensus.
pub const NAKAMOTO_THRESHOLD_PERCENT: u128 = 33;

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GeographicDiversity {
    pub countries: usize,
    pub cities: usize,
    pub datacenters: usize,
    pub unknown_country: usize,
    pub unknown_city: usize,
    pub unknown_datacenter: usize,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClientDiversity {
    pub agave: usize,
    pub jito: usize,
    pub firedancer: usize,
    pub unknown: usize,
}

impl ClientDiversity {
    pub fn count(&self, client_type: ClientType) -> usize {
        match client_type {
            ClientType::Agave => self.agave,
            ClientType::Jito => self.jito,
            ClientType::Firedancer => self.firedancer,
            ClientType::Unknown => self.unknown,
        }
    }

    fn increment(&mut self, client_type: ClientType) {
        match client_type {
            ClientType::Agave => self.agave += 1,
            ClientType::Jito => self.jito += 1,
            ClientType::Firedancer => self.firedancer += 1,
            ClientType::Unknown => self.unknown += 1,
        }
    }

    /// Number of distinct known client families in use.
    pub fn known_families(&self) -> usize {
        [self.agave, self.jito, self.firedancer]
            .iter()
            .filter(|count| **count > 0)
            .count()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct TopValidatorConcentration {
    #[serde(rename = "top10Percentage")]
    pub top10_percentage: f64,
    #[serde(rename = "top20Percentage")]
    pub top20_percentage: f64,
    #[serde(rename = "top50Percentage")]
    pub top50_percentage: f64,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DecentralizationMetrics {
    pub nakamoto_coefficient: u32,
    pub herfindahl_index: f64,
    pub gini_coefficient: f64,
    pub geographic_diversity: GeographicDiversity,
    pub client_diversity: ClientDiversity,
    pub top_validator_concentration: TopValidatorConcentration,
    pub total_stake: u64,
    pub validator_count: usize,
}

impl DecentralizationMetrics {
    /// Empty set or zero total stake: every stake derived figure stays at zero.
    pub fn is_degenerate(&self) -> bool {
        self.total_stake == 0
    }
}

/// Orders validators by activated stake, largest first, ties broken by vote account.
pub fn sort_by_stake_descending(validators: &[ValidatorRecord]) -> Vec<&ValidatorRecord> {
    let mut sorted: Vec<&ValidatorRecord> = validators.iter().collect();
    sorted.sort_by(|a, b| {
        b.activated_stake
            .cmp(&a.activated_stake)
            .then_with(|| a.vote_account.cmp(&b.vote_account))
    });
    sorted
}

pub fn compute_metrics(validators: &[ValidatorRecord]) -> DecentralizationMetrics {
    info!(
        "Computing decentralization metrics for {} validators",
        validators.len()
    );
    let geographic_diversity = geographic_diversity(validators);
    let client_diversity = client_diversity(validators);
    let total_stake: u128 = validators.iter().map(|v| v.activated_stake as u128).sum();

    if total_stake == 0 {
        warn!(
            "Total activated stake of {} validators is zero, metrics are degenerate",
            validators.len()
        );
        return DecentralizationMetrics {
            geographic_diversity,
            client_diversity,
            validator_count: validators.len(),
            ..Default::default()
        };
    }

    let sorted = sort_by_stake_descending(validators);
    let metrics = DecentralizationMetrics {
        nakamoto_coefficient: nakamoto_coefficient(&sorted, total_stake),
        herfindahl_index: herfindahl_index(&sorted, total_stake),
        gini_coefficient: gini_coefficient(&sorted, total_stake),
        geographic_diversity,
        client_diversity,
        top_validator_concentration: TopValidatorConcentration {
            top10_percentage: top_percentage(&sorted, 10, total_stake),
            top20_percentage: top_percentage(&sorted, 20, total_stake),
            top50_percentage: top_percentage(&sorted, 50, total_stake),
        },
        total_stake: u64::try_from(total_stake).unwrap_or(u64::MAX),
        validator_count: validators.len(),
    };
    info!(
        "Nakamoto coefficient {}, Herfindahl index {:.6}, top 10 hold {:.2}%",
        metrics.nakamoto_coefficient,
        metrics.herfindahl_index,
        metrics.top_validator_concentration.top10_percentage
    );
    metrics
}

fn nakamoto_coefficient(sorted: &[&ValidatorRecord], total_stake: u128) -> u32 {
    let mut cumulative: u128 = 0;
    for (index, validator) in sorted.iter().enumerate() {
        cumulative += validator.activated_stake as u128;
        if cumulative * 100 > total_stake * NAKAMOTO_THRESHOLD_PERCENT {
            return index as u32 + 1;
        }
    }
    sorted.len() as u32
}

fn herfindahl_index(sorted: &[&ValidatorRecord], total_stake: u128) -> f64 {
    let total = total_stake as f64;
    sorted
        .iter()
        .map(|v| {
            let share = v.activated_stake as f64 / total;
            share * share
        })
        .sum()
}

/// Walks the descending order backwards, i.e. ascending stakes ranked 1..=n.
fn gini_coefficient(sorted: &[&ValidatorRecord], total_stake: u128) -> f64 {
    let n = sorted.len() as f64;
    let weighted: f64 = sorted
        .iter()
        .rev()
        .enumerate()
        .map(|(rank, v)| (2.0 * (rank as f64 + 1.0) - n - 1.0) * v.activated_stake as f64)
        .sum();
    (weighted / (n * total_stake as f64)).max(0.0)
}

fn top_percentage(sorted: &[&ValidatorRecord], top: usize, total_stake: u128) -> f64 {
    if sorted.len() <= top {
        return 100.0;
    }
    let top_stake: u128 = sorted[..top]
        .iter()
        .map(|v| v.activated_stake as u128)
        .sum();
    top_stake as f64 * 100.0 / total_stake as f64
}

fn geographic_diversity(validators: &[ValidatorRecord]) -> GeographicDiversity {
    let mut countries = HashSet::new();
    let mut cities = HashSet::new();
    let mut datacenters = HashSet::new();
    let mut diversity = GeographicDiversity::default();
    for validator in validators {
        match validator.known_country() {
            Some(country) => {
                countries.insert(country);
            }
            None => diversity.unknown_country += 1,
        }
        match validator.known_city() {
            Some(city) => {
                cities.insert(city);
            }
            None => diversity.unknown_city += 1,
        }
        match validator.known_datacenter() {
            Some(datacenter) => {
                datacenters.insert(datacenter);
            }
            None => diversity.unknown_datacenter += 1,
        }
    }
    diversity.countries = countries.len();
    diversity.cities = cities.len();
    diversity.datacenters = datacenters.len();
    diversity
}

fn client_diversity(validators: &[ValidatorRecord]) -> ClientDiversity {
    let mut diversity = ClientDiversity::default();
    validators
        .iter()
        .for_each(|v| diversity.increment(v.client_type));
    diversity
}
