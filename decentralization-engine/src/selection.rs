use crate::engine_config::SelectionConfig;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use validator_pulse_common::allow_list::AllowList;
use validator_pulse_common::validator_record::{ClientType, ValidatorRecord};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum SelectionMode {
    /// hard filters passed, multi factor ranking with allow-list quota
    #[serde(rename = "ranked")]
    Ranked,
    /// nothing passed the hard filters, any active validator by ascending stake share
    #[serde(rename = "relaxed")]
    Relaxed,
}

/// Points a candidate collected per ranking factor.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateScore {
    pub decentralization: f64,
    pub performance: f64,
    pub geographic_bonus: f64,
    pub client_bonus: f64,
    pub allow_list_bonus: f64,
}

impl CandidateScore {
    pub fn total(&self) -> f64 {
        self.decentralization
            + self.performance
            + self.geographic_bonus
            + self.client_bonus
            + self.allow_list_bonus
    }
}

#[derive(Clone, Debug)]
pub struct Candidate<'a> {
    pub validator: &'a ValidatorRecord,
    pub score: CandidateScore,
    pub allow_listed: bool,
}

#[derive(Clone, Debug)]
pub struct CandidatePool<'a> {
    pub mode: SelectionMode,
    pub candidates: Vec<Candidate<'a>>,
    pub over_represented_region: Option<String>,
    pub dominant_client: Option<ClientType>,
}

impl<'a> CandidatePool<'a> {
    pub fn is_relaxed(&self) -> bool {
        self.mode == SelectionMode::Relaxed
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn validators(&self) -> Vec<&'a ValidatorRecord> {
        self.candidates.iter().map(|c| c.validator).collect()
    }

    pub fn allow_listed_count(&self) -> usize {
        self.candidates.iter().filter(|c| c.allow_listed).count()
    }
}

/// Region and client family that currently dominate a population.
struct DiversityContext<'a> {
    over_represented_region: Option<&'a str>,
    dominant_client: Option<ClientType>,
}

impl<'a> DiversityContext<'a> {
    fn from_population(population: &[&'a ValidatorRecord], config: &SelectionConfig) -> Self {
        let mut regions: BTreeMap<&'a str, usize> = BTreeMap::new();
        let mut clients: BTreeMap<ClientType, usize> = BTreeMap::new();
        for &validator in population {
            if let Some(country) = validator.known_country() {
                *regions.entry(country).or_default() += 1;
            }
            if validator.client_type.is_known() {
                *clients.entry(validator.client_type).or_default() += 1;
            }
        }
        let size = population.len();
        Self {
            over_represented_region: dominant_above(
                regions,
                size,
                config.over_represented_region_threshold,
            ),
            dominant_client: dominant_above(clients, size, config.dominant_client_threshold),
        }
    }
}

/// The most frequent key when its share of `size` exceeds `threshold`.
/// Ties go to the smallest key.
fn dominant_above<K: Copy + Ord>(counts: BTreeMap<K, usize>, size: usize, threshold: f64) -> Option<K> {
    if size == 0 {
        return None;
    }
    let mut best: Option<(K, usize)> = None;
    for (key, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((key, count));
        }
    }
    best.filter(|(_, count)| *count as f64 / size as f64 > threshold)
        .map(|(key, _)| key)
}

fn rejection_reason(validator: &ValidatorRecord, config: &SelectionConfig) -> Option<String> {
    if validator.delinquent {
        Some("delinquent".to_string())
    } else if validator.activated_stake <= config.min_activated_stake_lamports {
        Some(format!(
            "stake {} at or below floor {}",
            validator.activated_stake, config.min_activated_stake_lamports
        ))
    } else if validator.stake_percentage >= config.max_stake_percentage {
        Some(format!(
            "stake share {:.4}% at or above ceiling {}%",
            validator.stake_percentage, config.max_stake_percentage
        ))
    } else if validator.commission > config.max_commission {
        Some(format!(
            "commission {}% above cap {}%",
            validator.commission, config.max_commission
        ))
    } else {
        None
    }
}

fn score_candidate<'a>(
    validator: &'a ValidatorRecord,
    allow_list: &AllowList,
    context: &DiversityContext,
    config: &SelectionConfig,
) -> Candidate<'a> {
    let weights = &config.weights;
    let stake_ratio = (validator.stake_percentage / config.max_stake_percentage).clamp(0.0, 1.0);
    let credits_ratio =
        (validator.vote_credits as f64 / config.performance_credits_cap as f64).min(1.0);

    let geographic_bonus = match validator.known_country() {
        Some(country) if context.over_represented_region != Some(country) => weights.geographic,
        _ => 0.0,
    };
    let client_bonus = if validator.client_type.is_known()
        && context.dominant_client != Some(validator.client_type)
    {
        weights.client
    } else {
        0.0
    };
    let allow_listed = allow_list.includes(validator);

    Candidate {
        validator,
        score: CandidateScore {
            decentralization: weights.decentralization * (1.0 - stake_ratio),
            performance: weights.performance * credits_ratio,
            geographic_bonus,
            client_bonus,
            allow_list_bonus: if allow_listed {
                config.allow_list_bonus
            } else {
                0.0
            },
        },
        allow_listed,
    }
}

/// Highest score first, then smaller stake share, then vote account.
fn compare_ranked(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .total()
        .total_cmp(&a.score.total())
        .then_with(|| {
            a.validator
                .stake_percentage
                .total_cmp(&b.validator.stake_percentage)
        })
        .then_with(|| a.validator.vote_account.cmp(&b.validator.vote_account))
}

/// Truncates the ranking to `pool_size` and swaps the lowest ranked non allow-listed
/// members for the best allow-listed candidates left out, until `required` allow-listed
/// members are present or no more are available. Relative rank order is kept.
pub fn enforce_allow_list_quota<'a>(
    ranked: &[Candidate<'a>],
    pool_size: usize,
    required: usize,
) -> Vec<Candidate<'a>> {
    let pool_size = pool_size.min(ranked.len());
    let (pool, rest) = ranked.split_at(pool_size);
    let present = pool.iter().filter(|c| c.allow_listed).count();
    if present >= required {
        return pool.to_vec();
    }

    let replacements: Vec<&Candidate<'a>> = rest
        .iter()
        .filter(|c| c.allow_listed)
        .take(required - present)
        .collect();
    let evicted: HashSet<usize> = pool
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, c)| !c.allow_listed)
        .map(|(index, _)| index)
        .take(replacements.len())
        .collect();
    if replacements.len() < required - present {
        debug!(
            "Allow-list quota of {required} not reachable, only {} more allow-listed candidates eligible",
            replacements.len()
        );
    }

    pool.iter()
        .enumerate()
        .filter(|(index, candidate)| {
            let evict = evicted.contains(index);
            if evict {
                debug!(
                    "Quota swap evicts {} (score {:.2})",
                    candidate.validator.vote_account,
                    candidate.score.total()
                );
            }
            !evict
        })
        .map(|(_, candidate)| candidate)
        .chain(replacements.into_iter().take(evicted.len()))
        .cloned()
        .collect()
}

/// Ranks validators eligible for additional delegation.
///
/// Validators failing any hard filter (delinquent, dust stake, already too large,
/// commission above cap) are dropped, the rest is scored, ranked, truncated to the
/// configured pool size and topped up with allow-listed validators to meet the quota.
/// When no validator passes the hard filters the pool falls back to
/// [`SelectionMode::Relaxed`]: every active validator ordered by ascending stake share.
pub fn select_candidates<'a>(
    validators: &'a [ValidatorRecord],
    allow_list: &AllowList,
    config: &SelectionConfig,
) -> CandidatePool<'a> {
    let eligible: Vec<&ValidatorRecord> = validators
        .iter()
        .filter(|v| match rejection_reason(v, config) {
            Some(reason) => {
                debug!("Validator {} filtered out: {reason}", v.vote_account);
                false
            }
            None => true,
        })
        .collect();

    if eligible.is_empty() {
        return relaxed_selection(validators, allow_list, config);
    }

    let context = DiversityContext::from_population(&eligible, config);
    let mut ranked: Vec<Candidate> = eligible
        .iter()
        .map(|&v| score_candidate(v, allow_list, &context, config))
        .collect();
    ranked.sort_by(compare_ranked);

    let pool_size = config.candidate_pool_size.min(ranked.len());
    let candidates = enforce_allow_list_quota(&ranked, pool_size, config.required_quota(pool_size));
    info!(
        "Selected {} candidates out of {} eligible validators ({} allow-listed)",
        candidates.len(),
        ranked.len(),
        candidates.iter().filter(|c| c.allow_listed).count()
    );

    CandidatePool {
        mode: SelectionMode::Ranked,
        candidates,
        over_represented_region: context.over_represented_region.map(str::to_string),
        dominant_client: context.dominant_client,
    }
}

fn relaxed_selection<'a>(
    validators: &'a [ValidatorRecord],
    allow_list: &AllowList,
    config: &SelectionConfig,
) -> CandidatePool<'a> {
    let active: Vec<&ValidatorRecord> = validators.iter().filter(|v| !v.delinquent).collect();
    warn!(
        "No validator passed the hard filters, relaxing selection to {} active validators",
        active.len()
    );
    let context = DiversityContext::from_population(&active, config);
    let mut candidates: Vec<Candidate> = active
        .iter()
        .map(|&v| score_candidate(v, allow_list, &context, config))
        .collect();
    candidates.sort_by(|a, b| {
        a.validator
            .stake_percentage
            .total_cmp(&b.validator.stake_percentage)
            .then_with(|| a.validator.vote_account.cmp(&b.validator.vote_account))
    });
    candidates.truncate(config.candidate_pool_size);

    CandidatePool {
        mode: SelectionMode::Relaxed,
        candidates,
        over_represented_region: context.over_represented_region.map(str::to_string),
        dominant_client: context.dominant_client,
    }
}
