use crate::error::StrategyFailure;
use crate::strategies::language_model::{CompletionFuture, CompletionService};
use crate::strategies::rule_based::equal_split;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use std::sync::Mutex;
use validator_pulse_common::validator_record::{
    assign_stake_percentages, ClientType, ValidatorRecord,
};

pub const TEST_VOTE_ACCOUNT_NAMESPACE: u8 = 1;
pub const TEST_IDENTITY_NAMESPACE: u8 = 2;

pub fn test_pubkey(namespace: u8, seed: u32) -> Pubkey {
    let mut bytes = [0u8; 32];
    bytes[0] = namespace;
    bytes[1..5].copy_from_slice(&seed.to_be_bytes());
    Pubkey::new_from_array(bytes)
}

pub fn test_vote_account(seed: u32) -> Pubkey {
    test_pubkey(TEST_VOTE_ACCOUNT_NAMESPACE, seed)
}

pub fn test_identity(seed: u32) -> Pubkey {
    test_pubkey(TEST_IDENTITY_NAMESPACE, seed)
}

pub fn test_timestamp() -> DateTime<Utc> {
    Utc.timestamp_opt(1_717_200_000, 0).unwrap()
}

pub const SOL: u64 = 1_000_000_000;

pub struct ValidatorParams {
    seed: u32,
    stake: u64,
    commission: u8,
    vote_credits: u64,
    delinquent: bool,
    country: Option<String>,
    city: Option<String>,
    datacenter: Option<String>,
    client_type: ClientType,
}

impl ValidatorParams {
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            stake: 1_000 * SOL,
            commission: 5,
            vote_credits: 150_000,
            delinquent: false,
            country: None,
            city: None,
            datacenter: None,
            client_type: ClientType::Unknown,
        }
    }

    pub fn stake(mut self, stake: u64) -> Self {
        self.stake = stake;
        self
    }

    pub fn commission(mut self, commission: u8) -> Self {
        self.commission = commission;
        self
    }

    pub fn vote_credits(mut self, vote_credits: u64) -> Self {
        self.vote_credits = vote_credits;
        self
    }

    pub fn delinquent(mut self) -> Self {
        self.delinquent = true;
        self
    }

    pub fn country(mut self, country: &str) -> Self {
        self.country = Some(country.to_string());
        self
    }

    pub fn location(mut self, country: &str, city: &str, datacenter: &str) -> Self {
        self.country = Some(country.to_string());
        self.city = Some(city.to_string());
        self.datacenter = Some(datacenter.to_string());
        self
    }

    pub fn client(mut self, client_type: ClientType) -> Self {
        self.client_type = client_type;
        self
    }

    pub fn build(self) -> ValidatorRecord {
        ValidatorRecord {
            identity: test_identity(self.seed),
            vote_account: test_vote_account(self.seed),
            name: Some(format!("Validator {}", self.seed)),
            activated_stake: self.stake,
            stake_percentage: 0.0,
            commission: self.commission,
            vote_credits: self.vote_credits,
            delinquent: self.delinquent,
            country: self.country,
            city: self.city,
            datacenter: self.datacenter,
            client_type: self.client_type,
            last_updated: test_timestamp(),
        }
    }
}

/// Builds the records and assigns stake percentages over the whole set.
pub fn snapshot(params: Vec<ValidatorParams>) -> Vec<ValidatorRecord> {
    let mut validators: Vec<ValidatorRecord> = params.into_iter().map(|p| p.build()).collect();
    assign_stake_percentages(&mut validators);
    validators
}

pub fn snapshot_from_stakes(stakes: &[u64]) -> Vec<ValidatorRecord> {
    snapshot(
        stakes
            .iter()
            .enumerate()
            .map(|(i, stake)| ValidatorParams::new(i as u32 + 1).stake(*stake))
            .collect(),
    )
}

/// One whale and 15 small validators with mixed locations and clients.
/// Seed 14 is delinquent, seed 15 charges 50% commission.
pub fn test_network() -> Vec<ValidatorRecord> {
    let countries = ["Germany", "Japan", "United States"];
    let clients = [ClientType::Agave, ClientType::Jito, ClientType::Firedancer];
    let mut params = vec![ValidatorParams::new(1_000)
        .stake(10_000_000 * SOL)
        .country("United States")
        .client(ClientType::Agave)];
    for seed in 1..=15u32 {
        let mut validator = ValidatorParams::new(seed)
            .stake((1_000 + seed as u64 * 100) * SOL)
            .commission((seed % 8) as u8)
            .vote_credits(120_000 + seed as u64 * 5_000)
            .country(countries[seed as usize % countries.len()])
            .client(clients[seed as usize % clients.len()]);
        if seed == 14 {
            validator = validator.delinquent();
        }
        if seed == 15 {
            validator = validator.commission(50);
        }
        params.push(validator);
    }
    snapshot(params)
}

/// Always answers with the same text.
pub struct CannedCompletion(pub String);

impl CompletionService for CannedCompletion {
    fn complete<'a>(&'a self, _prompt: &'a str) -> CompletionFuture<'a> {
        Box::pin(async move { Ok(self.0.clone()) })
    }
}

pub struct FailingCompletion;

impl CompletionService for FailingCompletion {
    fn complete<'a>(&'a self, _prompt: &'a str) -> CompletionFuture<'a> {
        Box::pin(async move {
            Err(StrategyFailure::Transport(
                "connection refused".to_string(),
            ))
        })
    }
}

/// Never answers.
pub struct HangingCompletion;

impl CompletionService for HangingCompletion {
    fn complete<'a>(&'a self, _prompt: &'a str) -> CompletionFuture<'a> {
        Box::pin(std::future::pending())
    }
}

/// Keeps every prompt it was asked.
pub struct RecordingCompletion {
    pub response: String,
    pub prompts: Mutex<Vec<String>>,
}

impl RecordingCompletion {
    pub fn new(response: String) -> Self {
        Self {
            response,
            prompts: Mutex::new(vec![]),
        }
    }
}

impl CompletionService for RecordingCompletion {
    fn complete<'a>(&'a self, prompt: &'a str) -> CompletionFuture<'a> {
        Box::pin(async move {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.response.clone())
        })
    }
}

/// A well formed model answer splitting the budget equally over `candidates`.
pub fn model_answer(candidates: &[&ValidatorRecord], budget: u64, expected_nakamoto: u32) -> String {
    let stakes = equal_split(budget, candidates.len());
    let validators: Vec<serde_json::Value> = candidates
        .iter()
        .zip(stakes)
        .map(|(validator, stake)| {
            json!({
                "voteAccount": validator.vote_account.to_string(),
                "recommendedStake": stake,
                "reason": "Small validator with strong vote performance",
                "riskLevel": "low",
            })
        })
        .collect();
    let answer = json!({
        "validators": validators,
        "reasoning": "Spread stake over small, well performing validators outside the superminority.",
        "confidence": 0.82,
        "expectedNakamoto": expected_nakamoto,
        "expectedImpact": "Top 10 concentration drops slightly",
    });
    format!("```json\n{}\n```", serde_json::to_string_pretty(&answer).unwrap())
}
