use chrono::{DateTime, Utc};
use log::{info, warn};
use solana_sdk::pubkey::Pubkey;
use validator_pulse_common::utils::LAMPORTS_PER_SOL;
use validator_pulse_common::validator_record::{
    ClientType, DataSource, ValidatorCollection, ValidatorRecord,
};

pub const DEFAULT_SYNTHETIC_COUNT: usize = 100;
pub const DEFAULT_SYNTHETIC_TOTAL_STAKE: u64 = 400_000_000 * LAMPORTS_PER_SOL;
const DELINQUENT_PERCENT: u64 = 5;

const SALT_VOTE_ACCOUNT: u64 = 0x766f7465;
const SALT_IDENTITY: u64 = 0x6e6f6465;
const SALT_REGION: u64 = 1;
const SALT_CLIENT: u64 = 2;
const SALT_COMMISSION: u64 = 3;
const SALT_CREDITS: u64 = 4;
const SALT_DELINQUENT: u64 = 5;

struct Region {
    country: &'static str,
    city: &'static str,
    datacenter: &'static str,
    weight_percent: u64,
}

#[rustfmt::skip]
const REGIONS: [Region; 12] = [
    Region { country: "United States", city: "New York", datacenter: "Equinix NY5", weight_percent: 25 },
    Region { country: "United States", city: "San Francisco", datacenter: "Equinix SV1", weight_percent: 15 },
    Region { country: "Germany", city: "Frankfurt", datacenter: "Interxion FRA6", weight_percent: 12 },
    Region { country: "Singapore", city: "Singapore", datacenter: "Equinix SG1", weight_percent: 10 },
    Region { country: "United Kingdom", city: "London", datacenter: "Telehouse North", weight_percent: 8 },
    Region { country: "Japan", city: "Tokyo", datacenter: "Equinix TY3", weight_percent: 7 },
    Region { country: "Netherlands", city: "Amsterdam", datacenter: "Equinix AM3", weight_percent: 6 },
    Region { country: "Canada", city: "Toronto", datacenter: "Cologix TOR1", weight_percent: 5 },
    Region { country: "Australia", city: "Sydney", datacenter: "Equinix SY3", weight_percent: 4 },
    Region { country: "South Korea", city: "Seoul", datacenter: "LG U+ IDC", weight_percent: 3 },
    Region { country: "France", city: "Paris", datacenter: "Telehouse Voltaire", weight_percent: 3 },
    Region { country: "India", city: "Mumbai", datacenter: "Equinix MB1", weight_percent: 2 },
];

fn splitmix64(value: u64) -> u64 {
    let mut z = value.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

fn mix(seed: u64, key: u64, salt: u64) -> u64 {
    splitmix64(seed ^ splitmix64(key ^ splitmix64(salt)))
}

fn percent_roll(seed: u64, key: u64, salt: u64) -> u64 {
    mix(seed, key, salt) % 100
}

fn region_for(roll: u64) -> &'static Region {
    let mut cumulative = 0;
    for region in REGIONS.iter() {
        cumulative += region.weight_percent;
        if roll < cumulative {
            return region;
        }
    }
    &REGIONS[0]
}

fn client_for(roll: u64) -> ClientType {
    match roll {
        0..=64 => ClientType::Agave,
        65..=94 => ClientType::Jito,
        _ => ClientType::Firedancer,
    }
}

fn synthetic_pubkey(seed: u64, index: u64, salt: u64) -> Pubkey {
    let mut bytes = [0u8; 32];
    for (word, chunk) in bytes.chunks_mut(8).enumerate() {
        chunk.copy_from_slice(&mix(seed, index, salt.wrapping_add(word as u64)).to_le_bytes());
    }
    Pubkey::new_from_array(bytes)
}

fn tag_record(record: &mut ValidatorRecord, seed: u64, key: u64) {
    let region = region_for(percent_roll(seed, key, SALT_REGION));
    record.country = Some(region.country.to_string());
    record.city = Some(region.city.to_string());
    record.datacenter = Some(region.datacenter.to_string());
    record.client_type = client_for(percent_roll(seed, key, SALT_CLIENT));
}

/// Deterministic stand-in for live network data, a pure function of `seed` and `count`.
#[derive(Clone, Debug)]
pub struct SyntheticValidatorGenerator {
    pub seed: u64,
    pub count: usize,
    pub total_stake_lamports: u64,
}

impl SyntheticValidatorGenerator {
    pub fn new(seed: u64, count: usize) -> Self {
        Self {
            seed,
            count,
            total_stake_lamports: DEFAULT_SYNTHETIC_TOTAL_STAKE,
        }
    }

    /// Decreasing power-law share of the total stake for the validator at `index`.
    fn stake_share(index: usize) -> f64 {
        (10.0 / ((index + 1) as f64).powf(0.8)).max(0.1)
    }

    pub fn generate(&self, captured_at: DateTime<Utc>) -> ValidatorCollection {
        let shares: Vec<f64> = (0..self.count).map(Self::stake_share).collect();
        let total_share: f64 = shares.iter().sum();

        let validators = shares
            .iter()
            .enumerate()
            .map(|(i, share)| {
                let key = i as u64;
                let mut record = ValidatorRecord {
                    identity: synthetic_pubkey(self.seed, key, SALT_IDENTITY),
                    vote_account: synthetic_pubkey(self.seed, key, SALT_VOTE_ACCOUNT),
                    name: Some(format!("Validator {}", i + 1)),
                    activated_stake: (self.total_stake_lamports as f64 * share / total_share)
                        as u64,
                    stake_percentage: 0.0,
                    commission: (mix(self.seed, key, SALT_COMMISSION) % 11) as u8,
                    vote_credits: 100_000 + mix(self.seed, key, SALT_CREDITS) % 50_000,
                    delinquent: percent_roll(self.seed, key, SALT_DELINQUENT) < DELINQUENT_PERCENT,
                    country: None,
                    city: None,
                    datacenter: None,
                    client_type: ClientType::Unknown,
                    last_updated: captured_at,
                };
                tag_record(&mut record, self.seed, key);
                record
            })
            .collect();

        info!(
            "Generated {} synthetic validators with seed {}",
            self.count, self.seed
        );
        ValidatorCollection::new(captured_at, None, DataSource::Synthetic, validators)
    }
}

/// Fills location and client tags of live records with the synthetic distribution.
/// Tags follow the vote account, so a validator keeps its tags between snapshots.
pub fn assign_placeholder_tags(collection: &mut ValidatorCollection, seed: u64) {
    for record in collection.validators.iter_mut() {
        let mut key_bytes = [0u8; 8];
        key_bytes.copy_from_slice(&record.vote_account.to_bytes()[..8]);
        tag_record(record, seed, u64::from_le_bytes(key_bytes));
    }
    warn!(
        "Assigned placeholder location and client tags to {} validators, diversity figures are not real",
        collection.validators.len()
    );
}
