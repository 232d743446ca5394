use crate::serde_serialize::pubkey_string_conversion;
use anyhow::bail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::str::FromStr;

/// Validator client software family.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum ClientType {
    #[serde(rename = "agave")]
    Agave,
    #[serde(rename = "jito")]
    Jito,
    #[serde(rename = "firedancer")]
    Firedancer,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl ClientType {
    pub const ALL: [ClientType; 4] = [
        ClientType::Agave,
        ClientType::Jito,
        ClientType::Firedancer,
        ClientType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClientType::Agave => "agave",
            ClientType::Jito => "jito",
            ClientType::Firedancer => "firedancer",
            ClientType::Unknown => "unknown",
        }
    }

    pub fn parse_from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "agave" | "solana-labs" => Ok(ClientType::Agave),
            "jito" | "jito-solana" => Ok(ClientType::Jito),
            "firedancer" | "frankendancer" => Ok(ClientType::Firedancer),
            "unknown" | "" => Ok(ClientType::Unknown),
            _ => bail!("Unknown client type: {s}"),
        }
    }

    pub fn is_known(&self) -> bool {
        *self != ClientType::Unknown
    }
}

impl FromStr for ClientType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClientType::parse_from_str(s)
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a validator snapshot came from.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub enum DataSource {
    #[default]
    #[serde(rename = "live")]
    Live,
    #[serde(rename = "synthetic")]
    Synthetic,
}

/// One validator as seen in a point-in-time snapshot of the network.
///
/// `stake_percentage` is relative to the total activated stake of the snapshot
/// the record was captured in, see [`assign_stake_percentages`].
#[derive(Clone, Deserialize, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorRecord {
    #[serde(with = "pubkey_string_conversion", alias = "pubkey")]
    pub identity: Pubkey,
    #[serde(with = "pubkey_string_conversion", alias = "votePubkey")]
    pub vote_account: Pubkey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub activated_stake: u64,
    #[serde(default)]
    pub stake_percentage: f64,
    pub commission: u8,
    #[serde(default, alias = "epochVoteCredits")]
    pub vote_credits: u64,
    pub delinquent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacenter: Option<String>,
    #[serde(default)]
    pub client_type: ClientType,
    pub last_updated: DateTime<Utc>,
}

impl ValidatorRecord {
    pub fn known_country(&self) -> Option<&str> {
        known_tag(&self.country)
    }

    pub fn known_city(&self) -> Option<&str> {
        known_tag(&self.city)
    }

    pub fn known_datacenter(&self) -> Option<&str> {
        known_tag(&self.datacenter)
    }

    pub fn display_name(&self) -> String {
        match known_tag(&self.name) {
            Some(name) => name.to_string(),
            None => self.vote_account.to_string(),
        }
    }
}

/// Blank and "unknown" tags are treated as absent.
pub fn known_tag(tag: &Option<String>) -> Option<&str> {
    tag.as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("unknown"))
}

/// Recomputes `stake_percentage` of every record against the total of the slice.
/// A zero total leaves every percentage at zero.
pub fn assign_stake_percentages(validators: &mut [ValidatorRecord]) {
    let total_stake: u128 = validators.iter().map(|v| v.activated_stake as u128).sum();
    for validator in validators.iter_mut() {
        validator.stake_percentage = if total_stake == 0 {
            0.0
        } else {
            validator.activated_stake as f64 * 100.0 / total_stake as f64
        };
    }
}

/// Stake percentages are recomputed on load, values stored in the file are ignored.
#[derive(Clone, Deserialize, Serialize, Debug)]
#[serde(rename_all = "camelCase", from = "ValidatorCollectionFile")]
pub struct ValidatorCollection {
    pub captured_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<u64>,
    #[serde(default)]
    pub source: DataSource,
    pub validators: Vec<ValidatorRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidatorCollectionFile {
    captured_at: DateTime<Utc>,
    #[serde(default)]
    epoch: Option<u64>,
    #[serde(default)]
    source: DataSource,
    validators: Vec<ValidatorRecord>,
}

impl From<ValidatorCollectionFile> for ValidatorCollection {
    fn from(file: ValidatorCollectionFile) -> Self {
        ValidatorCollection::new(file.captured_at, file.epoch, file.source, file.validators)
    }
}

impl ValidatorCollection {
    pub fn new(
        captured_at: DateTime<Utc>,
        epoch: Option<u64>,
        source: DataSource,
        mut validators: Vec<ValidatorRecord>,
    ) -> Self {
        assign_stake_percentages(&mut validators);
        Self {
            captured_at,
            epoch,
            source,
            validators,
        }
    }

    /// sum of lamports activated on all validators of the snapshot
    pub fn total_stake(&self) -> u64 {
        self.validators.iter().map(|v| v.activated_stake).sum()
    }

    pub fn active(&self) -> impl Iterator<Item = &ValidatorRecord> {
        self.validators.iter().filter(|v| !v.delinquent)
    }

    pub fn delinquent_count(&self) -> usize {
        self.validators.iter().filter(|v| v.delinquent).count()
    }

    pub fn find_by_vote_account(&self, vote_account: &Pubkey) -> Option<&ValidatorRecord> {
        self.validators
            .iter()
            .find(|v| v.vote_account == *vote_account)
    }
}
