use crate::serde_serialize::pubkey_string_conversion;
use crate::utils::read_from_yaml_file;
use crate::validator_record::ValidatorRecord;
use log::info;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;
use std::path::Path;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct AllowListEntry {
    #[serde(with = "pubkey_string_conversion")]
    pub pubkey: Pubkey,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

#[derive(Deserialize, Serialize)]
struct AllowListFile {
    #[serde(default)]
    validators: Vec<AllowListEntry>,
}

/// Community validators that get preferential treatment when stake is recommended.
/// Entries may name either the node identity or the vote account.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(from = "AllowListFile", into = "AllowListFile")]
pub struct AllowList {
    entries: Vec<AllowListEntry>,
    index: HashSet<Pubkey>,
}

impl From<AllowListFile> for AllowList {
    fn from(file: AllowListFile) -> Self {
        AllowList::new(file.validators)
    }
}

impl From<AllowList> for AllowListFile {
    fn from(allow_list: AllowList) -> Self {
        AllowListFile {
            validators: allow_list.entries,
        }
    }
}

impl AllowList {
    pub fn new(entries: Vec<AllowListEntry>) -> Self {
        let index = entries.iter().map(|e| e.pubkey).collect();
        Self { entries, index }
    }

    pub fn from_pubkeys<I: IntoIterator<Item = Pubkey>>(pubkeys: I) -> Self {
        Self::new(
            pubkeys
                .into_iter()
                .map(|pubkey| AllowListEntry {
                    pubkey,
                    name: "Community Validator".to_string(),
                    region: None,
                    specialty: None,
                    joined_date: None,
                    website: None,
                })
                .collect(),
        )
    }

    pub fn contains(&self, pubkey: &Pubkey) -> bool {
        self.index.contains(pubkey)
    }

    pub fn includes(&self, validator: &ValidatorRecord) -> bool {
        self.contains(&validator.identity) || self.contains(&validator.vote_account)
    }

    pub fn entry_for(&self, validator: &ValidatorRecord) -> Option<&AllowListEntry> {
        self.entries
            .iter()
            .find(|e| e.pubkey == validator.identity || e.pubkey == validator.vote_account)
    }

    pub fn entries(&self) -> &[AllowListEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn load_allow_list<P: AsRef<Path>>(path: &P) -> anyhow::Result<AllowList> {
    let allow_list: AllowList = read_from_yaml_file(path)?;
    info!(
        "Loaded {} community validators from {}",
        allow_list.len(),
        path.as_ref().display()
    );
    Ok(allow_list)
}
