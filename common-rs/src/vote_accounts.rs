use crate::validator_record::{ClientType, DataSource, ValidatorCollection, ValidatorRecord};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use solana_client::rpc_response::{RpcVoteAccountInfo, RpcVoteAccountStatus};
use solana_sdk::clock::Epoch;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;
use std::str::FromStr;

/// Credits earned in the most recent epoch listed in the vote account history.
pub fn latest_epoch_credits(epoch_credits: &[(Epoch, u64, u64)]) -> u64 {
    epoch_credits
        .last()
        .map(|(_, credits, prev_credits)| credits.saturating_sub(*prev_credits))
        .unwrap_or(0)
}

fn normalize_vote_account(
    info: &RpcVoteAccountInfo,
    delinquent: bool,
    captured_at: DateTime<Utc>,
) -> Option<ValidatorRecord> {
    let vote_account = match Pubkey::from_str(&info.vote_pubkey) {
        Ok(pubkey) => pubkey,
        Err(e) => {
            error!("Skipping vote account with invalid pubkey {}: {e}", info.vote_pubkey);
            return None;
        }
    };
    let identity = match Pubkey::from_str(&info.node_pubkey) {
        Ok(pubkey) => pubkey,
        Err(e) => {
            error!(
                "Skipping vote account {vote_account} with invalid node pubkey {}: {e}",
                info.node_pubkey
            );
            return None;
        }
    };

    Some(ValidatorRecord {
        identity,
        vote_account,
        name: None,
        activated_stake: info.activated_stake,
        stake_percentage: 0.0,
        commission: info.commission,
        vote_credits: latest_epoch_credits(&info.epoch_credits),
        delinquent,
        country: None,
        city: None,
        datacenter: None,
        client_type: ClientType::Unknown,
        last_updated: captured_at,
    })
}

/// Turns a `getVoteAccounts` response into a snapshot.
/// Duplicated vote accounts keep their first occurrence, current accounts win over delinquent ones.
pub fn normalize_vote_accounts(
    status: &RpcVoteAccountStatus,
    epoch: Option<u64>,
    captured_at: DateTime<Utc>,
) -> ValidatorCollection {
    let mut seen: HashSet<Pubkey> = HashSet::new();
    let validators: Vec<ValidatorRecord> = status
        .current
        .iter()
        .map(|info| (info, false))
        .chain(status.delinquent.iter().map(|info| (info, true)))
        .filter_map(|(info, delinquent)| normalize_vote_account(info, delinquent, captured_at))
        .filter(|record| {
            let fresh = seen.insert(record.vote_account);
            if !fresh {
                warn!("Duplicated vote account {} in RPC response", record.vote_account);
            }
            fresh
        })
        .collect();

    info!(
        "Normalized {} vote accounts ({} current, {} delinquent in response)",
        validators.len(),
        status.current.len(),
        status.delinquent.len()
    );
    ValidatorCollection::new(captured_at, epoch, DataSource::Live, validators)
}
