use anyhow::anyhow;
use chrono::Utc;
use log::{info, warn};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use std::time::Duration;
use tokio::time::timeout;
use validator_pulse_common::validator_record::ValidatorCollection;
use validator_pulse_common::vote_accounts::normalize_vote_accounts;

pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

pub fn get_rpc_client(url: String, commitment: CommitmentLevel) -> RpcClient {
    RpcClient::new_with_commitment(url, CommitmentConfig { commitment })
}

/// Vote accounts and the current epoch of a single endpoint, bounded by `timeout_duration`.
pub async fn fetch_vote_accounts(
    rpc_url: &str,
    commitment: CommitmentLevel,
    timeout_duration: Duration,
) -> anyhow::Result<ValidatorCollection> {
    let rpc_client = get_rpc_client(rpc_url.to_string(), commitment);

    let (vote_accounts, epoch_info) = timeout(timeout_duration, async {
        tokio::try_join!(rpc_client.get_vote_accounts(), rpc_client.get_epoch_info())
    })
    .await
    .map_err(|_| anyhow!("RPC {rpc_url} did not answer within {timeout_duration:?}"))??;

    Ok(normalize_vote_accounts(
        &vote_accounts,
        Some(epoch_info.epoch),
        Utc::now(),
    ))
}

/// Tries the endpoints in order, the first one that answers wins.
pub async fn collect_live_validators(
    rpc_urls: &[String],
    commitment: CommitmentLevel,
    timeout_duration: Duration,
) -> anyhow::Result<ValidatorCollection> {
    let mut last_error = anyhow!("No RPC endpoint configured");
    for rpc_url in rpc_urls {
        info!("Fetching vote accounts from {rpc_url}...");
        match fetch_vote_accounts(rpc_url, commitment, timeout_duration).await {
            Ok(collection) => {
                info!(
                    "Fetched {} validators from {rpc_url} (epoch {:?})",
                    collection.validators.len(),
                    collection.epoch
                );
                return Ok(collection);
            }
            Err(e) => {
                warn!("RPC endpoint {rpc_url} failed: {e}");
                last_error = e;
            }
        }
    }
    Err(last_error.context(format!(
        "All {} RPC endpoints failed",
        rpc_urls.len()
    )))
}
