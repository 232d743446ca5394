use anyhow::anyhow;
use chrono::Utc;
use clap::Parser;
use solana_sdk::commitment_config::CommitmentLevel;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use validator_pulse_common::utils::write_to_json_file;
use validators_collector::rpc::{collect_live_validators, DEFAULT_RPC_URL};
use validators_collector::synthetic::{
    assign_placeholder_tags, SyntheticValidatorGenerator, DEFAULT_SYNTHETIC_COUNT,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// RPC endpoints tried in order
    #[arg(short = 'u', long, env = "RPC_URL", value_delimiter = ',', default_value = DEFAULT_RPC_URL)]
    rpc_url: Vec<String>,

    #[arg(long, default_value = "confirmed")]
    commitment: CommitmentLevel,

    #[arg(long, env, default_value_t = 10)]
    timeout_secs: u64,

    /// Generate synthetic validators when no endpoint answers
    #[arg(long, default_value_t = false)]
    synthetic_fallback: bool,

    #[arg(long, default_value_t = DEFAULT_SYNTHETIC_COUNT)]
    synthetic_count: usize,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Tag live validators with placeholder locations and clients
    #[arg(long, default_value_t = false)]
    placeholder_tags: bool,

    #[arg(long, env)]
    output: String,
}

fn init_logging() -> anyhow::Result<()> {
    tracing_log::LogTracer::init()?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow!("Failed to set up logging: {e}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;
    let args: Args = Args::parse();

    let timeout = Duration::from_secs(args.timeout_secs);
    let collection = match collect_live_validators(&args.rpc_url, args.commitment, timeout).await
    {
        Ok(mut collection) => {
            if args.placeholder_tags {
                assign_placeholder_tags(&mut collection, args.seed);
            }
            collection
        }
        Err(e) if args.synthetic_fallback => {
            warn!("Live collection failed, falling back to synthetic data: {e:#}");
            SyntheticValidatorGenerator::new(args.seed, args.synthetic_count).generate(Utc::now())
        }
        Err(e) => return Err(e),
    };

    info!(
        "Writing {} validators ({:?}, {} delinquent) to {}",
        collection.validators.len(),
        collection.source,
        collection.delinquent_count(),
        args.output
    );
    write_to_json_file(&collection, &args.output)?;

    Ok(())
}
