use decentralization_engine::analysis::monitor_validators;
use decentralization_engine::engine_config::{load_engine_config, EngineConfig};
use decentralization_engine::metrics::compute_metrics;
use decentralization_engine::orchestrator::RecommendationOrchestrator;
use env_logger::{Builder, Env};
use validator_pulse_common::allow_list::{load_allow_list, AllowList};
use validator_pulse_common::utils::{
    file_error, lamports_to_sol, read_from_json_file, write_to_json_file, LAMPORTS_PER_SOL,
};
use validator_pulse_common::validator_record::ValidatorCollection;
use {clap::Parser, log::info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Validator collection JSON as written by validators-collector
    #[arg(long, env)]
    validator_collection: String,

    #[arg(long, env)]
    engine_config: Option<String>,

    #[arg(long, env)]
    allow_list: Option<String>,

    #[arg(long, env, default_value_t = 1_000_000 * LAMPORTS_PER_SOL)]
    budget_lamports: u64,

    #[arg(long, env)]
    output_metrics: String,

    #[arg(long, env)]
    output_recommendation: String,

    #[arg(long, env)]
    output_monitoring: Option<String>,

    /// Skip the language model even when an API key is available
    #[arg(long, env, default_value_t = false)]
    rule_based_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.init();

    info!("Starting decentralization engine...");
    let args: Args = Args::parse();

    let config = match &args.engine_config {
        Some(path) => load_engine_config(path).map_err(file_error("engine-config", path))?,
        None => EngineConfig::default(),
    };

    let allow_list = match &args.allow_list {
        Some(path) => load_allow_list(path).map_err(file_error("allow-list", path))?,
        None => AllowList::default(),
    };
    info!("Allow list loaded: {} validators", allow_list.len());

    info!("Loading validator collection...");
    let collection: ValidatorCollection = read_from_json_file(&args.validator_collection)
        .map_err(file_error("validator-collection", &args.validator_collection))?;
    info!(
        "Loaded {} validators ({:?}) captured at {}",
        collection.validators.len(),
        collection.source,
        collection.captured_at
    );

    info!("Computing decentralization metrics...");
    let metrics = compute_metrics(&collection.validators);
    info!(
        "Nakamoto coefficient: {}, top 10 share: {:.2}%",
        metrics.nakamoto_coefficient, metrics.top_validator_concentration.top10_percentage
    );
    write_to_json_file(&metrics, &args.output_metrics)?;

    if let Some(output_monitoring) = &args.output_monitoring {
        let report = monitor_validators(&collection.validators, &metrics);
        write_to_json_file(&report, output_monitoring)?;
    }

    let orchestrator = if args.rule_based_only {
        RecommendationOrchestrator::new(config, allow_list)?
    } else {
        RecommendationOrchestrator::from_env(config, allow_list)?
    };

    info!(
        "Generating recommendation for {} SOL...",
        lamports_to_sol(args.budget_lamports)
    );
    let recommendation = orchestrator
        .generate_recommendation(&collection.validators, &metrics, args.budget_lamports)
        .await?;
    write_to_json_file(&recommendation, &args.output_recommendation)?;

    info!("Finished.");
    Ok(())
}
