use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use territory_analyze::{pipeline, report, AnalysisConfig, Stages};

#[derive(Parser, Debug)]
#[command(version, about = "Territorial-control text analysis over ACLED event exports", long_about = None)]
struct Args {
    /// ACLED CSV export
    path: PathBuf,
    #[clap(short, long, help = "JSON file overriding any subset of the analysis settings")]
    config: Option<PathBuf>,
    #[clap(short, long, help = "Seed for LDA, the train/test split and the bootstrap resamples")]
    seed: Option<u64>,
    #[clap(short, long, help = "Number of bootstrap resamples used to tune the penalty")]
    bootstraps: Option<usize>,
    #[clap(short, long, help = "Worker threads for tuning (defaults to one per core)")]
    threads: Option<usize>,
    #[clap(long, help = "Skip the LDA and structural topic models")]
    skip_topics: bool,
    #[clap(long, help = "Skip the LASSO classifier")]
    skip_classifier: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "territory_analyze=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match AnalysisConfig::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("failed to load configuration from {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => AnalysisConfig::default(),
    };
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if let Some(bootstraps) = args.bootstraps {
        config.classifier.bootstraps = bootstraps;
    }

    if let Some(threads) = args.threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
            error!("failed to configure worker threads: {e}");
            return ExitCode::FAILURE;
        }
    }

    println!("Path: {}", args.path.display());
    let stages = Stages {
        skip_topics: args.skip_topics,
        skip_classifier: args.skip_classifier,
    };

    match pipeline::run(&args.path, &config, stages) {
        Ok(analysis) => {
            report::print_report(&analysis, &config);
            info!("analysis complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
