//! CLI entry point for the station congestion predictor.
//!
//! Provides subcommands for serving the prediction endpoint, running a
//! single prediction from a JSON file, bootstrapping the model cache, and
//! classifying a score against the configured thresholds.

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use congestion_predictor::classify::classify;
use congestion_predictor::config::PredictorConfig;
use congestion_predictor::model::ModelArtifact;
use congestion_predictor::output::append_record;
use congestion_predictor::server;
use congestion_predictor::types::{PredictionRequest, PredictionResponse};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "congestion_predictor")]
#[command(about = "Predicts station congestion from weather and calendar features", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve POST /predict over HTTP
    Serve {
        /// Address to listen on
        #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
        bind: String,

        /// Load the model and thresholds before accepting requests
        #[arg(long, env = "PRELOAD", default_value_t = false)]
        preload: bool,

        #[command(flatten)]
        config: PredictorConfig,
    },
    /// Run one prediction from a JSON request file and print the response
    Predict {
        /// Path to a JSON file holding a single request
        #[arg(value_name = "REQUEST_JSON")]
        request: String,

        /// CSV file to append the result to
        #[arg(short, long)]
        output: Option<String>,

        #[command(flatten)]
        config: PredictorConfig,
    },
    /// Download the model artifact into the local cache if it is missing
    FetchModel {
        #[command(flatten)]
        config: PredictorConfig,
    },
    /// Print the congestion tier for a score using the configured thresholds
    Classify {
        score: f64,

        #[command(flatten)]
        config: PredictorConfig,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let _file_guard = init_tracing()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            preload,
            config,
        } => {
            let predictor = Arc::new(config.build()?);
            if preload {
                match predictor.preload().await {
                    Ok(()) => info!("Model and thresholds preloaded"),
                    Err(e) => warn!(error = %e, "Preload failed, will retry on first request"),
                }
            }
            server::serve(&bind, predictor).await?;
        }
        Commands::Predict {
            request,
            output,
            config,
        } => {
            let body = std::fs::read_to_string(&request)?;
            let req: PredictionRequest = serde_json::from_str(&body)?;

            let predictor = config.build()?;
            let response = predictor.predict(&req).await;
            println!("{}", serde_json::to_string_pretty(&response)?);

            match response {
                PredictionResponse::Ok(ok) => {
                    if let Some(path) = output {
                        append_record(&path, &ok.result)?;
                        info!(path = %path, "Result appended");
                    }
                }
                PredictionResponse::Error { message } => return Err(anyhow!(message)),
            }
        }
        Commands::FetchModel { config } => {
            let store = config.artifact_store()?;
            let bytes = store.fetch().await?;
            let model = ModelArtifact::from_slice(&bytes)?;
            info!(
                path = %store.local_path().display(),
                bytes = bytes.len(),
                n_features = model.n_features(),
                "Model artifact ready"
            );
        }
        Commands::Classify { score, config } => {
            let thresholds = config.build()?.thresholds().await?;
            println!("{}", classify(score, &thresholds));
        }
    }

    Ok(())
}

/// Colored stderr logs plus a JSON daily-rolling log file.
fn init_tracing() -> Result<WorkerGuard> {
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/congestion_predictor.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("congestion_predictor.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    Ok(file_guard)
}
