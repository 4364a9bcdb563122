use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use clap_serde_derive::ClapSerde;
use tokio::net::TcpListener;
use tracing::{error, info};

use shachiku_ai::api::{router, AppState};
use shachiku_ai::config::{Config, DEFAULT_CONFIG_FILE};
use shachiku_ai::inference::client::ModelClient;
use shachiku_ai::inference::models::causal_lm::CausalLmModel;
use shachiku_ai::telemetry::{init_telemetry, shutdown_telemetry};

#[cfg(unix)]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

macro_rules! exit_err {
    ($code:expr, $fmt:expr $(, $arg:expr)*) => {
        {
            error!($fmt $(, $arg)*);
            std::process::exit($code);
        }
    };
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env, default_value = DEFAULT_CONFIG_FILE)]
    config_file: String,

    /// OTLP endpoint traces and metrics are exported to
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    /// Keep logging to the console while exporting to OTLP
    #[arg(long, env)]
    console: bool,

    /// Configuration options
    #[command(flatten)]
    pub opt_config: <Config as ClapSerde>::Opt,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_telemetry(&args.otlp_endpoint, args.console)?;

    let config = match Config::load(&args.config_file, args.opt_config) {
        Ok(config) => config,
        Err(err) => exit_err!(1, "{:#}", err),
    };

    info!(model = %config.model_name, "Loading model");
    let load_config = config.clone();
    let model = match tokio::task::spawn_blocking(move || CausalLmModel::load(&load_config)).await? {
        Ok(model) => model,
        Err(err) => exit_err!(1, "Failed to load model: {:#}", err),
    };
    let client = ModelClient::new(Arc::new(model), config.max_concurrent_generations);
    let app = router(AppState::new(client, config.debug_mode));

    let listener = TcpListener::bind(format!("{}:{}", config.address, config.port)).await?;
    info!("Listening on {}", listener.local_addr()?);
    info!(
        "Supported features: avx: {}, neon: {}, simd128: {}, f16c: {}",
        candle_core::utils::with_avx(),
        candle_core::utils::with_neon(),
        candle_core::utils::with_simd128(),
        candle_core::utils::with_f16c()
    );
    if config.debug_mode {
        info!("Debug mode enabled, reply responses carry raw generations");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    shutdown_telemetry();
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down..."),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}
