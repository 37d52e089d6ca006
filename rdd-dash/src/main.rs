//! rdd-dash - Rice disease detection dashboard
//!
//! Serves the browser dashboard, forwards submissions to the prediction
//! service and keeps each user's prediction history in the local database.

use anyhow::{Context, Result};
use clap::Parser;
use rdd_common::config::{
    default_config_path, resolve_api_url, resolve_bind, RootFolderInitializer, RootFolderResolver,
    TomlConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rdd_dash::prediction::HttpPredictionClient;
use rdd_dash::{build_router, AppState};

const MODULE_NAME: &str = "rdd-dash";

#[derive(Parser, Debug)]
#[command(name = "rdd-dash", version, about = "Rice disease detection dashboard")]
struct Args {
    /// Folder holding the local database
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// TOML config file (default: <config dir>/rdd/rdd-dash.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Prediction service base URL
    #[arg(long)]
    api_url: Option<String>,

    /// Listen address
    #[arg(long, env = "RDD_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(|| default_config_path(MODULE_NAME));
    let config = config_path
        .as_deref()
        .map(TomlConfig::load_or_default)
        .unwrap_or_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!(
        "Starting rice disease detection dashboard ({}) v{}",
        MODULE_NAME,
        env!("CARGO_PKG_VERSION")
    );
    if let Some(path) = &config_path {
        info!("Config file: {}", path.display());
    }

    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_toml(&config)
        .with_cli_arg(args.root_folder.clone())
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db = rdd_common::db::init_database(&db_path).await?;
    rdd_common::auth::load_shared_secret(&db)
        .await
        .context("Failed to load provider assertion secret")?;
    info!(
        "Provider sign-in assertions are verified with settings key '{}'",
        rdd_common::auth::SHARED_SECRET_KEY
    );

    let api_url = resolve_api_url(args.api_url.as_deref(), &config);
    info!("Prediction service: {}", api_url);
    let predictions = HttpPredictionClient::new(api_url)?;

    let state = AppState::with_database(db, Arc::new(predictions));
    let app = build_router(state);

    let bind = resolve_bind(args.bind.as_deref(), &config);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app).await?;

    Ok(())
}
