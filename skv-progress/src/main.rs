//! skv-progress - Skilvania learner progress service
//!
//! Records node completions, credits XP and levels, and stores course
//! ratings. Serves HTTP on port 5810 by default.

use anyhow::{Context, Result};
use clap::Parser;
use skv_common::config::{RuntimeSettings, TomlConfig};
use skv_common::db::init_database;
use skv_progress::cli::{Args, ServiceConfig};
use skv_progress::{build_router, AppState};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // The config file is read before tracing so its log level can seed the filter
    let toml_config = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load config file")?;
    let config = ServiceConfig::resolve(&args, &toml_config)?;

    let default_filter = format!(
        "skv_progress={lvl},skv_common={lvl},tower_http={lvl}",
        lvl = config.log_level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Skilvania progress service (skv-progress) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    info!("Database path: {}", config.database_path.display());
    let pool = init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let settings = RuntimeSettings::load(&pool)
        .await
        .context("Failed to load runtime settings")?;
    info!(
        completion_max_retries = settings.completion_retry.max_retries,
        rating_max_retries = settings.rating_retry.max_retries,
        xp_per_level = settings.xp_per_level,
        "Runtime settings loaded"
    );

    let app = build_router(AppState::new(pool.clone(), settings));

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    info!("skv-progress listening on http://{}", config.listen);
    info!("Health check: http://{}/health", config.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    pool.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
