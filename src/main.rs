// src/main.rs

use anyhow::Context;
use module_cdn::infra::config::{self, Config};
use module_cdn::transport::http::{build_app, AppState};
use module_cdn::{DatabaseService, DiskStorage, DownloadTokenManager};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(config::log_filter())
                .unwrap_or_else(|_| EnvFilter::new(config::DEFAULT_LOG_FILTER)),
        )
        .init();

    // --- Record store ---
    info!(database_url = %cfg.database_url, "connecting to database");
    let db_service = DatabaseService::connect(&cfg.database_url)
        .await
        .context("database initialization failed")?;
    let seeded = db_service
        .seed_licenses(&cfg.license_keys)
        .await
        .context("seeding license keys failed")?;
    info!(seeded, configured = cfg.license_keys.len(), "license allow-list loaded");

    // --- Storage ---
    tokio::fs::create_dir_all(&cfg.storage_root)
        .await
        .with_context(|| format!("cannot create storage root {}", cfg.storage_root.display()))?;
    let storage = DiskStorage::new(&cfg.storage_root);
    info!(root = %storage.root().display(), "file storage ready");

    // --- Download tokens ---
    let tokens = Arc::new(DownloadTokenManager::new(cfg.max_live_tokens));
    let sweep = tokens.clone().start_sweep_task(cfg.token_sweep_interval);
    info!(
        ttl_secs = tokens.ttl().as_secs(),
        sweep_secs = cfg.token_sweep_interval.as_secs(),
        capacity = cfg.max_live_tokens,
        "download token manager started"
    );

    if cfg.admin_api_key.is_none() {
        warn!("ADMIN_API_KEY is not set; admin routes are open to anyone who can reach the server");
    }

    let app_state = AppState {
        db_service: Arc::new(db_service),
        storage: Arc::new(storage),
        tokens: tokens.clone(),
        admin_api_key: cfg.admin_api_key.as_deref().map(Arc::from),
    };
    let app = build_app(app_state, cfg.cors_origins.as_deref());

    let listener = tokio::net::TcpListener::bind(cfg.bind_addr)
        .await
        .with_context(|| format!("bind {}", cfg.bind_addr))?;
    info!(addr = %cfg.bind_addr, "module CDN listening");
    info!("Swagger UI available at http://{}/swagger-ui", cfg.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tokens.shutdown();
    if let Err(e) = sweep.await {
        error!(error = %e, "token sweep task ended abnormally");
    }
    info!("graceful shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
