//! ASL Hand-Sign Recognition Service
//!
//! Accepts camera frames over HTTP, locates the hand with OpenVINO and
//! classifies the sign with a random forest trained offline.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use handsign::api::{create_rest_router, AppState};
use handsign::classifier::ClassifierModel;
use handsign::config::Config;
use handsign::engine::{HandTracker, ModelPool};
use handsign::service::SignService;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    info!("Starting Hand-Sign Recognition Service v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load(Config::default_path())
        .unwrap_or_else(|e| {
            info!("Using default config ({})", e);
            Config::default()
        })
        .with_env_overrides();

    info!("Configuration loaded:");
    info!("  Port: {}", config.server.port);
    info!("  Device: {}", config.inference.device);
    info!("  Classifier: {}", config.models.classifier.display());
    info!("  Confidence threshold: {}", config.inference.confidence_threshold);

    // Initialize model pool and hand tracker
    let pool = Arc::new(ModelPool::new(&config.inference, &config.models)?);
    let tracker = HandTracker::new(pool, &config.inference);

    // Load classifier
    let model = ClassifierModel::load(&config.models.classifier)
        .with_context(|| format!("failed to load classifier from {}", config.models.classifier.display()))?;
    info!(
        "Classifier loaded: {} classes, {} trees, {} geometry",
        model.classes().len(),
        model.forest().num_trees(),
        model.geometry().as_str()
    );

    // Create sign service and router
    let service = Arc::new(SignService::new(tracker, model, &config.inference));
    let app_state = Arc::new(AppState { service });
    let router = create_rest_router(app_state, &config.server);

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("REST API listening on http://{}", addr);
    info!("Hand-Sign Recognition Service is ready!");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received, cleaning up...");
        })
        .await?;

    info!("Goodbye!");
    Ok(())
}
