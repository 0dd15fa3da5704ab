//! hatecheck Server
//!
//! Loads the hate-speech classifier once at startup and serves predictions
//! over HTTP.

use anyhow::Result;
use clap::Parser;
use hatecheck_classifiers::{load_sequence_classifier, ClassificationGateway};
use hatecheck_server::cors::build_cors_layer;
use hatecheck_server::routes::{
    create_router, ERRORS_TOTAL, INFERENCE_LATENCY_US, PREDICTIONS_TOTAL, REQUESTS_TOTAL,
};
use hatecheck_server::{AppState, Cli, ServerConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose, cli.log_json);

    info!("Starting hatecheck server");

    // Load configuration
    let config = ServerConfig::load(&cli.config, &cli)?;
    info!("Configuration loaded successfully");
    info!("Labels: {:?}", config.labels.labels());
    info!(
        "Truncation: {} tokens, max batch size: {}",
        config.gateway.max_length, config.gateway.max_batch_size
    );

    // Initialize metrics
    let metrics_handle = init_metrics()?;

    // Load the classifier before accepting any traffic
    info!("Loading classifier...");
    let model_config = config.model.clone();
    let classifier = tokio::task::spawn_blocking(move || load_sequence_classifier(&model_config))
        .await?
        .map_err(|e| {
            error!("Classifier failed to initialize: {}", e);
            e
        })?;
    info!(
        "Classifier ready on {:?} ({:?}), label ids {:?}",
        classifier.device(),
        classifier.dtype(),
        classifier.label_ids()
    );
    if classifier.label_ids().len() != config.labels.len() {
        warn!(
            "Model emits {} classes but {} labels are configured",
            classifier.label_ids().len(),
            config.labels.len()
        );
    }

    let gateway = ClassificationGateway::new(Arc::new(classifier), config.labels.clone())
        .with_config(config.gateway.clone());
    info!("Serving classifier '{}'", gateway.classifier_name());
    let state = AppState::new(gateway, config.service.clone()).with_metrics(metrics_handle);

    let cors = build_cors_layer(&config.cors)?;
    let app = create_router(state, cors);

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            warn!("Shutdown signal received, stopping server...");
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
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
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool, json: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("hatecheck=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hatecheck=info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(REQUESTS_TOTAL, "Total number of requests by endpoint");
    metrics::describe_counter!(PREDICTIONS_TOTAL, "Total number of predictions by label");
    metrics::describe_counter!(ERRORS_TOTAL, "Total number of errors by kind");
    metrics::describe_histogram!(
        INFERENCE_LATENCY_US,
        metrics::Unit::Microseconds,
        "Gateway latency in microseconds by endpoint"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}
