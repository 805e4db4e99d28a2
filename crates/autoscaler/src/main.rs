//! PVC Autoscaler - grows persistent volume claims before they fill up
//!
//! Runs as a single-replica Deployment (or a CronJob with `run_once`),
//! reading kubelet volume statistics from Prometheus and patching the
//! storage request of claims that opted in.

use anyhow::{Context, Result};
use autoscaler_lib::{
    api::{self, AppState},
    cycle::{CycleRunner, Reconciler, SharedReport},
    health::HealthRegistry,
    sources::{KubernetesClaims, PrometheusMetricsSource},
    ResizeEngine, StructuredLogger,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const AUTOSCALER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = config::AutoscalerConfig::load()?;
    info!(
        instance = %config.instance,
        prometheus_url = %config.prometheus_url,
        namespace = ?config.namespace,
        "Autoscaler configured"
    );

    let logger = StructuredLogger::new(&config.instance);
    logger.log_startup(AUTOSCALER_VERSION, config.dry_run);

    let client = kube::Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let kubernetes = Arc::new(
        KubernetesClaims::new(client)
            .with_prefix(&config.annotation_prefix)
            .with_namespace(config.namespace.clone()),
    );
    let prometheus = Arc::new(PrometheusMetricsSource::new(
        &config.prometheus_url,
        config.prometheus_timeout(),
    )?);

    let runner = CycleRunner::builder()
        .claims(kubernetes.clone())
        .storage_classes(kubernetes.clone())
        .updater(kubernetes)
        .metrics_source(prometheus)
        .engine(ResizeEngine::new(config.policy_defaults()?))
        .dry_run(config.dry_run)
        .instance(&config.instance)
        .build()?;

    let health_registry = HealthRegistry::with_components().await;
    let last_cycle = SharedReport::default();

    let reconciler = Reconciler::builder(runner)
        .health(health_registry.clone())
        .last_report(last_cycle.clone())
        .interval(config.interval())
        .cycle_timeout(config.cycle_timeout())
        .build()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if config.run_once {
        let report = reconciler.run_once(&shutdown_rx).await?;
        info!(
            resized = report.resized(),
            planned = report.planned(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Single cycle finished"
        );
        logger.log_shutdown("run_once complete");
        return Ok(());
    }

    // Start health and metrics server
    let app_state = Arc::new(AppState::new(health_registry, last_cycle));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    let reconcile_handle = tokio::spawn(reconciler.run(shutdown_rx));

    let reason = shutdown_signal().await?;
    logger.log_shutdown(reason);

    // Lets an in-flight cycle stop between claims.
    let _ = shutdown_tx.send(true);
    reconcile_handle.await?;
    api_handle.abort();

    info!("Shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM (the signal Kubernetes sends on pod deletion)
async fn shutdown_signal() -> Result<&'static str> {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("Failed to register SIGTERM handler")?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for SIGINT")?;
            Ok("SIGINT received")
        }
        _ = sigterm.recv() => Ok("SIGTERM received"),
    }
}
