//! Dry-run cycle against a live cluster

use anyhow::{Context, Result};
use autoscaler_lib::cycle::{ClaimOutcome, CycleGuard, CycleReport, CycleRunner};
use autoscaler_lib::sources::{KubernetesClaims, PrometheusMetricsSource};
use std::sync::Arc;
use std::time::Duration;
use tabled::Tabled;

use crate::output::{color_outcome, format_bytes, print_info, print_success, print_table, OutputFormat};

/// Row for the claims table
#[derive(Tabled)]
struct ClaimRow {
    #[tabled(rename = "Claim")]
    claim: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Details")]
    details: String,
}

impl ClaimRow {
    fn new(claim: String, outcome: &ClaimOutcome) -> Self {
        let (code, current, target, details) = match outcome {
            ClaimOutcome::Resized(plan) | ClaimOutcome::DryRun(plan) => (
                "resize",
                format_bytes(plan.current_bytes),
                format_bytes(plan.target_bytes),
                if plan.clamped_to_ceiling {
                    "clamped to ceiling".to_string()
                } else {
                    String::new()
                },
            ),
            ClaimOutcome::Skipped { reason } => {
                (reason.code(), "-".to_string(), "-".to_string(), reason.to_string())
            }
            ClaimOutcome::Failed { message, .. } => {
                ("failed", "-".to_string(), "-".to_string(), message.clone())
            }
        };

        Self {
            claim,
            outcome: color_outcome(code),
            current,
            target,
            details,
        }
    }
}

/// Options for connecting to the cluster and Prometheus
pub struct ClaimsOptions {
    pub kubeconfig: Option<String>,
    pub namespace: Option<String>,
    pub prometheus_url: String,
    pub annotation_prefix: String,
}

/// Evaluate every managed claim without writing anything
pub async fn list_claims(options: ClaimsOptions, format: OutputFormat) -> Result<()> {
    let client = kube_client(options.kubeconfig.as_deref()).await?;
    let kubernetes = Arc::new(
        KubernetesClaims::new(client)
            .with_prefix(options.annotation_prefix)
            .with_namespace(options.namespace),
    );
    let prometheus = Arc::new(PrometheusMetricsSource::new(
        &options.prometheus_url,
        Duration::from_secs(30),
    )?);

    let runner = CycleRunner::builder()
        .claims(kubernetes.clone())
        .storage_classes(kubernetes.clone())
        .updater(kubernetes)
        .metrics_source(prometheus)
        .dry_run(true)
        .instance("pvca")
        .build()?;

    let report = runner
        .run_cycle(&CycleGuard::unbounded())
        .await
        .context("Dry-run cycle failed")?;

    let rows: Vec<ClaimRow> = report
        .claims
        .iter()
        .map(|c| ClaimRow::new(c.claim.to_string(), &c.outcome))
        .collect();
    print_table(rows, &report, format)?;

    if matches!(format, OutputFormat::Table) {
        print_summary(&report);
    }

    Ok(())
}

fn print_summary(report: &CycleReport) {
    if report.planned() > 0 {
        print_success(&format!(
            "{} of {} claims would be resized",
            report.planned(),
            report.discovered
        ));
    } else {
        print_info(&format!("{} claims evaluated, none need resizing", report.discovered));
    }
}

async fn kube_client(kubeconfig: Option<&str>) -> Result<kube::Client> {
    let Some(path) = kubeconfig else {
        return kube::Client::try_default()
            .await
            .context("Failed to create Kubernetes client");
    };

    let kubeconfig = kube::config::Kubeconfig::read_from(path)
        .with_context(|| format!("Failed to read kubeconfig {}", path))?;
    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &Default::default())
        .await
        .context("Invalid kubeconfig")?;

    kube::Client::try_from(config).context("Failed to create Kubernetes client")
}
