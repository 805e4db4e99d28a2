//! Offline evaluation of a single resize decision

use anyhow::{Context, Result};
use autoscaler_lib::policy::{keys, parse_quantity, AutoscalePolicy, PolicyDefaults};
use autoscaler_lib::{
    ClaimId, ResizeDecision, ResizeEngine, Resizability, StorageClassCapability,
    VolumeClaimSnapshot, VolumeMetrics,
};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::output::{color_outcome, format_bytes, format_usage, print_json, OutputFormat};

/// Synthetic claim to run through the decision engine
#[derive(Debug, Args)]
pub struct EvaluateArgs {
    /// Allocated capacity from the claim status (e.g. 10Gi)
    #[arg(long)]
    pub capacity: String,

    /// Used bytes reported by the kubelet (e.g. 9Gi)
    #[arg(long)]
    pub used: String,

    /// Filesystem capacity reported by the kubelet (defaults to --capacity)
    #[arg(long)]
    pub observed_capacity: Option<String>,

    /// Threshold annotation (e.g. 80% or 8Gi)
    #[arg(long)]
    pub threshold: Option<String>,

    /// Increase annotation (e.g. 20% or 5Gi)
    #[arg(long)]
    pub increase: Option<String>,

    /// Ceiling annotation (e.g. 100Gi)
    #[arg(long)]
    pub ceiling: Option<String>,

    /// previous_capacity annotation in bytes
    #[arg(long)]
    pub previous_capacity: Option<String>,

    /// Storage class name
    #[arg(long, default_value = "standard")]
    pub storage_class: String,

    /// Treat the storage class as not allowing volume expansion
    #[arg(long)]
    pub no_expansion: bool,
}

#[derive(Serialize)]
struct Evaluation<'a> {
    claim: &'a ClaimId,
    allocated_bytes: u64,
    used_bytes: u64,
    observed_capacity_bytes: u64,
    policy: &'a AutoscalePolicy,
    decision: &'a ResizeDecision,
}

impl EvaluateArgs {
    fn annotations(&self) -> BTreeMap<String, String> {
        [
            (keys::THRESHOLD, &self.threshold),
            (keys::INCREASE, &self.increase),
            (keys::CEILING, &self.ceiling),
            (keys::PREVIOUS_CAPACITY, &self.previous_capacity),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_ref().map(|v| (key.to_string(), v.clone())))
        .collect()
    }

    fn snapshot(&self) -> Result<VolumeClaimSnapshot> {
        let allocated = parse_quantity(&self.capacity).context("Invalid --capacity")?;
        let used = parse_quantity(&self.used).context("Invalid --used")?;
        let observed = match &self.observed_capacity {
            Some(q) => parse_quantity(q).context("Invalid --observed-capacity")?,
            None => allocated,
        };

        Ok(VolumeClaimSnapshot {
            id: ClaimId::new("cli", "evaluate"),
            storage_class: Some(self.storage_class.clone()),
            allocated_bytes: Some(allocated),
            metrics: VolumeMetrics {
                used_bytes: used,
                capacity_bytes: observed,
            },
            resizability: Resizability::Resizable,
            annotations: self.annotations(),
            resource_version: None,
        })
    }
}

/// Run the decision engine on the given input and print the decision
pub fn evaluate(args: &EvaluateArgs, format: OutputFormat) -> Result<()> {
    let snapshot = args.snapshot()?;
    let capability = StorageClassCapability::new(&args.storage_class, !args.no_expansion);

    let policy = AutoscalePolicy::from_annotations(&snapshot.annotations, &PolicyDefaults::default())
        .context("Invalid policy")?;
    let decision = ResizeEngine::decide_with_policy(&snapshot, Some(&capability), &policy);

    match format {
        OutputFormat::Json => print_json(&Evaluation {
            claim: &snapshot.id,
            allocated_bytes: snapshot.allocated_bytes.unwrap_or_default(),
            used_bytes: snapshot.metrics.used_bytes,
            observed_capacity_bytes: snapshot.metrics.capacity_bytes,
            policy: &policy,
            decision: &decision,
        })?,
        OutputFormat::Table => print_decision(&snapshot, &policy, &decision),
    }

    Ok(())
}

fn print_decision(snapshot: &VolumeClaimSnapshot, policy: &AutoscalePolicy, decision: &ResizeDecision) {
    println!("{}", "Resize Evaluation".bold());
    println!("{}", "=".repeat(50));
    println!(
        "Capacity:   {}",
        format_bytes(snapshot.allocated_bytes.unwrap_or_default())
    );
    println!(
        "Used:       {} ({})",
        format_bytes(snapshot.metrics.used_bytes),
        format_usage(snapshot.metrics.used_bytes, snapshot.metrics.capacity_bytes)
    );
    println!("Threshold:  {}", policy.threshold);
    println!("Increase:   {}", policy.increase);
    println!(
        "Ceiling:    {}",
        policy
            .ceiling
            .map(format_bytes)
            .unwrap_or_else(|| "none".to_string())
    );
    println!();

    println!("Decision:   {}", color_outcome(decision.reason_code()));
    match decision {
        ResizeDecision::Resize(plan) => {
            println!(
                "Target:     {} ({} bytes){}",
                format_bytes(plan.target_bytes).cyan(),
                plan.target_bytes,
                if plan.clamped_to_ceiling {
                    " clamped to ceiling"
                } else {
                    ""
                }
            );
            println!("Marker:     {} bytes", plan.previous_capacity);
        }
        ResizeDecision::NoAction { reason } => {
            println!("Reason:     {}", reason);
        }
    }
}
