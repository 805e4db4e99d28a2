//! PVC Autoscaler CLI
//!
//! A command-line tool for checking what the autoscaler would decide,
//! either for a synthetic claim or for every managed claim in a cluster.

mod commands;
mod output;

use anyhow::Result;
use autoscaler_lib::sources::DEFAULT_ANNOTATION_PREFIX;
use clap::{Parser, Subcommand};
use commands::{claims, evaluate};

/// PVC Autoscaler CLI
#[derive(Parser)]
#[command(name = "pvca")]
#[command(author, version, about = "CLI for the PVC Autoscaler", long_about = None)]
pub struct Cli {
    /// Path to kubeconfig file (uses default if not specified)
    #[arg(long, env = "KUBECONFIG", global = true)]
    pub kubeconfig: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the decision engine on a synthetic claim
    Evaluate(evaluate::EvaluateArgs),

    /// Show what the autoscaler would do for every managed claim (dry run)
    Claims {
        /// Only inspect claims in this namespace
        #[arg(long, short)]
        namespace: Option<String>,

        /// Prometheus server URL
        #[arg(long, env = "PVCA_PROMETHEUS_URL", default_value = "http://localhost:9090")]
        prometheus_url: String,

        /// Annotation prefix the autoscaler is configured with
        #[arg(long, default_value = DEFAULT_ANNOTATION_PREFIX)]
        annotation_prefix: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate(args) => {
            evaluate::evaluate(&args, cli.format)?;
        }
        Commands::Claims {
            namespace,
            prometheus_url,
            annotation_prefix,
        } => {
            let options = claims::ClaimsOptions {
                kubeconfig: cli.kubeconfig,
                namespace,
                prometheus_url,
                annotation_prefix,
            };
            claims::list_claims(options, cli.format).await?;
        }
    }

    Ok(())
}
