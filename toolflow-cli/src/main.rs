//! Toolflow CLI - Plan and dry-run tool manifests

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use toolflow_core::prelude::*;

#[derive(Parser)]
#[command(name = "toolflow")]
#[command(about = "Toolflow tool execution orchestrator CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a request and print the plan (or the planning issues) as JSON
    Plan {
        /// Tool manifest (TOML, or JSON with a .json extension)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Tools to plan
        #[arg(required = true)]
        tools: Vec<String>,
    },
    /// Execute a request with simulated executors
    Run {
        /// Tool manifest (TOML, or JSON with a .json extension)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Orchestrator configuration file (defaults to toolflow.toml and TOOLFLOW_* variables)
        #[arg(short, long, env = "TOOLFLOW_CONFIG_PATH")]
        config: Option<PathBuf>,

        /// Acting user
        #[arg(short, long, default_value = "cli")]
        user: String,

        /// Session the run is charged to
        #[arg(short, long, default_value = "cli")]
        session: String,

        /// JSON params passed to every tool
        #[arg(short, long, default_value = "{}")]
        params: String,

        /// Tools to run
        #[arg(required = true)]
        tools: Vec<String>,
    },
    /// Version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing on stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("toolflow {}", env!("CARGO_PKG_VERSION"));
            println!("toolflow-core {}", toolflow_core::VERSION);
        }
        Commands::Plan { manifest, tools } => {
            let manifest = load_manifest(&manifest)?;
            let orchestrator = ToolOrchestrator::new();
            orchestrator
                .register_tools(manifest.definitions().cloned())
                .await;

            let outcome = orchestrator.plan_execution(&tools).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.valid {
                bail!("planning found {} issue(s)", outcome.issues.len());
            }
        }
        Commands::Run {
            manifest,
            config,
            user,
            session,
            params,
            tools,
        } => {
            let manifest = load_manifest(&manifest)?;
            let config = match config {
                Some(path) => OrchestratorConfig::from_file(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => OrchestratorConfig::load().context("loading config")?,
            };
            let params: serde_json::Value =
                serde_json::from_str(&params).context("--params must be valid JSON")?;

            let orchestrator = ToolOrchestrator::builder().config(config).build()?;
            orchestrator
                .register_tools(manifest.definitions().cloned())
                .await;

            let outcome = orchestrator.plan_execution(&tools).await;
            let Some(plan) = outcome.plan else {
                println!("{}", serde_json::to_string_pretty(&outcome.issues)?);
                bail!("planning found {} issue(s)", outcome.issues.len());
            };

            let executors = manifest.simulated_executors();
            let result = orchestrator
                .execute_plan(&plan, &executors, &user, &session, &params)
                .await;

            let mut profiles = Vec::with_capacity(plan.order.len());
            for tool in &plan.order {
                profiles.push(orchestrator.get_performance_profile(tool).await);
            }

            let report = serde_json::json!({
                "plan": plan,
                "result": result,
                "profiles": profiles,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);

            if !result.success {
                bail!("{} tool(s) failed", result.failures.len());
            }
        }
    }

    Ok(())
}

fn load_manifest(path: &Path) -> Result<Manifest> {
    Manifest::from_file(path).with_context(|| format!("loading manifest {}", path.display()))
}
