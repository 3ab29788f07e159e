//! # cluster-autoscaler-operator
//!
//! Command line entry point.
//!
//! - `run`: seed an in-memory store from manifests and reconcile until Ctrl-C
//! - `validate`: run admission review over each document of a manifest
//! - `render`: print the objects a `ClusterAutoscaler` would produce

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![deny(clippy::expect_used)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use autoscaler_api::ClusterAutoscaler;
use autoscaler_core::{Object, Resource};
use autoscaler_reconciler::{AdmissionRouter, DesiredStateBuilder};
use autoscaler_store::{InMemoryObjectStore, ObjectStore, TracingObjectStore};
use autoscaler_operator::config::process_env;
use autoscaler_operator::manifest::{load_objects, to_yaml_stream};
use autoscaler_operator::{Operator, OperatorConfig};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cluster-autoscaler-operator", version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile manifests in an in-memory store until interrupted.
    Run {
        /// Manifests to seed the store with.
        manifests: Vec<PathBuf>,

        /// Print the converged store as YAML on exit.
        #[arg(long)]
        dump: bool,
    },
    /// Admission-review every document in a manifest.
    Validate { file: PathBuf },
    /// Print the desired objects for a `ClusterAutoscaler` manifest.
    Render { file: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Command failed");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<ExitCode> {
    let config = OperatorConfig::load(cli.config.as_deref(), process_env)
        .context("Failed to load configuration")?;

    match cli.command {
        Command::Run { manifests, dump } => run(config, &manifests, dump).await,
        Command::Validate { file } => validate(&config, &file),
        Command::Render { file } => render(&config, &file),
    }
}

/// Initialize tracing subscriber with environment filter.
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

async fn run(config: OperatorConfig, manifests: &[PathBuf], dump: bool) -> Result<ExitCode> {
    let start_time = Instant::now();

    let store = InMemoryObjectStore::new_arc();
    store.register_kinds(autoscaler_api::builtin_kinds()).await;
    store
        .register_kinds(config.target_kinds().context("Invalid target kinds")?)
        .await;
    let events = store.subscribe();

    for path in manifests {
        for object in load_objects(path)? {
            let key = object.key()?;
            store
                .create(object)
                .await
                .with_context(|| format!("Failed to seed {key}"))?;
        }
        info!(manifest = %path.display(), "Seeded store");
    }

    let traced: Arc<dyn ObjectStore> = Arc::new(TracingObjectStore::new(store.clone()));
    let operator = Operator::new(config, traced)
        .await
        .context("Operator initialization failed")?;
    info!(
        startup_ms = start_time.elapsed().as_millis(),
        "Operator started. Press Ctrl+C to stop."
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(operator.run(events, stop_rx));

    wait_for_shutdown().await;
    let _ = stop_tx.send(true);
    handle
        .await
        .context("Operator task failed")?
        .context("Operator stopped with an error")?;

    if dump {
        print!("{}", to_yaml_stream(&store.snapshot().await)?);
    }
    Ok(ExitCode::SUCCESS)
}

fn validate(config: &OperatorConfig, file: &Path) -> Result<ExitCode> {
    let router = AdmissionRouter::new(config.autoscaler.name.clone());
    let mut denied = 0usize;

    for object in load_objects(file)? {
        let response = router.review_object(&object);
        let verdict = if response.allowed { "allowed" } else { "denied" };
        println!("{} {}: {verdict}: {}", object.kind, object.metadata.name, response.reason);
        for warning in &response.warnings {
            println!("  warning: {warning}");
        }
        if !response.allowed {
            denied += 1;
        }
    }

    if denied > 0 {
        warn!(denied, "Some objects were denied");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn render(config: &OperatorConfig, file: &Path) -> Result<ExitCode> {
    let Some(object) = load_objects(file)?
        .into_iter()
        .find(|o| o.kind == ClusterAutoscaler::KIND)
    else {
        bail!("{} contains no ClusterAutoscaler", file.display());
    };
    let ca = ClusterAutoscaler::from_object(object)?;

    let router = AdmissionRouter::new(config.autoscaler.name.clone());
    let review = router.review_object(&ca.to_object()?);
    if !review.allowed {
        bail!("ClusterAutoscaler is invalid: {}", review.reason);
    }

    let desired = DesiredStateBuilder::new(config.autoscaler_config()).build(&ca);
    let mut objects: Vec<Object> = vec![
        desired.deployment.to_object()?,
        desired.service.to_object()?,
        desired.service_monitor.to_object()?,
        desired.prometheus_rule.to_object()?,
    ];
    for policy in &desired.network_policies {
        objects.push(policy.to_object()?);
    }
    print!("{}", to_yaml_stream(&objects)?);
    Ok(ExitCode::SUCCESS)
}

/// Wait for shutdown signal (Ctrl+C).
async fn wait_for_shutdown() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
        Err(err) => error!("Failed to listen for shutdown signal: {}", err),
    }
}
