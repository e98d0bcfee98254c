//! Pool Topology Operator
//!
//! File-driven planning loop: reads a StoragePoolPolicy and the observed
//! cluster state, computes the desired pool topology, and emits it for the
//! apply layer. Watch/event plumbing lives outside this binary; identity
//! continuity comes from feeding the emitted plan back into the state file.

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use kube::CustomResourceExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pool_topology_operator::planner::{DesiredState, ObservedState, PlanningEngine};
use pool_topology_operator::{Result, StoragePoolCluster, StoragePoolPolicy};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Pool Topology Operator - storage-pool topology planner
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the StoragePoolPolicy YAML
    #[arg(long, env = "POLICY_FILE", required_unless_present = "print_crds")]
    policy: Option<PathBuf>,

    /// Path to the observed-state YAML (resources, previous plan, devices)
    #[arg(long, env = "STATE_FILE", required_unless_present = "print_crds")]
    state: Option<PathBuf>,

    /// Pool cluster name when the policy metadata carries none
    #[arg(long, env = "CLUSTER_NAME", default_value = "storage-pool-cluster")]
    cluster_name: String,

    /// Namespace for the pool cluster
    #[arg(long, env = "CLUSTER_NAMESPACE", default_value = "storage")]
    namespace: String,

    /// Output format for the desired state
    #[arg(long, env = "OUTPUT", value_enum, default_value = "yaml")]
    output: OutputFormat,

    /// Reconcile interval in seconds
    #[arg(long, env = "RECONCILE_INTERVAL", default_value = "30")]
    interval_secs: u64,

    /// Run a single planning pass and exit
    #[arg(long, env = "RUN_ONCE")]
    once: bool,

    /// Print the CRD manifests and exit
    #[arg(long)]
    print_crds: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    if args.print_crds {
        print_crds()?;
        return Ok(());
    }

    info!("Starting Pool Topology Operator planner");
    info!("  Version: {}", pool_topology_operator::VERSION);
    info!("  Policy: {}", args.policy.as_deref().unwrap_or(Path::new("-")).display());
    info!("  State: {}", args.state.as_deref().unwrap_or(Path::new("-")).display());
    info!("  Once: {}", args.once);

    if args.once {
        let desired = run_planning_pass(&args).context("planning pass failed")?;
        print_desired(&desired, args.output)?;
        return Ok(());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval_secs));
    loop {
        ticker.tick().await;
        match run_planning_pass(&args) {
            Ok(desired) => print_desired(&desired, args.output)?,
            Err(e) => {
                warn!(error = %e, action = ?e.action(), "planning pass failed");
            }
        }
    }
}

// =============================================================================
// Planning Pass
// =============================================================================

fn run_planning_pass(args: &Args) -> Result<DesiredState> {
    // Presence is enforced by clap when --print-crds is absent
    let policy_path = args.policy.as_deref().unwrap_or(Path::new(""));
    let state_path = args.state.as_deref().unwrap_or(Path::new(""));

    let policy: StoragePoolPolicy =
        serde_yaml::from_str(&std::fs::read_to_string(policy_path)?)?;
    let state: ObservedState = serde_yaml::from_str(&std::fs::read_to_string(state_path)?)?;

    let name = policy
        .metadata
        .name
        .clone()
        .unwrap_or_else(|| args.cluster_name.clone());
    let namespace = policy
        .metadata
        .namespace
        .clone()
        .unwrap_or_else(|| args.namespace.clone());

    let engine = PlanningEngine::new(name, namespace);
    engine.plan(&policy.spec, &state)
}

fn print_desired(desired: &DesiredState, format: OutputFormat) -> Result<()> {
    let rendered = match format {
        OutputFormat::Yaml => serde_yaml::to_string(desired)?,
        OutputFormat::Json => serde_json::to_string_pretty(desired)?,
    };
    println!("{}", rendered);
    Ok(())
}

fn print_crds() -> Result<()> {
    println!("{}", serde_yaml::to_string(&StoragePoolPolicy::crd())?);
    println!("---");
    println!("{}", serde_yaml::to_string(&StoragePoolCluster::crd())?);
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("kube=info".parse().unwrap())
        .add_directive("tower=warn".parse().unwrap());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
