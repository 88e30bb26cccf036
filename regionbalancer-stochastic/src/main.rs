//! Region Balancer CLI
//!
//! Dry-run driver for the stochastic balancer:
//! - Reads a cluster state (JSON) and an optional balancer config (TOML)
//! - Runs one optimization
//! - Prints the resulting plan wave by wave, or as JSON

use anyhow::Context;
use clap::Parser;
use regionbalancer_core::{ClusterState, RegionPlan};
use regionbalancer_stochastic::{BalanceOutcome, BalancerConfig, StochasticBalancer};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, Level};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "regionbalancer")]
#[command(about = "Compute a region balancing plan for a cluster snapshot")]
struct Cli {
    /// Cluster state as JSON
    #[arg(long)]
    cluster: PathBuf,

    /// Balancer configuration as TOML (environment variables when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Random seed, overriding the configuration
    #[arg(long, env = "BALANCER_SEED")]
    seed: Option<u64>,

    /// Step limit, overriding the configuration
    #[arg(long)]
    max_steps: Option<u64>,

    /// Print the plan as JSON
    #[arg(long, default_value = "false")]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// JSON form of a run result
///
/// `no_plan_needed` separates an already balanced cluster from a trivial
/// cluster whose plan is empty.
#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    no_plan_needed: bool,
    plan_id: Option<Uuid>,
    waves: Vec<&'a [RegionPlan]>,
}

impl<'a> JsonReport<'a> {
    fn new(outcome: &'a BalanceOutcome) -> Self {
        match outcome {
            BalanceOutcome::NoPlanNeeded(_) => Self {
                no_plan_needed: true,
                plan_id: None,
                waves: Vec::new(),
            },
            BalanceOutcome::Plan { plan, .. } => Self {
                no_plan_needed: false,
                plan_id: Some(plan.id),
                waves: plan.waves().collect(),
            },
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => BalancerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => BalancerConfig::from_env().context("reading config from environment")?,
    };
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    if let Some(max_steps) = cli.max_steps {
        config.max_steps = max_steps;
    }

    let contents = std::fs::read_to_string(&cli.cluster)
        .with_context(|| format!("reading cluster state {}", cli.cluster.display()))?;
    let cluster: ClusterState = serde_json::from_str(&contents)
        .with_context(|| format!("parsing cluster state {}", cli.cluster.display()))?;

    info!(
        servers = cluster.server_count(),
        regions = cluster.region_count(),
        "Loaded cluster state"
    );

    let balancer = StochasticBalancer::new(config)?;
    let outcome = balancer.balance_cluster(&cluster)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&JsonReport::new(&outcome))?);
    }

    match &outcome {
        BalanceOutcome::NoPlanNeeded(summary) => {
            info!(summary = %summary.summary(), "No plan needed");
        }
        BalanceOutcome::Plan { plan, summary } => {
            info!(summary = %summary.summary(), "Run complete");
            if !cli.json {
                println!("{}", plan.summary());
                for (i, wave) in plan.waves().enumerate() {
                    println!("wave {}:", i + 1);
                    for region_plan in wave {
                        println!("  {}", region_plan);
                    }
                }
                let after = plan.apply_to(&cluster);
                println!("region counts after plan: {:?}", after.region_counts());
            }
        }
    }

    Ok(())
}
