//! Stochastic Region Balancer
//!
//! Computes region moves that even out a cluster's region placement.
//!
//! A run works on an owned snapshot of the current assignment and performs
//! simulated annealing over it:
//! - Action generators propose single moves and swaps
//! - Weighted cost functions score region count skew, per-table skew,
//!   churn and store-file size spread
//! - The cheapest assignment found is turned into a plan of region moves
//!
//! The coordinator keeps runs from overlapping with each other or with the
//! execution of a previous plan.

pub mod action;
pub mod cluster;
pub mod config;
pub mod coordinator;
pub mod cost;
pub mod optimizer;
pub mod plan;

// Re-export main types
pub use action::{Action, ActionGenerator, GeneratorMix};
pub use cluster::{ClusterSnapshot, Counters};
pub use config::{BalancerConfig, ConfigError};
pub use coordinator::{BalancerCoordinator, CoordinatorStatus};
pub use cost::{
    cost_from_stats, CostFunction, CostRegistry, MoveCostFunction, RegionCountSkewCostFunction,
    StoreFileCostFunction, TableSkewCostFunction,
};
pub use optimizer::{BalanceOutcome, RunSummary, StochasticBalancer, Termination};
pub use plan::{Plan, PlanBuilder};
