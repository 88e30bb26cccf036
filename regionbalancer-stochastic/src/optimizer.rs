//! Stochastic Optimizer
//!
//! Bounded simulated-annealing search over region assignments:
//! - Generate one action, apply it to the working snapshot
//! - Rescore incrementally via the cost registry
//! - Accept improvements outright, accept regressions with probability
//!   `exp(-delta / temperature)`, undo otherwise
//! - Track the cheapest assignment seen
//! - Descend greedily from it, moving regions off the fullest server while
//!   that lowers the cost, and turn the result into a plan
//!
//! A run stops at the step budget, the deadline, or zero cost. Cancellation
//! is checked between steps, so the snapshot is never left half-mutated.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regionbalancer_core::{BalancerError, ClusterState, Result};
use std::fmt;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::action::{Action, GeneratorMix};
use crate::cluster::ClusterSnapshot;
use crate::config::BalancerConfig;
use crate::cost::CostRegistry;
use crate::plan::{Plan, PlanBuilder};

/// Why a run stopped searching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Fewer than two servers or no regions; nothing to search
    Trivial,
    /// The step budget was used up
    StepBudget,
    /// The wall-clock budget ran out
    Deadline,
    /// The total cost reached zero
    ZeroCost,
}

/// Statistics for one run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub servers: usize,
    pub regions: usize,
    pub initial_cost: f64,
    pub best_cost: f64,
    pub step_budget: u64,
    pub steps: u64,
    pub accepted: u64,
    /// Moves applied by the final greedy descent
    pub descent_moves: u64,
    pub elapsed: Duration,
    pub termination: Termination,
}

impl RunSummary {
    pub fn improvement(&self) -> f64 {
        self.initial_cost - self.best_cost
    }

    pub fn summary(&self) -> String {
        format!(
            "{} servers, {} regions: cost {:.4} -> {:.4} after {}/{} steps ({} accepted, {} descent) in {:?}, stopped on {:?}",
            self.servers,
            self.regions,
            self.initial_cost,
            self.best_cost,
            self.steps,
            self.step_budget,
            self.accepted,
            self.descent_moves,
            self.elapsed,
            self.termination
        )
    }
}

/// Result of a balancer run
#[derive(Debug)]
pub enum BalanceOutcome {
    /// The cluster is already acceptably balanced; nothing should move
    NoPlanNeeded(RunSummary),
    /// Moves to execute, possibly empty for a trivial cluster
    Plan { plan: Plan, summary: RunSummary },
}

impl BalanceOutcome {
    pub fn summary(&self) -> &RunSummary {
        match self {
            BalanceOutcome::NoPlanNeeded(summary) => summary,
            BalanceOutcome::Plan { summary, .. } => summary,
        }
    }

    pub fn plan(&self) -> Option<&Plan> {
        match self {
            BalanceOutcome::NoPlanNeeded(_) => None,
            BalanceOutcome::Plan { plan, .. } => Some(plan),
        }
    }

    pub fn into_plan(self) -> Option<Plan> {
        match self {
            BalanceOutcome::NoPlanNeeded(_) => None,
            BalanceOutcome::Plan { plan, .. } => Some(plan),
        }
    }

    pub fn is_no_plan(&self) -> bool {
        matches!(self, BalanceOutcome::NoPlanNeeded(_))
    }
}

impl fmt::Display for BalanceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceOutcome::NoPlanNeeded(summary) => {
                write!(f, "no plan needed ({})", summary.summary())
            }
            BalanceOutcome::Plan { plan, summary } => {
                write!(f, "{} ({})", plan.summary(), summary.summary())
            }
        }
    }
}

/// Annealing temperature over the course of a run
///
/// Geometric decay from `initial` to `final_` when both are positive,
/// linear decay to `final_` otherwise. Never increases.
#[derive(Debug, Clone, Copy)]
pub struct TemperatureSchedule {
    initial: f64,
    final_: f64,
    steps: u64,
}

impl TemperatureSchedule {
    pub fn new(initial: f64, final_: f64, steps: u64) -> Self {
        Self {
            initial,
            final_: final_.min(initial),
            steps: steps.max(1),
        }
    }

    pub fn at(&self, step: u64) -> f64 {
        let progress = (step as f64 / self.steps as f64).min(1.0);
        if self.initial <= 0.0 {
            0.0
        } else if self.final_ > 0.0 {
            self.initial * (self.final_ / self.initial).powf(progress)
        } else {
            self.initial + (self.final_ - self.initial) * progress
        }
    }
}

/// Simulated annealing acceptance test
pub fn accept<R: Rng + ?Sized>(delta: f64, temperature: f64, rng: &mut R) -> bool {
    if delta <= 0.0 {
        return true;
    }
    if temperature <= 0.0 {
        return false;
    }
    rng.gen::<f64>() < (-delta / temperature).exp()
}

/// Stochastic region balancer
#[derive(Debug, Clone)]
pub struct StochasticBalancer {
    config: BalancerConfig,
    generators: GeneratorMix,
}

impl StochasticBalancer {
    /// Create a balancer; fails on an invalid configuration
    pub fn new(config: BalancerConfig) -> Result<Self> {
        config.validate()?;
        let generators = GeneratorMix::from_config(&config)?;
        Ok(Self { config, generators })
    }

    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }

    /// Random source for a run: seeded when the configuration pins a seed
    pub fn new_rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Compute a plan for `state` with a random source from [`Self::new_rng`]
    pub fn balance_cluster(&self, state: &ClusterState) -> Result<BalanceOutcome> {
        let mut rng = self.new_rng();
        self.balance_cluster_with(state, &mut rng, &CancellationToken::new())
    }

    /// Compute a plan for `state` with an explicit random source and cancellation token
    #[instrument(skip(self, state, rng, cancel))]
    pub fn balance_cluster_with<R: Rng + ?Sized>(
        &self,
        state: &ClusterState,
        rng: &mut R,
        cancel: &CancellationToken,
    ) -> Result<BalanceOutcome> {
        let start = Instant::now();
        // No deadline when the run time does not fit in an Instant
        let deadline = start.checked_add(self.config.max_run_time());
        let mut snapshot = ClusterSnapshot::new(state)?;

        let servers = snapshot.server_count();
        let regions = snapshot.total_regions();

        if servers < 2 || regions == 0 {
            debug!(servers, regions, "Nothing to balance");
            return Ok(BalanceOutcome::Plan {
                plan: Plan::empty(),
                summary: RunSummary {
                    servers,
                    regions,
                    initial_cost: 0.0,
                    best_cost: 0.0,
                    step_budget: 0,
                    steps: 0,
                    accepted: 0,
                    descent_moves: 0,
                    elapsed: start.elapsed(),
                    termination: Termination::Trivial,
                },
            });
        }

        let mut costs = CostRegistry::from_config(&self.config);
        let initial_cost = costs.prepare(&snapshot);
        let step_budget = self.config.step_budget(regions, servers);
        // The cap never blocks the moves that even out region counts
        let moves_to_balance = snapshot.moves_to_balance();
        let move_cap = self.config.move_cap(regions).max(moves_to_balance);
        let schedule = TemperatureSchedule::new(
            self.config.initial_temperature,
            self.config.final_temperature,
            step_budget,
        );

        info!(
            servers,
            regions,
            tables = snapshot.table_count(),
            initial_cost,
            step_budget,
            move_cap,
            moves_to_balance,
            "Starting balancer run"
        );
        debug!(breakdown = ?costs.breakdown(), "Initial cost breakdown");

        let mut current_cost = initial_cost;
        let mut best_cost = initial_cost;
        let mut best = snapshot.assignment().to_vec();
        let mut steps = 0u64;
        let mut accepted = 0u64;

        let termination = loop {
            if current_cost <= 0.0 {
                break Termination::ZeroCost;
            }
            if steps >= step_budget {
                break Termination::StepBudget;
            }
            if cancel.is_cancelled() {
                info!(steps, best_cost, "Balancer run cancelled");
                return Err(BalancerError::Cancelled);
            }
            if past(deadline) {
                warn!(
                    steps,
                    step_budget,
                    max_run_time = ?self.config.max_run_time(),
                    "Balancer run hit its deadline"
                );
                break Termination::Deadline;
            }

            let temperature = schedule.at(steps);
            steps += 1;

            let generator = self.generators.pick(rng);
            let action = generator.generate(&snapshot, rng);
            if action.is_null() {
                continue;
            }

            snapshot.apply_action(&action);
            if snapshot.moved_regions() > move_cap {
                snapshot.undo_last_action();
                continue;
            }

            let new_cost = costs.update(&snapshot, &action);
            if accept(new_cost - current_cost, temperature, rng) {
                snapshot.commit();
                current_cost = new_cost;
                accepted += 1;

                if current_cost < best_cost {
                    best_cost = current_cost;
                    best.copy_from_slice(snapshot.assignment());
                }
            } else {
                snapshot.undo_last_action();
                current_cost = costs.update(&snapshot, &action);
            }
        };

        let mut descent_moves = 0;
        if best_cost > 0.0 {
            let (cost, moves) = descend(&mut snapshot, &mut costs, &best, deadline);
            best_cost = cost;
            best.copy_from_slice(snapshot.assignment());
            descent_moves = moves;
        }

        let summary = RunSummary {
            servers,
            regions,
            initial_cost,
            best_cost,
            step_budget,
            steps,
            accepted,
            descent_moves,
            elapsed: start.elapsed(),
            termination,
        };

        if moves_to_balance == 0 && summary.improvement() < self.config.min_cost_improvement {
            debug!(
                improvement = summary.improvement(),
                threshold = self.config.min_cost_improvement,
                "Improvement below threshold, no plan needed"
            );
            info!(summary = %summary.summary(), "Cluster already balanced");
            return Ok(BalanceOutcome::NoPlanNeeded(summary));
        }

        let plan = PlanBuilder::new(self.config.max_moves_per_server).build(&snapshot, &best);
        if plan.is_empty() {
            info!(summary = %summary.summary(), "Best assignment equals the current one");
            return Ok(BalanceOutcome::NoPlanNeeded(summary));
        }

        info!(
            plan = %plan.summary(),
            summary = %summary.summary(),
            "Balancer run complete"
        );

        Ok(BalanceOutcome::Plan { plan, summary })
    }
}

/// Reset `snapshot` to `best`, then move one region at a time from the
/// fullest server to the emptiest one until counts differ by at most one
///
/// Each step takes the first region whose move lowers the total cost. When
/// none does, the move is made anyway, preferring a region that returns to
/// its initial server. Every step narrows the count spread, so the loop ends
/// even without the deadline. Returns the final cost and the number of moves.
fn descend(
    snapshot: &mut ClusterSnapshot,
    costs: &mut CostRegistry,
    best: &[usize],
    deadline: Option<Instant>,
) -> (f64, u64) {
    for (region, &target) in best.iter().enumerate() {
        let from = snapshot.server_of(region);
        if from != target {
            snapshot.apply_action(&Action::Move {
                region,
                from,
                to: target,
            });
        }
    }
    snapshot.commit();

    let mut current = costs.prepare(snapshot);
    let mut moves = 0u64;
    let mut forced = 0u64;

    while let Some((most, least)) = extremes(snapshot) {
        if past(deadline) {
            break;
        }

        let candidates = snapshot.regions_on(most).to_vec();
        let mut lowered = None;
        for &region in &candidates {
            let action = Action::Move {
                region,
                from: most,
                to: least,
            };
            snapshot.apply_action(&action);
            let cost = costs.update(snapshot, &action);
            if cost < current {
                lowered = Some(cost);
                break;
            }
            snapshot.undo_last_action();
            costs.update(snapshot, &action);
        }

        let cost = match lowered {
            Some(cost) => cost,
            None => {
                let Some(region) = candidates
                    .iter()
                    .copied()
                    .find(|&r| snapshot.initial_server_of(r) == least)
                    .or_else(|| candidates.first().copied())
                else {
                    break;
                };
                let action = Action::Move {
                    region,
                    from: most,
                    to: least,
                };
                snapshot.apply_action(&action);
                forced += 1;
                costs.update(snapshot, &action)
            }
        };

        snapshot.commit();
        current = cost;
        moves += 1;
    }

    if moves > 0 {
        debug!(moves, forced, cost = current, "Greedy descent evened out region counts");
    }
    (current, moves)
}

fn past(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

/// Fullest and emptiest servers, or `None` when counts differ by at most one
fn extremes(snapshot: &ClusterSnapshot) -> Option<(usize, usize)> {
    let counts = snapshot.region_counts();
    let most = (0..counts.len()).max_by_key(|&s| counts[s])?;
    let least = (0..counts.len()).min_by_key(|&s| counts[s])?;
    (counts[most] > counts[least] + 1).then_some((most, least))
}

#[cfg(test)]
mod tests {
    use super::*;
    use regionbalancer_core::{RegionInfo, ServerName};

    fn state(counts: &[usize]) -> ClusterState {
        let mut state = ClusterState::new();
        let mut id = 0u64;
        for (i, &count) in counts.iter().enumerate() {
            let regions = (0..count)
                .map(|_| {
                    id += 1;
                    RegionInfo::new("t", id.to_be_bytes().to_vec(), Vec::<u8>::new(), id)
                })
                .collect();
            state = state.with_server(ServerName::new(format!("rs{:02}", i), 16020, 1), regions);
        }
        state
    }

    fn test_config() -> BalancerConfig {
        BalancerConfig {
            max_steps: 20_000,
            seed: Some(17),
            ..Default::default()
        }
    }

    #[test]
    fn test_temperature_schedule_non_increasing() {
        for schedule in [
            TemperatureSchedule::new(1.0, 0.0001, 1000),
            TemperatureSchedule::new(2.0, 0.0, 1000),
            TemperatureSchedule::new(0.0, 0.0, 1000),
        ] {
            let mut last = f64::INFINITY;
            for step in (0..=1200).step_by(10) {
                let t = schedule.at(step);
                assert!(t <= last);
                assert!(t >= 0.0);
                last = t;
            }
        }

        let geometric = TemperatureSchedule::new(1.0, 0.0001, 1000);
        assert!((geometric.at(0) - 1.0).abs() < 1e-12);
        assert!((geometric.at(1000) - 0.0001).abs() < 1e-12);
        assert!((geometric.at(500) - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_accept_rules() {
        let mut rng = StdRng::seed_from_u64(5);
        assert!(accept(-1.0, 0.0, &mut rng));
        assert!(accept(0.0, 0.0, &mut rng));
        assert!(!accept(1e-9, 0.0, &mut rng));

        // exp(-1000) underflows to zero, exp(-1e-12) is effectively one
        assert!(!accept(1000.0, 1.0, &mut rng));
        let accepted = (0..1000).filter(|_| accept(1e-12, 1.0, &mut rng)).count();
        assert_eq!(accepted, 1000);
    }

    #[test]
    fn test_trivial_clusters_return_empty_plan() {
        let balancer = StochasticBalancer::new(test_config()).unwrap();
        for counts in [&[][..], &[0][..], &[10][..], &[0, 0][..]] {
            match balancer.balance_cluster(&state(counts)).unwrap() {
                BalanceOutcome::Plan { plan, summary } => {
                    assert!(plan.is_empty());
                    assert_eq!(summary.termination, Termination::Trivial);
                }
                other => panic!("{:?}: unexpected {:?}", counts, other),
            }
        }
    }

    #[test]
    fn test_uniform_cluster_needs_no_plan() {
        let balancer = StochasticBalancer::new(test_config()).unwrap();
        let outcome = balancer.balance_cluster(&state(&[5, 5, 5, 5])).unwrap();
        assert!(outcome.is_no_plan());
        assert_eq!(outcome.summary().termination, Termination::ZeroCost);
    }

    #[test]
    fn test_skewed_cluster_gets_plan() {
        let balancer = StochasticBalancer::new(test_config()).unwrap();
        let input = state(&[12, 0, 0]);
        let outcome = balancer.balance_cluster(&input).unwrap();

        let plan = outcome.plan().expect("expected a plan");
        let counts = plan.apply_to(&input).region_counts();
        assert_eq!(counts, vec![4, 4, 4]);
        assert!(outcome.summary().best_cost < outcome.summary().initial_cost);
    }

    #[test]
    fn test_cancelled_run() {
        let balancer = StochasticBalancer::new(test_config()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut rng = StdRng::seed_from_u64(1);
        let err = balancer
            .balance_cluster_with(&state(&[9, 0]), &mut rng, &cancel)
            .unwrap_err();
        assert_eq!(err, BalancerError::Cancelled);
    }

    #[test]
    fn test_deadline_terminates() {
        let config = BalancerConfig {
            max_run_time_ms: 0,
            ..test_config()
        };
        let balancer = StochasticBalancer::new(config).unwrap();
        let outcome = balancer.balance_cluster(&state(&[9, 0])).unwrap();
        assert_eq!(outcome.summary().termination, Termination::Deadline);
        assert!(outcome.is_no_plan());
    }

    #[test]
    fn test_step_budget_respected() {
        let config = BalancerConfig {
            max_steps: 50,
            // Skew stays positive on an odd split, so the run uses its whole budget
            table_skew_cost: 0.0,
            ..test_config()
        };
        let balancer = StochasticBalancer::new(config).unwrap();
        let outcome = balancer.balance_cluster(&state(&[30, 1])).unwrap();
        assert!(outcome.summary().steps <= 50);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = BalancerConfig {
            max_moves_per_server: 0,
            ..Default::default()
        };
        assert!(matches!(
            StochasticBalancer::new(config),
            Err(BalancerError::InvalidConfig(_))
        ));
    }
}
