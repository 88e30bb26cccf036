//! Balancer Coordinator
//!
//! Serializes balancer runs for one cluster:
//! - At most one optimization runs at a time
//! - No new run starts while the previous plan is still executing
//! - A running optimization can be cancelled from another thread

use parking_lot::Mutex;
use rand::Rng;
use regionbalancer_core::{BalancerError, ClusterState, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::optimizer::{BalanceOutcome, StochasticBalancer};

/// Coordinator state
#[derive(Debug, Clone)]
enum RunState {
    Idle,
    Optimizing { cancel: CancellationToken },
    Executing { plan_id: Uuid },
}

/// Externally visible coordinator phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorStatus {
    Idle,
    Optimizing,
    Executing(Uuid),
}

/// Guards a single balancer against overlapping runs
pub struct BalancerCoordinator {
    balancer: StochasticBalancer,
    state: Mutex<RunState>,
}

impl BalancerCoordinator {
    pub fn new(balancer: StochasticBalancer) -> Self {
        Self {
            balancer,
            state: Mutex::new(RunState::Idle),
        }
    }

    pub fn balancer(&self) -> &StochasticBalancer {
        &self.balancer
    }

    pub fn status(&self) -> CoordinatorStatus {
        match &*self.state.lock() {
            RunState::Idle => CoordinatorStatus::Idle,
            RunState::Optimizing { .. } => CoordinatorStatus::Optimizing,
            RunState::Executing { plan_id } => CoordinatorStatus::Executing(*plan_id),
        }
    }

    /// Run the balancer with a random source seeded from its configuration
    pub fn run(&self, cluster: &ClusterState) -> Result<BalanceOutcome> {
        let mut rng = self.balancer.new_rng();
        self.run_with(cluster, &mut rng)
    }

    /// Run the balancer with an explicit random source
    pub fn run_with<R: Rng + ?Sized>(
        &self,
        cluster: &ClusterState,
        rng: &mut R,
    ) -> Result<BalanceOutcome> {
        let cancel = self.begin()?;
        let guard = RunGuard { coordinator: self };
        let outcome = self.balancer.balance_cluster_with(cluster, rng, &cancel);
        guard.finish(outcome)
    }

    /// Mark the in-flight plan as fully executed
    #[instrument(skip(self))]
    pub fn complete_plan(&self, plan_id: Uuid) -> Result<()> {
        let mut state = self.state.lock();
        match &*state {
            RunState::Executing { plan_id: current } if *current == plan_id => {
                *state = RunState::Idle;
                info!(%plan_id, "Plan execution complete");
                Ok(())
            }
            _ => {
                warn!(%plan_id, "Completion reported for an unknown plan");
                Err(BalancerError::UnknownPlan(plan_id))
            }
        }
    }

    /// Cancel the running optimization; returns false when none is running
    pub fn cancel(&self) -> bool {
        match &*self.state.lock() {
            RunState::Optimizing { cancel } => {
                info!("Cancelling balancer run");
                cancel.cancel();
                true
            }
            _ => false,
        }
    }

    fn begin(&self) -> Result<CancellationToken> {
        let mut state = self.state.lock();
        match &*state {
            RunState::Idle => {
                let cancel = CancellationToken::new();
                *state = RunState::Optimizing {
                    cancel: cancel.clone(),
                };
                debug!("Balancer run started");
                Ok(cancel)
            }
            RunState::Optimizing { .. } => Err(BalancerError::RunInProgress),
            RunState::Executing { plan_id } => {
                Err(BalancerError::PlanInFlight { plan_id: *plan_id })
            }
        }
    }
}

/// Returns the coordinator to idle if a run exits without finishing
struct RunGuard<'a> {
    coordinator: &'a BalancerCoordinator,
}

impl RunGuard<'_> {
    fn finish(self, outcome: Result<BalanceOutcome>) -> Result<BalanceOutcome> {
        let next = match &outcome {
            Ok(BalanceOutcome::Plan { plan, .. }) if !plan.is_empty() => {
                info!(plan_id = %plan.id, moves = plan.len(), "Plan handed off for execution");
                RunState::Executing { plan_id: plan.id }
            }
            _ => RunState::Idle,
        };
        *self.coordinator.state.lock() = next;
        std::mem::forget(self);
        outcome
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self.coordinator.state.lock() = RunState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BalancerConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
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
            state = state.with_server(ServerName::new(format!("rs{}", i), 16020, 1), regions);
        }
        state
    }

    fn coordinator() -> BalancerCoordinator {
        let config = BalancerConfig {
            max_steps: 20_000,
            seed: Some(3),
            ..Default::default()
        };
        BalancerCoordinator::new(StochasticBalancer::new(config).unwrap())
    }

    #[test]
    fn test_plan_blocks_next_run_until_complete() {
        let coordinator = coordinator();
        let outcome = coordinator.run(&state(&[8, 0])).unwrap();
        let plan_id = outcome.plan().expect("expected a plan").id;
        assert_eq!(coordinator.status(), CoordinatorStatus::Executing(plan_id));

        let err = coordinator.run(&state(&[8, 0])).unwrap_err();
        assert_eq!(err, BalancerError::PlanInFlight { plan_id });

        let unknown = Uuid::new_v4();
        assert_eq!(
            coordinator.complete_plan(unknown),
            Err(BalancerError::UnknownPlan(unknown))
        );
        assert_eq!(coordinator.status(), CoordinatorStatus::Executing(plan_id));

        coordinator.complete_plan(plan_id).unwrap();
        assert_eq!(coordinator.status(), CoordinatorStatus::Idle);
        assert!(coordinator.run(&state(&[4, 4])).unwrap().is_no_plan());
    }

    #[test]
    fn test_no_plan_returns_to_idle() {
        let coordinator = coordinator();
        let mut rng = StdRng::seed_from_u64(8);
        let outcome = coordinator.run_with(&state(&[3, 3, 3]), &mut rng).unwrap();
        assert!(outcome.is_no_plan());
        assert_eq!(coordinator.status(), CoordinatorStatus::Idle);
    }

    #[test]
    fn test_trivial_plan_returns_to_idle() {
        let coordinator = coordinator();
        let outcome = coordinator.run(&state(&[5])).unwrap();
        assert!(outcome.plan().map(|p| p.is_empty()).unwrap_or(false));
        assert_eq!(coordinator.status(), CoordinatorStatus::Idle);
    }

    #[test]
    fn test_errors_return_to_idle() {
        let coordinator = coordinator();
        let server = ServerName::new("rs0", 16020, 1);
        let other = ServerName::new("rs1", 16020, 1);
        let region = RegionInfo::new("t", b"a".to_vec(), Vec::<u8>::new(), 1);
        let broken = ClusterState::new()
            .with_server(server, vec![region.clone()])
            .with_server(other, vec![region]);

        assert!(matches!(
            coordinator.run(&broken),
            Err(BalancerError::DuplicateAssignment { .. })
        ));
        assert_eq!(coordinator.status(), CoordinatorStatus::Idle);
    }

    #[test]
    fn test_cancel_without_run() {
        let coordinator = coordinator();
        assert!(!coordinator.cancel());
        assert!(coordinator.complete_plan(Uuid::new_v4()).is_err());
    }
}
