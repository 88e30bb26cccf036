//! Integration tests for run coordination
//!
//! Run with: cargo test --test coordinator_test

use regionbalancer_core::{BalancerError, ClusterState, RegionInfo, ServerName};
use regionbalancer_stochastic::{
    BalancerConfig, BalancerCoordinator, CoordinatorStatus, StochasticBalancer,
};
use std::time::{Duration, Instant};

fn cluster(counts: &[usize]) -> ClusterState {
    let mut state = ClusterState::new();
    let mut id = 0u64;
    for (i, &count) in counts.iter().enumerate() {
        let regions = (0..count)
            .map(|_| {
                id += 1;
                RegionInfo::new("usertable", id.to_be_bytes().to_vec(), Vec::<u8>::new(), id)
            })
            .collect();
        state = state.with_server(ServerName::new(format!("rs{:02}", i), 16020, 1), regions);
    }
    state
}

/// Wait until `condition` holds, panicking after a generous timeout
fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(30);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_cancel_running_optimization() {
    // A budget far beyond what the test waits for; only cancellation ends it
    let config = BalancerConfig {
        max_steps: u64::MAX,
        steps_per_region: u64::MAX,
        max_run_time_ms: 600_000,
        seed: Some(11),
        ..Default::default()
    };
    let coordinator = BalancerCoordinator::new(StochasticBalancer::new(config).unwrap());
    let state = cluster(&[400, 0, 0, 0, 0, 0, 0, 3]);

    std::thread::scope(|scope| {
        let run = scope.spawn(|| coordinator.run(&state));

        wait_for(|| coordinator.status() == CoordinatorStatus::Optimizing);
        assert_eq!(
            coordinator.run(&state).unwrap_err(),
            BalancerError::RunInProgress
        );
        assert!(coordinator.cancel());

        let result = run.join().expect("balancer thread panicked");
        assert_eq!(result.unwrap_err(), BalancerError::Cancelled);
    });

    assert_eq!(coordinator.status(), CoordinatorStatus::Idle);
    assert!(!coordinator.cancel());
}

#[test]
fn test_plan_lifecycle() {
    let config = BalancerConfig {
        max_steps: 30_000,
        seed: Some(12),
        ..Default::default()
    };
    let coordinator = BalancerCoordinator::new(StochasticBalancer::new(config).unwrap());

    let before = cluster(&[10, 2, 0]);
    let outcome = coordinator.run(&before).unwrap();
    let plan = outcome.into_plan().expect("expected a plan");
    assert!(!plan.is_empty());
    assert_eq!(coordinator.status(), CoordinatorStatus::Executing(plan.id));

    assert_eq!(
        coordinator.run(&before).unwrap_err(),
        BalancerError::PlanInFlight { plan_id: plan.id }
    );

    // The executor applies the moves and reports back
    let after = plan.apply_to(&before);
    coordinator.complete_plan(plan.id).unwrap();
    assert_eq!(coordinator.status(), CoordinatorStatus::Idle);
    assert_eq!(
        coordinator.complete_plan(plan.id).unwrap_err(),
        BalancerError::UnknownPlan(plan.id)
    );

    // The balanced result needs no further plan
    let outcome = coordinator.run(&after).unwrap();
    assert!(outcome.is_no_plan());
    assert_eq!(coordinator.status(), CoordinatorStatus::Idle);
}
