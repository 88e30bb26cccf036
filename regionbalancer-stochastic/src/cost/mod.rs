//! Cost functions
//!
//! Each cost function scores one balance dimension of a snapshot in [0, 1]
//! (0 = perfectly balanced). The registry holds the enabled functions with
//! their weights and reports the weighted total the optimizer minimizes.

use crate::action::Action;
use crate::cluster::ClusterSnapshot;
use crate::config::BalancerConfig;

mod move_cost;
mod skew;
pub mod stats;
mod store_file;

pub use move_cost::MoveCostFunction;
pub use skew::{RegionCountSkewCostFunction, TableSkewCostFunction};
pub use stats::cost_from_stats;
pub use store_file::StoreFileCostFunction;

/// Scores one balance dimension of a snapshot
pub trait CostFunction: Send {
    /// Name of this cost function
    fn name(&self) -> &'static str;

    /// Score the snapshot from scratch, leaving cached state untouched
    fn score(&self, snapshot: &ClusterSnapshot) -> f64;

    /// Recompute cached partial sums for `snapshot` and return its score
    fn prepare(&mut self, snapshot: &ClusterSnapshot) -> f64;

    /// Rescore after `action` was applied to, or undone on, `snapshot`
    ///
    /// The default rescans; functions with an incremental form override it.
    fn score_delta(&mut self, snapshot: &ClusterSnapshot, _action: &Action) -> f64 {
        self.prepare(snapshot)
    }
}

struct WeightedCost {
    function: Box<dyn CostFunction>,
    weight: f64,
    value: f64,
}

/// Enabled cost functions and their weights
pub struct CostRegistry {
    entries: Vec<WeightedCost>,
}

impl CostRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registry with the built-in cost functions weighted per `config`
    pub fn from_config(config: &BalancerConfig) -> Self {
        let mut registry = Self::new();
        registry.register(
            Box::new(RegionCountSkewCostFunction::new()),
            config.region_count_skew_cost,
        );
        registry.register(Box::new(TableSkewCostFunction::new()), config.table_skew_cost);
        registry.register(
            Box::new(MoveCostFunction::new(
                config.max_moves_percent,
                config.min_max_moves,
            )),
            config.move_cost,
        );
        registry.register(Box::new(StoreFileCostFunction::new()), config.store_file_cost);
        registry
    }

    /// Add a cost function; a weight of 0 leaves it disabled
    pub fn register(&mut self, function: Box<dyn CostFunction>, weight: f64) {
        if weight > 0.0 {
            self.entries.push(WeightedCost {
                function,
                weight,
                value: 0.0,
            });
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Prime every function for `snapshot` and return the weighted total
    pub fn prepare(&mut self, snapshot: &ClusterSnapshot) -> f64 {
        for entry in &mut self.entries {
            entry.value = entry.function.prepare(snapshot);
        }
        self.total()
    }

    /// Rescore after `action` was applied or undone and return the weighted total
    pub fn update(&mut self, snapshot: &ClusterSnapshot, action: &Action) -> f64 {
        if action.is_null() {
            return self.total();
        }
        for entry in &mut self.entries {
            entry.value = entry.function.score_delta(snapshot, action);
        }
        self.total()
    }

    /// Weighted sum of the last computed values
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|e| e.weight * e.value).sum()
    }

    /// Weighted total scored from scratch
    pub fn score(&self, snapshot: &ClusterSnapshot) -> f64 {
        self.entries
            .iter()
            .map(|e| e.weight * e.function.score(snapshot))
            .sum()
    }

    /// Last computed (name, unweighted value) per enabled function
    pub fn breakdown(&self) -> Vec<(&'static str, f64)> {
        self.entries
            .iter()
            .map(|e| (e.function.name(), e.value))
            .collect()
    }
}

impl Default for CostRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regionbalancer_core::{ClusterState, RegionInfo, ServerName};

    fn snapshot(counts: &[usize]) -> ClusterSnapshot {
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
        ClusterSnapshot::new(&state).unwrap()
    }

    #[test]
    fn test_zero_weight_disables() {
        let config = BalancerConfig {
            table_skew_cost: 0.0,
            store_file_cost: 0.0,
            ..Default::default()
        };
        let registry = CostRegistry::from_config(&config);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_weighted_total() {
        let config = BalancerConfig {
            region_count_skew_cost: 10.0,
            table_skew_cost: 1.0,
            move_cost: 0.0,
            store_file_cost: 0.0,
            ..Default::default()
        };
        let mut registry = CostRegistry::from_config(&config);
        let snap = snapshot(&[0, 0, 0, 0, 1]);

        // One table, so table skew equals region count skew
        let total = registry.prepare(&snap);
        assert!((total - 11.0).abs() < 1e-9);
        assert!((registry.score(&snap) - total).abs() < 1e-9);

        let names: Vec<_> = registry.breakdown().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["region_count_skew", "table_skew"]);
    }

    #[test]
    fn test_update_tracks_full_score() {
        let mut registry = CostRegistry::from_config(&BalancerConfig::default());
        let mut snap = snapshot(&[6, 1, 0, 0]);
        registry.prepare(&snap);

        let r = snap.regions_on(0)[0];
        let action = Action::Move {
            region: r,
            from: 0,
            to: 2,
        };
        snap.apply_action(&action);
        let incremental = registry.update(&snap, &action);
        assert!((incremental - registry.score(&snap)).abs() < 1e-9);

        snap.undo_last_action();
        let restored = registry.update(&snap, &action);
        assert!((restored - registry.score(&snap)).abs() < 1e-9);
    }
}
