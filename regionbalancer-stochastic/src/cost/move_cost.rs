//! Cost of data movement

use super::CostFunction;
use crate::action::Action;
use crate::cluster::ClusterSnapshot;

/// Fraction of the per-run move cap already spent
///
/// Reads the snapshot's moved-region counter, which is maintained
/// incrementally, so every rescore is O(1).
#[derive(Debug, Clone)]
pub struct MoveCostFunction {
    max_moves_percent: f64,
    min_max_moves: u64,
    scale: usize,
}

impl MoveCostFunction {
    pub fn new(max_moves_percent: f64, min_max_moves: u64) -> Self {
        Self {
            max_moves_percent,
            min_max_moves,
            scale: 1,
        }
    }

    /// Move cap for a cluster with `total_regions` regions
    pub fn max_moves(&self, total_regions: usize) -> usize {
        let by_percent = (total_regions as f64 * self.max_moves_percent).ceil() as u64;
        by_percent.max(self.min_max_moves) as usize
    }

    fn cost_of(&self, moved: usize) -> f64 {
        (moved as f64 / self.scale as f64).clamp(0.0, 1.0)
    }
}

impl CostFunction for MoveCostFunction {
    fn name(&self) -> &'static str {
        "move"
    }

    fn score(&self, snapshot: &ClusterSnapshot) -> f64 {
        let total = snapshot.total_regions();
        let scale = total.min(self.max_moves(total)).max(1);
        (snapshot.moved_regions() as f64 / scale as f64).clamp(0.0, 1.0)
    }

    fn prepare(&mut self, snapshot: &ClusterSnapshot) -> f64 {
        let total = snapshot.total_regions();
        self.scale = total.min(self.max_moves(total)).max(1);
        self.cost_of(snapshot.moved_regions())
    }

    fn score_delta(&mut self, snapshot: &ClusterSnapshot, _action: &Action) -> f64 {
        self.cost_of(snapshot.moved_regions())
    }
}
