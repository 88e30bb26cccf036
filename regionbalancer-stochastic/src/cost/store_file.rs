//! Store file size dispersion across servers

use super::stats::{cost_from_stats, dispersion_from_moments};
use super::CostFunction;
use crate::action::Action;
use crate::cluster::ClusterSnapshot;

/// Dispersion of per-server store file sizes
///
/// Keeps the exact sum of squared per-server sizes; the plain sum is
/// invariant under moves.
#[derive(Debug, Default)]
pub struct StoreFileCostFunction {
    squares: Vec<u128>,
    sum_sq: u128,
    sum: u128,
    servers: u64,
}

impl StoreFileCostFunction {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> f64 {
        dispersion_from_moments(self.servers, self.sum, self.sum_sq)
    }
}

impl CostFunction for StoreFileCostFunction {
    fn name(&self) -> &'static str {
        "store_file"
    }

    fn score(&self, snapshot: &ClusterSnapshot) -> f64 {
        let sizes: Vec<f64> = (0..snapshot.server_count())
            .map(|s| snapshot.server_size_mb(s) as f64)
            .collect();
        cost_from_stats(&sizes)
    }

    fn prepare(&mut self, snapshot: &ClusterSnapshot) -> f64 {
        let n = snapshot.server_count();
        self.servers = n as u64;
        self.squares = (0..n)
            .map(|s| {
                let size = snapshot.server_size_mb(s) as u128;
                size * size
            })
            .collect();
        self.sum_sq = self.squares.iter().sum();
        self.sum = (0..n).map(|s| snapshot.server_size_mb(s) as u128).sum();
        self.current()
    }

    fn score_delta(&mut self, snapshot: &ClusterSnapshot, action: &Action) -> f64 {
        if let Some(servers) = action.servers() {
            for s in servers {
                let size = snapshot.server_size_mb(s) as u128;
                let square = size * size;
                self.sum_sq = self.sum_sq - self.squares[s] + square;
                self.squares[s] = square;
            }
        }
        self.current()
    }
}
