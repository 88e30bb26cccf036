//! Region count skew across servers and within each table

use super::stats::{scaled_deviation, skew_from_deviation};
use super::CostFunction;
use crate::action::Action;
use crate::cluster::ClusterSnapshot;

/// Skew of per-server region counts over the whole cluster
///
/// Caches each server's scaled deviation from the mean and their sum, so a
/// rescore after an action touches two servers.
#[derive(Debug, Default)]
pub struct RegionCountSkewCostFunction {
    deviations: Vec<u64>,
    deviation_sum: u64,
    servers: usize,
    total: usize,
}

impl RegionCountSkewCostFunction {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> f64 {
        skew_from_deviation(self.deviation_sum, self.servers, self.total)
    }
}

impl CostFunction for RegionCountSkewCostFunction {
    fn name(&self) -> &'static str {
        "region_count_skew"
    }

    fn score(&self, snapshot: &ClusterSnapshot) -> f64 {
        super::stats::skew_cost(&snapshot.region_counts())
    }

    fn prepare(&mut self, snapshot: &ClusterSnapshot) -> f64 {
        self.servers = snapshot.server_count();
        self.total = snapshot.total_regions();
        self.deviations = (0..self.servers)
            .map(|s| scaled_deviation(self.servers, snapshot.region_count(s), self.total))
            .collect();
        self.deviation_sum = self.deviations.iter().sum();
        self.current()
    }

    fn score_delta(&mut self, snapshot: &ClusterSnapshot, action: &Action) -> f64 {
        if let Some(servers) = action.servers() {
            for s in servers {
                let updated = scaled_deviation(self.servers, snapshot.region_count(s), self.total);
                self.deviation_sum = self.deviation_sum - self.deviations[s] + updated;
                self.deviations[s] = updated;
            }
        }
        self.current()
    }
}

/// Mean over tables of each table's own region count skew
///
/// Penalizes a table whose regions cluster on a few servers even when the
/// cluster as a whole is even.
#[derive(Debug, Default)]
pub struct TableSkewCostFunction {
    /// Indexed `[table][server]`
    deviations: Vec<Vec<u64>>,
    deviation_sums: Vec<u64>,
    table_costs: Vec<f64>,
    cost_sum: f64,
    servers: usize,
}

impl TableSkewCostFunction {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> f64 {
        if self.table_costs.is_empty() {
            0.0
        } else {
            (self.cost_sum / self.table_costs.len() as f64).clamp(0.0, 1.0)
        }
    }

    fn refresh(&mut self, snapshot: &ClusterSnapshot, table: usize, server: usize) {
        let total = snapshot.table_total(table);
        let updated = scaled_deviation(
            self.servers,
            snapshot.table_region_count(table, server),
            total,
        );
        let sum = self.deviation_sums[table] - self.deviations[table][server] + updated;
        self.deviations[table][server] = updated;
        self.deviation_sums[table] = sum;

        let cost = skew_from_deviation(sum, self.servers, total);
        self.cost_sum += cost - self.table_costs[table];
        self.table_costs[table] = cost;
    }
}

impl CostFunction for TableSkewCostFunction {
    fn name(&self) -> &'static str {
        "table_skew"
    }

    fn score(&self, snapshot: &ClusterSnapshot) -> f64 {
        let tables = snapshot.table_count();
        if tables == 0 {
            return 0.0;
        }
        let n = snapshot.server_count();
        let sum: f64 = (0..tables)
            .map(|t| {
                let counts: Vec<usize> =
                    (0..n).map(|s| snapshot.table_region_count(t, s)).collect();
                super::stats::skew_cost(&counts)
            })
            .sum();
        (sum / tables as f64).clamp(0.0, 1.0)
    }

    fn prepare(&mut self, snapshot: &ClusterSnapshot) -> f64 {
        let n = snapshot.server_count();
        let tables = snapshot.table_count();
        self.servers = n;
        self.deviations = (0..tables)
            .map(|t| {
                let total = snapshot.table_total(t);
                (0..n)
                    .map(|s| scaled_deviation(n, snapshot.table_region_count(t, s), total))
                    .collect()
            })
            .collect();
        self.deviation_sums = self.deviations.iter().map(|d| d.iter().sum()).collect();
        self.table_costs = (0..tables)
            .map(|t| skew_from_deviation(self.deviation_sums[t], n, snapshot.table_total(t)))
            .collect();
        self.cost_sum = self.table_costs.iter().sum();
        self.current()
    }

    fn score_delta(&mut self, snapshot: &ClusterSnapshot, action: &Action) -> f64 {
        let Some(servers) = action.servers() else {
            return self.current();
        };
        let [first, second] = action.regions();
        let table_a = first.map(|r| snapshot.table_of(r));
        let table_b = second.map(|r| snapshot.table_of(r)).filter(|&t| Some(t) != table_a);

        for table in [table_a, table_b].into_iter().flatten() {
            for s in servers {
                self.refresh(snapshot, table, s);
            }
        }
        self.current()
    }
}
