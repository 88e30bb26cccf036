//! Cluster Snapshot
//!
//! Mutable model of the region assignment owned by one balancer run.
//! Servers, regions and tables are addressed by dense indices assigned at
//! construction; every counter the cost functions read is maintained
//! incrementally as actions are applied and undone:
//! - regions per server (length of the server's region list)
//! - regions per (table, server)
//! - store file size per server
//! - number of regions away from their initial server

use regionbalancer_core::{BalancerError, ClusterState, RegionInfo, Result, ServerName, TableName};
use std::collections::HashMap;

use crate::action::Action;

/// One elementary region relocation, enough to reverse it exactly
#[derive(Debug, Clone, Copy)]
struct MoveRecord {
    region: usize,
    from: usize,
    to: usize,
    from_pos: usize,
}

/// Counters tracked by a snapshot, for equality checks in tests and debugging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counters {
    pub region_server: Vec<usize>,
    pub server_regions: Vec<Vec<usize>>,
    pub table_server_counts: Vec<Vec<usize>>,
    pub server_size_mb: Vec<u64>,
    pub moved_regions: usize,
}

/// Region assignment used during one optimization run
#[derive(Debug, Clone)]
pub struct ClusterSnapshot {
    servers: Vec<ServerName>,
    regions: Vec<RegionInfo>,
    tables: Vec<TableName>,
    region_table: Vec<usize>,
    region_size_mb: Vec<u64>,
    initial_server: Vec<usize>,
    region_server: Vec<usize>,
    /// Position of each region inside its server's list
    region_pos: Vec<usize>,
    server_regions: Vec<Vec<usize>>,
    /// Indexed `[table][server]`
    table_server_counts: Vec<Vec<usize>>,
    table_totals: Vec<usize>,
    server_size_mb: Vec<u64>,
    moved_regions: usize,
    journal: Vec<(Action, usize)>,
    records: Vec<MoveRecord>,
}

impl ClusterSnapshot {
    /// Build a snapshot from the current assignment
    ///
    /// Fails if a region is listed under more than one server.
    pub fn new(state: &ClusterState) -> Result<Self> {
        let server_count = state.assignments.len();
        let mut servers = Vec::with_capacity(server_count);
        let mut regions = Vec::new();
        let mut tables = Vec::new();
        let mut table_index: HashMap<&TableName, usize> = HashMap::new();
        let mut seen: HashMap<&RegionInfo, usize> = HashMap::new();
        let mut region_table = Vec::new();
        let mut region_size_mb = Vec::new();
        let mut region_server = Vec::new();
        let mut region_pos = Vec::new();
        let mut server_regions = Vec::with_capacity(server_count);
        let mut server_size_mb = vec![0u64; server_count];

        for (s, (server, hosted)) in state.assignments.iter().enumerate() {
            servers.push(server.clone());
            let mut list = Vec::with_capacity(hosted.len());

            for region in hosted {
                if let Some(&first) = seen.get(region) {
                    return Err(BalancerError::DuplicateAssignment {
                        region: region.region_name(),
                        first: servers[first].to_string(),
                        second: server.to_string(),
                    });
                }
                seen.insert(region, s);

                let t = *table_index.entry(&region.table).or_insert_with(|| {
                    tables.push(region.table.clone());
                    tables.len() - 1
                });
                let size = state
                    .load_of(region)
                    .map(|l| l.store_file_size_mb)
                    .unwrap_or(0);

                let r = regions.len();
                regions.push(region.clone());
                region_table.push(t);
                region_size_mb.push(size);
                region_server.push(s);
                region_pos.push(list.len());
                list.push(r);
                server_size_mb[s] += size;
            }

            server_regions.push(list);
        }

        let mut table_server_counts = vec![vec![0usize; server_count]; tables.len()];
        let mut table_totals = vec![0usize; tables.len()];
        for (r, &t) in region_table.iter().enumerate() {
            table_server_counts[t][region_server[r]] += 1;
            table_totals[t] += 1;
        }

        Ok(Self {
            servers,
            regions,
            tables,
            region_table,
            region_size_mb,
            initial_server: region_server.clone(),
            region_server,
            region_pos,
            server_regions,
            table_server_counts,
            table_totals,
            server_size_mb,
            moved_regions: 0,
            journal: Vec::new(),
            records: Vec::new(),
        })
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    pub fn total_regions(&self) -> usize {
        self.regions.len()
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Mean regions per server (0 for an empty cluster)
    pub fn average(&self) -> f64 {
        if self.servers.is_empty() {
            0.0
        } else {
            self.total_regions() as f64 / self.server_count() as f64
        }
    }

    pub fn region_count(&self, server: usize) -> usize {
        self.server_regions[server].len()
    }

    pub fn table_region_count(&self, table: usize, server: usize) -> usize {
        self.table_server_counts[table][server]
    }

    /// Regions of `table` across the whole cluster
    pub fn table_total(&self, table: usize) -> usize {
        self.table_totals[table]
    }

    pub fn server_size_mb(&self, server: usize) -> u64 {
        self.server_size_mb[server]
    }

    /// Regions currently away from the server they started on
    pub fn moved_regions(&self) -> usize {
        self.moved_regions
    }

    pub fn server(&self, server: usize) -> &ServerName {
        &self.servers[server]
    }

    pub fn region(&self, region: usize) -> &RegionInfo {
        &self.regions[region]
    }

    pub fn table(&self, table: usize) -> &TableName {
        &self.tables[table]
    }

    pub fn table_of(&self, region: usize) -> usize {
        self.region_table[region]
    }

    pub fn server_of(&self, region: usize) -> usize {
        self.region_server[region]
    }

    pub fn initial_server_of(&self, region: usize) -> usize {
        self.initial_server[region]
    }

    pub fn regions_on(&self, server: usize) -> &[usize] {
        &self.server_regions[server]
    }

    /// Current server of every region, indexed by region
    pub fn assignment(&self) -> &[usize] {
        &self.region_server
    }

    /// Server each region started on, indexed by region
    pub fn initial_assignment(&self) -> &[usize] {
        &self.initial_server
    }

    pub fn region_counts(&self) -> Vec<usize> {
        self.server_regions.iter().map(Vec::len).collect()
    }

    /// Fewest moves that bring every server to the floor or ceiling of the
    /// average region count
    ///
    /// The fullest servers keep the `total % servers` ceiling slots, so only
    /// the excess above each server's target has to move.
    pub fn moves_to_balance(&self) -> usize {
        let servers = self.server_count();
        if servers == 0 {
            return 0;
        }
        let floor = self.total_regions() / servers;
        let with_ceiling = self.total_regions() % servers;

        let mut counts = self.region_counts();
        counts.sort_unstable_by(|a, b| b.cmp(a));
        counts
            .iter()
            .enumerate()
            .map(|(i, &count)| {
                let target = if i < with_ceiling { floor + 1 } else { floor };
                count.saturating_sub(target)
            })
            .sum()
    }

    pub fn counters(&self) -> Counters {
        Counters {
            region_server: self.region_server.clone(),
            server_regions: self.server_regions.clone(),
            table_server_counts: self.table_server_counts.clone(),
            server_size_mb: self.server_size_mb.clone(),
            moved_regions: self.moved_regions,
        }
    }

    /// Whether `action` describes the current assignment
    pub fn is_legal(&self, action: &Action) -> bool {
        let n = self.server_count();
        match *action {
            Action::Null => true,
            Action::Move { region, from, to } => {
                region < self.total_regions()
                    && from != to
                    && to < n
                    && self.region_server[region] == from
            }
            Action::Swap {
                region_a,
                server_a,
                region_b,
                server_b,
            } => {
                server_a != server_b
                    && region_a < self.total_regions()
                    && region_b < self.total_regions()
                    && self.region_server[region_a] == server_a
                    && self.region_server[region_b] == server_b
            }
        }
    }

    /// Apply an action; it stays undoable until the next `commit`
    pub fn apply_action(&mut self, action: &Action) {
        debug_assert!(self.is_legal(action), "illegal action {:?}", action);
        let before = self.records.len();
        match *action {
            Action::Null => {}
            Action::Move { region, to, .. } => {
                self.relocate(region, to);
            }
            Action::Swap {
                region_a,
                server_a,
                region_b,
                server_b,
            } => {
                self.relocate(region_a, server_b);
                self.relocate(region_b, server_a);
            }
        }
        self.journal.push((*action, self.records.len() - before));
    }

    /// Reverse the most recent uncommitted action, restoring every counter
    /// and every region's position exactly
    pub fn undo_last_action(&mut self) -> Option<Action> {
        let (action, count) = self.journal.pop()?;
        for _ in 0..count {
            if let Some(record) = self.records.pop() {
                self.revert(record);
            }
        }
        Some(action)
    }

    /// Forget the undo history; applied actions become permanent
    pub fn commit(&mut self) {
        self.journal.clear();
        self.records.clear();
    }

    /// Number of actions that can still be undone
    pub fn pending_actions(&self) -> usize {
        self.journal.len()
    }

    fn relocate(&mut self, region: usize, to: usize) {
        let from = self.region_server[region];
        let from_pos = self.region_pos[region];

        let list = &mut self.server_regions[from];
        list.swap_remove(from_pos);
        if let Some(&displaced) = list.get(from_pos) {
            self.region_pos[displaced] = from_pos;
        }

        self.region_pos[region] = self.server_regions[to].len();
        self.server_regions[to].push(region);
        self.region_server[region] = to;
        self.shift_counters(region, from, to);

        self.records.push(MoveRecord {
            region,
            from,
            to,
            from_pos,
        });
    }

    fn revert(&mut self, record: MoveRecord) {
        let MoveRecord {
            region,
            from,
            to,
            from_pos,
        } = record;

        // LIFO undo keeps the region at the tail of its destination list
        let popped = self.server_regions[to].pop();
        debug_assert_eq!(popped, Some(region));

        let list = &mut self.server_regions[from];
        if from_pos < list.len() {
            let displaced = list[from_pos];
            list[from_pos] = region;
            self.region_pos[displaced] = list.len();
            list.push(displaced);
        } else {
            list.push(region);
        }

        self.region_pos[region] = from_pos;
        self.region_server[region] = from;
        self.shift_counters(region, to, from);
    }

    fn shift_counters(&mut self, region: usize, from: usize, to: usize) {
        let t = self.region_table[region];
        self.table_server_counts[t][from] -= 1;
        self.table_server_counts[t][to] += 1;

        let size = self.region_size_mb[region];
        self.server_size_mb[from] -= size;
        self.server_size_mb[to] += size;

        let initial = self.initial_server[region];
        if from == initial {
            self.moved_regions += 1;
        } else if to == initial {
            self.moved_regions -= 1;
        }
    }
}
