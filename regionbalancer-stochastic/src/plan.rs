//! Balance Plan
//!
//! Turns the best assignment found by a run into region moves:
//! - One move per region whose server differs from its initial one
//! - Moves grouped into waves, each wave sending at most
//!   `max_moves_per_server` regions to any one destination
//! - Destinations are served round-robin so no server is flooded first

use regionbalancer_core::{ClusterState, RegionPlan, ServerName};
use std::collections::{BTreeMap, HashSet, VecDeque};
use uuid::Uuid;

use crate::cluster::ClusterSnapshot;

/// Ordered region moves produced by one balancer run
#[derive(Debug, Clone)]
pub struct Plan {
    /// Plan ID
    pub id: Uuid,
    moves: Vec<RegionPlan>,
    /// Exclusive end index of each wave in `moves`
    wave_ends: Vec<usize>,
}

impl Plan {
    /// A plan with no moves
    pub fn empty() -> Self {
        Self {
            id: Uuid::new_v4(),
            moves: Vec::new(),
            wave_ends: Vec::new(),
        }
    }

    pub fn moves(&self) -> &[RegionPlan] {
        &self.moves
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn wave_count(&self) -> usize {
        self.wave_ends.len()
    }

    /// Moves grouped by wave, in execution order
    pub fn waves(&self) -> impl Iterator<Item = &[RegionPlan]> + '_ {
        let mut start = 0;
        self.wave_ends.iter().map(move |&end| {
            let wave = &self.moves[start..end];
            start = end;
            wave
        })
    }

    /// Moves that leave `server`
    pub fn moves_from(&self, server: &ServerName) -> Vec<&RegionPlan> {
        self.moves.iter().filter(|m| &m.source == server).collect()
    }

    /// Moves that land on `server`
    pub fn moves_to(&self, server: &ServerName) -> Vec<&RegionPlan> {
        self.moves
            .iter()
            .filter(|m| &m.destination == server)
            .collect()
    }

    /// The cluster state after every move has been executed
    ///
    /// Moves whose region is not on its recorded source are skipped.
    pub fn apply_to(&self, state: &ClusterState) -> ClusterState {
        let mut result = state.clone();
        for plan in &self.moves {
            let Some(source) = result.assignments.get_mut(&plan.source) else {
                continue;
            };
            let Some(pos) = source.iter().position(|r| r == &plan.region) else {
                continue;
            };
            let region = source.remove(pos);
            result
                .assignments
                .entry(plan.destination.clone())
                .or_default()
                .push(region);
        }
        result
    }

    pub fn summary(&self) -> String {
        let sources: HashSet<_> = self.moves.iter().map(|m| &m.source).collect();
        let destinations: HashSet<_> = self.moves.iter().map(|m| &m.destination).collect();
        format!(
            "plan {}: {} moves in {} waves, {} source servers, {} destination servers",
            self.id,
            self.moves.len(),
            self.wave_ends.len(),
            sources.len(),
            destinations.len()
        )
    }
}

/// Builds a [`Plan`] from a target assignment
#[derive(Debug, Clone, Copy)]
pub struct PlanBuilder {
    max_moves_per_server: usize,
}

impl PlanBuilder {
    pub fn new(max_moves_per_server: usize) -> Self {
        Self {
            max_moves_per_server: max_moves_per_server.max(1),
        }
    }

    /// Diff `target` (server index per region) against the snapshot's
    /// initial assignment
    pub fn build(&self, snapshot: &ClusterSnapshot, target: &[usize]) -> Plan {
        let mut queues: BTreeMap<usize, VecDeque<RegionPlan>> = BTreeMap::new();
        for (region, &destination) in target.iter().enumerate() {
            let source = snapshot.initial_server_of(region);
            if source == destination {
                continue;
            }
            queues.entry(destination).or_default().push_back(RegionPlan::new(
                snapshot.region(region).clone(),
                snapshot.server(source).clone(),
                snapshot.server(destination).clone(),
            ));
        }

        let mut moves = Vec::new();
        let mut wave_ends = Vec::new();
        while !queues.is_empty() {
            for queue in queues.values_mut() {
                let take = queue.len().min(self.max_moves_per_server);
                moves.extend(queue.drain(..take));
            }
            queues.retain(|_, queue| !queue.is_empty());
            wave_ends.push(moves.len());
        }

        Plan {
            id: Uuid::new_v4(),
            moves,
            wave_ends,
        }
    }
}
