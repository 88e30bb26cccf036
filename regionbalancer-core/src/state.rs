//! Cluster state handed to the balancer
//!
//! The master's in-memory view of which regions live on which servers, plus
//! whatever per-region load it has collected.

use crate::region::{RegionInfo, RegionLoad};
use crate::server::ServerName;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Current assignment of regions to servers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterState {
    /// Regions hosted by each server, in the order the server reports them
    pub assignments: BTreeMap<ServerName, Vec<RegionInfo>>,
    /// Region loads keyed by encoded region name
    #[serde(default)]
    pub loads: HashMap<String, RegionLoad>,
}

impl ClusterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a server → regions map without load information
    pub fn from_assignments(assignments: BTreeMap<ServerName, Vec<RegionInfo>>) -> Self {
        Self {
            assignments,
            loads: HashMap::new(),
        }
    }

    /// Add a server with its regions (replaces any previous entry)
    pub fn with_server(mut self, server: ServerName, regions: Vec<RegionInfo>) -> Self {
        self.assignments.insert(server, regions);
        self
    }

    /// Record load for a region
    pub fn with_load(mut self, region: &RegionInfo, load: RegionLoad) -> Self {
        self.loads.insert(region.encoded_name(), load);
        self
    }

    pub fn server_count(&self) -> usize {
        self.assignments.len()
    }

    /// Number of region entries across all servers (duplicates counted twice)
    pub fn region_count(&self) -> usize {
        self.assignments.values().map(Vec::len).sum()
    }

    pub fn load_of(&self, region: &RegionInfo) -> Option<&RegionLoad> {
        self.loads.get(&region.encoded_name())
    }

    /// Region counts per server, in server order
    pub fn region_counts(&self) -> Vec<usize> {
        self.assignments.values().map(Vec::len).collect()
    }
}
