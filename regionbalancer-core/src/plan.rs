//! Region move instructions

use crate::region::RegionInfo;
use crate::server::ServerName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Move one region from `source` to `destination`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionPlan {
    pub region: RegionInfo,
    pub source: ServerName,
    pub destination: ServerName,
}

impl RegionPlan {
    pub fn new(region: RegionInfo, source: ServerName, destination: ServerName) -> Self {
        Self {
            region,
            source,
            destination,
        }
    }
}

impl fmt::Display for RegionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {}",
            self.region.encoded_name(),
            self.source,
            self.destination
        )
    }
}
