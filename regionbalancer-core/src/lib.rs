//! Region Balancer Core Library
//!
//! Shared abstractions for the region placement balancer.
//! This crate provides:
//! - Server and region identities (`ServerName`, `RegionInfo`, `TableName`)
//! - The cluster state handed to the balancer (`ClusterState`)
//! - Move instructions produced by a balancer run (`RegionPlan`)
//! - Common error handling

pub mod error;
pub mod plan;
pub mod region;
pub mod server;
pub mod state;

pub use error::{BalancerError, Result};
pub use plan::RegionPlan;
pub use region::{RegionInfo, RegionLoad, TableName};
pub use server::ServerName;
pub use state::ClusterState;

/// Length of an encoded region name in hex characters
pub const ENCODED_NAME_LEN: usize = 32;
