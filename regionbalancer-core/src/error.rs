//! Error types for the region balancer
//!
//! Provides a unified error type for snapshot construction, configuration
//! validation and run coordination.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for balancer operations
pub type Result<T> = std::result::Result<T, BalancerError>;

/// Unified error type for the balancer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BalancerError {
    // ===== Input Errors =====
    #[error("Region {region} is assigned to both {first} and {second}")]
    DuplicateAssignment {
        region: String,
        first: String,
        second: String,
    },

    #[error("Invalid server name: {0}")]
    InvalidServerName(String),

    // ===== Configuration Errors =====
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ===== Run Coordination Errors =====
    #[error("A balancer run is already in progress")]
    RunInProgress,

    #[error("Plan {plan_id} is still being executed")]
    PlanInFlight { plan_id: Uuid },

    #[error("Unknown plan: {0}")]
    UnknownPlan(Uuid),

    #[error("Balancer run cancelled")]
    Cancelled,
}
