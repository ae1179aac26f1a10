//! Readiness classification for a demand line.

use serde::{Deserialize, Serialize};

use stockflow_core::Quantity;

/// Snapshot-in-time readiness of an (item, project) pair.
///
/// Recomputed on every ledger refresh; never persisted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessStatus {
    /// The project's allocation already covers the requirement.
    ReadyForOutward,
    /// Enough unallocated stock exists to cover the shortfall.
    AvailableForAllocation,
    /// Neither allocation nor available stock can cover the requirement.
    InsufficientStock,
}

/// Pure classification: no side effects, no ledger access.
pub fn classify(
    required: Quantity,
    project_allocation: Quantity,
    total_available: Quantity,
) -> ReadinessStatus {
    if project_allocation >= required {
        ReadinessStatus::ReadyForOutward
    } else if total_available >= required.saturating_sub(project_allocation) {
        ReadinessStatus::AvailableForAllocation
    } else {
        ReadinessStatus::InsufficientStock
    }
}
