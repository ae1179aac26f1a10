//! Per-location stock buckets and project allocations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, ProjectCode, Quantity, ValueObject};

/// Which bucket an outward movement draws stock from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutwardType {
    /// Draw from stock already allocated to the project.
    Allocated,
    /// Draw from unallocated, freely available stock.
    Available,
}

/// A claim against a location's allocated bucket for a specific project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub project_code: ProjectCode,
    pub quantity: Quantity,
    pub allocation_date: DateTime<Utc>,
    pub remarks: Option<String>,
}

impl ValueObject for Allocation {}

/// Stock buckets for one (item, location) pair.
///
/// Invariants, enforced at construction:
/// - `allocated + available <= total` (outward is already removed from the
///   total accounting, so it does not participate);
/// - allocation quantities sum to at most `allocated`.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationStock {
    total: Quantity,
    allocated: Quantity,
    available: Quantity,
    outward: Quantity,
    allocations: Vec<Allocation>,
}

impl LocationStock {
    pub fn new(
        total: Quantity,
        allocated: Quantity,
        available: Quantity,
        outward: Quantity,
        allocations: Vec<Allocation>,
    ) -> DomainResult<Self> {
        if allocated + available > total {
            return Err(DomainError::invariant(format!(
                "allocated ({allocated}) + available ({available}) exceeds total ({total})"
            )));
        }
        let claimed: Quantity = allocations.iter().map(|a| a.quantity).sum();
        if claimed > allocated {
            return Err(DomainError::invariant(format!(
                "allocation records sum to {claimed}, more than the allocated bucket {allocated}"
            )));
        }
        Ok(Self {
            total,
            allocated,
            available,
            outward,
            allocations,
        })
    }

    /// An empty bucket (no stock at this location).
    pub fn empty() -> Self {
        Self {
            total: Quantity::ZERO,
            allocated: Quantity::ZERO,
            available: Quantity::ZERO,
            outward: Quantity::ZERO,
            allocations: Vec::new(),
        }
    }

    pub fn total(&self) -> Quantity {
        self.total
    }

    pub fn allocated(&self) -> Quantity {
        self.allocated
    }

    pub fn available(&self) -> Quantity {
        self.available
    }

    pub fn outward(&self) -> Quantity {
        self.outward
    }

    pub fn allocations(&self) -> &[Allocation] {
        &self.allocations
    }

    /// Portion of this location's allocated bucket claimed by `project`.
    pub fn allocated_to(&self, project: &ProjectCode) -> Quantity {
        self.allocations
            .iter()
            .filter(|a| &a.project_code == project)
            .map(|a| a.quantity)
            .sum()
    }
}
