//! Wire DTOs for reads whose domain types carry cross-field invariants.
//!
//! `LocationStock` and `RequiredItem` are validated/derived on construction,
//! so their wire shapes deserialize into raw DTOs first and convert through
//! the domain constructors. Everything else round-trips through serde
//! directly.

use std::collections::BTreeMap;

use serde::Deserialize;

use stockflow_core::{DomainError, Location, Quantity};
use stockflow_ledger::{Allocation, LocationStock, RequiredItem};

/// Raw `LocationStock` as returned by `GET /inventory/{id}/location-stock/`.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationStockDto {
    pub total: Quantity,
    pub allocated: Quantity,
    pub available: Quantity,
    pub outward: Quantity,
    #[serde(default)]
    pub allocations: Vec<Allocation>,
}

impl TryFrom<LocationStockDto> for LocationStock {
    type Error = DomainError;

    fn try_from(dto: LocationStockDto) -> Result<Self, Self::Error> {
        LocationStock::new(
            dto.total,
            dto.allocated,
            dto.available,
            dto.outward,
            dto.allocations,
        )
    }
}

/// The full per-location response body, keyed by location display name.
pub type LocationStockResponse = BTreeMap<Location, LocationStockDto>;

/// Convert a response body into the domain map, enforcing stock invariants.
pub fn into_location_stocks(
    body: LocationStockResponse,
) -> Result<BTreeMap<Location, LocationStock>, DomainError> {
    body.into_iter()
        .map(|(location, dto)| Ok((location, dto.try_into()?)))
        .collect()
}

/// Raw requirement row from `GET /project-requirements/{project_code}/`.
///
/// `remaining_quantity` never travels; it is derived locally.
#[derive(Debug, Clone, Deserialize)]
pub struct RequiredItemDto {
    pub item_id: stockflow_core::ItemId,
    pub required_quantity: Quantity,
    #[serde(default)]
    pub outwarded_quantity: Quantity,
}

impl From<RequiredItemDto> for RequiredItem {
    fn from(dto: RequiredItemDto) -> Self {
        RequiredItem::new(dto.item_id, dto.required_quantity, dto.outwarded_quantity)
    }
}
