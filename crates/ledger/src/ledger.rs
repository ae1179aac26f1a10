//! Locally cached, refreshable view of remote stock state.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use thiserror::Error;

use stockflow_core::{ItemId, Location, ProjectCode, Quantity};

use crate::allocation::AllocationIndex;
use crate::item::InventoryItem;
use crate::stock::LocationStock;

/// Error on ledger reads: the recoverable "stale data" condition.
///
/// Callers must treat either variant the same way: refuse dependent actions
/// (staging, submit) until a fresh snapshot has been fetched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("no stock snapshot cached for item {0}")]
    Missing(ItemId),

    #[error("stock snapshot for item {0} is stale; refresh before continuing")]
    Stale(ItemId),
}

/// One item's per-location stock as fetched from the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct StockSnapshot {
    locations: BTreeMap<Location, LocationStock>,
    fetched_at: DateTime<Utc>,
}

impl StockSnapshot {
    pub fn new(locations: BTreeMap<Location, LocationStock>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            locations,
            fetched_at,
        }
    }

    pub fn location(&self, location: Location) -> Option<&LocationStock> {
        self.locations.get(&location)
    }

    pub fn locations(&self) -> &BTreeMap<Location, LocationStock> {
        &self.locations
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Sum of the `available` bucket across all locations.
    pub fn total_available(&self) -> Quantity {
        self.locations.values().map(LocationStock::available).sum()
    }
}

struct CachedSnapshot {
    snapshot: StockSnapshot,
    fresh: bool,
}

/// Arena of item master data plus cached per-item stock snapshots.
///
/// The backend is the source of truth; the ledger never mutates stock
/// figures itself. Freshness is explicit: a snapshot starts fresh when
/// inserted and turns stale on [`StockLedger::mark_stale`] (after a commit,
/// after a failed read, or after a remote insufficient-stock rejection).
/// Stale snapshots are unreadable through [`StockLedger::snapshot`] so that
/// no staging decision is made against them.
#[derive(Default)]
pub struct StockLedger {
    items: HashMap<ItemId, InventoryItem>,
    snapshots: HashMap<ItemId, CachedSnapshot>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_item(&mut self, item: InventoryItem) {
        self.items.insert(item.id_typed(), item);
    }

    pub fn item(&self, item_id: ItemId) -> Option<&InventoryItem> {
        self.items.get(&item_id)
    }

    /// Install a freshly fetched snapshot, replacing whatever was cached.
    pub fn insert_snapshot(&mut self, item_id: ItemId, snapshot: StockSnapshot) {
        self.snapshots.insert(
            item_id,
            CachedSnapshot {
                snapshot,
                fresh: true,
            },
        );
    }

    /// Degrade the cached snapshot (if any) to stale.
    pub fn mark_stale(&mut self, item_id: ItemId) {
        if let Some(cached) = self.snapshots.get_mut(&item_id) {
            cached.fresh = false;
        }
    }

    pub fn is_fresh(&self, item_id: ItemId) -> bool {
        self.snapshots
            .get(&item_id)
            .map(|c| c.fresh)
            .unwrap_or(false)
    }

    /// The cached snapshot, readable only while fresh.
    pub fn snapshot(&self, item_id: ItemId) -> Result<&StockSnapshot, LedgerError> {
        match self.snapshots.get(&item_id) {
            None => Err(LedgerError::Missing(item_id)),
            Some(cached) if !cached.fresh => Err(LedgerError::Stale(item_id)),
            Some(cached) => Ok(&cached.snapshot),
        }
    }

    /// The cached snapshot regardless of freshness (display-only reads).
    pub fn snapshot_unchecked(&self, item_id: ItemId) -> Option<&StockSnapshot> {
        self.snapshots.get(&item_id).map(|c| &c.snapshot)
    }

    /// Sum of `Allocation.quantity` for `project` across all of the item's
    /// locations.
    pub fn project_allocation(
        &self,
        item_id: ItemId,
        project: &ProjectCode,
    ) -> Result<Quantity, LedgerError> {
        Ok(AllocationIndex::new(self.snapshot(item_id)?).total(project))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stock::Allocation;

    fn qty(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    fn snapshot_with(available: &str, allocated_to_prj: &str) -> StockSnapshot {
        let stock = LocationStock::new(
            qty("500"),
            qty(allocated_to_prj),
            qty(available),
            qty("0"),
            vec![Allocation {
                project_code: ProjectCode::new("PRJ-1").unwrap(),
                quantity: qty(allocated_to_prj),
                allocation_date: Utc::now(),
                remarks: None,
            }],
        )
        .unwrap();
        StockSnapshot::new(
            BTreeMap::from([(Location::Sakar, stock)]),
            Utc::now(),
        )
    }

    #[test]
    fn missing_snapshot_is_a_read_failure() {
        let ledger = StockLedger::new();
        let item = ItemId::new();
        assert_eq!(ledger.snapshot(item).unwrap_err(), LedgerError::Missing(item));
    }

    #[test]
    fn stale_snapshot_blocks_reads_until_reinserted() {
        let mut ledger = StockLedger::new();
        let item = ItemId::new();

        ledger.insert_snapshot(item, snapshot_with("40", "30"));
        assert!(ledger.snapshot(item).is_ok());
        assert!(ledger.is_fresh(item));

        ledger.mark_stale(item);
        assert_eq!(ledger.snapshot(item).unwrap_err(), LedgerError::Stale(item));
        assert!(ledger.snapshot_unchecked(item).is_some());

        ledger.insert_snapshot(item, snapshot_with("40", "30"));
        assert!(ledger.snapshot(item).is_ok());
    }

    #[test]
    fn caches_item_master_data_by_id() {
        let mut ledger = StockLedger::new();
        let item = InventoryItem::new(ItemId::new(), "ITM-0007", "MS Angle 50x50", None, None)
            .unwrap();
        let id = item.id_typed();

        ledger.upsert_item(item.clone());
        assert_eq!(ledger.item(id), Some(&item));
        assert!(ledger.item(ItemId::new()).is_none());
    }

    #[test]
    fn project_allocation_sums_across_the_snapshot() {
        let mut ledger = StockLedger::new();
        let item = ItemId::new();
        ledger.insert_snapshot(item, snapshot_with("10", "25.50"));

        let prj = ProjectCode::new("PRJ-1").unwrap();
        assert_eq!(ledger.project_allocation(item, &prj).unwrap(), qty("25.50"));

        let other = ProjectCode::new("PRJ-2").unwrap();
        assert_eq!(ledger.project_allocation(item, &other).unwrap(), Quantity::ZERO);
    }
}
