//! Session-scoped accumulator of pending outward selections.
//!
//! Every mutation clamps against three bounds derived from the current
//! ledger snapshot: the requested quantity, the location's capacity for the
//! chosen stock source, and the project's remaining requirement net of what
//! is already staged at other locations. The bounds come from a possibly
//! outdated snapshot, so they are advisory at edit time; checkout
//! re-validates against a fresh snapshot before submitting.

use std::collections::BTreeMap;

use thiserror::Error;

use stockflow_core::{ItemId, Location, ProjectCode, Quantity};
use stockflow_infra::OutwardEntry;
use stockflow_ledger::{AllocationIndex, OutwardType, StockSnapshot};

/// Which bound forced a rejected add to zero.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BindingConstraint {
    /// The location has nothing to draw from for the chosen stock source.
    LocationCapacity,
    /// The requirement is already covered by quantities staged elsewhere.
    RemainingRequirement,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartError {
    #[error("requested quantity must be positive")]
    NothingRequested,

    #[error("cannot add item {item_id} at {location}: {constraint:?} leaves no room")]
    CannotAdd {
        item_id: ItemId,
        location: Location,
        constraint: BindingConstraint,
    },

    #[error("item {0} is staged with a different stock source")]
    OutwardTypeMismatch(ItemId),

    #[error("item {0} is not in the cart")]
    UnknownEntry(ItemId),
}

/// The clamping bounds for one item, captured from a fresh snapshot.
pub struct StageBounds<'a> {
    snapshot: &'a StockSnapshot,
    project: &'a ProjectCode,
    remaining_required: Quantity,
}

impl<'a> StageBounds<'a> {
    pub fn new(
        snapshot: &'a StockSnapshot,
        project: &'a ProjectCode,
        remaining_required: Quantity,
    ) -> Self {
        Self {
            snapshot,
            project,
            remaining_required,
        }
    }

    pub fn remaining_required(&self) -> Quantity {
        self.remaining_required
    }

    /// The most one location can supply for the given stock source.
    pub fn max_location_qty(&self, location: Location, outward_type: OutwardType) -> Quantity {
        match outward_type {
            OutwardType::Allocated => {
                AllocationIndex::new(self.snapshot).at(location, self.project)
            }
            OutwardType::Available => self
                .snapshot
                .location(location)
                .map(|stock| stock.available())
                .unwrap_or(Quantity::ZERO),
        }
    }
}

/// One item's staged selections.
#[derive(Debug, Clone, PartialEq)]
pub struct CartEntry {
    outward_type: OutwardType,
    location_quantities: BTreeMap<Location, Quantity>,
}

impl CartEntry {
    pub fn outward_type(&self) -> OutwardType {
        self.outward_type
    }

    pub fn location_quantities(&self) -> &BTreeMap<Location, Quantity> {
        &self.location_quantities
    }

    pub fn quantity_at(&self, location: Location) -> Quantity {
        self.location_quantities
            .get(&location)
            .copied()
            .unwrap_or(Quantity::ZERO)
    }

    pub fn total_quantity(&self) -> Quantity {
        self.location_quantities.values().copied().sum()
    }
}

/// Quantity edit operations on a staged location.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UpdateOp {
    /// Raise by exactly one unit.
    Increment,
    /// Lower by exactly one unit; reaching zero deletes the location.
    Decrement,
    /// Clamp an arbitrary target; zero deletes the location.
    Set(Quantity),
}

/// Pending outward selections, per item and per location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutwardCart {
    entries: BTreeMap<ItemId, CartEntry>,
}

impl OutwardCart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &BTreeMap<ItemId, CartEntry> {
        &self.entries
    }

    pub fn entry(&self, item_id: ItemId) -> Option<&CartEntry> {
        self.entries.get(&item_id)
    }

    /// Stage (or restage) a quantity for one item at one location.
    ///
    /// The stored quantity is `min(requested, location capacity, remaining
    /// requirement net of other locations)`. A clamp to zero mutates nothing
    /// and names the binding constraint.
    pub fn add(
        &mut self,
        bounds: &StageBounds<'_>,
        item_id: ItemId,
        outward_type: OutwardType,
        location: Location,
        requested: Quantity,
    ) -> Result<Quantity, CartError> {
        if !requested.is_positive() {
            return Err(CartError::NothingRequested);
        }
        if let Some(entry) = self.entries.get(&item_id)
            && entry.outward_type != outward_type
        {
            return Err(CartError::OutwardTypeMismatch(item_id));
        }

        let clamped = self.clamp(bounds, item_id, outward_type, location, requested);
        if clamped.is_zero() {
            let constraint = if bounds.max_location_qty(location, outward_type).is_zero() {
                BindingConstraint::LocationCapacity
            } else {
                BindingConstraint::RemainingRequirement
            };
            return Err(CartError::CannotAdd {
                item_id,
                location,
                constraint,
            });
        }

        let entry = self.entries.entry(item_id).or_insert_with(|| CartEntry {
            outward_type,
            location_quantities: BTreeMap::new(),
        });
        entry.location_quantities.insert(location, clamped);
        Ok(clamped)
    }

    /// Edit a staged location's quantity, reclamping against the bounds.
    ///
    /// Returns the quantity now stored at that location; zero means the
    /// location (and, if it was the last one, the item) was deleted.
    pub fn update(
        &mut self,
        bounds: &StageBounds<'_>,
        item_id: ItemId,
        location: Location,
        op: UpdateOp,
    ) -> Result<Quantity, CartError> {
        let entry = self
            .entries
            .get(&item_id)
            .ok_or(CartError::UnknownEntry(item_id))?;
        let outward_type = entry.outward_type;
        let current = entry.quantity_at(location);

        let target = match op {
            UpdateOp::Increment => current + Quantity::ONE,
            UpdateOp::Decrement => current.saturating_sub(Quantity::ONE),
            UpdateOp::Set(target) => target,
        };
        let clamped = self.clamp(bounds, item_id, outward_type, location, target);

        if clamped.is_zero() {
            self.remove(item_id, location);
        } else {
            self.entries
                .get_mut(&item_id)
                .ok_or(CartError::UnknownEntry(item_id))?
                .location_quantities
                .insert(location, clamped);
        }
        Ok(clamped)
    }

    /// Unconditionally drop one staged location. No-op if absent; dropping
    /// the last location drops the item entry too.
    pub fn remove(&mut self, item_id: ItemId, location: Location) {
        if let Some(entry) = self.entries.get_mut(&item_id) {
            entry.location_quantities.remove(&location);
            if entry.location_quantities.is_empty() {
                self.entries.remove(&item_id);
            }
        }
    }

    /// Switch an item's stock source, reclamping every staged location
    /// against the new source's bounds. Locations clamped to zero are
    /// dropped rather than left over-limit.
    pub fn set_outward_type(
        &mut self,
        bounds: &StageBounds<'_>,
        item_id: ItemId,
        outward_type: OutwardType,
    ) -> Result<(), CartError> {
        let entry = self
            .entries
            .get(&item_id)
            .ok_or(CartError::UnknownEntry(item_id))?;
        if entry.outward_type == outward_type {
            return Ok(());
        }

        let mut staged_total = Quantity::ZERO;
        let mut reclamped = BTreeMap::new();
        for (&location, &quantity) in &entry.location_quantities {
            let cap = bounds.max_location_qty(location, outward_type);
            let room = bounds.remaining_required().saturating_sub(staged_total);
            let clamped = quantity.min(cap).min(room);
            if clamped.is_positive() {
                staged_total += clamped;
                reclamped.insert(location, clamped);
            }
        }

        if reclamped.is_empty() {
            self.entries.remove(&item_id);
        } else {
            self.entries.insert(
                item_id,
                CartEntry {
                    outward_type,
                    location_quantities: reclamped,
                },
            );
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Serialize staged selections into transaction entries.
    pub fn to_entries(&self) -> Vec<OutwardEntry> {
        self.entries
            .iter()
            .map(|(&item_id, entry)| OutwardEntry {
                item_id,
                outward_type: entry.outward_type,
                location_quantities: entry.location_quantities.clone(),
            })
            .collect()
    }

    /// `min(requested, location capacity, remaining requirement net of the
    /// item's other staged locations)`.
    fn clamp(
        &self,
        bounds: &StageBounds<'_>,
        item_id: ItemId,
        outward_type: OutwardType,
        location: Location,
        requested: Quantity,
    ) -> Quantity {
        let staged_elsewhere: Quantity = self
            .entries
            .get(&item_id)
            .map(|entry| {
                entry
                    .location_quantities
                    .iter()
                    .filter(|&(&l, _)| l != location)
                    .map(|(_, &q)| q)
                    .sum()
            })
            .unwrap_or(Quantity::ZERO);
        let room = bounds.remaining_required().saturating_sub(staged_elsewhere);
        requested
            .min(bounds.max_location_qty(location, outward_type))
            .min(room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use stockflow_ledger::{Allocation, LocationStock};

    fn qty(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    fn project() -> ProjectCode {
        ProjectCode::new("PRJ-1").unwrap()
    }

    fn alloc(quantity: &str) -> Allocation {
        Allocation {
            project_code: project(),
            quantity: qty(quantity),
            allocation_date: Utc::now(),
            remarks: None,
        }
    }

    /// Location A: 30 allocated to the project, 10 available.
    /// Location B: 20 allocated to the project, 0 available.
    fn snapshot() -> StockSnapshot {
        let a = LocationStock::new(qty("60"), qty("30"), qty("10"), qty("0"), vec![alloc("30")])
            .unwrap();
        let b = LocationStock::new(qty("25"), qty("20"), qty("0"), qty("0"), vec![alloc("20")])
            .unwrap();
        StockSnapshot::new(
            BTreeMap::from([(Location::TimesSquare, a), (Location::Pirana, b)]),
            Utc::now(),
        )
    }

    #[test]
    fn staging_across_locations_tracks_the_requirement() {
        let snapshot = snapshot();
        let prj = project();
        let bounds = StageBounds::new(&snapshot, &prj, qty("100"));
        let item = ItemId::new();
        let mut cart = OutwardCart::new();

        let stored = cart
            .add(&bounds, item, OutwardType::Allocated, Location::TimesSquare, qty("30"))
            .unwrap();
        assert_eq!(stored, qty("30"));

        let stored = cart
            .add(&bounds, item, OutwardType::Allocated, Location::Pirana, qty("20"))
            .unwrap();
        assert_eq!(stored, qty("20"));

        assert_eq!(cart.entry(item).unwrap().total_quantity(), qty("50"));
    }

    #[test]
    fn add_clamps_to_the_location_bound() {
        let snapshot = snapshot();
        let prj = project();
        let bounds = StageBounds::new(&snapshot, &prj, qty("100"));
        let item = ItemId::new();
        let mut cart = OutwardCart::new();

        // Available at location A is 10; a request for 60 stores 10.
        let stored = cart
            .add(&bounds, item, OutwardType::Available, Location::TimesSquare, qty("60"))
            .unwrap();
        assert_eq!(stored, qty("10"));
    }

    #[test]
    fn add_clamps_to_the_remaining_requirement() {
        let snapshot = snapshot();
        let prj = project();
        let bounds = StageBounds::new(&snapshot, &prj, qty("35"));
        let item = ItemId::new();
        let mut cart = OutwardCart::new();

        cart.add(&bounds, item, OutwardType::Allocated, Location::TimesSquare, qty("30"))
            .unwrap();
        // Only 5 of the requirement is left, despite 20 allocated at B.
        let stored = cart
            .add(&bounds, item, OutwardType::Allocated, Location::Pirana, qty("20"))
            .unwrap();
        assert_eq!(stored, qty("5"));
    }

    #[test]
    fn zero_clamp_rejects_and_names_the_constraint() {
        let snapshot = snapshot();
        let prj = project();
        let bounds = StageBounds::new(&snapshot, &prj, qty("100"));
        let item = ItemId::new();
        let mut cart = OutwardCart::new();

        // Location B has no available stock at all.
        let err = cart
            .add(&bounds, item, OutwardType::Available, Location::Pirana, qty("5"))
            .unwrap_err();
        assert_eq!(
            err,
            CartError::CannotAdd {
                item_id: item,
                location: Location::Pirana,
                constraint: BindingConstraint::LocationCapacity,
            }
        );
        assert!(cart.is_empty());

        // Requirement fully staged elsewhere.
        let tight = StageBounds::new(&snapshot, &prj, qty("30"));
        cart.add(&tight, item, OutwardType::Allocated, Location::TimesSquare, qty("30"))
            .unwrap();
        let err = cart
            .add(&tight, item, OutwardType::Allocated, Location::Pirana, qty("1"))
            .unwrap_err();
        assert!(matches!(
            err,
            CartError::CannotAdd {
                constraint: BindingConstraint::RemainingRequirement,
                ..
            }
        ));
    }

    #[test]
    fn mixed_stock_sources_for_one_item_are_refused() {
        let snapshot = snapshot();
        let prj = project();
        let bounds = StageBounds::new(&snapshot, &prj, qty("100"));
        let item = ItemId::new();
        let mut cart = OutwardCart::new();

        cart.add(&bounds, item, OutwardType::Allocated, Location::TimesSquare, qty("10"))
            .unwrap();
        let err = cart
            .add(&bounds, item, OutwardType::Available, Location::TimesSquare, qty("5"))
            .unwrap_err();
        assert_eq!(err, CartError::OutwardTypeMismatch(item));
    }

    #[test]
    fn set_is_idempotent() {
        let snapshot = snapshot();
        let prj = project();
        let bounds = StageBounds::new(&snapshot, &prj, qty("100"));
        let item = ItemId::new();
        let mut cart = OutwardCart::new();

        cart.add(&bounds, item, OutwardType::Allocated, Location::TimesSquare, qty("10"))
            .unwrap();
        cart.update(&bounds, item, Location::TimesSquare, UpdateOp::Set(qty("25")))
            .unwrap();
        let once = cart.clone();
        cart.update(&bounds, item, Location::TimesSquare, UpdateOp::Set(qty("25")))
            .unwrap();
        assert_eq!(cart, once);
    }

    #[test]
    fn increment_stops_at_the_bound_and_decrement_to_zero_deletes() {
        let snapshot = snapshot();
        let prj = project();
        let bounds = StageBounds::new(&snapshot, &prj, qty("100"));
        let item = ItemId::new();
        let mut cart = OutwardCart::new();

        cart.add(&bounds, item, OutwardType::Allocated, Location::TimesSquare, qty("30"))
            .unwrap();
        let after = cart
            .update(&bounds, item, Location::TimesSquare, UpdateOp::Increment)
            .unwrap();
        assert_eq!(after, qty("30"));

        cart.update(&bounds, item, Location::TimesSquare, UpdateOp::Set(qty("1")))
            .unwrap();
        let after = cart
            .update(&bounds, item, Location::TimesSquare, UpdateOp::Decrement)
            .unwrap();
        assert_eq!(after, Quantity::ZERO);
        assert!(cart.is_empty());
    }

    #[test]
    fn removing_one_location_leaves_the_other_untouched() {
        let snapshot = snapshot();
        let prj = project();
        let bounds = StageBounds::new(&snapshot, &prj, qty("100"));
        let item = ItemId::new();
        let mut cart = OutwardCart::new();

        cart.add(&bounds, item, OutwardType::Allocated, Location::TimesSquare, qty("30"))
            .unwrap();
        cart.add(&bounds, item, OutwardType::Allocated, Location::Pirana, qty("20"))
            .unwrap();

        cart.remove(item, Location::Pirana);
        let entry = cart.entry(item).unwrap();
        assert_eq!(entry.total_quantity(), qty("30"));
        assert_eq!(entry.quantity_at(Location::TimesSquare), qty("30"));

        cart.remove(item, Location::TimesSquare);
        assert!(cart.is_empty());
    }

    #[test]
    fn switching_stock_source_reclamps_staged_quantities() {
        let snapshot = snapshot();
        let prj = project();
        let bounds = StageBounds::new(&snapshot, &prj, qty("100"));
        let item = ItemId::new();
        let mut cart = OutwardCart::new();

        cart.add(&bounds, item, OutwardType::Allocated, Location::TimesSquare, qty("30"))
            .unwrap();
        cart.add(&bounds, item, OutwardType::Allocated, Location::Pirana, qty("20"))
            .unwrap();

        // Available is 10 at A and 0 at B; staged 30/20 must not survive.
        cart.set_outward_type(&bounds, item, OutwardType::Available)
            .unwrap();
        let entry = cart.entry(item).unwrap();
        assert_eq!(entry.outward_type(), OutwardType::Available);
        assert_eq!(entry.quantity_at(Location::TimesSquare), qty("10"));
        assert_eq!(entry.quantity_at(Location::Pirana), Quantity::ZERO);
        assert_eq!(entry.total_quantity(), qty("10"));
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, ..ProptestConfig::default() })]

        /// Any sequence of adds and updates keeps the staged total within
        /// the remaining requirement.
        #[test]
        fn staged_total_never_exceeds_remaining(
            remaining in 0u32..80,
            ops in proptest::collection::vec((0usize..2, 0usize..3, 0u32..90), 1..24),
        ) {
            let snapshot = snapshot();
            let prj = project();
            let bounds = StageBounds::new(&snapshot, &prj, Quantity::from_int(remaining));
            let item = ItemId::new();
            let mut cart = OutwardCart::new();
            let locations = [Location::TimesSquare, Location::Pirana];

            for (loc_idx, op_idx, amount) in ops {
                let location = locations[loc_idx];
                let amount = Quantity::from_int(amount);
                match op_idx {
                    0 => {
                        let _ = cart.add(&bounds, item, OutwardType::Allocated, location, amount);
                    }
                    1 => {
                        let _ = cart.update(&bounds, item, location, UpdateOp::Set(amount));
                    }
                    _ => {
                        let _ = cart.update(&bounds, item, location, UpdateOp::Increment);
                    }
                }
                if let Some(entry) = cart.entry(item) {
                    prop_assert!(entry.total_quantity() <= bounds.remaining_required());
                    prop_assert!(entry.location_quantities().values().all(|q| q.is_positive()));
                }
            }
        }
    }
}
