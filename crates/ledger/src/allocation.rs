//! Project-scoped view over a stock snapshot's allocation records.

use std::collections::BTreeMap;

use stockflow_core::{Location, ProjectCode, Quantity};

use crate::ledger::StockSnapshot;

/// Derives, for an (item, project) pair, the portion of each location's
/// allocated stock that belongs to that project.
///
/// A borrow over one snapshot; nothing is cached; the index is recomputed
/// on demand and stays trivially consistent with the snapshot it wraps.
pub struct AllocationIndex<'a> {
    snapshot: &'a StockSnapshot,
}

impl<'a> AllocationIndex<'a> {
    pub fn new(snapshot: &'a StockSnapshot) -> Self {
        Self { snapshot }
    }

    /// The project's allocated quantity at one location.
    pub fn at(&self, location: Location, project: &ProjectCode) -> Quantity {
        self.snapshot
            .location(location)
            .map(|stock| stock.allocated_to(project))
            .unwrap_or(Quantity::ZERO)
    }

    /// The project's allocated quantity per location (zero entries omitted).
    pub fn by_location(&self, project: &ProjectCode) -> BTreeMap<Location, Quantity> {
        self.snapshot
            .locations()
            .iter()
            .filter_map(|(location, stock)| {
                let claimed = stock.allocated_to(project);
                claimed.is_positive().then_some((*location, claimed))
            })
            .collect()
    }

    /// The project's allocated quantity across all locations.
    pub fn total(&self, project: &ProjectCode) -> Quantity {
        self.snapshot
            .locations()
            .values()
            .map(|stock| stock.allocated_to(project))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stock::{Allocation, LocationStock};
    use chrono::Utc;

    fn qty(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    fn alloc(project: &str, quantity: &str) -> Allocation {
        Allocation {
            project_code: ProjectCode::new(project).unwrap(),
            quantity: qty(quantity),
            allocation_date: Utc::now(),
            remarks: None,
        }
    }

    fn two_location_snapshot() -> StockSnapshot {
        let times_square = LocationStock::new(
            qty("100"),
            qty("50"),
            qty("20"),
            qty("0"),
            vec![alloc("PRJ-1", "30"), alloc("PRJ-2", "20")],
        )
        .unwrap();
        let pirana = LocationStock::new(
            qty("60"),
            qty("20"),
            qty("40"),
            qty("0"),
            vec![alloc("PRJ-1", "20")],
        )
        .unwrap();
        StockSnapshot::new(
            BTreeMap::from([
                (Location::TimesSquare, times_square),
                (Location::Pirana, pirana),
            ]),
            Utc::now(),
        )
    }

    #[test]
    fn total_spans_locations() {
        let snapshot = two_location_snapshot();
        let index = AllocationIndex::new(&snapshot);
        let prj1 = ProjectCode::new("PRJ-1").unwrap();
        assert_eq!(index.total(&prj1), qty("50"));
    }

    #[test]
    fn at_is_per_location_and_zero_off_snapshot() {
        let snapshot = two_location_snapshot();
        let index = AllocationIndex::new(&snapshot);
        let prj2 = ProjectCode::new("PRJ-2").unwrap();

        assert_eq!(index.at(Location::TimesSquare, &prj2), qty("20"));
        assert_eq!(index.at(Location::Pirana, &prj2), Quantity::ZERO);
        assert_eq!(index.at(Location::Sakar, &prj2), Quantity::ZERO);
    }

    #[test]
    fn by_location_omits_zero_entries() {
        let snapshot = two_location_snapshot();
        let index = AllocationIndex::new(&snapshot);
        let prj2 = ProjectCode::new("PRJ-2").unwrap();

        let map = index.by_location(&prj2);
        assert_eq!(map.len(), 1);
        assert_eq!(map[&Location::TimesSquare], qty("20"));
    }
}
