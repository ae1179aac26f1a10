//! Project demand lines.

use serde::{Deserialize, Serialize};

use stockflow_core::{ItemId, Quantity};

/// A project's demand line for one item.
///
/// `remaining_quantity` is derived, never stored independently; it is
/// recomputed whenever the outward history changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredItem {
    pub item_id: ItemId,
    pub required_quantity: Quantity,
    pub outwarded_quantity: Quantity,
    pub remaining_quantity: Quantity,
}

impl RequiredItem {
    pub fn new(item_id: ItemId, required: Quantity, outwarded: Quantity) -> Self {
        Self {
            item_id,
            required_quantity: required,
            outwarded_quantity: outwarded,
            remaining_quantity: required.saturating_sub(outwarded),
        }
    }

    /// Re-derive `remaining_quantity` from a new outward total.
    pub fn record_outwarded(&mut self, outwarded: Quantity) {
        self.outwarded_quantity = outwarded;
        self.remaining_quantity = self.required_quantity.saturating_sub(outwarded);
    }

    pub fn is_fulfilled(&self) -> bool {
        self.remaining_quantity.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qty(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    #[test]
    fn remaining_is_required_minus_outwarded() {
        let line = RequiredItem::new(ItemId::new(), qty("100"), qty("30"));
        assert_eq!(line.remaining_quantity, qty("70"));
        assert!(!line.is_fulfilled());
    }

    #[test]
    fn remaining_floors_at_zero_when_over_delivered() {
        let line = RequiredItem::new(ItemId::new(), qty("50"), qty("62.50"));
        assert_eq!(line.remaining_quantity, Quantity::ZERO);
        assert!(line.is_fulfilled());
    }

    #[test]
    fn record_outwarded_recomputes_remaining() {
        let mut line = RequiredItem::new(ItemId::new(), qty("100"), qty("0"));
        line.record_outwarded(qty("40"));
        assert_eq!(line.remaining_quantity, qty("60"));
    }
}
