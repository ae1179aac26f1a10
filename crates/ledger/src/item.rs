//! Inventory item master data.

use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, Entity, ItemId};

/// Master-data record of an inventory item.
///
/// Identity is immutable; stock figures live in the per-location snapshots
/// (`LocationStock`), never here. The backend owns creation and mutation;
/// the ledger only caches what it was given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    id: ItemId,
    item_number: String,
    description: String,
    make: Option<String>,
    material_group: Option<String>,
}

impl InventoryItem {
    pub fn new(
        id: ItemId,
        item_number: impl Into<String>,
        description: impl Into<String>,
        make: Option<String>,
        material_group: Option<String>,
    ) -> Result<Self, DomainError> {
        let item_number = item_number.into();
        if item_number.trim().is_empty() {
            return Err(DomainError::validation("item_number cannot be empty"));
        }
        Ok(Self {
            id,
            item_number,
            description: description.into(),
            make,
            material_group,
        })
    }

    pub fn id_typed(&self) -> ItemId {
        self.id
    }

    pub fn item_number(&self) -> &str {
        &self.item_number
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn make(&self) -> Option<&str> {
        self.make.as_deref()
    }

    pub fn material_group(&self) -> Option<&str> {
        self.material_group.as_deref()
    }
}

impl Entity for InventoryItem {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
