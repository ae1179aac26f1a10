//! `stockflow-ledger`: the locally cached view of per-item, per-location
//! stock, plus the derived reads built on top of it.
//!
//! The remote inventory service owns the truth; everything in this crate is
//! a refreshable snapshot. [`StockLedger`] caches snapshots and tracks their
//! freshness, [`AllocationIndex`] derives the project-scoped slice of a
//! snapshot, and [`classify`] maps a demand line to its readiness state.

pub mod allocation;
pub mod item;
pub mod ledger;
pub mod required;
pub mod status;
pub mod stock;

pub use allocation::AllocationIndex;
pub use item::InventoryItem;
pub use ledger::{LedgerError, StockLedger, StockSnapshot};
pub use required::RequiredItem;
pub use status::{ReadinessStatus, classify};
pub use stock::{Allocation, LocationStock, OutwardType};
