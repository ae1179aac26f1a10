//! Inventory-service backend boundary.
//!
//! The trait is transport-agnostic; implementations live next to it
//! (`http` for the REST service, `in_memory` for tests).

pub mod http;
pub mod in_memory;
pub mod r#trait;

pub use http::HttpBackend;
pub use in_memory::InMemoryBackend;
pub use r#trait::{
    BackendError, CommitReceipt, CommitRequest, DocumentDetails, DocumentType, InventoryBackend,
    OutwardEntry, OutwardRecord, OutwardTransaction, ProjectStockDetail,
};
