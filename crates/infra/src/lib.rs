//! `stockflow-infra`: the remote inventory-service boundary.
//!
//! Defines the [`backend::InventoryBackend`] trait (the four reads plus the
//! atomic outward+document write) without making transport assumptions, an
//! HTTP implementation over the service's REST contract, and an in-memory
//! implementation with real commit semantics for tests.

pub mod backend;
pub mod config;
pub mod wire;

pub use backend::{
    BackendError, CommitReceipt, CommitRequest, DocumentDetails, DocumentType, HttpBackend,
    InMemoryBackend, InventoryBackend, OutwardEntry, OutwardRecord, OutwardTransaction,
    ProjectStockDetail,
};
pub use config::HttpBackendConfig;
