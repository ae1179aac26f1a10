//! The inventory-service contract: snapshot reads plus the atomic
//! outward+document write.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockflow_core::{ItemId, Location, ProjectCode, Quantity, TransactionId};
use stockflow_ledger::{LocationStock, OutwardType, RequiredItem};

/// Kind of source document generated together with an outward movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    DeliveryChallan,
    BillingInstruction,
}

impl core::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DocumentType::DeliveryChallan => f.write_str("delivery challan"),
            DocumentType::BillingInstruction => f.write_str("billing instruction"),
        }
    }
}

/// Metadata of the source document the server generates atomically with the
/// stock movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDetails {
    pub document_type: DocumentType,
    pub document_number: String,
    pub remarks: Option<String>,
}

/// One item's staged movement within a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutwardEntry {
    pub item_id: ItemId,
    pub outward_type: OutwardType,
    pub location_quantities: BTreeMap<Location, Quantity>,
}

/// The complete outward movement, created once at checkout and submitted as
/// a single unit. Fully applied or fully rejected server-side; the client
/// never attempts partial application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutwardTransaction {
    pub project_code: ProjectCode,
    pub document_type: DocumentType,
    pub document_number: String,
    pub remarks: Option<String>,
    pub entries: Vec<OutwardEntry>,
}

/// Wire body of `POST /process-outward-and-document/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRequest {
    pub outward: OutwardTransaction,
    pub document: DocumentDetails,
}

impl From<OutwardTransaction> for CommitRequest {
    fn from(outward: OutwardTransaction) -> Self {
        let document = DocumentDetails {
            document_type: outward.document_type,
            document_number: outward.document_number.clone(),
            remarks: outward.remarks.clone(),
        };
        Self { outward, document }
    }
}

/// Authoritative result of a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    pub transaction_id: TransactionId,
    pub download_url: Option<String>,
}

/// One line of an item's outward history for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutwardRecord {
    pub item_id: ItemId,
    pub project_code: ProjectCode,
    pub location: Location,
    pub quantity: Quantity,
    pub document_number: String,
    pub outwarded_at: DateTime<Utc>,
}

/// Project-scoped stock detail row (supplementary read view).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectStockDetail {
    pub location: Location,
    pub allocated_to_project: Quantity,
    pub available: Quantity,
}

/// Error from the backend boundary.
///
/// Remote conditions are classified here from status/body so that callers
/// never see raw transport errors; the checkout layer folds these into the
/// user-facing failure taxonomy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The server refused the commit because it would collide with existing
    /// state (e.g. a duplicate document number). Terminal; retrying the
    /// identical request would conflict again.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The server found less stock than the (stale) local view promised.
    #[error("insufficient stock: {0}")]
    InsufficientStock(String),

    /// Network-level or clearly retryable failure (timeouts, 5xx, 429).
    #[error("transient: {0}")]
    Transient(String),

    /// The server rejected the request for a reason that retrying cannot
    /// change (other 4xx).
    #[error("rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The requested resource does not exist on the server.
    #[error("not found: {0}")]
    NotFound(String),

    /// The response body could not be understood.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Whether resubmitting the identical request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transient(_) | BackendError::Decode(_))
    }
}

/// Async boundary to the remote inventory service.
///
/// Reads return authoritative snapshots; the single write atomically moves
/// stock and generates the source document.
#[async_trait::async_trait]
pub trait InventoryBackend: Send + Sync {
    /// `GET /inventory/{id}/location-stock/`
    async fn fetch_location_stock(
        &self,
        item_id: ItemId,
    ) -> Result<BTreeMap<Location, LocationStock>, BackendError>;

    /// `GET /project-requirements/{project_code}/`
    async fn fetch_project_requirements(
        &self,
        project: &ProjectCode,
    ) -> Result<Vec<RequiredItem>, BackendError>;

    /// `GET /stock-details/{item_id}/{project_code}/`
    async fn fetch_stock_details(
        &self,
        item_id: ItemId,
        project: &ProjectCode,
    ) -> Result<Vec<ProjectStockDetail>, BackendError>;

    /// `GET /outward-history/{item_id}/{project_code}/`
    async fn fetch_outward_history(
        &self,
        item_id: ItemId,
        project: &ProjectCode,
    ) -> Result<Vec<OutwardRecord>, BackendError>;

    /// `POST /process-outward-and-document/`, the atomic write.
    async fn commit_outward(&self, request: &CommitRequest)
    -> Result<CommitReceipt, BackendError>;
}

/// Shared handles delegate, so a caller can keep a handle to the backend it
/// hands to a service.
#[async_trait::async_trait]
impl<B: InventoryBackend + ?Sized> InventoryBackend for std::sync::Arc<B> {
    async fn fetch_location_stock(
        &self,
        item_id: ItemId,
    ) -> Result<BTreeMap<Location, LocationStock>, BackendError> {
        (**self).fetch_location_stock(item_id).await
    }

    async fn fetch_project_requirements(
        &self,
        project: &ProjectCode,
    ) -> Result<Vec<RequiredItem>, BackendError> {
        (**self).fetch_project_requirements(project).await
    }

    async fn fetch_stock_details(
        &self,
        item_id: ItemId,
        project: &ProjectCode,
    ) -> Result<Vec<ProjectStockDetail>, BackendError> {
        (**self).fetch_stock_details(item_id, project).await
    }

    async fn fetch_outward_history(
        &self,
        item_id: ItemId,
        project: &ProjectCode,
    ) -> Result<Vec<OutwardRecord>, BackendError> {
        (**self).fetch_outward_history(item_id, project).await
    }

    async fn commit_outward(
        &self,
        request: &CommitRequest,
    ) -> Result<CommitReceipt, BackendError> {
        (**self).commit_outward(request).await
    }
}
