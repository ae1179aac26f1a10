//! The outward-fulfillment service: the single mutation surface over the
//! ledger cache, the cart, and the checkout state machine.
//!
//! One service instance serves one project session. All remote calls are
//! async and guarded by a busy flag; while a checkout is in flight, staging
//! edits and further submissions are rejected, never queued.

use std::collections::HashMap;

use chrono::Utc;
use thiserror::Error;

use stockflow_core::{ItemId, Location, ProjectCode, Quantity};
use stockflow_infra::{
    BackendError, CommitRequest, DocumentType, InventoryBackend, OutwardTransaction,
    ProjectStockDetail,
};
use stockflow_ledger::{
    AllocationIndex, LedgerError, OutwardType, ReadinessStatus, RequiredItem, StockLedger,
    StockSnapshot, classify,
};

use crate::cart::{CartError, OutwardCart, StageBounds, UpdateOp};
use crate::checkout::{
    CheckoutError, CheckoutFailure, CheckoutOutcome, CheckoutProcessor, CheckoutState,
    DraftDocument,
};

#[derive(Debug, Error)]
pub enum ServiceError {
    /// A checkout is in flight; the action is rejected, not queued.
    #[error("a checkout is already in flight")]
    Busy,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("project has no requirement line for item {0}")]
    NoRequirement(ItemId),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// A remote read failed; the affected snapshot is now stale.
    #[error("backend read failed: {0}")]
    Read(BackendError),

    /// A fresh snapshot no longer covers a staged quantity; the cart must
    /// be re-staged before submitting.
    #[error("staged quantities for item {0} exceed the fresh stock bounds")]
    BoundsChanged(ItemId),
}

/// Holds the busy flag raised for the duration of one remote commit.
struct InFlightGuard<'a>(&'a mut bool);

impl<'a> InFlightGuard<'a> {
    fn arm(flag: &'a mut bool) -> Self {
        *flag = true;
        Self(flag)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

/// Session facade owning the ledger cache, requirement lines, cart, and
/// checkout processor for one project.
pub struct OutwardService<B: InventoryBackend> {
    backend: B,
    project: ProjectCode,
    ledger: StockLedger,
    required: HashMap<ItemId, RequiredItem>,
    cart: OutwardCart,
    draft: DraftDocument,
    processor: CheckoutProcessor,
    in_flight: bool,
}

impl<B: InventoryBackend> OutwardService<B> {
    pub fn new(backend: B, project: ProjectCode) -> Self {
        Self {
            backend,
            project,
            ledger: StockLedger::new(),
            required: HashMap::new(),
            cart: OutwardCart::new(),
            draft: DraftDocument::default(),
            processor: CheckoutProcessor::new(),
            in_flight: false,
        }
    }

    pub fn project(&self) -> &ProjectCode {
        &self.project
    }

    pub fn cart(&self) -> &OutwardCart {
        &self.cart
    }

    pub fn draft(&self) -> &DraftDocument {
        &self.draft
    }

    pub fn checkout_state(&self) -> CheckoutState {
        self.processor.state()
    }

    pub fn ledger(&self) -> &StockLedger {
        &self.ledger
    }

    pub fn required_item(&self, item_id: ItemId) -> Option<&RequiredItem> {
        self.required.get(&item_id)
    }

    /// Load (or reload) the project's demand lines, re-deriving each line's
    /// outwarded total from the authoritative history.
    #[tracing::instrument(skip(self), fields(project = %self.project))]
    pub async fn load_requirements(&mut self) -> Result<(), ServiceError> {
        let lines = self
            .backend
            .fetch_project_requirements(&self.project)
            .await
            .map_err(ServiceError::Read)?;
        let mut required = HashMap::with_capacity(lines.len());
        for mut line in lines {
            let history = self
                .backend
                .fetch_outward_history(line.item_id, &self.project)
                .await
                .map_err(ServiceError::Read)?;
            let outwarded: Quantity = history.iter().map(|r| r.quantity).sum();
            line.record_outwarded(outwarded);
            required.insert(line.item_id, line);
        }
        tracing::debug!(lines = required.len(), "requirements loaded");
        self.required = required;
        Ok(())
    }

    /// Fetch a fresh stock snapshot for one item.
    ///
    /// A failed read degrades whatever was cached to stale so that staging
    /// stays blocked until a later read succeeds.
    #[tracing::instrument(skip(self))]
    pub async fn refresh_item(&mut self, item_id: ItemId) -> Result<(), ServiceError> {
        match self.backend.fetch_location_stock(item_id).await {
            Ok(locations) => {
                self.ledger
                    .insert_snapshot(item_id, StockSnapshot::new(locations, Utc::now()));
                Ok(())
            }
            Err(error) => {
                tracing::warn!(%item_id, %error, "stock read failed; snapshot marked stale");
                self.ledger.mark_stale(item_id);
                Err(ServiceError::Read(error))
            }
        }
    }

    /// The project-scoped per-location view (allocated to this project vs.
    /// freely available), read straight from the backend. Display-oriented
    /// companion to [`OutwardService::readiness`]; staging itself clamps
    /// against the cached snapshot.
    pub async fn stock_details(
        &self,
        item_id: ItemId,
    ) -> Result<Vec<ProjectStockDetail>, ServiceError> {
        self.backend
            .fetch_stock_details(item_id, &self.project)
            .await
            .map_err(ServiceError::Read)
    }

    /// Classify one demand line against the fresh snapshot.
    pub fn readiness(&self, item_id: ItemId) -> Result<ReadinessStatus, ServiceError> {
        let line = self
            .required
            .get(&item_id)
            .ok_or(ServiceError::NoRequirement(item_id))?;
        let snapshot = self.ledger.snapshot(item_id)?;
        Ok(classify(
            line.required_quantity,
            AllocationIndex::new(snapshot).total(&self.project),
            snapshot.total_available(),
        ))
    }

    pub fn add_to_cart(
        &mut self,
        item_id: ItemId,
        outward_type: OutwardType,
        location: Location,
        requested: Quantity,
    ) -> Result<Quantity, ServiceError> {
        self.ensure_idle()?;
        let line = self
            .required
            .get(&item_id)
            .ok_or(ServiceError::NoRequirement(item_id))?;
        let snapshot = self.ledger.snapshot(item_id)?;
        let bounds = StageBounds::new(snapshot, &self.project, line.remaining_quantity);
        let stored = self
            .cart
            .add(&bounds, item_id, outward_type, location, requested)?;
        self.processor.note_staging(self.cart.is_empty());
        Ok(stored)
    }

    pub fn update_cart(
        &mut self,
        item_id: ItemId,
        location: Location,
        op: UpdateOp,
    ) -> Result<Quantity, ServiceError> {
        self.ensure_idle()?;
        let line = self
            .required
            .get(&item_id)
            .ok_or(ServiceError::NoRequirement(item_id))?;
        let snapshot = self.ledger.snapshot(item_id)?;
        let bounds = StageBounds::new(snapshot, &self.project, line.remaining_quantity);
        let stored = self.cart.update(&bounds, item_id, location, op)?;
        self.processor.note_staging(self.cart.is_empty());
        Ok(stored)
    }

    pub fn remove_from_cart(
        &mut self,
        item_id: ItemId,
        location: Location,
    ) -> Result<(), ServiceError> {
        self.ensure_idle()?;
        self.cart.remove(item_id, location);
        self.processor.note_staging(self.cart.is_empty());
        Ok(())
    }

    pub fn set_outward_type(
        &mut self,
        item_id: ItemId,
        outward_type: OutwardType,
    ) -> Result<(), ServiceError> {
        self.ensure_idle()?;
        let line = self
            .required
            .get(&item_id)
            .ok_or(ServiceError::NoRequirement(item_id))?;
        let snapshot = self.ledger.snapshot(item_id)?;
        let bounds = StageBounds::new(snapshot, &self.project, line.remaining_quantity);
        self.cart.set_outward_type(&bounds, item_id, outward_type)?;
        self.processor.note_staging(self.cart.is_empty());
        Ok(())
    }

    pub fn set_document_type(&mut self, document_type: DocumentType) {
        self.draft.document_type = Some(document_type);
    }

    pub fn set_document_number(&mut self, document_number: impl Into<String>) {
        self.draft.document_number = Some(document_number.into());
    }

    pub fn set_remarks(&mut self, remarks: impl Into<String>) {
        self.draft.remarks = Some(remarks.into());
    }

    /// Discard all local staging state. No remote effect.
    pub fn abandon_cart(&mut self) {
        self.cart.clear();
        self.draft = DraftDocument::default();
        self.processor.note_staging(true);
    }

    /// Validate the cart and document, re-check every staged quantity
    /// against freshly fetched snapshots, then submit the whole cart as one
    /// atomic transaction.
    #[tracing::instrument(skip(self), fields(project = %self.project))]
    pub async fn submit_checkout(&mut self) -> Result<CheckoutOutcome, ServiceError> {
        self.ensure_idle()?;
        self.processor
            .validate(&self.cart, &self.draft, &self.project)?;
        self.revalidate_against_fresh_snapshots().await?;
        let transaction = self.processor.begin_submit()?;
        self.dispatch(transaction).await
    }

    /// Resubmit the identical transaction after a transient failure.
    #[tracing::instrument(skip(self), fields(project = %self.project))]
    pub async fn retry_checkout(&mut self) -> Result<CheckoutOutcome, ServiceError> {
        self.ensure_idle()?;
        let transaction = self.processor.take_retry()?;
        self.dispatch(transaction).await
    }

    fn ensure_idle(&self) -> Result<(), ServiceError> {
        if self.in_flight {
            Err(ServiceError::Busy)
        } else {
            Ok(())
        }
    }

    /// Refresh every staged item and confirm its staged quantities still fit
    /// the new bounds. Edit-time clamps are advisory; this is the binding
    /// check.
    async fn revalidate_against_fresh_snapshots(&mut self) -> Result<(), ServiceError> {
        let staged: Vec<ItemId> = self.cart.entries().keys().copied().collect();
        for item_id in staged {
            self.refresh_item(item_id).await?;
            let line = self
                .required
                .get(&item_id)
                .ok_or(ServiceError::NoRequirement(item_id))?;
            let snapshot = self.ledger.snapshot(item_id)?;
            let bounds = StageBounds::new(snapshot, &self.project, line.remaining_quantity);
            let entry = match self.cart.entry(item_id) {
                Some(entry) => entry,
                None => continue,
            };
            if entry.total_quantity() > bounds.remaining_required() {
                return Err(ServiceError::BoundsChanged(item_id));
            }
            for (&location, &quantity) in entry.location_quantities() {
                if quantity > bounds.max_location_qty(location, entry.outward_type()) {
                    return Err(ServiceError::BoundsChanged(item_id));
                }
            }
        }
        Ok(())
    }

    /// Send one transaction and reconcile local state from the result.
    async fn dispatch(
        &mut self,
        transaction: OutwardTransaction,
    ) -> Result<CheckoutOutcome, ServiceError> {
        let staged: Vec<ItemId> = transaction.entries.iter().map(|e| e.item_id).collect();
        let request = CommitRequest::from(transaction);

        // The guard also clears the flag when the submit future is dropped
        // mid-flight (e.g. a caller-side timeout), so an abandoned submit
        // never leaves the service stuck busy.
        let result = {
            let _guard = InFlightGuard::arm(&mut self.in_flight);
            self.backend.commit_outward(&request).await
        };

        let outcome = match result {
            Ok(receipt) => {
                tracing::info!(transaction_id = %receipt.transaction_id, "outward committed");
                CheckoutOutcome::Committed(receipt)
            }
            Err(error) => {
                let failure = CheckoutFailure::classify(error);
                tracing::warn!(%failure, "outward rejected");
                CheckoutOutcome::Rejected(failure)
            }
        };
        self.processor.complete(&outcome);

        match &outcome {
            CheckoutOutcome::Committed(_) => {
                // Never infer post-commit stock locally; refetch everything
                // the transaction touched.
                self.cart.clear();
                self.draft = DraftDocument::default();
                for item_id in staged {
                    if self.refresh_item(item_id).await.is_err() {
                        tracing::warn!(%item_id, "post-commit refresh failed");
                    }
                }
                if let Err(error) = self.load_requirements().await {
                    tracing::warn!(%error, "post-commit requirement reload failed");
                }
            }
            CheckoutOutcome::Rejected(CheckoutFailure::InsufficientStock(_)) => {
                // The local view lied; force a refresh before any re-stage.
                for item_id in staged {
                    self.ledger.mark_stale(item_id);
                }
            }
            CheckoutOutcome::Rejected(_) => {}
        }

        Ok(outcome)
    }
}
