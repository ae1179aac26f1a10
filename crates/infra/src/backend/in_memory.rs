//! Deterministic in-memory [`InventoryBackend`] for tests.
//!
//! Implements the same commit semantics as the real service: duplicate
//! document numbers conflict, a shortfall in any entry rejects the whole
//! transaction, and a successful commit mutates stock all-or-nothing and
//! appends to the outward history.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use stockflow_core::{ItemId, Location, ProjectCode, Quantity, TransactionId};
use stockflow_ledger::{Allocation, LocationStock, OutwardType, RequiredItem};

use crate::backend::r#trait::{
    BackendError, CommitReceipt, CommitRequest, InventoryBackend, OutwardRecord,
    ProjectStockDetail,
};

#[derive(Default)]
struct State {
    stocks: HashMap<ItemId, BTreeMap<Location, LocationStock>>,
    requirements: HashMap<ProjectCode, Vec<(ItemId, Quantity)>>,
    history: Vec<OutwardRecord>,
    used_document_numbers: HashSet<String>,
    fail_next_commit: Option<BackendError>,
}

/// In-memory inventory service.
#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> Result<MutexGuard<'_, State>, BackendError> {
        self.state
            .lock()
            .map_err(|_| BackendError::Transient("backend state lock poisoned".to_string()))
    }

    /// Seed stock for one (item, location) pair, replacing any earlier seed.
    pub fn put_stock(&self, item_id: ItemId, location: Location, stock: LocationStock) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .stocks
            .entry(item_id)
            .or_default()
            .insert(location, stock);
    }

    /// Seed a project requirement line.
    pub fn put_requirement(&self, project: ProjectCode, item_id: ItemId, required: Quantity) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let lines = state.requirements.entry(project).or_default();
        match lines.iter_mut().find(|(id, _)| *id == item_id) {
            Some(line) => line.1 = required,
            None => lines.push((item_id, required)),
        }
    }

    /// Make the next `commit_outward` call fail with `error`, once.
    pub fn fail_next_commit(&self, error: BackendError) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_next_commit = Some(error);
    }

    fn outwarded_for(state: &State, item_id: ItemId, project: &ProjectCode) -> Quantity {
        state
            .history
            .iter()
            .filter(|r| r.item_id == item_id && &r.project_code == project)
            .map(|r| r.quantity)
            .sum()
    }

    /// How much `project` may still draw from `stock` for the given type.
    fn bound(stock: &LocationStock, project: &ProjectCode, outward_type: OutwardType) -> Quantity {
        match outward_type {
            OutwardType::Allocated => stock.allocated_to(project),
            OutwardType::Available => stock.available(),
        }
    }

    fn apply_deduction(
        stock: &LocationStock,
        project: &ProjectCode,
        outward_type: OutwardType,
        quantity: Quantity,
    ) -> Result<LocationStock, BackendError> {
        let (allocated, available, allocations) = match outward_type {
            OutwardType::Allocated => (
                stock.allocated().saturating_sub(quantity),
                stock.available(),
                reduce_allocations(stock.allocations(), project, quantity),
            ),
            OutwardType::Available => (
                stock.allocated(),
                stock.available().saturating_sub(quantity),
                stock.allocations().to_vec(),
            ),
        };
        LocationStock::new(
            stock.total().saturating_sub(quantity),
            allocated,
            available,
            stock.outward() + quantity,
            allocations,
        )
        .map_err(|e| BackendError::Rejected {
            status: 500,
            message: e.to_string(),
        })
    }
}

/// Consume `quantity` from `project`'s allocation records, oldest first.
fn reduce_allocations(
    allocations: &[Allocation],
    project: &ProjectCode,
    quantity: Quantity,
) -> Vec<Allocation> {
    let mut remaining = quantity;
    let mut kept = Vec::with_capacity(allocations.len());
    for allocation in allocations {
        if &allocation.project_code != project || remaining.is_zero() {
            kept.push(allocation.clone());
            continue;
        }
        let consumed = allocation.quantity.min(remaining);
        remaining = remaining.saturating_sub(consumed);
        let left = allocation.quantity.saturating_sub(consumed);
        if left.is_positive() {
            let mut reduced = allocation.clone();
            reduced.quantity = left;
            kept.push(reduced);
        }
    }
    kept
}

#[async_trait::async_trait]
impl InventoryBackend for InMemoryBackend {
    async fn fetch_location_stock(
        &self,
        item_id: ItemId,
    ) -> Result<BTreeMap<Location, LocationStock>, BackendError> {
        let state = self.locked()?;
        state
            .stocks
            .get(&item_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("no stock for item {item_id}")))
    }

    async fn fetch_project_requirements(
        &self,
        project: &ProjectCode,
    ) -> Result<Vec<RequiredItem>, BackendError> {
        let state = self.locked()?;
        let lines = state
            .requirements
            .get(project)
            .ok_or_else(|| BackendError::NotFound(format!("no requirements for {project}")))?;
        Ok(lines
            .iter()
            .map(|&(item_id, required)| {
                RequiredItem::new(item_id, required, Self::outwarded_for(&state, item_id, project))
            })
            .collect())
    }

    async fn fetch_stock_details(
        &self,
        item_id: ItemId,
        project: &ProjectCode,
    ) -> Result<Vec<ProjectStockDetail>, BackendError> {
        let stocks = self.fetch_location_stock(item_id).await?;
        Ok(stocks
            .iter()
            .map(|(&location, stock)| ProjectStockDetail {
                location,
                allocated_to_project: stock.allocated_to(project),
                available: stock.available(),
            })
            .collect())
    }

    async fn fetch_outward_history(
        &self,
        item_id: ItemId,
        project: &ProjectCode,
    ) -> Result<Vec<OutwardRecord>, BackendError> {
        let state = self.locked()?;
        Ok(state
            .history
            .iter()
            .filter(|r| r.item_id == item_id && &r.project_code == project)
            .cloned()
            .collect())
    }

    async fn commit_outward(
        &self,
        request: &CommitRequest,
    ) -> Result<CommitReceipt, BackendError> {
        let mut state = self.locked()?;

        if let Some(error) = state.fail_next_commit.take() {
            return Err(error);
        }

        let document_number = &request.document.document_number;
        if state.used_document_numbers.contains(document_number) {
            return Err(BackendError::Conflict(format!(
                "document number {document_number} already exists"
            )));
        }

        let project = &request.outward.project_code;

        // Validate every line and compute its deduction before touching
        // anything, so any rejection leaves the state untouched.
        let mut deductions: Vec<(ItemId, Location, LocationStock, Quantity)> = Vec::new();
        for entry in &request.outward.entries {
            let stocks = state.stocks.get(&entry.item_id).ok_or_else(|| {
                BackendError::NotFound(format!("no stock for item {}", entry.item_id))
            })?;
            for (&location, &quantity) in &entry.location_quantities {
                let stock = stocks.get(&location).cloned().unwrap_or_else(LocationStock::empty);
                let bound = Self::bound(&stock, project, entry.outward_type);
                if quantity > bound {
                    return Err(BackendError::InsufficientStock(format!(
                        "item {} at {location}: requested {quantity}, only {bound} available",
                        entry.item_id
                    )));
                }
                let deducted =
                    Self::apply_deduction(&stock, project, entry.outward_type, quantity)?;
                deductions.push((entry.item_id, location, deducted, quantity));
            }
        }

        let now = Utc::now();
        let document_number = document_number.clone();
        for (item_id, location, deducted, quantity) in deductions {
            state
                .stocks
                .entry(item_id)
                .or_default()
                .insert(location, deducted);
            state.history.push(OutwardRecord {
                item_id,
                project_code: project.clone(),
                location,
                quantity,
                document_number: document_number.clone(),
                outwarded_at: now,
            });
        }
        state.used_document_numbers.insert(document_number.clone());

        Ok(CommitReceipt {
            transaction_id: TransactionId::new(),
            download_url: Some(format!("/documents/{document_number}.pdf")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::r#trait::{DocumentType, OutwardEntry, OutwardTransaction};

    fn qty(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    fn project() -> ProjectCode {
        ProjectCode::new("PRJ-7").unwrap()
    }

    fn seeded(item_id: ItemId) -> InMemoryBackend {
        let backend = InMemoryBackend::new();
        backend.put_stock(
            item_id,
            Location::Sakar,
            LocationStock::new(
                qty("100"),
                qty("60"),
                qty("40"),
                qty("0"),
                vec![Allocation {
                    project_code: project(),
                    quantity: qty("35"),
                    allocation_date: Utc::now(),
                    remarks: None,
                }],
            )
            .unwrap(),
        );
        backend.put_requirement(project(), item_id, qty("50"));
        backend
    }

    fn request(item_id: ItemId, outward_type: OutwardType, quantity: &str, doc: &str) -> CommitRequest {
        let transaction = OutwardTransaction {
            project_code: project(),
            document_type: DocumentType::DeliveryChallan,
            document_number: doc.to_string(),
            remarks: None,
            entries: vec![OutwardEntry {
                item_id,
                outward_type,
                location_quantities: BTreeMap::from([(Location::Sakar, qty(quantity))]),
            }],
        };
        CommitRequest::from(transaction)
    }

    #[tokio::test]
    async fn commit_deducts_buckets_and_appends_history() {
        let item_id = ItemId::new();
        let backend = seeded(item_id);

        let receipt = backend
            .commit_outward(&request(item_id, OutwardType::Allocated, "20", "DC-1"))
            .await
            .unwrap();
        assert!(receipt.download_url.as_deref().unwrap().contains("DC-1"));

        let stocks = backend.fetch_location_stock(item_id).await.unwrap();
        let stock = &stocks[&Location::Sakar];
        assert_eq!(stock.total(), qty("80"));
        assert_eq!(stock.allocated(), qty("40"));
        assert_eq!(stock.outward(), qty("20"));
        assert_eq!(stock.allocated_to(&project()), qty("15"));

        let history = backend.fetch_outward_history(item_id, &project()).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].quantity, qty("20"));

        let requirements = backend.fetch_project_requirements(&project()).await.unwrap();
        assert_eq!(requirements[0].outwarded_quantity, qty("20"));
        assert_eq!(requirements[0].remaining_quantity, qty("30"));
    }

    #[tokio::test]
    async fn stock_details_are_scoped_to_the_project() {
        let item_id = ItemId::new();
        let backend = seeded(item_id);

        let details = backend.fetch_stock_details(item_id, &project()).await.unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].location, Location::Sakar);
        assert_eq!(details[0].allocated_to_project, qty("35"));
        assert_eq!(details[0].available, qty("40"));

        let other = ProjectCode::new("PRJ-OTHER").unwrap();
        let details = backend.fetch_stock_details(item_id, &other).await.unwrap();
        assert_eq!(details[0].allocated_to_project, Quantity::ZERO);
    }

    #[tokio::test]
    async fn duplicate_document_number_conflicts() {
        let item_id = ItemId::new();
        let backend = seeded(item_id);

        backend
            .commit_outward(&request(item_id, OutwardType::Available, "5", "DC-9"))
            .await
            .unwrap();
        let err = backend
            .commit_outward(&request(item_id, OutwardType::Available, "5", "DC-9"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Conflict(_)));
    }

    #[tokio::test]
    async fn shortfall_rejects_the_whole_transaction() {
        let item_id = ItemId::new();
        let backend = seeded(item_id);

        // Allocated bucket for the project holds 35; 36 must fail and leave
        // stock untouched.
        let err = backend
            .commit_outward(&request(item_id, OutwardType::Allocated, "36", "DC-2"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::InsufficientStock(_)));

        let stocks = backend.fetch_location_stock(item_id).await.unwrap();
        assert_eq!(stocks[&Location::Sakar].total(), qty("100"));
        assert!(backend
            .fetch_outward_history(item_id, &project())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let item_id = ItemId::new();
        let backend = seeded(item_id);
        backend.fail_next_commit(BackendError::Transient("connection reset".to_string()));

        let req = request(item_id, OutwardType::Available, "5", "DC-3");
        let err = backend.commit_outward(&req).await.unwrap_err();
        assert!(err.is_transient());

        backend.commit_outward(&req).await.unwrap();
    }
}
