//! Checkout state machine and failure classification.
//!
//! `Empty -> Staging -> Validating -> Submitting -> {Committed | Rejected}`.
//! The processor owns the transition rules and the pending transaction; the
//! surrounding service owns the cart, the ledger, and the backend call.

use thiserror::Error;

use stockflow_core::ProjectCode;
use stockflow_infra::{BackendError, CommitReceipt, DocumentType, OutwardTransaction};

use crate::cart::OutwardCart;

/// Where the current checkout attempt stands.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum CheckoutState {
    #[default]
    Empty,
    Staging,
    Validating,
    Submitting,
    Committed,
    Rejected,
}

/// Document metadata collected before submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftDocument {
    pub document_type: Option<DocumentType>,
    pub document_number: Option<String>,
    pub remarks: Option<String>,
}

/// Local, pre-submit blockers. No network call is made while any of these
/// hold.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("document type is required")]
    MissingDocumentType,

    #[error("document number is required")]
    MissingDocumentNumber,

    #[error("cart has not been validated")]
    NotValidated,

    #[error("no retryable submission is pending")]
    RetryNotAvailable,
}

/// Classified remote failure, decided from the backend error kind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckoutFailure {
    /// Terminal; resubmitting the identical transaction would conflict
    /// again (e.g. a duplicate document number).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The server held less stock than the local snapshot promised. The
    /// cart is preserved but unreliable until a fresh ledger read.
    #[error("insufficient stock: {0}")]
    InsufficientStock(String),

    /// Retryable; resubmitting the identical transaction may succeed.
    #[error("transient failure: {0}")]
    Transient(String),
}

impl CheckoutFailure {
    pub fn classify(error: BackendError) -> Self {
        match error {
            BackendError::Conflict(message) => CheckoutFailure::Conflict(message),
            BackendError::InsufficientStock(message) => {
                CheckoutFailure::InsufficientStock(message)
            }
            BackendError::Transient(message) | BackendError::Decode(message) => {
                CheckoutFailure::Transient(message)
            }
            BackendError::NotFound(message) => CheckoutFailure::Conflict(message),
            BackendError::Rejected { status, message } => {
                CheckoutFailure::Conflict(format!("rejected ({status}): {message}"))
            }
        }
    }

    /// Whether a user-initiated retry of the identical transaction is
    /// offered.
    pub fn retry_available(&self) -> bool {
        matches!(self, CheckoutFailure::Transient(_))
    }
}

/// Authoritative result of one submission.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutOutcome {
    Committed(CommitReceipt),
    Rejected(CheckoutFailure),
}

/// Drives the checkout lifecycle for one cart.
#[derive(Debug, Default)]
pub struct CheckoutProcessor {
    state: CheckoutState,
    pending: Option<OutwardTransaction>,
    last_failure: Option<CheckoutFailure>,
}

impl CheckoutProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CheckoutState {
        self.state
    }

    pub fn last_failure(&self) -> Option<&CheckoutFailure> {
        self.last_failure.as_ref()
    }

    /// Record a cart mutation. Any staged edit abandons a previously
    /// validated or rejected attempt.
    pub fn note_staging(&mut self, cart_is_empty: bool) {
        self.pending = None;
        self.last_failure = None;
        self.state = if cart_is_empty {
            CheckoutState::Empty
        } else {
            CheckoutState::Staging
        };
    }

    /// Validate the cart and draft document; on success the transaction is
    /// built and held for submission.
    ///
    /// On failure the state is unchanged so the caller can fix the named
    /// field and try again.
    pub fn validate(
        &mut self,
        cart: &OutwardCart,
        draft: &DraftDocument,
        project: &ProjectCode,
    ) -> Result<(), CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let document_type = draft
            .document_type
            .ok_or(CheckoutError::MissingDocumentType)?;
        let document_number = draft
            .document_number
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .ok_or(CheckoutError::MissingDocumentNumber)?;

        self.pending = Some(OutwardTransaction {
            project_code: project.clone(),
            document_type,
            document_number: document_number.to_string(),
            remarks: draft.remarks.clone(),
            entries: cart.to_entries(),
        });
        self.last_failure = None;
        self.state = CheckoutState::Validating;
        Ok(())
    }

    /// Transition into `Submitting` and hand out the transaction to send.
    pub fn begin_submit(&mut self) -> Result<OutwardTransaction, CheckoutError> {
        if self.state() != CheckoutState::Validating {
            return Err(CheckoutError::NotValidated);
        }
        let transaction = self.pending.clone().ok_or(CheckoutError::NotValidated)?;
        self.state = CheckoutState::Submitting;
        Ok(transaction)
    }

    /// Re-enter `Submitting` with the identical transaction after a
    /// transient rejection.
    pub fn take_retry(&mut self) -> Result<OutwardTransaction, CheckoutError> {
        let retryable = self
            .last_failure
            .as_ref()
            .is_some_and(CheckoutFailure::retry_available);
        if self.state() != CheckoutState::Rejected || !retryable {
            return Err(CheckoutError::RetryNotAvailable);
        }
        let transaction = self
            .pending
            .clone()
            .ok_or(CheckoutError::RetryNotAvailable)?;
        self.state = CheckoutState::Submitting;
        Ok(transaction)
    }

    /// Record the submission result.
    pub fn complete(&mut self, outcome: &CheckoutOutcome) {
        match outcome {
            CheckoutOutcome::Committed(_) => {
                self.pending = None;
                self.last_failure = None;
                self.state = CheckoutState::Committed;
            }
            CheckoutOutcome::Rejected(failure) => {
                if !failure.retry_available() {
                    self.pending = None;
                }
                self.last_failure = Some(failure.clone());
                self.state = CheckoutState::Rejected;
            }
        }
    }
}
