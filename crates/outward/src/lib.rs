//! `stockflow-outward`: staging and committing outward stock movements.
//!
//! [`cart::OutwardCart`] accumulates clamped per-location selections,
//! [`checkout::CheckoutProcessor`] drives the submit lifecycle, and
//! [`service::OutwardService`] is the session facade that owns both plus
//! the ledger cache and the backend handle.

pub mod cart;
pub mod checkout;
pub mod service;

pub use cart::{BindingConstraint, CartEntry, CartError, OutwardCart, StageBounds, UpdateOp};
pub use checkout::{
    CheckoutError, CheckoutFailure, CheckoutOutcome, CheckoutProcessor, CheckoutState,
    DraftDocument,
};
pub use service::{OutwardService, ServiceError};
