//! `stockflow-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly-typed identifiers, the canonical stock locations, the
//! two-fractional-digit quantity value object, and the domain error model.

pub mod entity;
pub mod error;
pub mod id;
pub mod location;
pub mod quantity;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{ItemId, ProjectCode, TransactionId};
pub use location::Location;
pub use quantity::Quantity;
pub use value_object::ValueObject;
