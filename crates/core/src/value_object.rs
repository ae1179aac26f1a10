//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values;
/// `Quantity` and `Allocation` are value objects, `InventoryItem` is an
/// entity. To "modify" a value object, construct a new one; this keeps
/// value semantics (copyable, comparable) and makes sharing safe.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
