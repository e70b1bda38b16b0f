//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. Derived amounts
/// such as line results and return settlements are value objects: they are
/// recomputed from their inputs and never patched in place.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
