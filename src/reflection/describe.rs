//! Recursive expansion of [`Reflect`] metadata into descriptors.
//!
//! Expansion is bounded by an [`ExpansionScope`]: a type that was already expanded in the same
//! scope is reported as a leaf. The scope is an explicit value owned by the caller (one per
//! document pass), never global state, so concurrent passes cannot contaminate each other.
//!
//! Known limitation: inside one scope, a nested type referenced from several places is only
//! expanded at its first occurrence; later references show no children.

use std::collections::HashSet;

use crate::reflection::field::{FieldDescriptor, TypeDescriptor};
use crate::reflection::reflect::{Reflect, TypeShape};

/// Set of type names already expanded during one pass
#[derive(Debug, Clone, Default)]
pub struct ExpansionScope {
    expanded: HashSet<String>,
}

impl ExpansionScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `type_name` as expanded; returns `false` if it already was
    pub fn enter(&mut self, type_name: &str) -> bool {
        self.expanded.insert(type_name.to_string())
    }

    /// Whether `type_name` was expanded in this scope
    pub fn contains(&self, type_name: &str) -> bool {
        self.expanded.contains(type_name)
    }

    /// Number of distinct types expanded so far
    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }
}

/// Expand the fields of `T`, unless `T` (after stripping) was already expanded in `scope`
pub fn describe_fields<T: Reflect>(scope: &mut ExpansionScope) -> Vec<FieldDescriptor> {
    if T::shape() == TypeShape::Scalar {
        return Vec::new();
    }
    if !scope.enter(&T::element_type_name()) {
        return Vec::new();
    }

    T::fields()
        .iter()
        .map(|field| field.describe(scope))
        .collect()
}

/// Expand a top-level request or response type
///
/// The top-level type itself is always expanded, even if a previous record in the same scope
/// already expanded it, so its direct fields are always listed. It is still marked in the scope
/// so that self references terminate.
pub fn describe_type<T: Reflect>(scope: &mut ExpansionScope) -> TypeDescriptor {
    scope.enter(&T::element_type_name());

    TypeDescriptor {
        name: T::type_name(),
        fields: T::fields()
            .iter()
            .map(|field| field.describe(scope))
            .collect(),
    }
}

/// Expand `T` in a fresh scope
pub fn describe<T: Reflect>() -> TypeDescriptor {
    describe_type::<T>(&mut ExpansionScope::new())
}
