//! # Reflection Introspector
//!
//! Type shape and tag metadata for request and response types. Types describe themselves once
//! through the [`Reflect`] trait; [`describe`] expands that description recursively into
//! [`FieldDescriptor`]s for path-parameter promotion, binding and document generation.

pub mod describe;
pub mod field;
pub mod reflect;

pub use describe::{describe, describe_fields, describe_type, ExpansionScope};
pub use field::{FieldDescriptor, FieldInfo, Tag, TypeDescriptor, SKIP_MARKER};
pub use reflect::{Reflect, TypeShape};
