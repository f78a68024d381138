//! The `Reflect` trait: compile-time registered type metadata standing in for runtime reflection.
//!
//! Wrappers that only add indirection (`Box`, `Arc`, `Option`) are transparent, which is the
//! equivalent of stripping pointer indirection. `Vec<T>` is a sequence whose fields are those of
//! its element type.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::reflection::field::FieldInfo;

/// Coarse shape of a type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeShape {
    /// Numbers, strings, booleans, maps and anything else without named fields
    Scalar,
    /// A type with named fields
    Struct,
    /// A homogeneous sequence
    Sequence,
}

/// Type metadata used for path-parameter derivation, binding and documentation
///
/// # Example
/// ```rust
/// use ctrl_router::reflection::{FieldInfo, Reflect, TypeShape};
///
/// struct ApiDetailReq {
///     id: u32,
/// }
///
/// impl Reflect for ApiDetailReq {
///     fn type_name() -> String {
///         "ApiDetailReq".to_string()
///     }
///
///     fn shape() -> TypeShape {
///         TypeShape::Struct
///     }
///
///     fn fields() -> Vec<FieldInfo> {
///         vec![FieldInfo::of::<u32>("id").uri("id")]
///     }
/// }
/// ```
pub trait Reflect {
    /// Declared type name
    fn type_name() -> String;

    /// Shape after stripping indirection
    fn shape() -> TypeShape {
        TypeShape::Scalar
    }

    /// Fields of the type; sequences report the fields of their element type
    fn fields() -> Vec<FieldInfo> {
        Vec::new()
    }

    /// Element type name for sequences, the type itself otherwise
    fn element_type_name() -> String {
        Self::type_name()
    }
}

macro_rules! impl_scalar {
    ($($ty:ty => $name:expr),* $(,)?) => {
        $(
            impl Reflect for $ty {
                fn type_name() -> String {
                    $name.to_string()
                }
            }
        )*
    };
}

impl_scalar!(
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    i128 => "i128",
    isize => "isize",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
    u128 => "u128",
    usize => "usize",
    f32 => "f32",
    f64 => "f64",
    bool => "bool",
    char => "char",
    String => "String",
    () => "()",
    serde_json::Value => "Value",
);

macro_rules! impl_transparent {
    ($($wrapper:ident),*) => {
        $(
            impl<T: Reflect> Reflect for $wrapper<T> {
                fn type_name() -> String {
                    T::type_name()
                }

                fn shape() -> TypeShape {
                    T::shape()
                }

                fn fields() -> Vec<FieldInfo> {
                    T::fields()
                }

                fn element_type_name() -> String {
                    T::element_type_name()
                }
            }
        )*
    };
}

impl_transparent!(Box, Arc, Option);

impl<T: Reflect> Reflect for Vec<T> {
    fn type_name() -> String {
        format!("Vec<{}>", T::type_name())
    }

    fn shape() -> TypeShape {
        TypeShape::Sequence
    }

    fn fields() -> Vec<FieldInfo> {
        match T::shape() {
            TypeShape::Struct => T::fields(),
            _ => Vec::new(),
        }
    }

    fn element_type_name() -> String {
        T::type_name()
    }
}

impl<V: Reflect> Reflect for HashMap<String, V> {
    fn type_name() -> String {
        format!("HashMap<String, {}>", V::type_name())
    }
}

impl<V: Reflect> Reflect for BTreeMap<String, V> {
    fn type_name() -> String {
        format!("BTreeMap<String, {}>", V::type_name())
    }
}
