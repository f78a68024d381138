//! Field metadata: the tag vocabulary a request or response type declares per field, and the
//! recursively expanded descriptors produced from it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::reflection::describe::{describe_fields, ExpansionScope};
use crate::reflection::reflect::Reflect;

/// Literal marker meaning "not bound from this location"
pub const SKIP_MARKER: &str = "-";

/// Tag values attached to one field
///
/// An empty string means the tag is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Query / form parameter key
    pub form_key: String,
    /// Path parameter key
    pub uri_key: String,
    /// Request header name
    pub header_key: String,
    /// Skip flag; only the literal `"true"` suppresses path promotion
    pub skip: String,
    /// JSON key (the part before the first comma of the declared value)
    pub json_key: String,
    /// Human readable title, defaults to the field name
    pub title: String,
    /// Format hint for documentation, e.g. `int64` or `date-time`
    pub format: String,
    /// Free-form description
    pub desc: String,
}

impl Tag {
    /// Whether the field is bound from a path parameter
    pub fn is_path_param(&self) -> bool {
        !self.uri_key.is_empty() && self.uri_key != SKIP_MARKER && self.skip != "true"
    }

    /// Whether the field is bound from the query string or a form body
    pub fn is_form_param(&self) -> bool {
        !self.form_key.is_empty() && self.form_key != SKIP_MARKER
    }

    /// Whether the field is bound from a request header
    pub fn is_header_param(&self) -> bool {
        !self.header_key.is_empty() && self.header_key != SKIP_MARKER
    }

    /// Whether the field is part of the JSON document
    pub fn is_json_field(&self) -> bool {
        !self.json_key.is_empty() && self.json_key != SKIP_MARKER
    }
}

type ChildDescriber = fn(&mut ExpansionScope) -> Vec<FieldDescriptor>;

/// Static description of one field, declared by a [`Reflect`] implementation
///
/// # Example
/// ```rust
/// use ctrl_router::reflection::FieldInfo;
///
/// let id = FieldInfo::of::<u32>("id").uri("id").desc("record id");
/// assert_eq!(id.tags.title, "id");
/// assert!(id.tags.is_path_param());
/// ```
#[derive(Clone)]
pub struct FieldInfo {
    /// Field name
    pub name: String,
    /// Declared type name, e.g. `u32` or `Vec<ApiInfoItem>`
    pub type_name: String,
    /// Element type name for sequences, the type itself otherwise
    pub child_type: String,
    /// Tag values
    pub tags: Tag,
    children: ChildDescriber,
}

impl FieldInfo {
    /// Describe a field of type `T`
    pub fn of<T: Reflect>(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            tags: Tag {
                title: name.clone(),
                ..Tag::default()
            },
            name,
            type_name: T::type_name(),
            child_type: T::element_type_name(),
            children: describe_fields::<T>,
        }
    }

    /// Set the query / form parameter key
    pub fn form(mut self, key: impl Into<String>) -> Self {
        self.tags.form_key = key.into();
        self
    }

    /// Set the path parameter key
    pub fn uri(mut self, key: impl Into<String>) -> Self {
        self.tags.uri_key = key.into();
        self
    }

    /// Set the request header the field is bound from
    pub fn header(mut self, name: impl Into<String>) -> Self {
        self.tags.header_key = name.into();
        self
    }

    /// Set the JSON key; options after a comma (`"name,omitempty"`) are dropped
    pub fn json(mut self, key: impl AsRef<str>) -> Self {
        self.tags.json_key = key
            .as_ref()
            .split(',')
            .next()
            .unwrap_or_default()
            .to_string();
        self
    }

    /// Mark the field as skipped for path promotion
    pub fn skip(mut self) -> Self {
        self.tags.skip = "true".to_string();
        self
    }

    /// Set the skip tag to an arbitrary literal
    pub fn skip_tag(mut self, value: impl Into<String>) -> Self {
        self.tags.skip = value.into();
        self
    }

    /// Override the title
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.tags.title = title.into();
        self
    }

    /// Set the format hint
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.tags.format = format.into();
        self
    }

    /// Set the description
    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.tags.desc = desc.into();
        self
    }

    /// Expand this field into a descriptor, recursing into its type
    pub fn describe(&self, scope: &mut ExpansionScope) -> FieldDescriptor {
        FieldDescriptor {
            name: self.name.clone(),
            type_name: self.type_name.clone(),
            tags: self.tags.clone(),
            child_type: self.child_type.clone(),
            children: (self.children)(scope),
        }
    }
}

impl fmt::Debug for FieldInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldInfo")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("child_type", &self.child_type)
            .field("tags", &self.tags)
            .finish()
    }
}

/// Expanded field metadata, recursively including nested struct fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub type_name: String,
    pub tags: Tag,
    pub child_type: String,
    pub children: Vec<FieldDescriptor>,
}

/// Expanded metadata of a whole request or response type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}
