//! # OpenAPI Module
//!
//! Route metadata collected while the route tree is built, and the OpenAPI document generated
//! from it.

pub mod document;
pub mod registry;

pub use document::{schema_type, OpenApiDocument, DEFAULT_OUTPUT_PATH, OPENAPI_VERSION};
pub use registry::{ApiRegistry, ApiRouteRecord};
