//! # ctrl-router - Controller-Driven Routing Library
//!
//! Derives an HTTP route tree from controller values at startup and serves it with axum.
//! Method names carry the route: `GetDetail` on a controller `Api` becomes `GET /api/detail`,
//! nested controller fields become nested route groups, and typed methods get request binding,
//! validation and a uniform response envelope for free. The same pass records request and
//! response shapes, which are turned into an OpenAPI 3 document.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ctrl_router::{Controller, Engine, Lifecycle, MethodSet};
//! use ctrl_router::core::types::handler_fn;
//! use std::sync::Arc;
//!
//! struct Health;
//!
//! impl Controller for Health {
//!     fn type_name(&self) -> String {
//!         "Health".to_string()
//!     }
//!
//!     fn register(self: Arc<Self>, methods: &mut MethodSet) {
//!         methods.handler(&self, "GetPing", |_| handler_fn(|_req| async { "pong" }));
//!     }
//! }
//!
//! # async fn run() -> ctrl_router::RouterResult<()> {
//! let engine = Arc::new(Engine::builder().controller(Health).build()?);
//! Lifecycle::new().with_server(engine).run().await
//! # }
//! ```
//!
//! ## Module Layout
//! - `core`: errors, configuration, request context and boxed handler types
//! - `reflection`: registered type metadata standing in for runtime reflection
//! - `routing`: naming rules, controller method sets, the tree builder and dispatch adapters
//! - `openapi`: the API metadata registry and document generation
//! - `middleware`: bundled CORS, interceptor, per-IP rate limit, tracing and request logging
//! - `gateway`: the engine facade and the process lifecycle
//! - `observability`: log subscriber setup

/// Core functionality including error types, configuration, and basic data structures
pub mod core;

/// Type metadata used for binding, path-parameter promotion and documentation
pub mod reflection;

/// Route derivation from controllers and request dispatch
pub mod routing;

/// API metadata registry and OpenAPI document
pub mod openapi;

/// Bundled middleware
pub mod middleware;

/// Engine facade and server lifecycle
pub mod gateway;

/// Structured logging setup
pub mod observability;

// Re-export commonly used types for easier access
pub use core::config::EngineConfig;
pub use core::error::{RouterError, RouterResult};
pub use core::types::{BoxHandler, BoxMiddleware, RequestContext};

pub use gateway::{Engine, EngineBuilder, Lifecycle, Server};
pub use reflection::{FieldInfo, Reflect, TypeShape};
pub use routing::{Controller, HttpMethodPrefix, MethodSet, Validate, Verb};
