//! # Routing Module
//!
//! Derives routes from controllers: the naming resolver maps method names to verbs and paths,
//! the tree builder walks the controller graph, the dispatch adapter wraps typed methods, and
//! the route table turns the result into an `axum::Router`.

pub mod builder;
pub mod controller;
pub mod dispatch;
pub mod naming;
pub mod router;

pub use builder::RouteTreeBuilder;
pub use controller::{
    is_exported, Controller, FieldEntry, FieldKind, MethodEntry, MethodMiddlewares, MethodSet, MethodShape,
    TypedCallback,
};
pub use dispatch::{
    typed_handler, Binder, DefaultBinder, DefaultResponder, DispatchContext, Envelope, Responder, Validate,
    DEFAULT_BODY_LIMIT,
};
pub use naming::{default_prefixes, lower_camel, HttpMethodPrefix, NamingResolver, NamingRule, ResolvedRoute, Verb};
pub use router::{join_path, Route, RouteGroup, RouteSummary, RouteTable};
