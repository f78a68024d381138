//! # Controller Registration
//!
//! A controller is any value whose exported methods and struct fields become routes and nested
//! route groups. Rust has no runtime reflection, so each controller lists its own method set once
//! through [`Controller::register`]; everything else is derived from that list at startup.
//!
//! ## Rust Concepts Used
//!
//! - `self: Arc<Self>` receivers so registered methods can keep the controller alive
//! - Default trait methods model optional capabilities (base path, middleware)
//! - A closed enum ([`MethodShape`]) classifies every method exactly once

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::core::error::RouterError;
use crate::core::types::{BoxHandler, BoxMiddleware, RequestContext};
use crate::reflection::{describe_type, ExpansionScope, FieldInfo, Reflect, TypeDescriptor, TypeShape};
use crate::routing::dispatch::{typed_handler, DispatchContext, Validate};

/// Per-method middleware, keyed by exported method name
pub type MethodMiddlewares = HashMap<String, Vec<BoxMiddleware>>;

/// A unit of route-group scope
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use ctrl_router::routing::{Controller, MethodSet};
///
/// struct Health;
///
/// impl Controller for Health {
///     fn type_name(&self) -> String {
///         "Health".to_string()
///     }
///
///     fn register(self: Arc<Self>, methods: &mut MethodSet) {
///         methods.handler(&self, "GetPing", |_| {
///             ctrl_router::core::types::handler_fn(|_req| async { "pong" })
///         });
///     }
/// }
/// ```
pub trait Controller: Send + Sync + 'static {
    /// Declared type name; the default group path is derived from it
    fn type_name(&self) -> String;

    /// Register exported methods and struct fields
    fn register(self: Arc<Self>, methods: &mut MethodSet);

    /// Shape of the controller value; only structs can be routed
    fn shape(&self) -> TypeShape {
        TypeShape::Struct
    }

    /// Explicit group base path, overriding the derived one
    fn base_path(&self) -> Option<String> {
        None
    }

    /// Middleware shared by every route of this group and its sub-groups
    fn middlewares(&self) -> Option<Vec<BoxMiddleware>> {
        None
    }

    /// Middleware for individual methods
    fn method_middlewares(&self) -> Option<MethodMiddlewares> {
        None
    }
}

/// Whether a method, field or type name is exported (starts with an ASCII capital)
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

type HandlerFactory = Arc<dyn Fn() -> BoxHandler + Send + Sync>;
type AdapterFactory = Arc<dyn Fn(&DispatchContext) -> BoxHandler + Send + Sync>;
type TypeDescriber = fn(&mut ExpansionScope) -> TypeDescriptor;

/// Typed callback metadata plus the factory that builds its dispatch adapter
#[derive(Clone)]
pub struct TypedCallback {
    /// Static field list of the request type
    pub request_fields: Vec<FieldInfo>,
    pub request_type: String,
    pub response_type: String,
    describe_request: TypeDescriber,
    describe_response: TypeDescriber,
    adapter: AdapterFactory,
}

impl TypedCallback {
    pub fn describe_request(&self, scope: &mut ExpansionScope) -> TypeDescriptor {
        (self.describe_request)(scope)
    }

    pub fn describe_response(&self, scope: &mut ExpansionScope) -> TypeDescriptor {
        (self.describe_response)(scope)
    }

    /// Build the dispatch adapter for this method
    pub fn build_handler(&self, dispatch: &DispatchContext) -> BoxHandler {
        (self.adapter)(dispatch)
    }
}

/// How a registered method turns into a route
#[derive(Clone)]
pub enum MethodShape {
    /// Produces a ready-made handler; called once while the route is registered
    RawHandler(HandlerFactory),
    /// `(context, request) -> (response, error)`, dispatched through the generic adapter
    TypedCallback(TypedCallback),
}

impl fmt::Debug for MethodShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodShape::RawHandler(_) => f.write_str("RawHandler"),
            MethodShape::TypedCallback(callback) => f
                .debug_struct("TypedCallback")
                .field("request_type", &callback.request_type)
                .field("response_type", &callback.response_type)
                .finish(),
        }
    }
}

/// One registered method
#[derive(Debug, Clone)]
pub struct MethodEntry {
    pub name: String,
    pub shape: MethodShape,
}

/// Embedded fields promote their methods; named fields become their own sub-group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Named,
    Embedded,
}

/// One registered struct field
#[derive(Clone)]
pub struct FieldEntry {
    pub name: String,
    pub kind: FieldKind,
    /// `None` models an unset field, which is skipped
    pub value: Option<Arc<dyn Controller>>,
}

impl fmt::Debug for FieldEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldEntry")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("type_name", &self.value.as_ref().map(|value| value.type_name()))
            .finish()
    }
}

/// Methods and fields a controller exposes, in registration order
#[derive(Debug, Default)]
pub struct MethodSet {
    methods: Vec<MethodEntry>,
    fields: Vec<FieldEntry>,
}

impl MethodSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the method set of `controller`
    pub fn of(controller: Arc<dyn Controller>) -> Self {
        let mut set = Self::new();
        controller.register(&mut set);
        set
    }

    /// Register a method that produces a ready-made handler
    pub fn handler<C, F>(&mut self, controller: &Arc<C>, name: &str, produce: F)
    where
        C: Send + Sync + 'static,
        F: Fn(&C) -> BoxHandler + Send + Sync + 'static,
    {
        let controller = controller.clone();
        self.methods.push(MethodEntry {
            name: name.to_string(),
            shape: MethodShape::RawHandler(Arc::new(move || produce(&controller))),
        });
    }

    /// Register a typed callback `(Arc<C>, RequestContext, Req) -> Result<Resp, E>`
    pub fn typed<C, Req, Resp, E, F, Fut>(&mut self, controller: &Arc<C>, name: &str, method: F)
    where
        C: Send + Sync + 'static,
        Req: Reflect + DeserializeOwned + Validate + Send + 'static,
        Resp: Reflect + Serialize + Send + 'static,
        E: Into<RouterError> + Send + 'static,
        F: Fn(Arc<C>, RequestContext, Req) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, E>> + Send + 'static,
    {
        let controller = controller.clone();
        let method_name = name.to_string();
        let adapter: AdapterFactory = Arc::new(move |dispatch: &DispatchContext| {
            typed_handler(controller.clone(), &method_name, method.clone(), dispatch)
        });

        self.methods.push(MethodEntry {
            name: name.to_string(),
            shape: MethodShape::TypedCallback(TypedCallback {
                request_fields: Req::fields(),
                request_type: Req::type_name(),
                response_type: Resp::type_name(),
                describe_request: describe_type::<Req>,
                describe_response: describe_type::<Resp>,
                adapter,
            }),
        });
    }

    /// Register a named struct field; it becomes a nested sub-group
    pub fn named<T: Controller>(&mut self, name: &str, value: Option<Arc<T>>) {
        self.field(name, FieldKind::Named, value.map(|value| value as Arc<dyn Controller>));
    }

    /// Register an embedded field; its methods are promoted into this controller
    pub fn embedded<T: Controller>(&mut self, name: &str, value: Option<Arc<T>>) {
        self.field(name, FieldKind::Embedded, value.map(|value| value as Arc<dyn Controller>));
    }

    /// Register a field holding an already type-erased controller
    pub fn field(&mut self, name: &str, kind: FieldKind, value: Option<Arc<dyn Controller>>) {
        self.fields.push(FieldEntry {
            name: name.to_string(),
            kind,
            value,
        });
    }

    pub fn methods(&self) -> &[MethodEntry] {
        &self.methods
    }

    pub fn fields(&self) -> &[FieldEntry] {
        &self.fields
    }

    /// Own methods followed by methods promoted from embedded fields
    ///
    /// A name already present shadows a promoted method with the same name, at any depth.
    pub fn with_promoted(&self) -> Vec<MethodEntry> {
        let mut methods = self.methods.clone();
        for field in self.embedded_fields() {
            for promoted in MethodSet::of(field).with_promoted() {
                if !methods.iter().any(|method| method.name == promoted.name) {
                    methods.push(promoted);
                }
            }
        }
        methods
    }

    /// Values of the embedded fields that are set
    pub fn embedded_fields(&self) -> impl Iterator<Item = Arc<dyn Controller>> + '_ {
        self.fields
            .iter()
            .filter(|field| field.kind == FieldKind::Embedded)
            .filter_map(|field| field.value.clone())
    }
}

/// Look up a capability on `controller`, falling back to its embedded fields (depth first)
pub fn promoted_capability<T>(
    controller: &Arc<dyn Controller>,
    methods: &MethodSet,
    capability: &dyn Fn(&dyn Controller) -> Option<T>,
) -> Option<T> {
    if let Some(value) = capability(controller.as_ref()) {
        return Some(value);
    }
    methods.embedded_fields().find_map(|field| {
        let nested = MethodSet::of(field.clone());
        promoted_capability(&field, &nested, capability)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::handler_fn;

    struct Inner;

    impl Controller for Inner {
        fn type_name(&self) -> String {
            "Inner".to_string()
        }

        fn register(self: Arc<Self>, methods: &mut MethodSet) {
            methods.handler(&self, "GetShared", |_| handler_fn(|_req| async { "inner" }));
            methods.handler(&self, "GetInner", |_| handler_fn(|_req| async { "inner" }));
        }

        fn base_path(&self) -> Option<String> {
            Some("/custom".to_string())
        }
    }

    struct Outer {
        inner: Option<Arc<Inner>>,
    }

    impl Controller for Outer {
        fn type_name(&self) -> String {
            "Outer".to_string()
        }

        fn register(self: Arc<Self>, methods: &mut MethodSet) {
            methods.handler(&self, "GetShared", |_| handler_fn(|_req| async { "outer" }));
            methods.embedded("Inner", self.inner.clone());
        }
    }

    #[test]
    fn test_is_exported() {
        assert!(is_exported("GetDetail"));
        assert!(!is_exported("getDetail"));
        assert!(!is_exported("_Get"));
        assert!(!is_exported(""));
    }

    #[test]
    fn test_promoted_methods_are_shadowed_by_own() {
        let outer: Arc<dyn Controller> = Arc::new(Outer {
            inner: Some(Arc::new(Inner)),
        });
        let methods = MethodSet::of(outer);
        let names: Vec<_> = methods.with_promoted().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["GetShared", "GetInner"]);
    }

    #[test]
    fn test_unset_embedded_field_promotes_nothing() {
        let outer: Arc<dyn Controller> = Arc::new(Outer { inner: None });
        let methods = MethodSet::of(outer);
        assert_eq!(methods.with_promoted().len(), 1);
        assert_eq!(methods.fields().len(), 1);
    }

    #[test]
    fn test_capability_is_promoted_from_embedded_field() {
        let outer: Arc<dyn Controller> = Arc::new(Outer {
            inner: Some(Arc::new(Inner)),
        });
        let methods = MethodSet::of(outer.clone());
        let base = promoted_capability(&outer, &methods, &|c: &dyn Controller| c.base_path());
        assert_eq!(base.as_deref(), Some("/custom"));
    }
}
