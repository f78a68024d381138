//! # Router Module
//!
//! This module holds the route groups and the flat route table the tree builder registers into,
//! and converts the table into one `axum::Router`.
//!
//! ## Rust Concepts Used
//!
//! - `RouteGroup` is a plain value: opening a sub-group clones the inherited middleware list
//! - `axum::middleware::from_fn` adapts each boxed middleware into a tower layer
//! - `MethodRouter::merge` joins routes that share a path but differ in verb
//! - `BTreeMap` keeps the table in a deterministic order for conversion and introspection
//! - `tower::ServiceBuilder` stacks the outermost layers, as a tower-http panic guard

use axum::extract::Request;
use axum::middleware::{from_fn, Next};
use axum::routing::{on, MethodRouter};
use axum::Router as AxumRouter;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::debug;

use crate::core::error::{RouterError, RouterResult};
use crate::core::types::{BoxHandler, BoxMiddleware};
use crate::routing::naming::Verb;

/// Join path fragments into one absolute, slash-normalized path
///
/// # Example
/// ```rust
/// use ctrl_router::routing::join_path;
///
/// assert_eq!(join_path("/api/", "detail"), "/api/detail");
/// assert_eq!(join_path("", ""), "/");
/// ```
pub fn join_path(base: &str, sub: &str) -> String {
    let segments: Vec<&str> = base
        .split('/')
        .chain(sub.split('/'))
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();
    format!("/{}", segments.join("/"))
}

/// A route group: base path plus the middleware every route below it inherits
#[derive(Clone, Default)]
pub struct RouteGroup {
    base_path: String,
    middlewares: Vec<BoxMiddleware>,
}

impl RouteGroup {
    /// Root group at `base_path`
    pub fn root(base_path: &str) -> Self {
        Self {
            base_path: join_path(base_path, ""),
            middlewares: Vec::new(),
        }
    }

    /// Open a sub-group; inherited middleware runs before `middlewares`
    pub fn group(&self, path: &str, middlewares: Vec<BoxMiddleware>) -> Self {
        let mut inherited = self.middlewares.clone();
        inherited.extend(middlewares);
        Self {
            base_path: join_path(&self.base_path, path),
            middlewares: inherited,
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn middlewares(&self) -> &[BoxMiddleware] {
        &self.middlewares
    }

    /// Build a route below this group: group middleware, then `method_middlewares`, then `handler`
    pub fn route(
        &self,
        verb: Verb,
        path: &str,
        method_name: &str,
        method_middlewares: Vec<BoxMiddleware>,
        handler: BoxHandler,
    ) -> Route {
        let mut middlewares = self.middlewares.clone();
        middlewares.extend(method_middlewares);
        Route {
            verb,
            path: join_path(&self.base_path, path),
            method_name: method_name.to_string(),
            middlewares,
            handler,
        }
    }
}

impl fmt::Debug for RouteGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteGroup")
            .field("base_path", &self.base_path)
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}

/// One registered route: verb, absolute path, ordered middleware and exactly one terminal handler
#[derive(Clone)]
pub struct Route {
    pub verb: Verb,
    pub path: String,
    /// Controller method the route was derived from
    pub method_name: String,
    pub middlewares: Vec<BoxMiddleware>,
    pub handler: BoxHandler,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("verb", &self.verb)
            .field("path", &self.path)
            .field("method_name", &self.method_name)
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}

/// Verb, path and method name of a registered route
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RouteSummary {
    pub verb: Verb,
    pub path: String,
    pub method_name: String,
}

/// Pattern with parameter names erased, `/a/:id` -> `/a/:`
fn path_shape(path: &str) -> String {
    path.split('/')
        .map(|segment| match segment.chars().next() {
            Some(':') => ":",
            Some('*') => "*",
            _ => segment,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Every route of the engine, keyed by `(path, verb)`
#[derive(Default)]
pub struct RouteTable {
    routes: BTreeMap<(String, Verb), Route>,
    shapes: HashMap<String, String>,
    global: Vec<BoxMiddleware>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Middleware that wraps the whole router, including unmatched requests
    pub fn with_global(mut self, middlewares: Vec<BoxMiddleware>) -> Self {
        self.global = middlewares;
        self
    }

    /// Add a route
    ///
    /// Fails when the verb and path are already taken, or when the path differs from an existing
    /// one only in its parameter names.
    pub fn add(&mut self, route: Route) -> RouterResult<()> {
        let key = (route.path.clone(), route.verb);
        if let Some(existing) = self.routes.get(&key) {
            return Err(RouterError::config(format!(
                "duplicate route {} {} (methods {} and {})",
                route.verb, route.path, existing.method_name, route.method_name
            )));
        }

        let shape = path_shape(&route.path);
        match self.shapes.get(&shape) {
            Some(path) if *path != route.path => {
                return Err(RouterError::config(format!(
                    "route {} conflicts with {}: parameter names differ",
                    route.path, path
                )));
            }
            Some(_) => {}
            None => {
                self.shapes.insert(shape, route.path.clone());
            }
        }

        debug!(verb = %route.verb, path = %route.path, method = %route.method_name, "Registered route");
        self.routes.insert(key, route);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn contains(&self, verb: Verb, path: &str) -> bool {
        self.routes.contains_key(&(path.to_string(), verb))
    }

    pub fn get(&self, verb: Verb, path: &str) -> Option<&Route> {
        self.routes.get(&(path.to_string(), verb))
    }

    /// Registered routes ordered by path, then verb
    pub fn summaries(&self) -> Vec<RouteSummary> {
        self.routes
            .values()
            .map(|route| RouteSummary {
                verb: route.verb,
                path: route.path.clone(),
                method_name: route.method_name.clone(),
            })
            .collect()
    }

    /// Convert the table into an `axum::Router`
    pub fn into_router(self) -> AxumRouter {
        let mut by_path: BTreeMap<String, MethodRouter> = BTreeMap::new();

        for ((path, _), route) in self.routes {
            let method_router = method_router(route);
            let merged = match by_path.remove(&path) {
                Some(existing) => existing.merge(method_router),
                None => method_router,
            };
            by_path.insert(path, merged);
        }

        let mut router = by_path
            .into_iter()
            .fold(AxumRouter::new(), |router, (path, method_router)| {
                router.route(&path, method_router)
            });

        // the last layer added runs first
        for middleware in self.global.into_iter().rev() {
            router = router.layer(from_fn(move |request: Request, next: Next| {
                let middleware = middleware.clone();
                async move { middleware(request, next).await }
            }));
        }

        // a panicking raw handler or middleware answers 500 instead of dropping the connection
        router.layer(ServiceBuilder::new().layer(CatchPanicLayer::new()))
    }
}

fn method_router(route: Route) -> MethodRouter {
    let handler = route.handler;
    let mut method_router = on(route.verb.method_filter(), move |request: Request| {
        let handler = handler.clone();
        async move { handler(request).await }
    });

    for middleware in route.middlewares.into_iter().rev() {
        method_router = method_router.route_layer(from_fn(move |request: Request, next: Next| {
            let middleware = middleware.clone();
            async move { middleware(request, next).await }
        }));
    }

    method_router
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.summaries())
            .field("global", &self.global.len())
            .finish()
    }
}
