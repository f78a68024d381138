//! # Engine
//!
//! The facade that owns the routing configuration, builds the whole route tree from the
//! registered controllers at construction time, and serves the result.
//!
//! ## Rust Concepts Used
//!
//! - Builder pattern (`EngineBuilder`) with consuming `self` setters
//! - `tokio::sync::watch` to signal graceful shutdown to a running `start()`
//! - `axum::serve` with `ConnectInfo` so middleware can see the peer address

use axum::Router as AxumRouter;
use std::collections::BTreeMap;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::core::config::EngineConfig;
use crate::core::error::{RouterError, RouterResult};
use crate::core::types::BoxMiddleware;
use crate::middleware::MiddlewareSet;
use crate::openapi::{ApiRegistry, ApiRouteRecord, OpenApiDocument};
use crate::routing::controller::Controller;
use crate::routing::dispatch::{Binder, DefaultBinder, DefaultResponder, DispatchContext, Responder};
use crate::routing::naming::{default_naming_rule, HttpMethodPrefix, NamingResolver, NamingRule, Verb};
use crate::routing::router::{RouteGroup, RouteSummary};
use crate::routing::RouteTreeBuilder;

/// Collects engine options before the route tree is built
///
/// `config` replaces the whole configuration, so call it before the finer-grained setters.
pub struct EngineBuilder {
    config: EngineConfig,
    naming_rule: NamingRule,
    binder: Arc<dyn Binder>,
    responder: Arc<dyn Responder>,
    middlewares: Vec<BoxMiddleware>,
    controllers: Vec<Arc<dyn Controller>>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            naming_rule: default_naming_rule(),
            binder: Arc::new(DefaultBinder),
            responder: Arc::new(DefaultResponder),
            middlewares: Vec::new(),
            controllers: Vec::new(),
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Path every controller group is mounted below
    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.config.routing.base_path = base_path.into();
        self
    }

    /// Replace the method-name prefix table
    pub fn prefixes(mut self, prefixes: Vec<HttpMethodPrefix>) -> Self {
        self.config.routing.prefixes = prefixes;
        self
    }

    pub fn default_verb(mut self, verb: Option<Verb>) -> Self {
        self.config.routing.default_verb = verb;
        self
    }

    pub fn naming_rule<F>(mut self, rule: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.naming_rule = Arc::new(rule);
        self
    }

    pub fn binder(mut self, binder: Arc<dyn Binder>) -> Self {
        self.binder = binder;
        self
    }

    pub fn responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.responder = responder;
        self
    }

    /// Global middleware; runs before every group and method middleware, in the order added
    pub fn middleware(mut self, middleware: BoxMiddleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn controller<C: Controller>(self, controller: C) -> Self {
        self.controller_arc(Arc::new(controller))
    }

    pub fn controller_arc(mut self, controller: Arc<dyn Controller>) -> Self {
        self.controllers.push(controller);
        self
    }

    /// Document title
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.openapi.title = title.into();
        self
    }

    /// Document version
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.openapi.version = version.into();
        self
    }

    /// Build the route tree, the router and the document
    ///
    /// Fails fast with a configuration error on invalid controllers or duplicate routes.
    #[instrument(skip(self))]
    pub fn build(self) -> RouterResult<Engine> {
        let config = self.config;
        config.validate()?;

        let resolver = NamingResolver::new(config.routing.prefixes.clone(), self.naming_rule)
            .with_default_verb(config.routing.default_verb);
        for prefix in resolver.ambiguous_prefixes() {
            warn!(prefix = %prefix, "Prefix configured more than once; the first entry wins");
        }

        let dispatch = DispatchContext {
            binder: self.binder,
            responder: self.responder.clone(),
            body_limit: config.server.max_body_size,
        };

        let root = RouteGroup::root(&config.routing.base_path);
        let mut builder = RouteTreeBuilder::new(resolver, dispatch);
        for controller in self.controllers {
            builder.build_root(&root, controller)?;
        }
        let (table, registry) = builder.finish();

        let document = OpenApiDocument::from_registry(&registry, &config.openapi.title, &config.openapi.version);
        if config.openapi.enabled {
            document.write_yaml(&config.openapi.output_path)?;
        }

        let mut global = MiddlewareSet::new(self.responder, &config.middleware).from_config(&config.middleware);
        global.extend(self.middlewares);

        let routes = table.summaries();
        let router = table.with_global(global).into_router();

        info!(
            routes = routes.len(),
            documented_routes = registry.len(),
            base_path = %config.routing.base_path,
            "Route tree built"
        );

        let (shutdown, _) = watch::channel(false);
        Ok(Engine {
            config,
            router,
            routes,
            registry,
            document,
            shutdown,
            local_addr: parking_lot::Mutex::new(None),
        })
    }
}

/// A built engine: router, API metadata and server lifecycle
pub struct Engine {
    config: EngineConfig,
    router: AxumRouter,
    routes: Vec<RouteSummary>,
    registry: ApiRegistry,
    document: OpenApiDocument,
    shutdown: watch::Sender<bool>,
    local_addr: parking_lot::Mutex<Option<SocketAddr>>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// The assembled router; clones share handlers and middleware state
    pub fn router(&self) -> AxumRouter {
        self.router.clone()
    }

    /// Typed routes by final path, each with its request and response descriptors
    pub fn api_routes(&self) -> &BTreeMap<String, Vec<ApiRouteRecord>> {
        self.registry.routes()
    }

    pub fn openapi(&self) -> &OpenApiDocument {
        &self.document
    }

    /// Every registered route, ordered by path and verb
    pub fn routes(&self) -> &[RouteSummary] {
        &self.routes
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Address the listener is bound to while `start` runs
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Bind and serve until `stop` is called
    ///
    /// After `stop`, in-flight requests get `server.shutdown_timeout` to finish. The stop signal is
    /// cleared on return, so a stopped engine can be started again; a `stop` issued before `start`
    /// makes that `start` return right after binding.
    pub async fn start(&self) -> RouterResult<()> {
        let bind_addr = format!("{}:{}", self.config.server.bind_address, self.config.server.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| RouterError::internal(format!("Failed to bind server to {}: {}", bind_addr, e)))?;
        let local_addr = listener.local_addr()?;
        *self.local_addr.lock() = Some(local_addr);
        info!("HTTP server listening on {}", local_addr);

        let mut stop_rx = self.shutdown.subscribe();
        let mut deadline_rx = self.shutdown.subscribe();
        let shutdown_timeout = self.config.server.shutdown_timeout;

        let server = axum::serve(
            listener,
            self.router
                .clone()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = stop_rx.wait_for(|stop| *stop).await;
        })
        .into_future();

        let deadline = async move {
            let _ = deadline_rx.wait_for(|stop| *stop).await;
            tokio::time::sleep(shutdown_timeout).await;
        };

        let result = tokio::select! {
            result = server => result.map_err(|e| RouterError::internal(format!("Server error: {}", e))),
            _ = deadline => {
                warn!("Server shutdown timed out after {:?}, dropping in-flight requests", shutdown_timeout);
                Ok(())
            }
        };

        *self.local_addr.lock() = None;
        self.shutdown.send_replace(false);
        info!("HTTP server stopped");
        result
    }

    /// Signal a running `start` to shut down gracefully
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("routes", &self.routes)
            .field("documented_routes", &self.registry.len())
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

#[async_trait::async_trait]
impl crate::gateway::lifecycle::Starter for Engine {
    async fn start(&self) -> RouterResult<()> {
        Engine::start(self).await
    }
}

#[async_trait::async_trait]
impl crate::gateway::lifecycle::Stopper for Engine {
    async fn stop(&self) -> RouterResult<()> {
        Engine::stop(self);
        Ok(())
    }
}
