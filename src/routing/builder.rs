//! # Route Tree Builder
//!
//! Walks a controller graph once at startup. Every exported method that resolves to a verb
//! becomes a route in the group of its controller; every exported struct field becomes a nested
//! group. Typed callbacks are also recorded in the [`ApiRegistry`], which may extend their path
//! with promoted path parameters.
//!
//! Embedded fields promote their methods (and capabilities) into the parent, so the recursive
//! call for an embedded field skips its own methods and only descends into its fields.

use std::sync::Arc;
use tracing::{debug, trace};

use crate::core::error::RouterResult;
use crate::openapi::registry::ApiRegistry;
use crate::reflection::TypeShape;
use crate::routing::controller::{
    is_exported, promoted_capability, Controller, FieldKind, MethodSet, MethodShape,
};
use crate::routing::dispatch::DispatchContext;
use crate::routing::naming::NamingResolver;
use crate::routing::router::{RouteGroup, RouteTable};

/// Builds the route table and the API registry from controllers
pub struct RouteTreeBuilder {
    resolver: NamingResolver,
    dispatch: DispatchContext,
    table: RouteTable,
    registry: ApiRegistry,
}

impl RouteTreeBuilder {
    pub fn new(resolver: NamingResolver, dispatch: DispatchContext) -> Self {
        Self {
            resolver,
            dispatch,
            table: RouteTable::new(),
            registry: ApiRegistry::new(),
        }
    }

    /// Build a top-level controller
    ///
    /// Unlike nested fields, a top-level controller with an unexported type name is an error.
    pub fn build_root(&mut self, parent: &RouteGroup, controller: Arc<dyn Controller>) -> RouterResult<()> {
        let type_name = controller.type_name();
        if !is_exported(&type_name) {
            return Err(crate::config_error!(
                "controller type {:?} is not exported (must start with an upper-case letter)",
                type_name
            ));
        }
        self.build(parent, Some(controller), false)
    }

    /// Register the routes of `controller` and its fields below `parent`
    pub fn build(
        &mut self,
        parent: &RouteGroup,
        controller: Option<Arc<dyn Controller>>,
        skip_own_methods: bool,
    ) -> RouterResult<()> {
        let Some(controller) = controller else {
            return Ok(());
        };

        let type_name = controller.type_name();
        let shape = controller.shape();
        if shape != TypeShape::Struct {
            return Err(crate::config_error!(
                "controller {} is {:?}, not a struct",
                type_name,
                shape
            ));
        }
        if !is_exported(&type_name) {
            trace!(controller = %type_name, "Skipping unexported controller type");
            return Ok(());
        }

        let methods = MethodSet::of(controller.clone());
        let group_middlewares =
            promoted_capability(&controller, &methods, &|c: &dyn Controller| c.middlewares())
                .unwrap_or_default();
        let base_path =
            promoted_capability(&controller, &methods, &|c: &dyn Controller| c.base_path())
                .unwrap_or_else(|| self.resolver.apply(&type_name));
        let group = parent.group(&base_path, group_middlewares);
        debug!(controller = %type_name, base_path = %group.base_path(), "Opened route group");

        if !skip_own_methods {
            let method_middlewares = promoted_capability(&controller, &methods, &|c: &dyn Controller| {
                c.method_middlewares()
            })
            .unwrap_or_default();

            for method in methods.with_promoted() {
                if !is_exported(&method.name) {
                    trace!(controller = %type_name, method = %method.name, "Skipping unexported method");
                    continue;
                }
                let Some(resolved) = self.resolver.resolve(&method.name) else {
                    trace!(controller = %type_name, method = %method.name, "Method name has no verb prefix");
                    continue;
                };
                let middlewares = method_middlewares.get(&method.name).cloned().unwrap_or_default();

                let route = match method.shape {
                    MethodShape::RawHandler(produce) => group.route(
                        resolved.verb,
                        &resolved.sub_path,
                        &method.name,
                        middlewares,
                        produce(),
                    ),
                    MethodShape::TypedCallback(callback) => {
                        let mut route = group.route(
                            resolved.verb,
                            &resolved.sub_path,
                            &method.name,
                            middlewares,
                            callback.build_handler(&self.dispatch),
                        );
                        route.path = self.registry.record_with(
                            &route.path,
                            resolved.verb,
                            &method.name,
                            |scope| callback.describe_request(scope),
                            |scope| callback.describe_response(scope),
                        );
                        route
                    }
                };
                self.table.add(route)?;
            }
        }

        for field in methods.fields() {
            if !is_exported(&field.name) {
                trace!(controller = %type_name, field = %field.name, "Skipping unexported field");
                continue;
            }
            self.build(&group, field.value.clone(), field.kind == FieldKind::Embedded)?;
        }

        Ok(())
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn registry(&self) -> &ApiRegistry {
        &self.registry
    }

    /// Finish building and hand out the route table and the API registry
    pub fn finish(self) -> (RouteTable, ApiRegistry) {
        (self.table, self.registry)
    }
}
