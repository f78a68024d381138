//! API metadata collector: one record per typed route, keyed by final path.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::reflection::{describe_type, ExpansionScope, Reflect, TypeDescriptor};
use crate::routing::naming::Verb;

/// Metadata of one typed route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRouteRecord {
    /// Final path, including promoted path parameters
    pub path: String,
    /// Lower-case verb, e.g. `get`
    pub verb: String,
    /// Controller method the route was derived from
    pub method_name: String,
    pub request: TypeDescriptor,
    pub response: TypeDescriptor,
}

/// Path to per-verb records
///
/// The registry owns the expansion scope of its document pass; two registries never share
/// expansion state.
#[derive(Debug, Clone, Default)]
pub struct ApiRegistry {
    routes: BTreeMap<String, Vec<ApiRouteRecord>>,
    scope: ExpansionScope,
}

impl ApiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a typed route and return its final path
    ///
    /// Every top-level request field carrying a path-parameter key appends `/:<key>` to `path`.
    pub fn record<Req: Reflect, Resp: Reflect>(&mut self, path: &str, verb: Verb, method_name: &str) -> String {
        self.record_with(path, verb, method_name, describe_type::<Req>, describe_type::<Resp>)
    }

    /// Like [`ApiRegistry::record`], with the request and response describers supplied directly
    pub fn record_with<FReq, FResp>(
        &mut self,
        path: &str,
        verb: Verb,
        method_name: &str,
        describe_request: FReq,
        describe_response: FResp,
    ) -> String
    where
        FReq: FnOnce(&mut ExpansionScope) -> TypeDescriptor,
        FResp: FnOnce(&mut ExpansionScope) -> TypeDescriptor,
    {
        let request = describe_request(&mut self.scope);
        let response = describe_response(&mut self.scope);

        let mut final_path = path.trim_end_matches('/').to_string();
        for field in request.fields.iter().filter(|field| field.tags.is_path_param()) {
            final_path.push_str("/:");
            final_path.push_str(&field.tags.uri_key);
        }
        if final_path.is_empty() {
            final_path.push('/');
        }

        self.routes
            .entry(final_path.clone())
            .or_default()
            .push(ApiRouteRecord {
                path: final_path.clone(),
                verb: verb.lowercase().to_string(),
                method_name: method_name.to_string(),
                request,
                response,
            });

        final_path
    }

    pub fn routes(&self) -> &BTreeMap<String, Vec<ApiRouteRecord>> {
        &self.routes
    }

    /// Records under `path`, in registration order
    pub fn get(&self, path: &str) -> Option<&[ApiRouteRecord]> {
        self.routes.get(path).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn into_routes(self) -> BTreeMap<String, Vec<ApiRouteRecord>> {
        self.routes
    }
}
