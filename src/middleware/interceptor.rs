//! Interceptor: blocks configured method and path pairs, optionally only for some client IPs.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::core::error::RouterError;
use crate::core::types::{middleware_fn, BoxMiddleware, RequestContext};
use crate::routing::dispatch::Responder;

/// One blocking rule
///
/// An empty `ip_list` blocks every client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptorRule {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub ip_list: Vec<String>,
    #[serde(default = "default_message")]
    pub message: String,
}

fn default_message() -> String {
    "this API is currently unavailable".to_string()
}

impl InterceptorRule {
    pub fn new(method: impl Into<String>, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ip_list: Vec::new(),
            message: message.into(),
        }
    }

    pub fn for_ips(mut self, ips: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ip_list = ips.into_iter().map(Into::into).collect();
        self
    }

    pub fn matches(&self, method: &str, path: &str, client_ip: &str) -> bool {
        self.method.eq_ignore_ascii_case(method)
            && self.path == path
            && (self.ip_list.is_empty() || self.ip_list.iter().any(|ip| ip == client_ip))
    }
}

pub struct InterceptorMiddleware {
    responder: Arc<dyn Responder>,
    rules: Vec<InterceptorRule>,
}

impl InterceptorMiddleware {
    pub fn new(responder: Arc<dyn Responder>, rules: Vec<InterceptorRule>) -> Self {
        Self { responder, rules }
    }

    pub async fn handle(&self, request: Request, next: Next) -> Response {
        let ctx = RequestContext::snapshot(&request);
        let matched = self
            .rules
            .iter()
            .find(|rule| rule.matches(ctx.method.as_str(), ctx.path(), &ctx.client_ip));

        match matched {
            Some(rule) => {
                info!(
                    method = %ctx.method,
                    path = %ctx.path(),
                    client_ip = %ctx.client_ip,
                    "Request intercepted"
                );
                self.responder.respond(
                    &ctx,
                    Err(RouterError::Intercepted {
                        method: ctx.method.to_string(),
                        path: ctx.path().to_string(),
                        message: rule.message.clone(),
                    }),
                )
            }
            None => next.run(request).await,
        }
    }

    pub fn into_middleware(self) -> BoxMiddleware {
        let interceptor = Arc::new(self);
        middleware_fn(move |request: Request, next: Next| {
            let interceptor = interceptor.clone();
            async move { interceptor.handle(request, next).await }
        })
    }
}
