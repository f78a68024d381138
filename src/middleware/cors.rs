//! Permissive CORS: every origin is allowed and `OPTIONS` requests are answered directly.

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::Response;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use crate::core::types::{middleware_fn, BoxMiddleware, RequestContext};
use crate::routing::dispatch::Responder;

pub const ALLOW_HEADERS: &str =
    "Content-Type,AccessToken,X-CSRF-Token, Authorization, Token,X-Token,X-User-Id";
pub const ALLOW_METHODS: &str = "POST, GET, OPTIONS,DELETE,PUT";
pub const EXPOSE_HEADERS: &str = "Content-Length, Access-Control-Allow-Origin, Access-Control-Allow-Headers, Content-Type, New-Token, New-Expires-At";
pub const PREFLIGHT_MAX_AGE: &str = "3600";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    /// Headers added to every response, after the CORS headers
    pub extra_headers: BTreeMap<String, String>,
}

pub struct CorsMiddleware {
    responder: Arc<dyn Responder>,
    extra_headers: Vec<(HeaderName, HeaderValue)>,
}

impl CorsMiddleware {
    /// Invalid extra header names or values are logged and dropped
    pub fn new(responder: Arc<dyn Responder>, extra_headers: &BTreeMap<String, String>) -> Self {
        let extra_headers = extra_headers
            .iter()
            .filter_map(|(name, value)| {
                match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
                    (Ok(name), Ok(value)) => Some((name, value)),
                    _ => {
                        warn!(header = %name, "Ignoring invalid CORS header");
                        None
                    }
                }
            })
            .collect();

        Self {
            responder,
            extra_headers,
        }
    }

    fn apply_headers(&self, origin: &HeaderValue, headers: &mut HeaderMap) {
        headers.insert("access-control-allow-origin", origin.clone());
        headers.insert("access-control-allow-headers", HeaderValue::from_static(ALLOW_HEADERS));
        headers.insert("access-control-allow-methods", HeaderValue::from_static(ALLOW_METHODS));
        headers.insert("access-control-expose-headers", HeaderValue::from_static(EXPOSE_HEADERS));
        headers.insert("access-control-allow-credentials", HeaderValue::from_static("true"));
        for (name, value) in &self.extra_headers {
            headers.insert(name.clone(), value.clone());
        }
    }

    pub async fn handle(&self, request: Request, next: Next) -> Response {
        let origin = request
            .headers()
            .get("origin")
            .filter(|origin| !origin.is_empty() && origin.as_bytes() != b"null")
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("*"));

        let mut response = if request.method() == Method::OPTIONS {
            let ctx = RequestContext::snapshot(&request);
            let mut response = self.responder.respond(&ctx, Ok(Value::Null));
            response
                .headers_mut()
                .insert("access-control-max-age", HeaderValue::from_static(PREFLIGHT_MAX_AGE));
            response
        } else {
            next.run(request).await
        };

        self.apply_headers(&origin, response.headers_mut());
        response
    }

    pub fn into_middleware(self) -> BoxMiddleware {
        let cors = Arc::new(self);
        middleware_fn(move |request: Request, next: Next| {
            let cors = cors.clone();
            async move { cors.handle(request, next).await }
        })
    }
}
