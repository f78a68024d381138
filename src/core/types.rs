//! # Core Types Module
//!
//! This module defines the request-time data structures shared by every part of the router:
//! the `RequestContext` handed to binders, controller methods and responders, and the boxed
//! handler and middleware function types that make up a route's handler chain.
//!
//! ## Rust Concepts Used
//!
//! - `Arc<dyn Fn ...>` lets one pre-built handler be shared by every request task
//! - `BoxFuture<'static, _>` erases the concrete future type of each handler
//! - `Bytes` makes cloning the buffered body cheap

use axum::extract::connect_info::ConnectInfo;
use axum::extract::{FromRequestParts, MatchedPath, RawPathParams, Request};
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap, Method, Uri, Version};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::core::error::{RouterError, RouterResult};

/// Terminal handler: turns a request into a response
pub type BoxHandler = Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// Middleware: either answers the request itself or calls `next.run(request)`
pub type BoxMiddleware = Arc<dyn Fn(Request, Next) -> BoxFuture<'static, Response> + Send + Sync>;

/// Wrap an async function into a [`BoxHandler`]
///
/// # Example
/// ```rust
/// use ctrl_router::core::types::handler_fn;
///
/// let hello = handler_fn(|_req| async { "hello world" });
/// ```
pub fn handler_fn<F, Fut, R>(f: F) -> BoxHandler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + 'static,
{
    Arc::new(move |request| {
        let fut = f(request);
        async move { fut.await.into_response() }.boxed()
    })
}

/// Wrap an async function into a [`BoxMiddleware`]
pub fn middleware_fn<F, Fut, R>(f: F) -> BoxMiddleware
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + 'static,
{
    Arc::new(move |request, next| {
        let fut = f(request, next);
        async move { fut.await.into_response() }.boxed()
    })
}

/// Everything a typed callback may need to know about the live request
///
/// The body is buffered once when the context is created, so the context can be cloned and
/// handed to the binder, the controller method and the responder independently.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique identifier for this request
    pub id: String,

    /// HTTP method
    pub method: Method,

    /// Request URI including path and query
    pub uri: Uri,

    /// HTTP version
    pub version: Version,

    /// Request headers
    pub headers: HeaderMap,

    /// Request extensions set by middleware
    pub extensions: Extensions,

    /// Percent-decoded path parameters of the matched route
    pub path_params: HashMap<String, String>,

    /// Buffered request body
    pub body: Bytes,

    /// Resolved client address (see [`client_ip`])
    pub client_ip: String,

    /// Route pattern that matched, e.g. `/api/detail/:id`
    pub matched_path: Option<String>,

    /// When the context was created
    pub received_at: Instant,
}

impl RequestContext {
    /// Build a context from a live request, buffering at most `body_limit` bytes of body
    pub async fn from_request(request: Request, body_limit: usize) -> RouterResult<Self> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, body_limit)
            .await
            .map_err(|e| RouterError::bind(format!("failed to read request body: {}", e)))?;

        Ok(Self::from_parts(parts, body).await)
    }

    /// Build a context from request parts and an already buffered body
    pub async fn from_parts(mut parts: Parts, body: Bytes) -> Self {
        let path_params = match RawPathParams::from_request_parts(&mut parts, &()).await {
            Ok(params) => params
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            Err(_) => HashMap::new(),
        };

        let matched_path = parts
            .extensions
            .get::<MatchedPath>()
            .map(|path| path.as_str().to_string());
        let client_ip = client_ip(&parts.headers, &parts.extensions);

        Self {
            id: Uuid::new_v4().to_string(),
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            extensions: parts.extensions,
            path_params,
            body,
            client_ip,
            matched_path,
            received_at: Instant::now(),
        }
    }

    /// Head-only copy of a request that is still travelling through middleware
    ///
    /// Path parameters and body are left empty.
    pub fn snapshot(request: &Request) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            method: request.method().clone(),
            uri: request.uri().clone(),
            version: request.version(),
            headers: request.headers().clone(),
            extensions: request.extensions().clone(),
            path_params: HashMap::new(),
            body: Bytes::new(),
            client_ip: client_ip(request.headers(), request.extensions()),
            matched_path: request
                .extensions()
                .get::<MatchedPath>()
                .map(|path| path.as_str().to_string()),
            received_at: Instant::now(),
        }
    }

    /// Get the request path without query parameters
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Get the raw query string
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Get a header value by name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Content type without parameters, lower-cased
    pub fn content_type(&self) -> Option<String> {
        self.header("content-type").map(|value| {
            value
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    /// Look up a path parameter
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// Decode the query string; repeated keys keep every value in order
    pub fn query_params(&self) -> HashMap<String, Vec<String>> {
        self.query().map(parse_urlencoded).unwrap_or_default()
    }
}

/// Parse an `application/x-www-form-urlencoded` string
///
/// Keys without values (`?flag`) map to an empty string and repeated keys collect their values
/// in order. Pairs that fail to decode are dropped.
pub fn parse_urlencoded(input: &str) -> HashMap<String, Vec<String>> {
    let mut params: HashMap<String, Vec<String>> = HashMap::new();

    for pair in input.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        // `+` is a space in form encoding; urlencoding only handles `%XX`
        let key = key.replace('+', " ");
        let value = value.replace('+', " ");
        if let (Ok(decoded_key), Ok(decoded_value)) =
            (urlencoding::decode(&key), urlencoding::decode(&value))
        {
            params
                .entry(decoded_key.into_owned())
                .or_default()
                .push(decoded_value.into_owned());
        }
    }

    params
}

/// Resolve the client address of a request
///
/// Order: first hop of `X-Forwarded-For`, then `X-Real-IP`, then the socket address recorded by
/// `ConnectInfo`, else `"unknown"`.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
