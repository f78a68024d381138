//! Per-request trace span with trace and span ids propagated through headers.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use tracing::{field, info_span, Instrument};
use uuid::Uuid;

use crate::core::types::{middleware_fn, BoxMiddleware};

pub const TRACE_ID_HEADER: &str = "trace_id";
pub const SPAN_ID_HEADER: &str = "span_id";

/// Ids assigned by the tracing middleware
///
/// Stored in the request extensions for handlers and in the response extensions for outer
/// middleware such as the request logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
}

impl TraceContext {
    /// Reuse `trace_id` when the caller supplied one
    pub fn new(trace_id: Option<&str>) -> Self {
        let trace_id = trace_id
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        let span_id = Uuid::new_v4().simple().to_string()[..16].to_string();
        Self { trace_id, span_id }
    }
}

pub struct TracingMiddleware {
    service_name: String,
    instance_id: String,
    environment: String,
}

impl TracingMiddleware {
    pub fn new(service_name: &str, instance_id: &str, environment: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            instance_id: instance_id.to_string(),
            environment: environment.to_string(),
        }
    }

    pub async fn handle(&self, mut request: Request, next: Next) -> Response {
        let route = request
            .extensions()
            .get::<axum::extract::MatchedPath>()
            .map(|path| path.as_str().to_string())
            .unwrap_or_else(|| format!("HTTP {} route not found", request.method()));

        let inbound = request
            .headers()
            .get(TRACE_ID_HEADER)
            .and_then(|value| value.to_str().ok());
        let trace = TraceContext::new(inbound);

        let span = info_span!(
            "http_request",
            route = %route,
            service = %self.service_name,
            instance = %self.instance_id,
            env = %self.environment,
            method = %request.method(),
            trace_id = %trace.trace_id,
            span_id = %trace.span_id,
            status = field::Empty,
        );

        if let Ok(value) = HeaderValue::from_str(&trace.trace_id) {
            request.headers_mut().insert(TRACE_ID_HEADER, value);
        }
        if let Ok(value) = HeaderValue::from_str(&trace.span_id) {
            request.headers_mut().insert(SPAN_ID_HEADER, value);
        }
        request.extensions_mut().insert(trace.clone());

        let mut response = next.run(request).instrument(span.clone()).await;

        span.record("status", response.status().as_u16());
        let trace_header = HeaderValue::from_str(&trace.trace_id)
            .unwrap_or_else(|_| HeaderValue::from_static("not-trace"));
        response.headers_mut().insert(TRACE_ID_HEADER, trace_header);
        response.extensions_mut().insert(trace);
        response
    }

    pub fn into_middleware(self) -> BoxMiddleware {
        let tracer = Arc::new(self);
        middleware_fn(move |request: Request, next: Next| {
            let tracer = tracer.clone();
            async move { tracer.handle(request, next).await }
        })
    }
}
