use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::core::types::{client_ip, middleware_fn, BoxMiddleware};
use crate::middleware::request_tracing::{TraceContext, SPAN_ID_HEADER, TRACE_ID_HEADER};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestLoggingConfig {
    pub enabled: bool,
    /// `chrono` format string; RFC 3339 when unset
    pub time_layout: Option<String>,
}

impl Default for RequestLoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            time_layout: None,
        }
    }
}

/// Emits one event per request
pub struct RequestLoggingMiddleware {
    service_name: String,
    time_layout: Option<String>,
}

impl RequestLoggingMiddleware {
    pub fn new(service_name: &str, time_layout: Option<String>) -> Self {
        Self {
            service_name: service_name.to_string(),
            time_layout,
        }
    }

    pub fn format_time(&self, time: &DateTime<Local>) -> String {
        match &self.time_layout {
            Some(layout) => time.format(layout).to_string(),
            None => time.to_rfc3339(),
        }
    }

    pub async fn handle(&self, request: Request, next: Next) -> Response {
        let start_time = Local::now();
        let started = Instant::now();
        let method = request.method().to_string();
        let uri = request.uri().to_string();
        let client_ip = client_ip(request.headers(), request.extensions());
        let inbound_trace = {
            let header = |name: &str| {
                request
                    .headers()
                    .get(name)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string)
            };
            header(TRACE_ID_HEADER).zip(header(SPAN_ID_HEADER))
        };

        let response = next.run(request).await;

        let latency = started.elapsed();
        let end_time = Local::now();
        let (trace_id, span_id) = response
            .extensions()
            .get::<TraceContext>()
            .map(|trace| (trace.trace_id.clone(), trace.span_id.clone()))
            .or(inbound_trace)
            .unwrap_or_default();

        info!(
            service = %self.service_name,
            timestamp = %self.format_time(&end_time),
            start_time = %self.format_time(&start_time),
            end_time = %self.format_time(&end_time),
            client_ip = %client_ip,
            status_code = response.status().as_u16(),
            req_method = %method,
            req_uri = %uri,
            latency_time = ?latency,
            trace_id = %trace_id,
            span_id = %span_id,
            "Request processed"
        );

        response
    }

    pub fn into_middleware(self) -> BoxMiddleware {
        let logger = Arc::new(self);
        middleware_fn(move |request: Request, next: Next| {
            let logger = logger.clone();
            async move { logger.handle(request, next).await }
        })
    }
}
