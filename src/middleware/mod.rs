//! Bundled middleware.
//!
//! Every middleware here is a [`BoxMiddleware`] and can be installed globally, on a controller
//! group, or on a single method. Those that short-circuit a request answer through the engine's
//! [`Responder`] so blocked requests get the same envelope as handler errors.

pub mod cors;
pub mod interceptor;
pub mod rate_limiting;
pub mod request_logging;
pub mod request_tracing;

pub use cors::{CorsConfig, CorsMiddleware};
pub use interceptor::{InterceptorMiddleware, InterceptorRule};
pub use rate_limiting::{IpLimitConfig, IpRateLimiter, RateLimitMiddleware, TokenBucket};
pub use request_logging::{RequestLoggingConfig, RequestLoggingMiddleware};
pub use request_tracing::{TraceContext, TracingMiddleware, SPAN_ID_HEADER, TRACE_ID_HEADER};

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::config::MiddlewareConfig;
use crate::core::types::BoxMiddleware;
use crate::routing::dispatch::{DefaultResponder, Responder};

/// Factory for the bundled middleware, sharing one responder and service identity
#[derive(Clone)]
pub struct MiddlewareSet {
    responder: Arc<dyn Responder>,
    service_name: String,
    instance_id: String,
    environment: String,
}

impl MiddlewareSet {
    pub fn new(responder: Arc<dyn Responder>, config: &MiddlewareConfig) -> Self {
        Self {
            responder,
            service_name: config.service_name.clone(),
            instance_id: config.instance_id.clone(),
            environment: config.environment.clone(),
        }
    }

    pub fn cors(&self, extra_headers: &BTreeMap<String, String>) -> BoxMiddleware {
        CorsMiddleware::new(self.responder.clone(), extra_headers).into_middleware()
    }

    pub fn interceptor(&self, rules: Vec<InterceptorRule>) -> BoxMiddleware {
        InterceptorMiddleware::new(self.responder.clone(), rules).into_middleware()
    }

    pub fn ip_limit(&self, capacity: u32, rate: f64) -> BoxMiddleware {
        RateLimitMiddleware::new(self.responder.clone(), capacity, rate).into_middleware()
    }

    pub fn tracing(&self) -> BoxMiddleware {
        TracingMiddleware::new(&self.service_name, &self.instance_id, &self.environment).into_middleware()
    }

    pub fn logger(&self, time_layout: Option<String>) -> BoxMiddleware {
        RequestLoggingMiddleware::new(&self.service_name, time_layout).into_middleware()
    }

    /// Global chain for the enabled sections, outermost first
    ///
    /// Tracing wraps logging so the logger sees the trace ids; both wrap the middleware that
    /// may reject a request, so rejections are traced and logged too.
    pub fn from_config(&self, config: &MiddlewareConfig) -> Vec<BoxMiddleware> {
        let mut chain = Vec::new();

        if config.tracing.enabled {
            chain.push(self.tracing());
        }
        if config.request_logging.enabled {
            chain.push(self.logger(config.request_logging.time_layout.clone()));
        }
        if config.cors.enabled {
            chain.push(self.cors(&config.cors.extra_headers));
        }
        if !config.interceptors.is_empty() {
            chain.push(self.interceptor(config.interceptors.clone()));
        }
        if config.ip_limit.enabled {
            chain.push(self.ip_limit(config.ip_limit.capacity, config.ip_limit.rate));
        }

        chain
    }
}

impl Default for MiddlewareSet {
    fn default() -> Self {
        Self::new(Arc::new(DefaultResponder), &MiddlewareConfig::default())
    }
}
