//! # Rate Limiting
//!
//! Per-client token buckets. A bucket holds at most `capacity` tokens and regains `rate` tokens
//! per second; each request takes one token. Buckets are created lazily on a client's first
//! request and kept for the life of the process.
//!
//! ## Rust Concepts Used
//!
//! - `DashMap` shards the bucket map so concurrent clients rarely contend
//! - `parking_lot::Mutex` guards each bucket; it is never held across an `.await`

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::core::error::RouterError;
use crate::core::types::{middleware_fn, BoxMiddleware, RequestContext};
use crate::routing::dispatch::Responder;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpLimitConfig {
    pub enabled: bool,
    /// Maximum burst per client
    pub capacity: u32,
    /// Tokens regained per second
    pub rate: f64,
}

impl Default for IpLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: 100,
            rate: 10.0,
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A single token bucket
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    rate: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// A full bucket
    pub fn new(capacity: u32, rate: f64) -> Self {
        Self {
            capacity: capacity as f64,
            rate,
            state: Mutex::new(BucketState {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token if available
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    fn allow_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock();
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently available, without refilling
    pub fn tokens(&self) -> f64 {
        self.state.lock().tokens
    }
}

/// Token buckets keyed by client
#[derive(Debug)]
pub struct IpRateLimiter {
    capacity: u32,
    rate: f64,
    buckets: DashMap<String, Arc<TokenBucket>>,
}

impl IpRateLimiter {
    pub fn new(capacity: u32, rate: f64) -> Self {
        Self {
            capacity,
            rate,
            buckets: DashMap::new(),
        }
    }

    pub fn allow(&self, client: &str) -> bool {
        let bucket = self
            .buckets
            .entry(client.to_string())
            .or_insert_with(|| Arc::new(TokenBucket::new(self.capacity, self.rate)))
            .clone();
        bucket.allow()
    }

    /// Number of clients seen so far
    pub fn clients(&self) -> usize {
        self.buckets.len()
    }
}

pub struct RateLimitMiddleware {
    responder: Arc<dyn Responder>,
    limiter: IpRateLimiter,
}

impl RateLimitMiddleware {
    pub fn new(responder: Arc<dyn Responder>, capacity: u32, rate: f64) -> Self {
        Self {
            responder,
            limiter: IpRateLimiter::new(capacity, rate),
        }
    }

    pub fn limiter(&self) -> &IpRateLimiter {
        &self.limiter
    }

    pub async fn handle(&self, request: Request, next: Next) -> Response {
        let ctx = RequestContext::snapshot(&request);
        if self.limiter.allow(&ctx.client_ip) {
            return next.run(request).await;
        }

        debug!(client_ip = %ctx.client_ip, path = %ctx.path(), "Rate limit exceeded");
        self.responder.respond(
            &ctx,
            Err(RouterError::RateLimited {
                client: ctx.client_ip.clone(),
            }),
        )
    }

    pub fn into_middleware(self) -> BoxMiddleware {
        let limiter = Arc::new(self);
        middleware_fn(move |request: Request, next: Next| {
            let limiter = limiter.clone();
            async move { limiter.handle(request, next).await }
        })
    }
}
