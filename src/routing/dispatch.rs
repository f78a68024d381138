//! # Generic Dispatch Adapter
//!
//! Turns a typed controller method `(Arc<C>, RequestContext, Req) -> Result<Resp, E>` into one
//! type-erased [`BoxHandler`]. The adapter is built once when the route is registered; every
//! request then runs the same bind, validate, call and respond sequence.
//!
//! ## Rust Concepts Used
//!
//! - Trait objects (`Arc<dyn Binder>`, `Arc<dyn Responder>`) for the replaceable collaborators
//! - `serde_json::Value` as the neutral document the binder fills and the request type is
//!   deserialized from
//! - `FutureExt::catch_unwind` to contain a panicking controller method

use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{trace, warn};

use crate::core::error::{RouterError, RouterResult};
use crate::core::types::{parse_urlencoded, BoxHandler, RequestContext};
use crate::reflection::{FieldInfo, Reflect, SKIP_MARKER};

/// Default limit for buffered request bodies (2 MiB)
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Optional self-validation of a bound request
///
/// The default accepts everything; request types override it to reject semantically invalid
/// input.
pub trait Validate {
    fn validate(&self) -> RouterResult<()> {
        Ok(())
    }
}

/// Fills a request document from the live request
pub trait Binder: Send + Sync {
    /// Produce the JSON document the request type is deserialized from
    fn bind(&self, ctx: &RequestContext, fields: &[FieldInfo]) -> RouterResult<Value>;
}

/// Serializes a handler outcome into the response sent to the client
pub trait Responder: Send + Sync {
    fn respond(&self, ctx: &RequestContext, result: RouterResult<Value>) -> Response;
}

/// Binds body, query string, path parameters and headers, in increasing precedence
///
/// - body: JSON, or `application/x-www-form-urlencoded` matched through `form` keys
/// - query: matched through `form` keys
/// - path: matched through `uri` keys; a missing path parameter is an error unless the field is
///   skipped, in which case it keeps its default
/// - headers: matched through `header` names
///
/// String inputs are coerced according to the declared field type. A repeated key fills a
/// sequence field with every value; a scalar field takes the first one.
#[derive(Debug, Clone, Default)]
pub struct DefaultBinder;

impl DefaultBinder {
    pub fn new() -> Self {
        Self
    }

    fn bind_body(&self, ctx: &RequestContext, fields: &[FieldInfo]) -> RouterResult<Map<String, Value>> {
        if ctx.body.is_empty() {
            return Ok(Map::new());
        }

        match ctx.content_type().as_deref() {
            Some("application/x-www-form-urlencoded") => {
                let body = std::str::from_utf8(&ctx.body)
                    .map_err(|e| RouterError::bind(format!("form body is not UTF-8: {}", e)))?;
                let form = parse_urlencoded(body);
                let mut document = Map::new();
                for field in fields.iter().filter(|field| field.tags.is_form_param()) {
                    if let Some(values) = form.get(&field.tags.form_key) {
                        document.insert(document_key(field), coerce(field, values.as_slice())?);
                    }
                }
                Ok(document)
            }
            Some("application/json") | None => {
                match serde_json::from_slice::<Value>(&ctx.body)
                    .map_err(|e| RouterError::bind(format!("invalid JSON body: {}", e)))?
                {
                    Value::Object(document) => Ok(document),
                    other => Err(RouterError::bind(format!(
                        "expected a JSON object body, got {}",
                        json_kind(&other)
                    ))),
                }
            }
            Some(other) => {
                trace!(content_type = other, "Ignoring body with unsupported content type");
                Ok(Map::new())
            }
        }
    }
}

impl Binder for DefaultBinder {
    fn bind(&self, ctx: &RequestContext, fields: &[FieldInfo]) -> RouterResult<Value> {
        let mut document = self.bind_body(ctx, fields)?;

        let query = ctx.query_params();
        for field in fields.iter().filter(|field| field.tags.is_form_param()) {
            if let Some(values) = query.get(&field.tags.form_key) {
                document.insert(document_key(field), coerce(field, values.as_slice())?);
            }
        }

        for field in fields.iter().filter(|field| field.tags.is_path_param()) {
            let raw = ctx.path_param(&field.tags.uri_key).ok_or_else(|| {
                RouterError::bind(format!("missing path parameter '{}'", field.tags.uri_key))
            })?;
            document.insert(document_key(field), coerce(field, &[raw][..])?);
        }

        // skipped uri fields are never part of the route path; bind them only when present
        for field in fields.iter().filter(|field| {
            !field.tags.is_path_param() && !field.tags.uri_key.is_empty() && field.tags.uri_key != SKIP_MARKER
        }) {
            if let Some(raw) = ctx.path_param(&field.tags.uri_key) {
                document.insert(document_key(field), coerce(field, &[raw][..])?);
            }
        }

        for field in fields.iter().filter(|field| field.tags.is_header_param()) {
            let values: Vec<&str> = ctx
                .headers
                .get_all(field.tags.header_key.as_str())
                .iter()
                .filter_map(|value| value.to_str().ok())
                .collect();
            if !values.is_empty() {
                document.insert(document_key(field), coerce(field, &values[..])?);
            }
        }

        Ok(Value::Object(document))
    }
}

/// Key a field occupies in the bound document: its `json` key, else its name
fn document_key(field: &FieldInfo) -> String {
    if field.tags.is_json_field() {
        field.tags.json_key.clone()
    } else {
        field.name.clone()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Convert raw string inputs into the JSON value the declared type expects
///
/// Sequence fields take every value, each also split on commas.
fn coerce<S: AsRef<str>>(field: &FieldInfo, values: &[S]) -> RouterResult<Value> {
    let type_name = field.type_name.as_str();
    if type_name.starts_with("Vec<") {
        let element = field.child_type.as_str();
        return values
            .iter()
            .flat_map(|value| value.as_ref().split(','))
            .filter(|item| !item.is_empty())
            .map(|item| coerce_scalar(&field.name, element, item.trim()))
            .collect::<RouterResult<Vec<_>>>()
            .map(Value::Array);
    }
    let raw = values.first().map(AsRef::as_ref).unwrap_or_default();
    coerce_scalar(&field.name, type_name, raw)
}

fn coerce_scalar(name: &str, type_name: &str, raw: &str) -> RouterResult<Value> {
    let invalid = || RouterError::bind(format!("field '{}' expects {}, got {:?}", name, type_name, raw));

    match type_name {
        "u8" | "u16" | "u32" | "u64" | "u128" | "usize" => raw
            .parse::<u64>()
            .map(|n| Value::Number(n.into()))
            .map_err(|_| invalid()),
        "i8" | "i16" | "i32" | "i64" | "i128" | "isize" => raw
            .parse::<i64>()
            .map(|n| Value::Number(n.into()))
            .map_err(|_| invalid()),
        "f32" | "f64" => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(invalid),
        "bool" => match raw {
            "true" | "1" | "on" => Ok(Value::Bool(true)),
            "false" | "0" | "off" | "" => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
        "String" | "char" => Ok(Value::String(raw.to_string())),
        _ => Ok(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))),
    }
}

/// Uniform response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub code: i32,
    pub msg: String,
    pub data: Value,
    pub error: String,
}

/// Writes every outcome as an [`Envelope`]
///
/// Success is `200` with `code = 0`; an error keeps its own HTTP status with `code = 1`.
#[derive(Debug, Clone, Default)]
pub struct DefaultResponder;

impl DefaultResponder {
    pub fn new() -> Self {
        Self
    }
}

impl Responder for DefaultResponder {
    fn respond(&self, _ctx: &RequestContext, result: RouterResult<Value>) -> Response {
        match result {
            Ok(data) => (
                StatusCode::OK,
                Json(Envelope {
                    code: 0,
                    msg: "success".to_string(),
                    data,
                    error: String::new(),
                }),
            )
                .into_response(),
            Err(err) => (
                err.status_code(),
                Json(Envelope {
                    code: 1,
                    msg: "request error".to_string(),
                    data: Value::Null,
                    error: err.to_string(),
                }),
            )
                .into_response(),
        }
    }
}

/// Shared collaborators every adapter is built with
#[derive(Clone)]
pub struct DispatchContext {
    pub binder: Arc<dyn Binder>,
    pub responder: Arc<dyn Responder>,
    pub body_limit: usize,
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self {
            binder: Arc::new(DefaultBinder),
            responder: Arc::new(DefaultResponder),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

/// Build the per-route handler for a typed controller method
pub fn typed_handler<C, Req, Resp, E, F, Fut>(
    controller: Arc<C>,
    method_name: &str,
    method: F,
    dispatch: &DispatchContext,
) -> BoxHandler
where
    C: Send + Sync + 'static,
    Req: Reflect + DeserializeOwned + Validate + Send + 'static,
    Resp: Reflect + Serialize + Send + 'static,
    E: Into<RouterError> + Send + 'static,
    F: Fn(Arc<C>, RequestContext, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp, E>> + Send + 'static,
{
    let method = Arc::new(method);
    let fields: Arc<[FieldInfo]> = Req::fields().into();
    let method_name: Arc<str> = method_name.into();
    let DispatchContext {
        binder,
        responder,
        body_limit,
    } = dispatch.clone();

    Arc::new(move |request: Request| {
        let controller = controller.clone();
        let method = method.clone();
        let fields = fields.clone();
        let method_name = method_name.clone();
        let binder = binder.clone();
        let responder = responder.clone();

        async move {
            let (parts, body) = request.into_parts();
            let body = axum::body::to_bytes(body, body_limit).await;
            let ctx = RequestContext::from_parts(parts, body.as_ref().cloned().unwrap_or_default()).await;
            if let Err(e) = body {
                let err = RouterError::bind(format!("failed to read request body: {}", e));
                return fail(&*responder, &ctx, &method_name, err);
            }

            let request = match binder
                .bind(&ctx, &fields)
                .and_then(|document| {
                    serde_json::from_value::<Req>(document).map_err(|e| RouterError::bind(e.to_string()))
                }) {
                Ok(request) => request,
                Err(err) => return fail(&*responder, &ctx, &method_name, err),
            };

            if let Err(err) = request.validate() {
                return fail(&*responder, &ctx, &method_name, err);
            }

            let call_ctx = ctx.clone();
            let outcome = AssertUnwindSafe(async move { (*method)(controller, call_ctx, request).await })
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(response)) => match serde_json::to_value(&response) {
                    Ok(data) => responder.respond(&ctx, Ok(data)),
                    Err(e) => fail(&*responder, &ctx, &method_name, e.into()),
                },
                Ok(Err(err)) => fail(&*responder, &ctx, &method_name, err.into()),
                Err(_) => {
                    warn!(method = %method_name, path = %ctx.path(), "Controller method panicked");
                    responder.respond(&ctx, Err(RouterError::Unknown))
                }
            }
        }
        .boxed()
    })
}

fn fail(responder: &dyn Responder, ctx: &RequestContext, method_name: &str, err: RouterError) -> Response {
    warn!(
        method = %method_name,
        path = %ctx.path(),
        error_type = err.error_type(),
        error = %err,
        "Request failed"
    );
    responder.respond(ctx, Err(err))
}
