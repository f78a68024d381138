//! End-to-end tests: controllers in, routed HTTP behaviour and API metadata out.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum_test::TestServer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ctrl_router::core::types::{handler_fn, middleware_fn};
use ctrl_router::routing::MethodMiddlewares;
use ctrl_router::{
    BoxMiddleware, Controller, Engine, FieldInfo, MethodSet, Reflect, RequestContext, RouterError, RouterResult,
    TypeShape, Validate, Verb,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiDetailReq {
    id: u32,
}

impl Reflect for ApiDetailReq {
    fn type_name() -> String {
        "ApiDetailReq".to_string()
    }

    fn shape() -> TypeShape {
        TypeShape::Struct
    }

    fn fields() -> Vec<FieldInfo> {
        vec![FieldInfo::of::<u32>("id").uri("id")]
    }
}

impl Validate for ApiDetailReq {}

#[derive(Debug, Default, Serialize)]
struct ApiDetailResp {
    id: u32,
    name: String,
}

impl Reflect for ApiDetailResp {
    fn type_name() -> String {
        "ApiDetailResp".to_string()
    }

    fn shape() -> TypeShape {
        TypeShape::Struct
    }

    fn fields() -> Vec<FieldInfo> {
        vec![
            FieldInfo::of::<u32>("id").json("id"),
            FieldInfo::of::<String>("name").json("name"),
        ]
    }
}

/// A uri-tagged field that is excluded from path derivation
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SkippedIdReq {
    id: u32,
    name: String,
}

impl Reflect for SkippedIdReq {
    fn type_name() -> String {
        "SkippedIdReq".to_string()
    }

    fn shape() -> TypeShape {
        TypeShape::Struct
    }

    fn fields() -> Vec<FieldInfo> {
        vec![
            FieldInfo::of::<u32>("id").uri("id").skip(),
            FieldInfo::of::<String>("name").json("name"),
        ]
    }
}

impl Validate for SkippedIdReq {}

#[derive(Default)]
struct Api {
    calls: AtomicUsize,
}

impl Api {
    async fn get_detail(self: Arc<Self>, _ctx: RequestContext, req: ApiDetailReq) -> RouterResult<ApiDetailResp> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if req.id == 0 {
            return Err(RouterError::not_found("no such record"));
        }
        Ok(ApiDetailResp {
            id: req.id,
            name: format!("record-{}", req.id),
        })
    }

    async fn post_create(self: Arc<Self>, _ctx: RequestContext, req: SkippedIdReq) -> RouterResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(req.name)
    }
}

impl Controller for Api {
    fn type_name(&self) -> String {
        "Api".to_string()
    }

    fn register(self: Arc<Self>, methods: &mut MethodSet) {
        methods.typed(&self, "GetDetail", Api::get_detail);
        methods.typed(&self, "PostCreate", Api::post_create);
    }
}

fn text(body: &'static str) -> ctrl_router::BoxHandler {
    handler_fn(move |_req| async move { body })
}

fn tag(label: &'static str) -> BoxMiddleware {
    middleware_fn(move |request: Request, next: Next| async move {
        let mut response = next.run(request).await;
        let order = response
            .headers()
            .get("x-order")
            .and_then(|value| value.to_str().ok())
            .map(|value| format!("{},{}", label, value))
            .unwrap_or_else(|| label.to_string());
        if let Ok(value) = HeaderValue::from_str(&order) {
            response.headers_mut().insert("x-order", value);
        }
        response
    })
}

/// Controller with a fixed type name and raw-handler methods, for tree-shape tests
struct Node {
    name: &'static str,
    methods: Vec<&'static str>,
    named: Vec<(&'static str, Arc<Node>)>,
    embedded: Vec<(&'static str, Arc<Node>)>,
    base_path: Option<&'static str>,
}

impl Node {
    fn new(name: &'static str, methods: &[&'static str]) -> Self {
        Self {
            name,
            methods: methods.to_vec(),
            named: Vec::new(),
            embedded: Vec::new(),
            base_path: None,
        }
    }

    fn named(mut self, field: &'static str, node: Node) -> Self {
        self.named.push((field, Arc::new(node)));
        self
    }

    fn embedded(mut self, field: &'static str, node: Node) -> Self {
        self.embedded.push((field, Arc::new(node)));
        self
    }
}

impl Controller for Node {
    fn type_name(&self) -> String {
        self.name.to_string()
    }

    fn register(self: Arc<Self>, methods: &mut MethodSet) {
        for method in &self.methods {
            methods.handler(&self, method, move |node| {
                let label: &'static str = node.name;
                text(label)
            });
        }
        for (field, node) in &self.named {
            methods.named(field, Some(node.clone()));
        }
        for (field, node) in &self.embedded {
            methods.embedded(field, Some(node.clone()));
        }
    }

    fn base_path(&self) -> Option<String> {
        self.base_path.map(str::to_string)
    }
}

fn paths(engine: &Engine) -> Vec<(Verb, String)> {
    engine
        .routes()
        .iter()
        .map(|route| (route.verb, route.path.clone()))
        .collect()
}

#[tokio::test]
async fn test_typed_route_serves_envelope() {
    let engine = Engine::builder().controller(Api::default()).build().unwrap();
    let server = TestServer::new(engine.router()).unwrap();

    let response = server.get("/api/detail/10").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["code"], 0);
    assert_eq!(body["msg"], "success");
    assert_eq!(body["data"]["id"], 10);
    assert_eq!(body["data"]["name"], "record-10");

    let response = server.get("/api/detail/0").await;
    assert_eq!(response.status_code(), 404);
    let body: Value = response.json();
    assert_eq!(body["code"], 1);
    assert_eq!(body["msg"], "request error");
    assert_eq!(body["error"], "no such record");

    assert_eq!(server.get("/api/detail").await.status_code(), 404);
}

#[tokio::test]
async fn test_malformed_path_parameter_fails_binding() {
    let api = Arc::new(Api::default());
    let engine = Engine::builder().controller_arc(api.clone()).build().unwrap();
    let server = TestServer::new(engine.router()).unwrap();

    let response = server.get("/api/detail/abc").await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["code"], 1);
    assert_eq!(body["msg"], "request error");
    assert_eq!(api.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_skipped_path_parameter_keeps_route_reachable() {
    let api = Arc::new(Api::default());
    let engine = Engine::builder().controller_arc(api.clone()).build().unwrap();

    // the skipped field does not extend the path
    assert!(engine.api_routes().contains_key("/api/create"));
    assert!(engine.api_routes().contains_key("/api/detail/:id"));

    let server = TestServer::new(engine.router()).unwrap();
    let response = server.post("/api/create").json(&serde_json::json!({"name": "x"})).await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"], "x");
    assert_eq!(api.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_named_and_embedded_fields() {
    let tree = Node::new("Outer", &["GetInfo"])
        .named("Images", Node::new("Images", &["GetFiles"]))
        .embedded("Shared", Node::new("Shared", &["GetShared"]));
    let engine = Engine::builder().controller(tree).build().unwrap();

    assert_eq!(
        paths(&engine),
        vec![
            (Verb::Get, "/outer/images/files".to_string()),
            (Verb::Get, "/outer/info".to_string()),
            (Verb::Get, "/outer/shared".to_string()),
        ]
    );

    let server = TestServer::new(engine.router()).unwrap();
    assert_eq!(server.get("/outer/shared").await.text(), "Shared");
    assert_eq!(server.get("/outer/images/files").await.text(), "Images");
    assert_eq!(server.get("/outer/shared/shared").await.status_code(), 404);
}

#[test]
fn test_own_method_shadows_promoted_method() {
    let tree = Node::new("Outer", &["GetShared"]).embedded("Shared", Node::new("Shared", &["GetShared"]));
    let engine = Engine::builder().controller(tree).build().unwrap();
    assert_eq!(paths(&engine), vec![(Verb::Get, "/outer/shared".to_string())]);
}

#[test]
fn test_visibility_follows_name_case() {
    let tree = Node::new("Outer", &["GetInfo", "getSecret"])
        .named("Hidden", Node::new("hidden", &["GetAnything"]))
        .named("secret", Node::new("Secret", &["GetAnything"]));
    let engine = Engine::builder().controller(tree).build().unwrap();
    assert_eq!(paths(&engine), vec![(Verb::Get, "/outer/info".to_string())]);

    let result = Engine::builder().controller(Node::new("outer", &["GetInfo"])).build();
    assert!(matches!(result, Err(RouterError::Configuration { .. })));
}

#[test]
fn test_methods_without_prefix_are_not_routes() {
    let engine = Engine::builder()
        .controller(Node::new("Tools", &["Ping", "GetInfo"]))
        .build()
        .unwrap();
    assert_eq!(paths(&engine), vec![(Verb::Get, "/tools/info".to_string())]);

    let engine = Engine::builder()
        .default_verb(Some(Verb::Post))
        .controller(Node::new("Tools", &["Ping", "GetInfo"]))
        .build()
        .unwrap();
    assert_eq!(
        paths(&engine),
        vec![
            (Verb::Get, "/tools/info".to_string()),
            (Verb::Post, "/tools/ping".to_string()),
        ]
    );
}

#[test]
fn test_method_named_like_prefix() {
    let engine = Engine::builder()
        .controller(Node::new("Health", &["Get"]))
        .build()
        .unwrap();
    assert_eq!(paths(&engine), vec![(Verb::Get, "/health/get".to_string())]);
}

#[test]
fn test_builds_are_idempotent() {
    let first = Engine::builder().controller(Api::default()).build().unwrap();
    let second = Engine::builder().controller(Api::default()).build().unwrap();
    assert_eq!(first.api_routes(), second.api_routes());
    assert_eq!(first.routes(), second.routes());
    assert_eq!(first.openapi(), second.openapi());
}

#[test]
fn test_duplicate_routes_fail_the_build() {
    let result = Engine::builder()
        .controller(Api::default())
        .controller(Api::default())
        .build();
    let err = result.unwrap_err();
    assert!(matches!(err, RouterError::Configuration { .. }));
    assert!(err.to_string().contains("duplicate route"));
}

#[test]
fn test_non_struct_controller_fails_the_build() {
    struct Tuple;

    impl Controller for Tuple {
        fn type_name(&self) -> String {
            "Tuple".to_string()
        }

        fn shape(&self) -> TypeShape {
            TypeShape::Scalar
        }

        fn register(self: Arc<Self>, _methods: &mut MethodSet) {}
    }

    let result = Engine::builder().controller(Tuple).build();
    assert!(matches!(result, Err(RouterError::Configuration { .. })));
}

#[test]
fn test_base_paths() {
    let mut custom = Node::new("Users", &["GetList"]);
    custom.base_path = Some("/accounts");
    let engine = Engine::builder()
        .base_path("/v1")
        .controller(custom)
        .controller(Node::new("Orders", &["DeleteItem"]))
        .build()
        .unwrap();

    assert_eq!(
        paths(&engine),
        vec![
            (Verb::Get, "/v1/accounts/list".to_string()),
            (Verb::Delete, "/v1/orders/item".to_string()),
        ]
    );
}

#[test]
fn test_custom_naming_rule() {
    let engine = Engine::builder()
        .naming_rule(|name| name.to_lowercase() + "s")
        .controller(Node::new("Order", &["GetItem"]))
        .build()
        .unwrap();
    assert_eq!(paths(&engine), vec![(Verb::Get, "/orders/items".to_string())]);
}

struct Guarded;

impl Controller for Guarded {
    fn type_name(&self) -> String {
        "Guarded".to_string()
    }

    fn register(self: Arc<Self>, methods: &mut MethodSet) {
        methods.handler(&self, "GetOpen", |_| text("open"));
        methods.handler(&self, "GetClosed", |_| text("closed"));
    }

    fn middlewares(&self) -> Option<Vec<BoxMiddleware>> {
        Some(vec![tag("group")])
    }

    fn method_middlewares(&self) -> Option<MethodMiddlewares> {
        let mut map = HashMap::new();
        map.insert("GetClosed".to_string(), vec![tag("method")]);
        Some(map)
    }
}

#[tokio::test]
async fn test_middleware_layers_run_in_order() {
    let engine = Engine::builder()
        .middleware(tag("global"))
        .controller(Guarded)
        .build()
        .unwrap();
    let server = TestServer::new(engine.router()).unwrap();

    let response = server.get("/guarded/closed").await;
    assert_eq!(response.text(), "closed");
    assert_eq!(response.header("x-order"), "global,group,method");

    let response = server.get("/guarded/open").await;
    assert_eq!(response.header("x-order"), "global,group");
}

#[tokio::test]
async fn test_capabilities_are_promoted_from_embedded_fields() {
    struct Outer {
        inner: Arc<Guarded>,
    }

    impl Controller for Outer {
        fn type_name(&self) -> String {
            "Outer".to_string()
        }

        fn register(self: Arc<Self>, methods: &mut MethodSet) {
            methods.embedded("Guarded", Some(self.inner.clone()));
        }
    }

    let engine = Engine::builder()
        .controller(Outer {
            inner: Arc::new(Guarded),
        })
        .build()
        .unwrap();
    let server = TestServer::new(engine.router()).unwrap();

    let response = server.get("/outer/closed").await;
    assert_eq!(response.text(), "closed");
    assert_eq!(response.header("x-order"), "group,method");
}
