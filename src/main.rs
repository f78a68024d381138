//! # ctrl-router demo server
//!
//! Mounts a small in-memory article API to show how routes are derived from controllers:
//!
//! - `Api` (group `/api`) holds typed callbacks such as `GetDetail` → `GET /api/detail/:id`
//! - `Api.Images` is a named field, so its methods live under `/api/images`
//! - `Api.Audit` is embedded, so its methods are promoted into `/api`
//!
//! Configuration is read from `CTRL_ROUTER_CONFIG_PATH` when set, otherwise defaults plus
//! `CTRL_ROUTER_*` environment overrides are used.

use anyhow::Context;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use ctrl_router::core::types::{handler_fn, middleware_fn};
use ctrl_router::observability::init_logging;
use ctrl_router::routing::MethodMiddlewares;
use ctrl_router::{
    BoxMiddleware, Controller, Engine, EngineConfig, FieldInfo, Lifecycle, MethodSet, Reflect, RequestContext,
    RouterError, RouterResult, TypeShape, Validate,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Article {
    id: u32,
    title: String,
    body: String,
    tags: Vec<String>,
}

impl Reflect for Article {
    fn type_name() -> String {
        "Article".to_string()
    }

    fn shape() -> TypeShape {
        TypeShape::Struct
    }

    fn fields() -> Vec<FieldInfo> {
        vec![
            FieldInfo::of::<u32>("id").json("id"),
            FieldInfo::of::<String>("title").json("title").desc("Headline"),
            FieldInfo::of::<String>("body").json("body"),
            FieldInfo::of::<Vec<String>>("tags").json("tags"),
        ]
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ArticleIdReq {
    id: u32,
}

impl Reflect for ArticleIdReq {
    fn type_name() -> String {
        "ArticleIdReq".to_string()
    }

    fn shape() -> TypeShape {
        TypeShape::Struct
    }

    fn fields() -> Vec<FieldInfo> {
        vec![FieldInfo::of::<u32>("id").uri("id")]
    }
}

impl Validate for ArticleIdReq {}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListReq {
    page: u32,
    size: u32,
    keyword: String,
}

impl Reflect for ListReq {
    fn type_name() -> String {
        "ListReq".to_string()
    }

    fn shape() -> TypeShape {
        TypeShape::Struct
    }

    fn fields() -> Vec<FieldInfo> {
        vec![
            FieldInfo::of::<u32>("page").form("page"),
            FieldInfo::of::<u32>("size").form("size"),
            FieldInfo::of::<String>("keyword").form("keyword"),
        ]
    }
}

impl Validate for ListReq {
    fn validate(&self) -> RouterResult<()> {
        if self.size > 100 {
            return Err(RouterError::validation("size must not exceed 100"));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Serialize)]
struct ListResp {
    total: usize,
    items: Vec<Article>,
}

impl Reflect for ListResp {
    fn type_name() -> String {
        "ListResp".to_string()
    }

    fn shape() -> TypeShape {
        TypeShape::Struct
    }

    fn fields() -> Vec<FieldInfo> {
        vec![
            FieldInfo::of::<usize>("total").json("total"),
            FieldInfo::of::<Vec<Article>>("items").json("items"),
        ]
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CreateReq {
    title: String,
    body: String,
    tags: Vec<String>,
}

impl Reflect for CreateReq {
    fn type_name() -> String {
        "CreateReq".to_string()
    }

    fn shape() -> TypeShape {
        TypeShape::Struct
    }

    fn fields() -> Vec<FieldInfo> {
        vec![
            FieldInfo::of::<String>("title").json("title"),
            FieldInfo::of::<String>("body").json("body"),
            FieldInfo::of::<Vec<String>>("tags").json("tags"),
        ]
    }
}

impl Validate for CreateReq {
    fn validate(&self) -> RouterResult<()> {
        if self.title.trim().is_empty() {
            return Err(RouterError::validation("title is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UpdateReq {
    id: u32,
    title: String,
    body: String,
    tags: Vec<String>,
}

impl Reflect for UpdateReq {
    fn type_name() -> String {
        "UpdateReq".to_string()
    }

    fn shape() -> TypeShape {
        TypeShape::Struct
    }

    fn fields() -> Vec<FieldInfo> {
        vec![
            FieldInfo::of::<u32>("id").uri("id"),
            FieldInfo::of::<String>("title").json("title"),
            FieldInfo::of::<String>("body").json("body"),
            FieldInfo::of::<Vec<String>>("tags").json("tags"),
        ]
    }
}

impl Validate for UpdateReq {
    fn validate(&self) -> RouterResult<()> {
        if self.title.trim().is_empty() {
            return Err(RouterError::validation("title is required"));
        }
        Ok(())
    }
}

/// In-memory article storage
#[derive(Default)]
struct ArticleStore {
    next_id: AtomicU32,
    articles: RwLock<BTreeMap<u32, Article>>,
}

impl ArticleStore {
    fn get(&self, id: u32) -> RouterResult<Article> {
        self.articles
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| RouterError::not_found(format!("article {} not found", id)))
    }
}

/// Promoted into `Api`: its routes are registered under `/api`
#[derive(Default)]
struct Audit {
    requests: Arc<AtomicU32>,
}

impl Controller for Audit {
    fn type_name(&self) -> String {
        "Audit".to_string()
    }

    fn register(self: Arc<Self>, methods: &mut MethodSet) {
        methods.handler(&self, "GetStats", |audit| {
            let requests = audit.requests.clone();
            handler_fn(move |_req| {
                let requests = requests.clone();
                async move { axum::Json(serde_json::json!({ "requests": requests.load(Ordering::Relaxed) })) }
            })
        });
    }

    fn middlewares(&self) -> Option<Vec<BoxMiddleware>> {
        let requests = self.requests.clone();
        Some(vec![middleware_fn(move |request, next: axum::middleware::Next| {
            requests.fetch_add(1, Ordering::Relaxed);
            next.run(request)
        })])
    }
}

/// Nested group `/api/images`
#[derive(Default)]
struct Images;

impl Controller for Images {
    fn type_name(&self) -> String {
        "Images".to_string()
    }

    fn register(self: Arc<Self>, methods: &mut MethodSet) {
        methods.handler(&self, "GetFormats", |_| {
            handler_fn(|_req| async { axum::Json(vec!["png", "jpeg", "webp"]) })
        });
    }
}

#[derive(Default)]
struct Api {
    store: ArticleStore,
    images: Option<Arc<Images>>,
    audit: Option<Arc<Audit>>,
}

impl Api {
    fn new() -> Self {
        Self {
            store: ArticleStore::default(),
            images: Some(Arc::new(Images)),
            audit: Some(Arc::new(Audit::default())),
        }
    }

    async fn get_detail(self: Arc<Self>, _ctx: RequestContext, req: ArticleIdReq) -> RouterResult<Article> {
        self.store.get(req.id)
    }

    async fn get_list(self: Arc<Self>, _ctx: RequestContext, req: ListReq) -> RouterResult<ListResp> {
        let size = if req.size == 0 { 10 } else { req.size as usize };
        let page = req.page.max(1) as usize;
        let articles = self.store.articles.read();
        let matching: Vec<Article> = articles
            .values()
            .filter(|article| req.keyword.is_empty() || article.title.contains(&req.keyword))
            .cloned()
            .collect();

        Ok(ListResp {
            total: matching.len(),
            items: matching.into_iter().skip((page - 1) * size).take(size).collect(),
        })
    }

    async fn post_create(self: Arc<Self>, ctx: RequestContext, req: CreateReq) -> RouterResult<Article> {
        let id = self.store.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let article = Article {
            id,
            title: req.title,
            body: req.body,
            tags: req.tags,
        };
        debug!(id, client_ip = %ctx.client_ip, "Article created");
        self.store.articles.write().insert(id, article.clone());
        Ok(article)
    }

    async fn put_update(self: Arc<Self>, _ctx: RequestContext, req: UpdateReq) -> RouterResult<Article> {
        let mut articles = self.store.articles.write();
        let article = articles
            .get_mut(&req.id)
            .ok_or_else(|| RouterError::not_found(format!("article {} not found", req.id)))?;
        article.title = req.title;
        article.body = req.body;
        article.tags = req.tags;
        Ok(article.clone())
    }

    async fn delete_info(self: Arc<Self>, _ctx: RequestContext, req: ArticleIdReq) -> RouterResult<Article> {
        self.store
            .articles
            .write()
            .remove(&req.id)
            .ok_or_else(|| RouterError::not_found(format!("article {} not found", req.id)))
    }
}

impl Controller for Api {
    fn type_name(&self) -> String {
        "Api".to_string()
    }

    fn register(self: Arc<Self>, methods: &mut MethodSet) {
        methods.typed(&self, "GetDetail", Api::get_detail);
        methods.typed(&self, "GetList", Api::get_list);
        methods.typed(&self, "PostCreate", Api::post_create);
        methods.typed(&self, "PutUpdate", Api::put_update);
        methods.typed(&self, "DeleteInfo", Api::delete_info);
        methods.named("Images", self.images.clone());
        methods.embedded("Audit", self.audit.clone());
    }

    fn method_middlewares(&self) -> Option<MethodMiddlewares> {
        let require_json = middleware_fn(|request: axum::extract::Request, next: axum::middleware::Next| async move {
            let is_json = request
                .headers()
                .get(axum::http::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(|value| value.starts_with("application/json"))
                .unwrap_or(false);
            if !is_json {
                return axum::response::IntoResponse::into_response((
                    axum::http::StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    "expected application/json",
                ));
            }
            next.run(request).await
        });

        let mut map = HashMap::new();
        map.insert("PostCreate".to_string(), vec![require_json.clone()]);
        map.insert("PutUpdate".to_string(), vec![require_json]);
        Some(map)
    }
}

async fn load_config() -> anyhow::Result<EngineConfig> {
    match std::env::var("CTRL_ROUTER_CONFIG_PATH") {
        Ok(path) => EngineConfig::load(&path)
            .await
            .with_context(|| format!("failed to load configuration from {}", path)),
        Err(_) => {
            let mut config = EngineConfig::default();
            config.apply_env_overrides()?;
            config.validate()?;
            Ok(config)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().await?;
    init_logging(&config.logging);

    info!("Starting ctrl-router demo");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let engine = Engine::builder()
        .config(config)
        .controller(Api::new())
        .build()
        .context("failed to build route tree")?;

    for route in engine.routes() {
        info!(verb = %route.verb, path = %route.path, method = %route.method_name, "Route");
    }

    Lifecycle::new().with_server(Arc::new(engine)).run().await?;

    info!("ctrl-router shutdown complete");
    Ok(())
}
