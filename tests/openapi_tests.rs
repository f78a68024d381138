//! Document generation from a built engine.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tempfile::TempDir;

use ctrl_router::openapi::OpenApiDocument;
use ctrl_router::{
    Controller, Engine, EngineConfig, FieldInfo, MethodSet, Reflect, RequestContext, RouterResult, TypeShape,
    Validate,
};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Tag {
    name: String,
}

impl Reflect for Tag {
    fn type_name() -> String {
        "Tag".to_string()
    }

    fn shape() -> TypeShape {
        TypeShape::Struct
    }

    fn fields() -> Vec<FieldInfo> {
        vec![FieldInfo::of::<String>("name").json("name")]
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UpdateReq {
    id: u64,
    dry_run: bool,
    title: String,
    tags: Vec<Tag>,
    internal: String,
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
            FieldInfo::of::<u64>("id").uri("id"),
            FieldInfo::of::<bool>("dry_run").form("dryRun"),
            FieldInfo::of::<String>("title").json("title").desc("New title"),
            FieldInfo::of::<Vec<Tag>>("tags").json("tags"),
            FieldInfo::of::<String>("internal").json("-"),
        ]
    }
}

impl Validate for UpdateReq {}

#[derive(Debug, Default, Serialize)]
struct UpdateResp {
    updated: bool,
    score: f64,
}

impl Reflect for UpdateResp {
    fn type_name() -> String {
        "UpdateResp".to_string()
    }

    fn shape() -> TypeShape {
        TypeShape::Struct
    }

    fn fields() -> Vec<FieldInfo> {
        vec![
            FieldInfo::of::<bool>("updated").json("updated"),
            FieldInfo::of::<f64>("score").json("score"),
        ]
    }
}

struct Articles;

impl Articles {
    async fn put_info(self: Arc<Self>, _ctx: RequestContext, _req: UpdateReq) -> RouterResult<UpdateResp> {
        Ok(UpdateResp {
            updated: true,
            score: 1.0,
        })
    }

    async fn get_info(self: Arc<Self>, _ctx: RequestContext, _req: UpdateReq) -> RouterResult<UpdateResp> {
        Ok(UpdateResp::default())
    }
}

impl Controller for Articles {
    fn type_name(&self) -> String {
        "Articles".to_string()
    }

    fn register(self: Arc<Self>, methods: &mut MethodSet) {
        methods.typed(&self, "PutInfo", Articles::put_info);
        methods.typed(&self, "GetInfo", Articles::get_info);
        methods.handler(&self, "GetRaw", |_| {
            ctrl_router::core::types::handler_fn(|_req| async { "raw" })
        });
    }
}

fn engine(config: EngineConfig) -> Engine {
    Engine::builder()
        .config(config)
        .title("articles")
        .version("1.2.0")
        .controller(Articles)
        .build()
        .unwrap()
}

#[test]
fn test_document_describes_typed_routes() {
    let engine = engine(EngineConfig::default());
    let document = engine.openapi();

    assert_eq!(document.openapi, "3.0.3");
    assert_eq!(document.info.title, "articles");
    assert_eq!(document.info.version, "1.2.0");

    // raw handlers carry no metadata
    assert_eq!(document.paths.len(), 1);
    let operations = &document.paths["/articles/info/{id}"];
    assert_eq!(operations.keys().collect::<Vec<_>>(), vec!["get", "put"]);

    let put = &operations["put"];
    assert_eq!(put.operation_id, "PutInfo");

    let id = put.parameters.iter().find(|p| p.name == "id").unwrap();
    assert_eq!(id.location, "path");
    assert!(id.required);
    assert_eq!(id.schema.schema_type, "integer");

    let dry_run = put.parameters.iter().find(|p| p.name == "dryRun").unwrap();
    assert_eq!(dry_run.location, "query");
    assert!(!dry_run.required);
    assert_eq!(dry_run.schema.schema_type, "boolean");

    let body = &put.request_body.as_ref().unwrap().content["application/json"].schema;
    assert_eq!(body.title, "UpdateReq");
    assert_eq!(body.properties.keys().collect::<Vec<_>>(), vec!["tags", "title"]);
    assert_eq!(body.properties["title"].description, "New title");
    assert_eq!(body.properties["tags"].schema_type, "array");
    let items = body.properties["tags"].items.as_ref().unwrap();
    assert!(items.properties.contains_key("name"));

    let response = &put.responses["200"].content["application/json"].schema;
    assert_eq!(response.schema_type, "object");
    assert_eq!(response.title, "UpdateResp");
    assert_eq!(response.properties["score"].schema_type, "number");
}

#[test]
fn test_document_is_written_when_enabled() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("openapi.yaml");

    let mut config = EngineConfig::default();
    config.openapi.enabled = true;
    config.openapi.output_path = output.clone();
    let engine = engine(config);

    let yaml = std::fs::read_to_string(&output).unwrap();
    assert!(yaml.contains("operationId: PutInfo"));
    let parsed: OpenApiDocument = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(&parsed, engine.openapi());
}

#[test]
fn test_document_is_not_written_when_disabled() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("openapi.yaml");

    let mut config = EngineConfig::default();
    config.openapi.output_path = output.clone();
    engine(config);

    assert!(!output.exists());
}

#[test]
fn test_unwritable_output_fails_the_build() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = EngineConfig::default();
    config.openapi.enabled = true;
    config.openapi.output_path = temp_dir.path().join("missing").join("openapi.yaml");

    let result = Engine::builder().config(config).controller(Articles).build();
    assert!(result.is_err());
}
