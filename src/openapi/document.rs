//! OpenAPI 3.0.3 document model, derived from the [`ApiRegistry`] and written as YAML.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::core::error::RouterResult;
use crate::openapi::registry::{ApiRegistry, ApiRouteRecord};
use crate::reflection::FieldDescriptor;

pub const OPENAPI_VERSION: &str = "3.0.3";

/// Default output file for the generated document
pub const DEFAULT_OUTPUT_PATH: &str = "openapi-tmp.yaml";

const JSON_CONTENT: &str = "application/json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Info {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaInfo {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub schema_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub format: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, SchemaInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaInfo>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: SchemaInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub content: BTreeMap<String, MediaType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    pub content: BTreeMap<String, MediaType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: String,
    #[serde(default)]
    pub required: bool,
    pub schema: SchemaInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "operationId")]
    pub operation_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub responses: BTreeMap<String, ApiResponse>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(rename = "requestBody", default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
}

/// The generated document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenApiDocument {
    pub openapi: String,
    pub info: Info,
    /// Path to lower-case verb to operation
    pub paths: BTreeMap<String, BTreeMap<String, Operation>>,
}

impl OpenApiDocument {
    /// Convert the collected route metadata into a document
    pub fn from_registry(registry: &ApiRegistry, title: &str, version: &str) -> Self {
        let paths = registry
            .routes()
            .iter()
            .map(|(path, records)| {
                let operations = records
                    .iter()
                    .map(|record| (record.verb.clone(), operation(record)))
                    .collect();
                (openapi_path(path), operations)
            })
            .collect();

        Self {
            openapi: OPENAPI_VERSION.to_string(),
            info: Info {
                title: title.to_string(),
                version: version.to_string(),
            },
            paths,
        }
    }

    pub fn to_yaml(&self) -> RouterResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write the document as YAML
    pub fn write_yaml(&self, path: impl AsRef<Path>) -> RouterResult<()> {
        let yaml = self.to_yaml()?;
        std::fs::write(path.as_ref(), yaml)?;
        info!(
            path = %path.as_ref().display(),
            paths = self.paths.len(),
            "Wrote OpenAPI document"
        );
        Ok(())
    }
}

/// `/api/detail/:id` -> `/api/detail/{id}`
pub fn openapi_path(path: &str) -> String {
    path.split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => format!("{{{}}}", name),
            None => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Map a declared type name to a JSON schema type
pub fn schema_type(type_name: &str) -> &'static str {
    match type_name {
        "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64" | "u128"
        | "usize" => "integer",
        "f32" | "f64" => "number",
        "bool" => "boolean",
        "String" | "char" | "&str" => "string",
        name if name.starts_with("Vec<") || name.starts_with('[') => "array",
        _ => "object",
    }
}

fn operation(record: &ApiRouteRecord) -> Operation {
    let mut responses = BTreeMap::new();
    responses.insert(
        "200".to_string(),
        ApiResponse {
            description: "success".to_string(),
            content: json_content(&record.response.name, &record.response.fields),
        },
    );

    let request_properties = properties(&record.request.fields, true);
    let request_body = (!request_properties.is_empty()).then(|| RequestBody {
        content: json_content(&record.request.name, &record.request.fields),
    });

    Operation {
        operation_id: record.method_name.clone(),
        tags: Vec::new(),
        responses,
        parameters: parameters(&record.request.fields),
        request_body,
    }
}

fn json_content(title: &str, fields: &[FieldDescriptor]) -> BTreeMap<String, MediaType> {
    let mut content = BTreeMap::new();
    content.insert(
        JSON_CONTENT.to_string(),
        MediaType {
            schema: SchemaInfo {
                schema_type: "object".to_string(),
                title: title.to_string(),
                properties: properties(fields, true),
                ..SchemaInfo::default()
            },
        },
    );
    content
}

fn parameters(fields: &[FieldDescriptor]) -> Vec<Parameter> {
    fields
        .iter()
        .filter_map(|field| {
            let tags = &field.tags;
            let (name, location, required) = if tags.is_path_param() {
                (tags.uri_key.clone(), "path", true)
            } else if tags.is_form_param() {
                (tags.form_key.clone(), "query", false)
            } else if tags.is_header_param() {
                (tags.header_key.clone(), "header", false)
            } else {
                return None;
            };

            Some(Parameter {
                name,
                location: location.to_string(),
                required,
                schema: leaf_schema(field),
            })
        })
        .collect()
}

/// JSON properties of `fields`; nested structs are rendered one level deep
fn properties(fields: &[FieldDescriptor], nested: bool) -> BTreeMap<String, SchemaInfo> {
    fields
        .iter()
        .filter(|field| field.tags.is_json_field())
        .map(|field| {
            let mut schema = leaf_schema(field);
            if nested && !field.children.is_empty() {
                let children = properties(&field.children, false);
                if schema.schema_type == "array" {
                    schema.items = Some(Box::new(SchemaInfo {
                        schema_type: "object".to_string(),
                        title: field.child_type.clone(),
                        properties: children,
                        ..SchemaInfo::default()
                    }));
                } else {
                    schema.properties = children;
                }
            }
            (field.tags.json_key.clone(), schema)
        })
        .collect()
}

fn leaf_schema(field: &FieldDescriptor) -> SchemaInfo {
    SchemaInfo {
        schema_type: schema_type(&field.type_name).to_string(),
        title: field.tags.title.clone(),
        format: field.tags.format.clone(),
        description: field.tags.desc.clone(),
        ..SchemaInfo::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::{FieldInfo, Reflect, TypeShape};
    use crate::routing::naming::Verb;

    struct Item;

    impl Reflect for Item {
        fn type_name() -> String {
            "Item".to_string()
        }

        fn shape() -> TypeShape {
            TypeShape::Struct
        }

        fn fields() -> Vec<FieldInfo> {
            vec![
                FieldInfo::of::<String>("name").json("name"),
                FieldInfo::of::<u32>("id").json("id"),
            ]
        }
    }

    struct ListReq;

    impl Reflect for ListReq {
        fn type_name() -> String {
            "ListReq".to_string()
        }

        fn shape() -> TypeShape {
            TypeShape::Struct
        }

        fn fields() -> Vec<FieldInfo> {
            vec![
                FieldInfo::of::<i32>("current").form("current"),
                FieldInfo::of::<String>("keyword").form("keyword").desc("search keyword"),
            ]
        }
    }

    struct ListResp;

    impl Reflect for ListResp {
        fn type_name() -> String {
            "ListResp".to_string()
        }

        fn shape() -> TypeShape {
            TypeShape::Struct
        }

        fn fields() -> Vec<FieldInfo> {
            vec![
                FieldInfo::of::<i64>("total").json("total").format("int64"),
                FieldInfo::of::<Vec<Box<Item>>>("list").json("list"),
                FieldInfo::of::<String>("secret").json("-"),
            ]
        }
    }

    struct DetailReq;

    impl Reflect for DetailReq {
        fn type_name() -> String {
            "DetailReq".to_string()
        }

        fn shape() -> TypeShape {
            TypeShape::Struct
        }

        fn fields() -> Vec<FieldInfo> {
            vec![
                FieldInfo::of::<u32>("id").uri("id"),
                FieldInfo::of::<u32>("tenant").uri("tenant").skip(),
                FieldInfo::of::<String>("token").header("X-Token"),
            ]
        }
    }

    fn document() -> OpenApiDocument {
        let mut registry = ApiRegistry::new();
        registry.record::<ListReq, ListResp>("/api/list", Verb::Get, "GetList");
        registry.record::<DetailReq, Item>("/api/detail", Verb::Get, "GetDetail");
        OpenApiDocument::from_registry(&registry, "demo", "v1")
    }

    #[test]
    fn test_schema_type_mapping() {
        assert_eq!(schema_type("u32"), "integer");
        assert_eq!(schema_type("f64"), "number");
        assert_eq!(schema_type("bool"), "boolean");
        assert_eq!(schema_type("String"), "string");
        assert_eq!(schema_type("Vec<Item>"), "array");
        assert_eq!(schema_type("Item"), "object");
    }

    #[test]
    fn test_query_parameters_and_response_properties() {
        let doc = document();
        let operation = &doc.paths["/api/list"]["get"];
        assert_eq!(operation.operation_id, "GetList");
        assert_eq!(operation.parameters.len(), 2);
        assert_eq!(operation.parameters[0].location, "query");
        assert!(!operation.parameters[0].required);
        assert_eq!(operation.parameters[1].schema.description, "search keyword");
        assert!(operation.request_body.is_none());

        let schema = &operation.responses["200"].content[JSON_CONTENT].schema;
        assert_eq!(schema.title, "ListResp");
        assert_eq!(schema.properties["total"].format, "int64");
        assert!(!schema.properties.contains_key("secret"));

        let list = &schema.properties["list"];
        assert_eq!(list.schema_type, "array");
        let items = list.items.as_ref().unwrap();
        assert_eq!(items.title, "Item");
        assert_eq!(items.properties["id"].schema_type, "integer");
    }

    #[test]
    fn test_path_parameters_use_braces() {
        let doc = document();
        let operation = &doc.paths["/api/detail/{id}"]["get"];
        assert_eq!(operation.parameters[0].location, "path");
        assert!(operation.parameters[0].required);
    }

    #[test]
    fn test_skipped_uri_field_is_not_a_path_parameter() {
        let doc = document();
        let operation = &doc.paths["/api/detail/{id}"]["get"];
        let names: Vec<_> = operation.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["id", "X-Token"]);
        assert_eq!(operation.parameters[1].location, "header");
        assert!(!operation.parameters[1].required);
    }

    #[test]
    fn test_write_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openapi.yaml");
        document().write_yaml(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("3.0.3"));
        assert!(written.contains("operationId: GetDetail"));

        let parsed: OpenApiDocument = serde_yaml::from_str(&written).unwrap();
        assert_eq!(parsed, document());
    }
}
