//! # Definition Loader
//!
//! Reads a declarative API definition (YAML or JSON) and builds a live
//! [`Api`] from it.
//!
//! ```yaml
//! info:
//!   title: Todo API
//! authorizations:
//!   apikey: {type: apiKey, name: X-API-KEY, in: header}
//! namespaces:
//!   - name: todos
//!     path: /todos
//!     models:
//!       - name: Todo
//!         fields:
//!           id: {type: integer, readonly: true}
//!           task: {type: string, required: true}
//!     resources:
//!       - name: TodoList
//!         url: /
//!         operations:
//!           get:
//!             docstring: List all todos
//!             doc: {responses: {"200": [null, ["Todo"]]}}
//! ```
//!
//! Models are resolved in declaration order: Api-level models first, then
//! each namespace in turn. A field or parent naming a model that is not
//! declared earlier is a specs error.
//!
//! The definition structs mirror the file keys one to one.
#![allow(missing_docs)]

use crate::api::{Api, ApiInfo, ResponseTemplate, SecurityScheme, Tag};
use crate::error::{AppError, AppResult};
use crate::fields::{DateFormat, Field};
use crate::mask::Mask;
use crate::model::{Model, ModelRef, ModelSource};
use crate::namespace::{Namespace, RouteOptions};
use crate::resource::{DocFragment, HttpMethod, Operation, Resource};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Number, Value};
use std::fs;
use std::path::Path;

/// Root of a definition file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiDefinition {
    pub info: ApiInfo,
    pub prefix: Option<String>,
    pub swagger_path: Option<String>,
    pub validate: Option<bool>,
    pub authorizations: IndexMap<String, SecurityScheme>,
    pub security: Value,
    pub tags: Vec<Tag>,
    pub responses: IndexMap<String, ResponseTemplate>,
    pub models: Vec<ModelDefinition>,
    pub namespaces: Vec<NamespaceDefinition>,
}

/// A namespace and everything mounted on it.
#[derive(Debug, Clone, Deserialize)]
pub struct NamespaceDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub validate: Option<bool>,
    #[serde(default)]
    pub internal: bool,
    #[serde(default)]
    pub models: Vec<ModelDefinition>,
    #[serde(default)]
    pub resources: Vec<ResourceDefinition>,
}

/// A model: plain, `clone` (flattened copy) or `inherit` (allOf).
#[derive(Debug, Clone, Deserialize)]
pub struct ModelDefinition {
    pub name: String,
    #[serde(default)]
    pub fields: IndexMap<String, FieldDefinition>,
    #[serde(default)]
    pub clone: Vec<String>,
    #[serde(default)]
    pub inherit: Vec<String>,
    #[serde(default)]
    pub mask: Option<String>,
}

/// Field kinds accepted in definition files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Raw,
    String,
    FormattedString,
    Integer,
    Float,
    Arbitrary,
    Fixed,
    Boolean,
    #[serde(alias = "date_time")]
    Datetime,
    Date,
    Nested,
    List,
    Polymorph,
}

/// One typed field declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDefinition {
    #[serde(rename = "type")]
    pub kind: FieldType,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub decimals: Option<u32>,
    #[serde(default)]
    pub format: DateFormat,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub items: Option<Box<FieldDefinition>>,
    #[serde(default)]
    pub mapping: IndexMap<String, String>,

    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub example: Option<Value>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default)]
    pub mask: Option<String>,

    #[serde(default)]
    pub min_length: Option<u64>,
    #[serde(default)]
    pub max_length: Option<u64>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default, rename = "enum")]
    pub enumeration: Vec<String>,
    #[serde(default)]
    pub discriminator: bool,

    /// A number for numeric kinds, a date string for dates.
    #[serde(default)]
    pub minimum: Option<Value>,
    #[serde(default)]
    pub maximum: Option<Value>,
    #[serde(default)]
    pub exclusive_minimum: bool,
    #[serde(default)]
    pub exclusive_maximum: bool,
    #[serde(default)]
    pub multiple_of: Option<Number>,

    #[serde(default)]
    pub min_items: Option<u64>,
    #[serde(default)]
    pub max_items: Option<u64>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub as_list: bool,
    #[serde(default)]
    pub allow_null: bool,
}

/// A resource routed on its namespace.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDefinition {
    pub name: String,
    pub url: String,
    /// Fixed canonical path.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub internal: bool,
    /// Documented methods; empty means all of them.
    #[serde(default)]
    pub methods: Vec<HttpMethod>,
    /// Class-level documentation.
    #[serde(default)]
    pub doc: Option<Value>,
    #[serde(default)]
    pub operations: IndexMap<HttpMethod, OperationDefinition>,
}

/// Documentation of one implemented method.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OperationDefinition {
    pub docstring: Option<String>,
    pub doc: Option<Value>,
}

/// Models visible while loading, by name.
pub type ModelScope = IndexMap<String, ModelRef>;

fn lookup(scope: &ModelScope, name: &str) -> AppResult<ModelRef> {
    scope
        .get(name)
        .cloned()
        .ok_or_else(|| AppError::Specs(format!("Model {} not registered", name)))
}

fn number(value: &Value, field: &str, key: &str) -> AppResult<Number> {
    match value {
        Value::Number(n) => Ok(n.clone()),
        other => Err(AppError::Configuration(format!(
            "Field {}: {} must be a number, got {}",
            field, key, other
        ))),
    }
}

impl FieldDefinition {
    /// Builds the field, resolving model names against `scope`.
    pub fn build(&self, name: &str, scope: &ModelScope) -> AppResult<Field> {
        let mut field = match self.kind {
            FieldType::Raw => Field::raw(),
            FieldType::String => Field::string(),
            FieldType::FormattedString => {
                let template = self.template.as_deref().ok_or_else(|| {
                    AppError::Configuration(format!("Field {}: missing template", name))
                })?;
                Field::formatted_string(template)
            }
            FieldType::Integer => Field::integer(),
            FieldType::Float => Field::float(),
            FieldType::Arbitrary => Field::arbitrary(),
            FieldType::Fixed => Field::fixed(self.decimals.unwrap_or(5)),
            FieldType::Boolean => Field::boolean(),
            FieldType::Datetime => Field::datetime(self.format),
            FieldType::Date => Field::date(),
            FieldType::Nested => {
                let model = self.model.as_deref().ok_or_else(|| {
                    AppError::Configuration(format!("Field {}: missing model", name))
                })?;
                Field::nested(&lookup(scope, model)?)
            }
            FieldType::List => {
                let items = self.items.as_deref().ok_or_else(|| {
                    AppError::Configuration(format!("Field {}: missing items", name))
                })?;
                Field::list(items.build(name, scope)?)
            }
            FieldType::Polymorph => {
                let mapping = self
                    .mapping
                    .iter()
                    .map(|(key, model)| Ok((key.clone(), lookup(scope, model)?)))
                    .collect::<AppResult<Vec<_>>>()?;
                Field::polymorph(mapping)?
            }
        };

        if let Some(default) = &self.default {
            field = field.with_default(default.clone());
        }
        if let Some(attribute) = &self.attribute {
            field = field.with_attribute(attribute.clone());
        }
        if let Some(title) = &self.title {
            field = field.with_title(title.clone());
        }
        if let Some(description) = &self.description {
            field = field.with_description(description.clone());
        }
        if let Some(example) = &self.example {
            field = field.with_example(example.clone());
        }
        if self.required {
            field = field.required();
        }
        if self.readonly {
            field = field.readonly();
        }
        if let Some(mask) = &self.mask {
            field = field.with_mask(Mask::parse(mask)?);
        }

        if let Some(len) = self.min_length {
            field = field.with_min_length(len);
        }
        if let Some(len) = self.max_length {
            field = field.with_max_length(len);
        }
        if let Some(pattern) = &self.pattern {
            field = field.with_pattern(pattern.clone());
        }
        if !self.enumeration.is_empty() {
            field = field.with_enum(self.enumeration.iter().cloned());
        }
        if self.discriminator {
            field = field.discriminator();
        }

        match self.kind {
            FieldType::Datetime | FieldType::Date => {
                let min = self.minimum.as_ref().and_then(Value::as_str);
                let max = self.maximum.as_ref().and_then(Value::as_str);
                if min.is_some() || max.is_some() {
                    field = field.with_date_range(min, max);
                }
            }
            _ => {
                if let Some(minimum) = &self.minimum {
                    field = field.with_minimum(number(minimum, name, "minimum")?);
                }
                if let Some(maximum) = &self.maximum {
                    field = field.with_maximum(number(maximum, name, "maximum")?);
                }
            }
        }
        if self.exclusive_minimum {
            field = field.exclusive_minimum();
        }
        if self.exclusive_maximum {
            field = field.exclusive_maximum();
        }
        if let Some(multiple) = &self.multiple_of {
            field = field.with_multiple_of(multiple.clone());
        }

        if let Some(count) = self.min_items {
            field = field.with_min_items(count);
        }
        if let Some(count) = self.max_items {
            field = field.with_max_items(count);
        }
        if self.unique {
            field = field.unique();
        }
        if self.as_list {
            field = field.as_list();
        }
        if self.allow_null {
            field = field.allow_null();
        }
        Ok(field)
    }
}

impl ModelDefinition {
    /// Builds the model, resolving parents and field references against `scope`.
    pub fn build(&self, scope: &ModelScope) -> AppResult<Model> {
        if !self.clone.is_empty() && !self.inherit.is_empty() {
            return Err(AppError::Configuration(format!(
                "Model {} cannot both clone and inherit",
                self.name
            )));
        }

        let fields = self
            .fields
            .iter()
            .map(|(name, field)| Ok((name.clone(), field.build(name, scope)?)))
            .collect::<AppResult<IndexMap<String, Field>>>()?;

        let model = if !self.clone.is_empty() || !self.inherit.is_empty() {
            let mut sources = self
                .clone
                .iter()
                .chain(&self.inherit)
                .map(|name| lookup(scope, name).map(ModelSource::Model))
                .collect::<AppResult<Vec<_>>>()?;
            sources.push(ModelSource::Fields(fields));
            if self.clone.is_empty() {
                Model::inherit(self.name.clone(), sources)
            } else {
                Model::cloned(self.name.clone(), &sources)
            }
        } else {
            Model::new(self.name.clone(), fields)
        };

        match &self.mask {
            Some(mask) => Ok(model.with_mask(Mask::parse(mask)?)),
            None => Ok(model),
        }
    }
}

impl ResourceDefinition {
    fn build(&self) -> Resource {
        let mut resource = Resource::new(self.name.clone());
        if let Some(path) = &self.path {
            resource = resource.with_path(path.clone());
        }
        if self.internal {
            resource = resource.internal();
        }
        if let Some(doc) = &self.doc {
            resource = resource.doc(DocFragment::new(doc.clone()));
        }
        for (method, definition) in &self.operations {
            let mut operation = Operation::new();
            if let Some(docstring) = &definition.docstring {
                operation = operation.with_docstring(docstring.clone());
            }
            if let Some(doc) = &definition.doc {
                operation = operation.doc(DocFragment::new(doc.clone()));
            }
            resource = resource.with_operation(*method, operation);
        }
        resource
    }
}

impl ApiDefinition {
    /// Parses a YAML document.
    pub fn from_yaml_str(input: &str) -> AppResult<Self> {
        Ok(serde_yaml::from_str(input)?)
    }

    /// Parses a JSON document.
    pub fn from_json_str(input: &str) -> AppResult<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Reads a definition file; `.json` files are parsed as JSON, anything
    /// else as YAML.
    pub fn from_path(path: &Path) -> AppResult<Self> {
        let content = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        tracing::debug!(path = %path.display(), is_json, "loading api definition");
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    /// Builds the live registry.
    pub fn into_api(self) -> AppResult<Api> {
        let mut api = Api::new(self.info);
        if let Some(prefix) = &self.prefix {
            api = api.with_prefix(prefix);
        }
        if let Some(path) = &self.swagger_path {
            api = api.with_swagger_path(path);
        }
        if let Some(validate) = self.validate {
            api = api.with_validate(validate);
        }
        for (name, scheme) in self.authorizations {
            api = api.with_authorization(&name, scheme);
        }
        if !self.security.is_null() {
            api = api.with_security(self.security);
        }
        for tag in self.tags {
            api = api.with_tag(tag);
        }
        for (name, template) in self.responses {
            api = api.with_response(&name, template);
        }

        let mut scope = ModelScope::new();
        for definition in &self.models {
            let model = api.add_model(definition.build(&scope)?);
            scope.insert(model.name().to_string(), model);
        }

        for definition in self.namespaces {
            let mut ns = Namespace::new(definition.name.clone());
            if let Some(description) = &definition.description {
                ns = ns.with_description(description.clone());
            }
            if let Some(path) = &definition.path {
                ns = ns.with_path(path);
            }
            if let Some(validate) = definition.validate {
                ns = ns.with_validate(validate);
            }
            if definition.internal {
                ns = ns.internal();
            }
            for model in &definition.models {
                let model = ns.add_model(model.build(&scope)?);
                scope.insert(model.name().to_string(), model);
            }
            for resource in &definition.resources {
                let options = RouteOptions {
                    methods: resource.methods.clone(),
                    doc: None,
                };
                ns.route_with(&resource.url, resource.build(), options)?;
            }
            api.add_namespace(ns)?;
        }

        tracing::info!(
            namespaces = api.namespaces().len(),
            models = api.models().len(),
            "api definition loaded"
        );
        Ok(api)
    }
}

/// Reads `path` and builds the [`Api`] it describes.
pub fn load_api(path: &Path) -> AppResult<Api> {
    ApiDefinition::from_path(path)?.into_api()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::io::Write;

    const TODO_YAML: &str = r#"
info:
  title: Todo API
  version: "1.2"
prefix: /api
authorizations:
  apikey: {type: apiKey, name: X-API-KEY, in: header}
security: apikey
tags:
  - {name: todos}
models:
  - name: Base
    fields:
      id: {type: integer, readonly: true}
namespaces:
  - name: todos
    description: Todo operations
    path: /todos
    models:
      - name: Todo
        inherit: [Base]
        fields:
          task: {type: string, required: true, max_length: 200}
          due: {type: date, minimum: "2024-01-01"}
      - name: TodoList
        fields:
          items: {type: list, items: {type: nested, model: Todo}}
    resources:
      - name: TodoCollection
        url: /
        operations:
          get:
            docstring: List all todos
            doc: {responses: {"200": [null, "TodoList"]}}
          post:
            doc: {expect: ["Todo"], security: apikey}
      - name: TodoItem
        url: /<int:id>
        doc: {params: {id: "The todo id"}}
        operations:
          get: {}
"#;

    #[test]
    fn test_yaml_definition_builds_api() {
        let api = ApiDefinition::from_yaml_str(TODO_YAML)
            .unwrap()
            .into_api()
            .unwrap();
        assert_eq!(api.info().title, "Todo API");
        assert_eq!(api.base_path(), "/api");
        assert_eq!(api.namespaces().len(), 1);

        let ns = &api.namespaces()[0];
        let urls: Vec<&str> = ns.resources().iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["/todos", "/todos/<int:id>"]);

        let models = api.models();
        let todo = &models["Todo"];
        assert_eq!(todo.parents()[0].name(), "Base");
        assert!(matches!(todo.fields()["due"].kind(), FieldKind::Date { .. }));
    }

    #[test]
    fn test_loaded_api_compiles() {
        let mut api = ApiDefinition::from_yaml_str(TODO_YAML)
            .unwrap()
            .into_api()
            .unwrap();
        let doc = api.schema(false).unwrap();
        assert_eq!(doc["basePath"], json!("/api"));
        assert_eq!(
            doc["paths"]["/todos"]["get"]["responses"]["200"]["schema"],
            json!({"$ref": "#/definitions/TodoList"})
        );
        assert_eq!(
            doc["paths"]["/todos/{id}"]["parameters"][0]["in"],
            json!("path")
        );
        let definitions = doc["definitions"].as_object().unwrap();
        let mut keys: Vec<&String> = definitions.keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["Base", "Todo", "TodoList"]);
    }

    #[test]
    fn test_unknown_model_reference() {
        let yaml = r#"
models:
  - name: Broken
    fields:
      child: {type: nested, model: Missing}
"#;
        let err = ApiDefinition::from_yaml_str(yaml)
            .unwrap()
            .into_api()
            .unwrap_err();
        assert!(matches!(err, AppError::Specs(_)));
    }

    #[test]
    fn test_undeclared_security_scheme() {
        let yaml = r#"
namespaces:
  - name: secure
    resources:
      - name: Vault
        url: /vault
        operations:
          get: {doc: {security: oauth}}
"#;
        let err = ApiDefinition::from_yaml_str(yaml)
            .unwrap()
            .into_api()
            .unwrap_err();
        assert!(matches!(err, AppError::Security(_)));
    }

    #[test]
    fn test_json_file_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        let definition = json!({
            "info": {"title": "From JSON"},
            "namespaces": [{
                "name": "ping",
                "resources": [{"name": "Ping", "url": "/ping", "operations": {"get": {}}}]
            }]
        });
        write!(file, "{}", definition).unwrap();

        let mut api = load_api(file.path()).unwrap();
        assert_eq!(api.info().title, "From JSON");
        assert_eq!(api.info().version, "1.0");
        let doc = api.schema(false).unwrap();
        assert_eq!(doc["paths"]["/ping"]["get"]["operationId"], json!("get_ping"));
    }

    #[test]
    fn test_clone_and_inherit_are_exclusive() {
        let yaml = r#"
models:
  - name: A
    fields: {x: {type: string}}
  - name: B
    clone: [A]
    inherit: [A]
"#;
        let err = ApiDefinition::from_yaml_str(yaml)
            .unwrap()
            .into_api()
            .unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }
}
