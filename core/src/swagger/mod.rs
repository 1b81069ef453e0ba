//! # Swagger Compiler
//!
//! Walks an [`Api`] and produces a Swagger 2.0 document as a
//! [`serde_json::Value`].
//!
//! Documentation is layered: class-level metadata of a resource applies to
//! every method, method-level metadata (the `get`/`post`/... sub-maps of the
//! class doc, then the operation's own metadata) overrides it. Models are
//! emitted under `definitions` only once something references them.

mod params;
mod responses;
mod security;

use params::{extract_path, extract_path_params};
use security::security_requirements;

use crate::api::Api;
use crate::docstring::{parse_docstring, Docstring};
use crate::error::{AppError, AppResult};
use crate::fields::is_truthy;
use crate::merge::{merge, merge_into};
use crate::model::ModelRef;
use crate::namespace::{Namespace, RegisteredResource};
use crate::naming::definition_key;
use crate::resource::{HttpMethod, Operation, Resource};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Swagger specification version emitted in every document.
pub const SWAGGER_VERSION: &str = "2.0";

const JSON_MEDIA_TYPE: &str = "application/json";

/// One compilation pass over an [`Api`].
pub struct Swagger<'a> {
    api: &'a Api,
    models: IndexMap<String, ModelRef>,
    registered: IndexMap<String, ModelRef>,
}

/// Documentation of one method after layering.
struct MethodDoc {
    doc: Map<String, Value>,
    docstring: Docstring,
}

fn empty() -> Value {
    Value::Object(Map::new())
}

fn opt_str(value: &Option<String>) -> Option<Value> {
    value.as_ref().map(|v| Value::from(v.clone()))
}

impl<'a> Swagger<'a> {
    /// Prepares a compilation pass; models are looked up in `api.models()`.
    pub fn new(api: &'a Api) -> Self {
        Self {
            api,
            models: api.models(),
            registered: IndexMap::new(),
        }
    }

    /// Compiles the whole document.
    ///
    /// Internal namespaces and resources are skipped unless `show_internal`
    /// is set. Fails with a specs error when documentation references an
    /// unregistered model.
    pub fn as_dict(mut self, show_internal: bool) -> AppResult<Value> {
        let api = self.api;

        let mut paths = BTreeMap::new();
        for ns in api.namespaces() {
            if !show_internal && !ns.is_public() {
                continue;
            }
            for registered in ns.resources() {
                if !show_internal && !registered.resource.is_public() {
                    continue;
                }
                if let Some(item) = self.serialize_resource(ns, registered)? {
                    paths.insert(extract_path(&registered.url), item);
                }
            }
        }

        let responses = self.register_responses()?;

        let mut specs = Map::new();
        specs.insert("swagger".into(), Value::from(SWAGGER_VERSION));
        specs.insert("basePath".into(), Value::from(self.base_path()));
        specs.insert(
            "paths".into(),
            Value::Object(paths.into_iter().collect()),
        );
        specs.insert("info".into(), self.info());
        specs.insert("produces".into(), json!(api.produces()));
        specs.insert("consumes".into(), json!([JSON_MEDIA_TYPE]));
        if let Some(definitions) = security::security_definitions(api) {
            specs.insert("securityDefinitions".into(), definitions);
        }
        if let Some(security) = security_requirements(api.security()).filter(|s| !s.is_empty()) {
            specs.insert("security".into(), Value::Array(security));
        }
        specs.insert("tags".into(), Value::Array(self.extract_tags()));
        let definitions = self.serialize_definitions()?;
        if !definitions.is_empty() {
            specs.insert("definitions".into(), Value::Object(definitions));
        }
        if !responses.is_empty() {
            specs.insert("responses".into(), Value::Object(responses));
        }

        tracing::debug!(
            paths = specs["paths"].as_object().map_or(0, Map::len),
            definitions = self.registered.len(),
            show_internal,
            "compiled swagger document"
        );
        Ok(Value::Object(specs))
    }

    fn base_path(&self) -> String {
        let prefix = self.api.base_path();
        match prefix.strip_suffix('/') {
            Some(stripped) if !stripped.is_empty() => stripped.to_string(),
            _ if prefix.is_empty() => "/".to_string(),
            _ => prefix.to_string(),
        }
    }

    fn info(&self) -> Value {
        let info = self.api.info();
        let mut out = Map::new();
        out.insert("title".into(), Value::from(info.title.clone()));
        out.insert("version".into(), Value::from(info.version.clone()));
        if let Some(description) = opt_str(&info.description) {
            out.insert("description".into(), description);
        }
        if let Some(terms) = opt_str(&info.terms_url) {
            out.insert("termsOfService".into(), terms);
        }
        if let Some(name) = &info.contact {
            if info.contact_email.is_some() || info.contact_url.is_some() {
                let mut contact = Map::new();
                contact.insert("name".into(), Value::from(name.clone()));
                if let Some(email) = opt_str(&info.contact_email) {
                    contact.insert("email".into(), email);
                }
                if let Some(url) = opt_str(&info.contact_url) {
                    contact.insert("url".into(), url);
                }
                out.insert("contact".into(), Value::Object(contact));
            }
        }
        if let Some(name) = &info.license {
            let mut license = Map::new();
            license.insert("name".into(), Value::from(name.clone()));
            if let Some(url) = opt_str(&info.license_url) {
                license.insert("url".into(), url);
            }
            out.insert("license".into(), Value::Object(license));
        }
        Value::Object(out)
    }

    /// Explicit tags first, then one tag per namespace. An explicit tag
    /// without a description borrows the namespace description.
    fn extract_tags(&self) -> Vec<Value> {
        let mut tags: IndexMap<String, Option<String>> = self
            .api
            .tags()
            .iter()
            .map(|tag| (tag.name.clone(), tag.description.clone()))
            .collect();

        for ns in self.api.namespaces() {
            let description = ns.description().map(str::to_string);
            match tags.get_mut(ns.name()) {
                Some(existing) if existing.is_none() => *existing = description,
                Some(_) => {}
                None => {
                    tags.insert(ns.name().to_string(), description);
                }
            }
        }

        tags.into_iter()
            .map(|(name, description)| {
                let mut tag = Map::new();
                tag.insert("name".into(), Value::from(name));
                if let Some(description) = description {
                    tag.insert("description".into(), Value::from(description));
                }
                Value::Object(tag)
            })
            .collect()
    }

    /// Class-level documentation with its resolved path-level parameters,
    /// or `None` for a hidden resource.
    fn resource_doc(&mut self, resource: &Resource, path: &str) -> AppResult<Option<Map<String, Value>>> {
        let Value::Object(class) = resource.metadata() else {
            return Ok(None);
        };
        let mut class = class.clone();

        let mut params = self.expected_params(&class)?;
        merge_into(&mut params, class.get("params").unwrap_or(&empty()));
        merge_into(&mut params, &extract_path_params(path));
        class.insert("params".into(), params);
        Ok(Some(class))
    }

    /// Layers the method documentation, or `None` when the method is hidden.
    fn method_doc(
        &mut self,
        class: &Map<String, Value>,
        method: HttpMethod,
        operation: &Operation,
    ) -> AppResult<Option<MethodDoc>> {
        let base = class.get(method.as_str()).cloned().unwrap_or_else(empty);
        let metadata = operation.metadata();
        let layered = if metadata.as_object().is_some_and(Map::is_empty) {
            base
        } else {
            merge(&base, metadata)
        };
        let Value::Object(mut doc) = layered else {
            return Ok(None);
        };

        let mut method_params = self.expected_params(&doc)?;
        merge_into(&mut method_params, doc.get("params").unwrap_or(&empty()));

        // Class parameters only reappear at method level when reaffirmed.
        let inherited: Map<String, Value> = match (class.get("params"), &method_params) {
            (Some(Value::Object(class_params)), Value::Object(own)) => class_params
                .iter()
                .filter(|(name, _)| own.contains_key(*name))
                .map(|(name, param)| (name.clone(), param.clone()))
                .collect(),
            _ => Map::new(),
        };
        doc.insert(
            "params".into(),
            merge(&Value::Object(inherited), &method_params),
        );

        Ok(Some(MethodDoc {
            doc,
            docstring: parse_docstring(operation.docstring()),
        }))
    }

    fn serialize_resource(
        &mut self,
        ns: &Namespace,
        registered: &RegisteredResource,
    ) -> AppResult<Option<Value>> {
        let resource = &registered.resource;
        let path = extract_path(&registered.url);
        let Some(class) = self.resource_doc(resource, &path)? else {
            tracing::trace!(resource = resource.name(), "resource hidden");
            return Ok(None);
        };

        let mut item = Map::new();
        let parameters = self.parameters_for(&class["params"])?;
        if !parameters.is_empty() {
            item.insert("parameters".into(), Value::Array(parameters));
        }

        let allowed = &registered.options.methods;
        for (method, operation) in resource.http_methods() {
            if !allowed.is_empty() && !allowed.contains(&method) {
                continue;
            }
            let Some(method_doc) = self.method_doc(&class, method, operation)? else {
                continue;
            };
            let operation = self.serialize_operation(ns, resource, &class, method, &method_doc)?;
            item.insert(method.as_str().into(), Value::Object(operation));
        }
        Ok(Some(Value::Object(item)))
    }

    fn serialize_operation(
        &mut self,
        ns: &Namespace,
        resource: &Resource,
        class: &Map<String, Value>,
        method: HttpMethod,
        method_doc: &MethodDoc,
    ) -> AppResult<Map<String, Value>> {
        let doc = &method_doc.doc;
        let docstring = &method_doc.docstring;
        let mut operation = Map::new();

        operation.insert(
            "responses".into(),
            Value::Object(self.responses_for(class, doc, docstring)?),
        );

        let summary = doc
            .get("summary")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| docstring.summary.clone());
        if let Some(summary) = summary {
            operation.insert("summary".into(), Value::from(summary));
        }
        if let Some(description) = description_for(class, doc, docstring) {
            operation.insert("description".into(), Value::from(description));
        }

        let operation_id = doc
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.api.operation_id(resource.name(), method.as_str()));
        operation.insert("operationId".into(), Value::from(operation_id));

        let parameters = self.parameters_for(&doc["params"])?;
        let consumes = consumes_for(&parameters);
        if !parameters.is_empty() {
            operation.insert("parameters".into(), Value::Array(parameters));
        }
        if let Some(security) = security::security_for(class, doc) {
            operation.insert("security".into(), Value::Array(security));
        }
        let deprecated = [class.get("deprecated"), doc.get("deprecated")]
            .into_iter()
            .flatten()
            .any(is_truthy);
        if deprecated {
            operation.insert("deprecated".into(), Value::Bool(true));
        }
        if let Some(consumes) = consumes {
            operation.insert("consumes".into(), consumes);
        }
        operation.insert("tags".into(), json!([ns.name()]));
        Ok(operation)
    }

    /// Every registered model, keyed and sorted by definition key.
    /// Definitions sorted by key. Two models sharing a key are an error.
    fn serialize_definitions(&self) -> AppResult<Map<String, Value>> {
        let mut definitions: BTreeMap<String, (&str, Value)> = BTreeMap::new();
        for (name, model) in &self.registered {
            let key = definition_key(name);
            if let Some((other, _)) = definitions.get(&key) {
                return Err(AppError::Specs(format!(
                    "Models {} and {} share the definition key {}",
                    other, name, key
                )));
            }
            definitions.insert(key, (name.as_str(), model.schema()));
        }
        Ok(definitions
            .into_iter()
            .map(|(key, (_, schema))| (key, schema))
            .collect())
    }
}

/// Class description, method description and docstring details, one per line.
fn description_for(
    class: &Map<String, Value>,
    doc: &Map<String, Value>,
    docstring: &Docstring,
) -> Option<String> {
    let parts: Vec<&str> = [
        class.get("description").and_then(Value::as_str),
        doc.get("description").and_then(Value::as_str),
        docstring.details.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect();
    let description = parts.join("\n");
    let description = description.trim();
    (!description.is_empty()).then(|| description.to_string())
}

fn consumes_for(parameters: &[Value]) -> Option<Value> {
    let form = || {
        parameters
            .iter()
            .filter(|p| p.get("in").and_then(Value::as_str) == Some("formData"))
    };
    if form().any(|p| p.get("type").and_then(Value::as_str) == Some("file")) {
        Some(json!(["multipart/form-data"]))
    } else if form().next().is_some() {
        Some(json!(["application/x-www-form-urlencoded", "multipart/form-data"]))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiInfo, SecurityScheme, Tag};
    use crate::fields::Field;
    use crate::model::Model;
    use crate::namespace::{ParamDoc, RouteOptions};
    use crate::resource::{Body, DocFragment};
    use pretty_assertions::assert_eq;

    fn todo_api() -> Api {
        let mut api = Api::new(ApiInfo {
            title: "Todo API".into(),
            version: "2.0".into(),
            ..ApiInfo::default()
        });
        let mut ns = Namespace::new("todos").with_description("Todo operations");
        let todo = ns.model(
            "Todo",
            [
                ("id", Field::integer().readonly()),
                ("task", Field::string().required().with_description("The task")),
            ],
        );
        let resource = Resource::new("TodoResource")
            .doc(ns.param("todo_id", ParamDoc::new(Default::default()).with_description("The id")))
            .with_operation(
                HttpMethod::Get,
                Operation::new()
                    .with_docstring("Fetch a todo.\n\nReturns the stored task.")
                    .doc(ns.marshal_with(&todo, 200, None)),
            )
            .with_operation(
                HttpMethod::Put,
                Operation::new()
                    .doc(ns.expect([Body::from(&todo)]))
                    .doc(ns.response(204, "Updated", None)),
            );
        ns.route("/todos/{todo_id}", resource).unwrap();
        api.add_namespace(ns).unwrap();
        api
    }

    #[test]
    fn test_top_level_document() {
        let api = todo_api();
        let doc = Swagger::new(&api).as_dict(false).unwrap();
        assert_eq!(doc["swagger"], json!("2.0"));
        assert_eq!(doc["basePath"], json!("/"));
        assert_eq!(doc["info"], json!({"title": "Todo API", "version": "2.0"}));
        assert_eq!(doc["produces"], json!(["application/json"]));
        assert_eq!(doc["consumes"], json!(["application/json"]));
        assert_eq!(
            doc["tags"],
            json!([{"name": "todos", "description": "Todo operations"}])
        );
        assert!(doc.get("security").is_none());
        assert!(doc.get("securityDefinitions").is_none());
        assert!(doc.get("responses").is_none());
    }

    #[test]
    fn test_path_item() {
        let api = todo_api();
        let doc = Swagger::new(&api).as_dict(false).unwrap();
        let item = &doc["paths"]["/todos/{todo_id}"];

        assert_eq!(
            item["parameters"],
            json!([{
                "description": "The id",
                "in": "path",
                "name": "todo_id",
                "required": true,
                "type": "string"
            }])
        );

        let get = &item["get"];
        assert_eq!(get["summary"], json!("Fetch a todo"));
        assert_eq!(get["description"], json!("Returns the stored task."));
        assert_eq!(get["operationId"], json!("get_todo_resource"));
        assert_eq!(get["tags"], json!(["todos"]));
        assert_eq!(
            get["responses"]["200"],
            json!({"description": "Success", "schema": {"$ref": "#/definitions/Todo"}})
        );
        assert!(get.get("parameters").is_none());

        let put = &item["put"];
        assert_eq!(
            put["parameters"],
            json!([{
                "name": "payload",
                "required": true,
                "in": "body",
                "schema": {"$ref": "#/definitions/Todo"}
            }])
        );
        assert_eq!(put["responses"], json!({"204": {"description": "Updated"}}));
    }

    #[test]
    fn test_definitions_only_for_referenced_models() {
        let mut api = todo_api();
        api.add_model(Model::new("Unused", [("x", Field::string())]));
        let doc = Swagger::new(&api).as_dict(false).unwrap();
        assert_eq!(
            doc["definitions"],
            json!({
                "Todo": {
                    "required": ["task"],
                    "type": "object",
                    "properties": {
                        "id": {"type": "integer", "readOnly": true},
                        "task": {"type": "string", "description": "The task"}
                    }
                }
            })
        );
    }

    #[test]
    fn test_hidden_method_and_resource() {
        let mut api = Api::default();
        let mut ns = Namespace::new("ns");
        let hidden_method = Resource::new("Partial")
            .with_method(HttpMethod::Get)
            .with_operation(HttpMethod::Delete, Operation::new().doc(ns.hide()));
        let hidden_resource = Resource::new("Ghost")
            .with_method(HttpMethod::Get)
            .doc(DocFragment::hidden());
        let hidden_by_class = Resource::new("ClassHidden")
            .doc(json!({"post": false}))
            .with_method(HttpMethod::Post)
            .with_method(HttpMethod::Get);
        ns.route("/partial", hidden_method).unwrap();
        ns.route("/ghost", hidden_resource).unwrap();
        ns.route("/class", hidden_by_class).unwrap();
        api.add_namespace(ns).unwrap();

        let doc = Swagger::new(&api).as_dict(false).unwrap();
        let paths = doc["paths"].as_object().unwrap();
        assert!(paths["/partial"].get("get").is_some());
        assert!(paths["/partial"].get("delete").is_none());
        assert!(!paths.contains_key("/ghost"));
        assert!(paths["/class"].get("post").is_none());
        assert!(paths["/class"].get("get").is_some());
    }

    #[test]
    fn test_route_method_allow_list() {
        let mut api = Api::default();
        let mut ns = Namespace::new("ns");
        let resource = Resource::new("Both")
            .with_method(HttpMethod::Get)
            .with_method(HttpMethod::Post);
        ns.route_with(
            "/both",
            resource,
            RouteOptions {
                methods: vec![HttpMethod::Post],
                doc: None,
            },
        )
        .unwrap();
        api.add_namespace(ns).unwrap();

        let doc = Swagger::new(&api).as_dict(false).unwrap();
        let item = doc["paths"]["/both"].as_object().unwrap();
        assert_eq!(item.keys().collect::<Vec<_>>(), vec!["post"]);
    }

    #[test]
    fn test_method_params_reaffirm_class_params() {
        let mut api = Api::default();
        let mut ns = Namespace::new("ns");
        let resource = Resource::new("Search")
            .doc(ns.param("q", ParamDoc::query().with_description("Query")))
            .doc(ns.param("page", ParamDoc::query().with_type("int")))
            .with_operation(
                HttpMethod::Get,
                Operation::new().doc(ns.param("q", ParamDoc::query().required())),
            );
        ns.route("/search", resource).unwrap();
        api.add_namespace(ns).unwrap();

        let doc = Swagger::new(&api).as_dict(false).unwrap();
        let item = &doc["paths"]["/search"];
        assert_eq!(item["parameters"].as_array().unwrap().len(), 2);
        assert_eq!(
            item["get"]["parameters"],
            json!([{
                "description": "Query",
                "in": "query",
                "required": true,
                "name": "q",
                "type": "string"
            }])
        );
    }

    #[test]
    fn test_security_and_deprecation() {
        let mut api = Api::default()
            .with_authorization("apikey", SecurityScheme::ApiKey {
                name: "X-API-KEY".into(),
                location: "header".into(),
                description: None,
            })
            .with_security(json!("apikey"));
        let mut ns = Namespace::new("ns");
        let resource = Resource::new("Open")
            .doc(ns.deprecated())
            .with_operation(HttpMethod::Get, Operation::new().doc(json!({"security": null})))
            .with_method(HttpMethod::Post);
        ns.route("/open", resource).unwrap();
        api.add_namespace(ns).unwrap();

        let doc = Swagger::new(&api).as_dict(false).unwrap();
        assert_eq!(doc["security"], json!([{"apikey": []}]));
        assert_eq!(
            doc["securityDefinitions"],
            json!({"apikey": {"type": "apiKey", "name": "X-API-KEY", "in": "header"}})
        );
        let get = &doc["paths"]["/open"]["get"];
        assert_eq!(get["security"], json!([]));
        assert_eq!(get["deprecated"], json!(true));
        assert!(doc["paths"]["/open"]["post"].get("security").is_none());
    }

    #[test]
    fn test_form_data_consumes() {
        let mut api = Api::default();
        let mut ns = Namespace::new("ns");
        let upload = Resource::new("Upload").with_operation(
            HttpMethod::Post,
            Operation::new().doc(ns.param(
                "file",
                ParamDoc::new(crate::namespace::ParamLocation::FormData).with_type("file"),
            )),
        );
        let form = Resource::new("Form").with_operation(
            HttpMethod::Post,
            Operation::new().doc(ns.param(
                "name",
                ParamDoc::new(crate::namespace::ParamLocation::FormData),
            )),
        );
        ns.route("/upload", upload).unwrap();
        ns.route("/form", form).unwrap();
        api.add_namespace(ns).unwrap();

        let doc = Swagger::new(&api).as_dict(false).unwrap();
        assert_eq!(
            doc["paths"]["/upload"]["post"]["consumes"],
            json!(["multipart/form-data"])
        );
        assert_eq!(
            doc["paths"]["/form"]["post"]["consumes"],
            json!(["application/x-www-form-urlencoded", "multipart/form-data"])
        );
    }

    #[test]
    fn test_info_contact_and_license() {
        let api = Api::new(ApiInfo {
            description: Some("Demo".into()),
            terms_url: Some("https://example.com/terms".into()),
            contact: Some("Ops".into()),
            contact_email: Some("ops@example.com".into()),
            license: Some("MIT".into()),
            ..ApiInfo::default()
        });
        let doc = Swagger::new(&api).as_dict(false).unwrap();
        assert_eq!(
            doc["info"],
            json!({
                "title": "API",
                "version": "1.0",
                "description": "Demo",
                "termsOfService": "https://example.com/terms",
                "contact": {"name": "Ops", "email": "ops@example.com"},
                "license": {"name": "MIT"}
            })
        );

        let nameless = Api::new(ApiInfo {
            contact_email: Some("ops@example.com".into()),
            ..ApiInfo::default()
        });
        let doc = Swagger::new(&nameless).as_dict(false).unwrap();
        assert!(doc["info"].get("contact").is_none());
    }

    #[test]
    fn test_tags_merge() {
        let mut api = Api::default()
            .with_tag(Tag::from("todos"))
            .with_tag(Tag::from(("extra", "Declared only")));
        api.add_namespace(Namespace::new("todos").with_description("From namespace"))
            .unwrap();
        api.add_namespace(Namespace::new("admin").internal()).unwrap();

        let doc = Swagger::new(&api).as_dict(false).unwrap();
        assert_eq!(
            doc["tags"],
            json!([
                {"name": "todos", "description": "From namespace"},
                {"name": "extra", "description": "Declared only"},
                {"name": "admin"}
            ])
        );
    }

    #[test]
    fn test_base_path() {
        let doc = Swagger::new(&Api::default().with_prefix("/api/v1/"))
            .as_dict(false)
            .unwrap();
        assert_eq!(doc["basePath"], json!("/api/v1"));
        let doc = Swagger::new(&Api::default().with_prefix("/")).as_dict(false).unwrap();
        assert_eq!(doc["basePath"], json!("/"));
    }

    #[test]
    fn test_unregistered_model_fails() {
        let mut api = Api::default();
        let mut ns = Namespace::new("ns");
        let resource = Resource::new("Broken").with_operation(
            HttpMethod::Get,
            Operation::new().doc(json!({"responses": {"200": ["OK", "Ghost"]}})),
        );
        ns.route("/broken", resource).unwrap();
        api.add_namespace(ns).unwrap();

        let err = Swagger::new(&api).as_dict(false).unwrap_err();
        assert_eq!(err.to_string(), "Specs Error: Model Ghost not registered");
    }

    #[test]
    fn test_definition_key_collision_fails() {
        let mut api = Api::default();
        let mut ns = Namespace::new("todos");
        ns.model("Todo item", [("id", Field::integer())]);
        ns.model("TodoItem", [("title", Field::string())]);
        let resource = Resource::new("Todos").with_operation(
            HttpMethod::Get,
            Operation::new().doc(json!({
                "responses": {"200": ["OK", "Todo item"], "201": ["Created", "TodoItem"]}
            })),
        );
        ns.route("/todos", resource).unwrap();
        api.add_namespace(ns).unwrap();

        let err = Swagger::new(&api).as_dict(false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Specs Error: Models Todo item and TodoItem share the definition key TodoItem"
        );
    }
}
