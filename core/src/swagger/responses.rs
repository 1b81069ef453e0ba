//! Response objects, body schemas and model registration.

use super::Swagger;
use crate::docstring::Docstring;
use crate::error::{AppError, AppResult};
use crate::fields::Field;
use crate::naming::definition_reference;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde_json::{json, Map, Value};

pub(crate) const DEFAULT_RESPONSE_DESCRIPTION: &str = "Success";

fn default_response() -> Value {
    json!({ "description": DEFAULT_RESPONSE_DESCRIPTION })
}

fn status_code(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(code)) => code.clone(),
        Some(Value::Number(code)) => code.to_string(),
        _ => "200".to_string(),
    }
}

fn set(target: &mut Value, key: &str, value: Value) {
    if let Value::Object(map) = target {
        map.insert(key.to_string(), value);
    }
}

impl Swagger<'_> {
    /// Schema for a documented body: a model name becomes a reference, a
    /// list wraps its first element, an object is an inline schema.
    pub(crate) fn serialize_schema(&mut self, body: &Value) -> AppResult<Value> {
        match body {
            Value::String(name) => self.register_model(name),
            Value::Array(items) => {
                let first = items.first().ok_or_else(|| {
                    AppError::Specs("A list body must name its item model".into())
                })?;
                Ok(json!({ "type": "array", "items": self.serialize_schema(first)? }))
            }
            Value::Object(_) => Ok(body.clone()),
            other => Err(AppError::Specs(format!("Model {} not registered", other))),
        }
    }

    /// Registers `name`, its parents and every model its fields reference.
    pub(crate) fn register_model(&mut self, name: &str) -> AppResult<Value> {
        let model = self
            .models
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::Specs(format!("Model {} not registered", name)))?;

        if !self.registered.contains_key(name) {
            tracing::debug!(model = name, "registering definition");
            self.registered.insert(name.to_string(), model.clone());
            for parent in model.parents() {
                self.register_model(parent.name())?;
            }
            for field in model.fields().values() {
                self.register_field(field)?;
            }
        }
        Ok(json!({ "$ref": definition_reference(name) }))
    }

    fn register_field(&mut self, field: &Field) -> AppResult<()> {
        for model in field.referenced_models() {
            self.register_model(model.name())?;
        }
        Ok(())
    }

    /// Response map for one operation: class-level then method-level
    /// declarations, legacy `model` keys and `:raises` references.
    pub(crate) fn responses_for(
        &mut self,
        class_doc: &Map<String, Value>,
        method_doc: &Map<String, Value>,
        docstring: &Docstring,
    ) -> AppResult<Map<String, Value>> {
        let mut responses = Map::new();

        for doc in [class_doc, method_doc] {
            if let Some(Value::Object(declared)) = doc.get("responses") {
                for (code, response) in declared {
                    let (description, model) = match response {
                        Value::String(description) => (Some(description.as_str()), None),
                        Value::Array(items) => {
                            (items.first().and_then(Value::as_str), items.get(1))
                        }
                        Value::Object(map) => (
                            map.get("description").and_then(Value::as_str),
                            map.get("model"),
                        ),
                        _ => (None, None),
                    };
                    let description = description
                        .filter(|d| !d.is_empty())
                        .unwrap_or(DEFAULT_RESPONSE_DESCRIPTION);

                    let schema = match model.filter(|m| !m.is_null()) {
                        Some(model) => Some(self.serialize_schema(model)?),
                        None => None,
                    };
                    let entry = responses
                        .entry(code.clone())
                        .or_insert_with(|| Value::Object(Map::new()));
                    set(entry, "description", Value::from(description));
                    if let Some(schema) = schema {
                        set(entry, "schema", schema);
                    }
                }
            }

            if let Some(model) = doc.get("model") {
                let schema = self.serialize_schema(model)?;
                let code = status_code(doc.get("default_code"));
                let entry = responses.entry(code).or_insert_with(default_response);
                set(entry, "schema", schema);
            }
        }

        for name in docstring.raises.keys() {
            let code = self
                .api
                .response_templates()
                .get(name)
                .and_then(|template| template.code.clone());
            if let Some(code) = code {
                responses.insert(
                    code,
                    json!({ "$ref": format!("#/responses/{}", utf8_percent_encode(name, NON_ALPHANUMERIC)) }),
                );
            }
        }

        if responses.is_empty() {
            responses.insert("200".into(), default_response());
        }
        Ok(responses)
    }

    /// Top-level `responses`: every shared response template.
    pub(crate) fn register_responses(&mut self) -> AppResult<Map<String, Value>> {
        let api = self.api;
        let mut responses = Map::new();
        for (name, template) in api.response_templates() {
            let mut response = Map::new();
            response.insert("description".into(), Value::from(template.description.clone()));
            if let Some(schema) = &template.schema {
                response.insert("schema".into(), self.serialize_schema(schema)?);
            }
            if !template.headers.is_empty() {
                response.insert(
                    "headers".into(),
                    Value::Object(
                        template
                            .headers
                            .iter()
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect(),
                    ),
                );
            }
            responses.insert(name.clone(), Value::Object(response));
        }
        Ok(responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Api, ResponseTemplate};
    use crate::docstring::parse_docstring;
    use crate::model::{Model, ModelSource};
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_default_response() {
        let api = Api::default();
        let mut swagger = Swagger::new(&api);
        let responses = swagger
            .responses_for(&Map::new(), &Map::new(), &Docstring::default())
            .unwrap();
        assert_eq!(Value::Object(responses), json!({"200": {"description": "Success"}}));
    }

    #[test]
    fn test_method_description_wins_and_model_attaches() {
        let mut api = Api::default();
        api.add_model(Model::new("Todo", [("task", Field::string())]));
        let mut swagger = Swagger::new(&api);

        let class_doc = object(json!({"responses": {"200": ["Class OK", "Todo"], "404": "Missing"}}));
        let method_doc = object(json!({"responses": {"200": "Method OK"}}));
        let responses = swagger
            .responses_for(&class_doc, &method_doc, &Docstring::default())
            .unwrap();
        assert_eq!(
            Value::Object(responses),
            json!({
                "200": {"description": "Method OK", "schema": {"$ref": "#/definitions/Todo"}},
                "404": {"description": "Missing"}
            })
        );
    }

    #[test]
    fn test_null_description_defaults() {
        let mut api = Api::default();
        api.add_model(Model::new("Todo", [("task", Field::string())]));
        let mut swagger = Swagger::new(&api);
        let method_doc = object(json!({"responses": {"201": [null, ["Todo"]]}}));
        let responses = swagger
            .responses_for(&Map::new(), &method_doc, &Docstring::default())
            .unwrap();
        assert_eq!(
            responses["201"],
            json!({
                "description": "Success",
                "schema": {"type": "array", "items": {"$ref": "#/definitions/Todo"}}
            })
        );
    }

    #[test]
    fn test_legacy_model_key() {
        let mut api = Api::default();
        api.add_model(Model::new("Todo", [("task", Field::string())]));
        let mut swagger = Swagger::new(&api);
        let method_doc = object(json!({"model": "Todo", "default_code": 201}));
        let responses = swagger
            .responses_for(&Map::new(), &method_doc, &Docstring::default())
            .unwrap();
        assert_eq!(
            Value::Object(responses),
            json!({"201": {"description": "Success", "schema": {"$ref": "#/definitions/Todo"}}})
        );
    }

    #[test]
    fn test_raises_reference_templates() {
        let api = Api::default().with_response(
            "NotFound",
            ResponseTemplate {
                code: Some("404".into()),
                description: "Not found".into(),
                schema: None,
                headers: IndexMap::new(),
            },
        );
        let mut swagger = Swagger::new(&api);
        let docstring = parse_docstring(Some("Get a todo.\n:raises NotFound: when missing"));
        let responses = swagger
            .responses_for(&Map::new(), &Map::new(), &docstring)
            .unwrap();
        assert_eq!(responses["404"], json!({"$ref": "#/responses/NotFound"}));
        assert_eq!(
            Value::Object(swagger.register_responses().unwrap()),
            json!({"NotFound": {"description": "Not found"}})
        );
    }

    #[test]
    fn test_registration_is_transitive() {
        let mut api = Api::default();
        let address = api.add_model(Model::new("Address", [("city", Field::string())]));
        let base = api.add_model(Model::new("Base", [("id", Field::integer())]));
        api.add_model(Model::inherit(
            "Person",
            vec![
                ModelSource::Model(Arc::clone(&base)),
                ModelSource::Fields(
                    [("home".to_string(), Field::list(Field::nested(&address)))]
                        .into_iter()
                        .collect(),
                ),
            ],
        ));
        let mut swagger = Swagger::new(&api);
        swagger.register_model("Person").unwrap();
        let names: Vec<&String> = swagger.registered.keys().collect();
        assert_eq!(names, vec!["Person", "Base", "Address"]);
    }

    #[test]
    fn test_unregistered_nested_model_fails() {
        let mut api = Api::default();
        let ghost = Arc::new(Model::new("Ghost", [("x", Field::string())]));
        api.add_model(Model::new("Haunted", [("ghost", Field::nested(&ghost))]));
        let mut swagger = Swagger::new(&api);
        assert!(matches!(
            swagger.register_model("Haunted"),
            Err(AppError::Specs(_))
        ));
    }
}
