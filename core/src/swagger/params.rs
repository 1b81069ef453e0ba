//! Parameter extraction: path placeholders, expected bodies and documented
//! parameters.

use super::Swagger;
use crate::error::AppResult;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::OnceLock;

/// Scalar type names accepted as shorthands for Swagger types.
const PY_TYPES: [(&str, &str); 4] = [
    ("int", "integer"),
    ("str", "string"),
    ("bool", "boolean"),
    ("float", "number"),
];

fn swagger_type(ty: &str) -> &str {
    PY_TYPES
        .iter()
        .find(|(alias, _)| *alias == ty)
        .map(|(_, swagger)| *swagger)
        .unwrap_or(ty)
}

fn path_param_re() -> &'static Regex {
    static PATH_PARAM_RE: OnceLock<Regex> = OnceLock::new();
    PATH_PARAM_RE.get_or_init(|| Regex::new(r"\{([^{}]+)\}").expect("Invalid regex"))
}

fn route_converter_re() -> &'static Regex {
    static ROUTE_CONVERTER_RE: OnceLock<Regex> = OnceLock::new();
    ROUTE_CONVERTER_RE.get_or_init(|| {
        Regex::new(r"<(?:[^:<>]+:)?(?P<name>[^<>]+)>").expect("Invalid regex")
    })
}

/// Rewrites router placeholders (`<id>`, `<int:id>`) into `{id}`.
pub(crate) fn extract_path(url: &str) -> String {
    route_converter_re().replace_all(url, "{$name}").into_owned()
}

/// One required path parameter per `{name}` placeholder.
pub(crate) fn extract_path_params(path: &str) -> Value {
    let mut params = Map::new();
    for caps in path_param_re().captures_iter(path) {
        let name = &caps[1];
        params.insert(
            name.to_string(),
            json!({"name": name, "in": "path", "required": true}),
        );
    }
    Value::Object(params)
}

fn payload(schema: Value, description: Option<&Value>) -> Value {
    let mut param = Map::new();
    param.insert("name".into(), Value::from("payload"));
    param.insert("required".into(), Value::Bool(true));
    param.insert("in".into(), Value::from("body"));
    param.insert("schema".into(), schema);
    if let Some(description) = description.filter(|d| !d.is_null()) {
        param.insert("description".into(), description.clone());
    }
    Value::Object(param)
}

impl Swagger<'_> {
    /// The `payload` body parameter derived from the `expect` entries of a
    /// documentation level. The last entry wins.
    pub(crate) fn expected_params(&mut self, doc: &Map<String, Value>) -> AppResult<Value> {
        let mut params = Map::new();
        let Some(Value::Array(expect)) = doc.get("expect") else {
            return Ok(Value::Object(params));
        };

        for entry in expect {
            let param = match entry {
                Value::String(_) => payload(self.serialize_schema(entry)?, None),
                Value::Array(items) if items.len() == 2 && items[1].is_string() => {
                    payload(self.serialize_schema(&items[0])?, Some(&items[1]))
                }
                Value::Array(_) => payload(self.serialize_schema(entry)?, None),
                Value::Object(map) if map.contains_key("model") => payload(
                    self.serialize_schema(&map["model"])?,
                    map.get("description"),
                ),
                Value::Object(_) => payload(entry.clone(), None),
                _ => continue,
            };
            params.insert("payload".into(), param);
        }
        Ok(Value::Object(params))
    }

    /// Swagger parameter objects for a `name -> attributes` map.
    pub(crate) fn parameters_for(&mut self, params: &Value) -> AppResult<Vec<Value>> {
        let Value::Object(params) = params else {
            return Ok(Vec::new());
        };

        let mut out = Vec::with_capacity(params.len());
        for (name, param) in params {
            let Value::Object(attrs) = param else {
                continue;
            };
            let mut param = attrs.clone();
            param.insert("name".into(), Value::from(name.clone()));
            if !param.contains_key("type") && !param.contains_key("schema") {
                param.insert("type".into(), Value::from("string"));
            }
            if !param.contains_key("in") {
                param.insert("in".into(), Value::from("query"));
            }

            if let Some(schema) = param.get("schema").cloned() {
                if !schema.is_object() {
                    param.insert("schema".into(), self.serialize_schema(&schema)?);
                }
            } else {
                match param.get("type").cloned() {
                    Some(Value::Array(items)) => {
                        let item = items.first().and_then(Value::as_str).unwrap_or("string");
                        param.insert("type".into(), Value::from("array"));
                        param.insert("items".into(), json!({"type": swagger_type(item)}));
                    }
                    Some(Value::String(ty)) => {
                        param.insert("type".into(), Value::from(swagger_type(&ty)));
                    }
                    _ => {}
                }
            }
            out.push(Value::Object(param));
        }
        Ok(out)
    }
}
