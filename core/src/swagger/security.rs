//! Security requirement normalization.

use crate::api::Api;
use crate::fields::is_truthy;
use serde_json::{Map, Value};

/// One requirement: a scheme name becomes `{name: []}`, map values are
/// wrapped into scope lists.
pub(crate) fn security_requirement(value: &Value) -> Option<Value> {
    match value {
        Value::String(name) => {
            let mut requirement = Map::new();
            requirement.insert(name.clone(), Value::Array(Vec::new()));
            Some(Value::Object(requirement))
        }
        Value::Object(map) => Some(Value::Object(
            map.iter()
                .map(|(scheme, scopes)| {
                    let scopes = match scopes {
                        Value::Array(_) => scopes.clone(),
                        other => Value::Array(vec![other.clone()]),
                    };
                    (scheme.clone(), scopes)
                })
                .collect(),
        )),
        _ => None,
    }
}

/// A list of alternative requirements. A falsy value means "no security"
/// and yields an empty list.
pub(crate) fn security_requirements(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items.iter().filter_map(security_requirement).collect()),
        other if is_truthy(other) => security_requirement(other).map(|r| vec![r]),
        _ => Some(Vec::new()),
    }
}

/// Method-level security overrides class-level security.
pub(crate) fn security_for(class_doc: &Map<String, Value>, method_doc: &Map<String, Value>) -> Option<Vec<Value>> {
    let mut security = None;
    if let Some(auth) = class_doc.get("security") {
        security = security_requirements(auth);
    }
    if let Some(auth) = method_doc.get("security") {
        security = security_requirements(auth);
    }
    security
}

/// `securityDefinitions`, if any scheme is declared.
pub(crate) fn security_definitions(api: &Api) -> Option<Value> {
    if api.authorizations().is_empty() {
        return None;
    }
    serde_json::to_value(api.authorizations()).ok()
}
