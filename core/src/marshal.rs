//! # Marshalling
//!
//! Renders raw JSON data through a model: every field reads its value from
//! the input, formats it and lands under its own key in declaration order.

use crate::error::AppResult;
use crate::fields::Field;
use crate::mask::Mask;
use crate::model::Model;
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Marshals `data` (an object or a list of objects) through `model`.
///
/// When a mask is given, the model fields are projected through it first;
/// unknown mask entries are a configuration error.
pub fn marshal(data: &Value, model: &Model, mask: Option<&Mask>) -> AppResult<Value> {
    let resolved = model.resolved_fields();
    let fields = match mask.or(model.mask()) {
        Some(mask) if !mask.is_empty() => mask.apply_to_fields(&resolved)?,
        _ => resolved,
    };
    marshal_fields(data, &fields, false)
}

/// Marshals `data` through a raw field mapping.
///
/// With `skip_none`, keys whose output is `null` are left out.
pub fn marshal_fields(
    data: &Value,
    fields: &IndexMap<String, Field>,
    skip_none: bool,
) -> AppResult<Value> {
    if let Value::Array(items) = data {
        return items
            .iter()
            .map(|item| marshal_fields(item, fields, skip_none))
            .collect::<AppResult<Vec<_>>>()
            .map(Value::Array);
    }

    let mut out = Map::new();
    for (key, field) in fields {
        let value = field.output(key, data)?;
        if skip_none && value.is_null() {
            continue;
        }
        out.insert(key.clone(), value);
    }
    tracing::trace!(fields = fields.len(), "marshalled object");
    Ok(Value::Object(out))
}
