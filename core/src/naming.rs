//! # Naming Utilities
//!
//! Operation ids, endpoint names and definition keys.

use heck::{ToSnakeCase, ToUpperCamelCase};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left untouched when quoting a definition key inside a `$ref`.
const REF_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Signature of an operation id generator: `(resource name, lowercase method) -> id`.
pub type OperationIdFn = fn(&str, &str) -> String;

/// Transforms a CamelCase identifier into its lowercase underscore form.
///
/// e.g. `TodoItem` -> `todo_item`
pub fn camel_to_dash(value: &str) -> String {
    value.to_snake_case()
}

/// Default operation id generator: `{method}_{camel_to_dash(resource)}`.
pub fn default_id(resource: &str, method: &str) -> String {
    format!("{}_{}", method, camel_to_dash(resource))
}

/// Default endpoint name for a resource mounted on a namespace.
pub fn default_endpoint(namespace: &str, resource: &str) -> String {
    format!("{}_{}", namespace, camel_to_dash(resource))
}

/// Key under which a model is stored in `definitions`.
///
/// Model names are PascalCased so that `$ref` URIs never need to carry
/// spaces or other separators.
pub fn definition_key(name: &str) -> String {
    name.to_upper_camel_case()
}

/// JSON reference to a model definition.
pub fn definition_reference(name: &str) -> String {
    format!(
        "#/definitions/{}",
        utf8_percent_encode(&definition_key(name), REF_SAFE)
    )
}
