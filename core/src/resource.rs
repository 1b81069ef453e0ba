#![deny(missing_docs)]

//! # Resources
//!
//! A [`Resource`] is the documentation-side descriptor of a request handler:
//! its name, the HTTP methods it implements and the documentation metadata
//! accumulated on the class and on every method.
//!
//! Metadata is stored as nested JSON maps and grows by repeated
//! [`merge`](crate::merge::merge) of [`DocFragment`]s, the latest fragment
//! winning for each leaf key. A fragment of `false` hides the target.

use crate::merge::merge_into;
use crate::model::ModelRef;
use crate::validation::{Converter, ValidationDescriptor};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// HTTP methods a resource may implement. `OPTIONS` is never documented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
    /// PATCH
    Patch,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
}

impl HttpMethod {
    /// Every method, in documentation order.
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Patch,
        HttpMethod::Head,
        HttpMethod::Options,
    ];

    /// Lowercase name, as used for documentation keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Delete => "delete",
            HttpMethod::Patch => "patch",
            HttpMethod::Head => "head",
            HttpMethod::Options => "options",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown HTTP method: {}", s))
    }
}

/// A documented body or response shape.
///
/// Encoded in metadata as a model name (`"Todo"`), a single-element list of
/// a model name (`["Todo"]`) or an inline schema object.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// A registered model.
    Model(String),
    /// A list of a registered model.
    List(String),
    /// An inline JSON schema.
    Inline(Value),
}

impl Body {
    /// A list of `model`.
    pub fn list(model: &ModelRef) -> Self {
        Body::List(model.name().to_string())
    }

    /// Metadata encoding of the body.
    pub fn to_value(&self) -> Value {
        match self {
            Body::Model(name) => Value::from(name.clone()),
            Body::List(name) => Value::Array(vec![Value::from(name.clone())]),
            Body::Inline(schema) => schema.clone(),
        }
    }
}

impl From<&ModelRef> for Body {
    fn from(model: &ModelRef) -> Self {
        Body::Model(model.name().to_string())
    }
}

impl From<&str> for Body {
    fn from(name: &str) -> Self {
        Body::Model(name.to_string())
    }
}

/// A piece of documentation metadata, applied to a resource or an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct DocFragment {
    doc: Value,
    validations: Vec<ValidationDescriptor>,
}

impl DocFragment {
    /// Wraps a metadata map (or `false` to hide).
    pub fn new(doc: Value) -> Self {
        Self {
            doc,
            validations: Vec::new(),
        }
    }

    /// The hiding fragment.
    pub fn hidden() -> Self {
        Self::new(Value::Bool(false))
    }

    /// Attaches a validation descriptor to the fragment.
    pub fn with_validation(mut self, descriptor: ValidationDescriptor) -> Self {
        self.validations.push(descriptor);
        self
    }

    /// The raw metadata.
    pub fn value(&self) -> &Value {
        &self.doc
    }

    /// Validation descriptors carried along.
    pub fn validations(&self) -> &[ValidationDescriptor] {
        &self.validations
    }

    /// Combines two fragments, `other` winning on conflicting keys.
    pub fn and(mut self, other: DocFragment) -> Self {
        merge_into(&mut self.doc, &other.doc);
        self.validations.extend(other.validations);
        self
    }
}

impl From<Value> for DocFragment {
    fn from(doc: Value) -> Self {
        Self::new(doc)
    }
}

/// Rewrites a bare parameter description into `{description: ...}`.
fn unshortcut_params_description(doc: &mut Map<String, Value>) {
    if let Some(Value::Object(params)) = doc.get_mut("params") {
        for value in params.values_mut() {
            if let Value::String(description) = value {
                let mut expanded = Map::new();
                expanded.insert("description".into(), Value::String(description.clone()));
                *value = Value::Object(expanded);
            }
        }
    }
}

/// Moves the deprecated `parser`/`body` keys into the `expect` list.
fn handle_deprecations(doc: &mut Map<String, Value>) {
    for key in ["parser", "body"] {
        if let Some(value) = doc.shift_remove(key) {
            tracing::warn!(key, "The {} attribute is deprecated, use expect instead", key);
            let mut expect = match doc.remove("expect") {
                Some(Value::Array(items)) => items,
                Some(single) => vec![single],
                None => Vec::new(),
            };
            expect.push(value);
            doc.insert("expect".into(), Value::Array(expect));
        }
    }
}

/// `expect` is always a list of entries.
fn wrap_expect(doc: &mut Map<String, Value>) {
    if let Some(expect) = doc.get_mut("expect") {
        if !expect.is_array() {
            *expect = Value::Array(vec![expect.take()]);
        }
    }
}

fn normalize_level(doc: &mut Map<String, Value>) {
    unshortcut_params_description(doc);
    handle_deprecations(doc);
    wrap_expect(doc);
}

/// Normalizes a fragment: the top level plus every HTTP method sub-map.
pub(crate) fn normalize(doc: &mut Value) {
    let Value::Object(map) = doc else {
        return;
    };
    normalize_level(map);
    for method in HttpMethod::ALL {
        if let Some(Value::Object(method_doc)) = map.get_mut(method.as_str()) {
            normalize_level(method_doc);
        }
    }
}

fn apply(target: &mut Value, fragment: &DocFragment) {
    let mut doc = fragment.doc.clone();
    normalize(&mut doc);
    merge_into(target, &doc);
}

/// Documentation attached to one HTTP method of a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    docstring: Option<String>,
    doc: Value,
    validations: IndexMap<String, ValidationDescriptor>,
}

impl Default for Operation {
    fn default() -> Self {
        Self {
            docstring: None,
            doc: Value::Object(Map::new()),
            validations: IndexMap::new(),
        }
    }
}

impl Operation {
    /// An undocumented operation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Free-form text parsed into summary and details.
    pub fn with_docstring(mut self, docstring: impl Into<String>) -> Self {
        self.docstring = Some(docstring.into());
        self
    }

    /// Merges a documentation fragment.
    pub fn doc(mut self, fragment: impl Into<DocFragment>) -> Self {
        let fragment = fragment.into();
        apply(&mut self.doc, &fragment);
        for descriptor in fragment.validations {
            self.validations.insert(descriptor.name.clone(), descriptor);
        }
        self
    }

    /// The docstring, if any.
    pub fn docstring(&self) -> Option<&str> {
        self.docstring.as_deref()
    }

    /// Accumulated metadata (`false` when hidden).
    pub fn metadata(&self) -> &Value {
        &self.doc
    }

    /// Validation descriptors by parameter name.
    pub fn validations(&self) -> &IndexMap<String, ValidationDescriptor> {
        &self.validations
    }
}

/// Documentation-side descriptor of a request handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    name: String,
    path: Option<String>,
    public: bool,
    doc: Value,
    methods: BTreeMap<HttpMethod, Operation>,
    validations: IndexMap<String, ValidationDescriptor>,
}

impl Resource {
    /// A public resource with no methods.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            public: true,
            doc: Value::Object(Map::new()),
            methods: BTreeMap::new(),
            validations: IndexMap::new(),
        }
    }

    /// Declares an implemented HTTP method.
    pub fn with_operation(mut self, method: HttpMethod, operation: Operation) -> Self {
        self.methods.insert(method, operation);
        self
    }

    /// Declares an implemented HTTP method with default documentation.
    pub fn with_method(self, method: HttpMethod) -> Self {
        self.with_operation(method, Operation::new())
    }

    /// Fixes the canonical path; every registration must use it.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Marks the resource as internal.
    pub fn internal(mut self) -> Self {
        self.public = false;
        self
    }

    /// Merges a class-level documentation fragment.
    pub fn doc(mut self, fragment: impl Into<DocFragment>) -> Self {
        let fragment = fragment.into();
        apply(&mut self.doc, &fragment);
        for descriptor in fragment.validations {
            self.validations.insert(descriptor.name.clone(), descriptor);
        }
        self
    }

    /// The resource name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fixed path, if any.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub(crate) fn set_path(&mut self, path: String) {
        self.path = Some(path);
    }

    /// Whether the resource shows in the public document.
    pub fn is_public(&self) -> bool {
        self.public
    }

    /// Class-level metadata (`false` when hidden).
    pub fn metadata(&self) -> &Value {
        &self.doc
    }

    /// Documented methods, `OPTIONS` excluded.
    pub fn http_methods(&self) -> impl Iterator<Item = (HttpMethod, &Operation)> {
        self.methods
            .iter()
            .filter(|(method, _)| **method != HttpMethod::Options)
            .map(|(method, op)| (*method, op))
    }

    /// Class-level validation descriptors by parameter name.
    pub fn validations(&self) -> &IndexMap<String, ValidationDescriptor> {
        &self.validations
    }

    /// Every security scheme name referenced by the class or any method.
    pub fn security_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        collect_security_names(self.doc.get("security"), &mut names);
        for (method, operation) in self.http_methods() {
            collect_security_names(
                self.doc.get(method.as_str()).and_then(|d| d.get("security")),
                &mut names,
            );
            collect_security_names(operation.doc.get("security"), &mut names);
        }
        names
    }

    /// Validation descriptors for `method`.
    ///
    /// Explicit descriptors (class level, then method level) come first;
    /// every other documented parameter gets one derived from its metadata.
    pub fn validation_descriptors(
        &self,
        method: HttpMethod,
    ) -> IndexMap<String, ValidationDescriptor> {
        let mut descriptors = self.validations.clone();
        let operation = self.methods.get(&method);
        if let Some(operation) = operation {
            descriptors.extend(operation.validations.clone());
        }

        let mut params = Value::Object(Map::new());
        let sources = [
            self.doc.get("params"),
            self.doc.get(method.as_str()).and_then(|d| d.get("params")),
            operation.and_then(|o| o.doc.get("params")),
        ];
        for source in sources.into_iter().flatten() {
            merge_into(&mut params, source);
        }
        if let Value::Object(params) = params {
            for (name, param) in &params {
                descriptors
                    .entry(name.clone())
                    .or_insert_with(|| derived_descriptor(name, param));
            }
        }
        descriptors
    }
}

fn derived_descriptor(name: &str, param: &Value) -> ValidationDescriptor {
    let convert = match param.get("type") {
        Some(Value::Array(_)) => Converter::List,
        Some(Value::String(ty)) => match ty.as_str() {
            "int" | "integer" => Converter::Integer,
            "float" | "number" => Converter::Float,
            "bool" | "boolean" => Converter::Boolean,
            "array" => Converter::List,
            _ => Converter::String,
        },
        _ => Converter::String,
    };
    let mandatory = param.get("required").and_then(Value::as_bool).unwrap_or(false)
        || param.get("in").and_then(Value::as_str) == Some("path");
    ValidationDescriptor {
        name: name.to_string(),
        pattern: param.get("pattern").and_then(Value::as_str).map(str::to_string),
        convert,
        mandatory,
        description: param
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

fn collect_security_names(value: Option<&Value>, names: &mut Vec<String>) {
    match value {
        Some(Value::String(name)) => names.push(name.clone()),
        Some(Value::Object(map)) => names.extend(map.keys().cloned()),
        Some(Value::Array(items)) => {
            for item in items {
                collect_security_names(Some(item), names);
            }
        }
        _ => {}
    }
}
