#![deny(missing_docs)]

//! # Namespaces
//!
//! A [`Namespace`] groups resources under a path prefix and a documentation
//! tag, owns the models they use and produces documentation fragments
//! through shorthand builders (`expect`, `marshal_with`, `param`, ...).
//!
//! Every shorthand returns a plain [`DocFragment`]: applying the fragment with
//! `Resource::doc` or `Operation::doc` is the only way it takes effect.

use crate::api::ApiId;
use crate::error::{AppError, AppResult};
use crate::fields::Field;
use crate::mask::Mask;
use crate::model::{Model, ModelRef, ModelSource};
use crate::naming::default_endpoint;
use crate::resource::{Body, DocFragment, HttpMethod, Resource};
use crate::validation::{Converter, ValidationDescriptor};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Where a parameter lives in the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamLocation {
    /// `?name=value`
    #[default]
    Query,
    /// Request header.
    Header,
    /// Form field.
    FormData,
    /// Request body.
    Body,
    /// URL placeholder.
    Path,
    /// Cookie.
    Cookie,
}

impl ParamLocation {
    /// Swagger `in` value.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamLocation::Query => "query",
            ParamLocation::Header => "header",
            ParamLocation::FormData => "formData",
            ParamLocation::Body => "body",
            ParamLocation::Path => "path",
            ParamLocation::Cookie => "cookie",
        }
    }
}

/// Builder for a documented parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamDoc {
    location: ParamLocation,
    description: Option<String>,
    attrs: Map<String, Value>,
    pattern: Option<String>,
    convert: Option<Converter>,
}

impl ParamDoc {
    /// A parameter at `location`.
    pub fn new(location: ParamLocation) -> Self {
        Self {
            location,
            ..Self::default()
        }
    }

    /// A query parameter.
    pub fn query() -> Self {
        Self::new(ParamLocation::Query)
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the type (`int`, `str`, `bool`, `float` or a Swagger type name).
    pub fn with_type(self, ty: &str) -> Self {
        self.with_attr("type", ty)
    }

    /// Documents a list of `ty`.
    pub fn with_list_type(self, ty: &str) -> Self {
        self.with_attr("type", json!([ty]))
    }

    /// Sets any other Swagger parameter attribute.
    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    /// Marks the parameter as required.
    pub fn required(self) -> Self {
        self.with_attr("required", true)
    }

    /// Regular expression checked by request validation.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Conversion applied by request validation.
    pub fn with_converter(mut self, convert: Converter) -> Self {
        self.convert = Some(convert);
        self
    }

    fn into_fragment(self, name: &str) -> DocFragment {
        let mut param = self.attrs;
        param.insert("in".into(), Value::from(self.location.as_str()));
        if let Some(description) = &self.description {
            param.insert("description".into(), Value::from(description.clone()));
        }
        let mandatory = param
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let mut params = Map::new();
        params.insert(name.to_string(), Value::Object(param));
        let fragment = DocFragment::new(json!({ "params": params }));

        if self.pattern.is_none() && self.convert.is_none() {
            return fragment;
        }
        fragment.with_validation(ValidationDescriptor {
            name: name.to_string(),
            pattern: self.pattern,
            convert: self.convert.unwrap_or_default(),
            mandatory,
            description: self.description,
        })
    }
}

/// Options given when routing a resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteOptions {
    /// Methods to document; empty means every implemented method.
    pub methods: Vec<HttpMethod>,
    /// Documentation applied to the resource at routing time.
    pub doc: Option<DocFragment>,
}

/// A resource mounted on a namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredResource {
    /// The resource descriptor.
    pub resource: Resource,
    /// Full URL (namespace path included, Api prefix excluded).
    pub url: String,
    /// Routing options.
    pub options: RouteOptions,
    /// Endpoint name: `{namespace}_{snake_case(resource)}`.
    pub endpoint: String,
}

/// A named, path-prefixed group of resources and models.
#[derive(Debug, Clone)]
pub struct Namespace {
    name: String,
    description: Option<String>,
    path: String,
    validate: Option<bool>,
    public: bool,
    models: IndexMap<String, ModelRef>,
    resources: Vec<RegisteredResource>,
    apis: Vec<ApiId>,
}

impl Namespace {
    /// A public namespace mounted at the root.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            path: "/".into(),
            validate: None,
            public: true,
            models: IndexMap::new(),
            resources: Vec::new(),
            apis: Vec::new(),
        }
    }

    /// Sets the description shown on the namespace tag.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the path prefix. An empty path falls back to `/{name}/`.
    pub fn with_path(mut self, path: &str) -> Self {
        self.path = if path.is_empty() {
            format!("/{}/", self.name)
        } else {
            format!("{}/", path.trim_end_matches('/'))
        };
        self
    }

    /// Default `validate` flag for `expect` fragments.
    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = Some(validate);
        self
    }

    /// Hides the namespace from the public document.
    pub fn internal(mut self) -> Self {
        self.public = false;
        self
    }

    /// The namespace name (also its tag).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The tag description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The normalized path prefix.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the namespace shows in the public document.
    pub fn is_public(&self) -> bool {
        self.public
    }

    /// Owned models, by name.
    pub fn models(&self) -> &IndexMap<String, ModelRef> {
        &self.models
    }

    /// Mounted resources, in registration order.
    pub fn resources(&self) -> &[RegisteredResource] {
        &self.resources
    }

    /// Every Api this namespace was attached to.
    pub fn apis(&self) -> &[ApiId] {
        &self.apis
    }

    pub(crate) fn attach(&mut self, api: ApiId) {
        if !self.apis.contains(&api) {
            self.apis.push(api);
        }
    }

    /// Full URL for a route relative to this namespace.
    fn full_url(&self, url: &str) -> AppResult<String> {
        if !url.starts_with('/') {
            return Err(AppError::Configuration(format!(
                "Route '{}' must start with '/'",
                url
            )));
        }
        Ok(if url.len() > 1 {
            format!("{}{}", self.path.trim_end_matches('/'), url)
        } else if self.path.len() > 1 {
            self.path.trim_end_matches('/').to_string()
        } else {
            self.path.clone()
        })
    }

    /// Mounts `resource` at `url`, relative to the namespace path.
    pub fn route(&mut self, url: &str, resource: Resource) -> AppResult<()> {
        self.route_with(url, resource, RouteOptions::default())
    }

    /// [`route`](Self::route) with explicit options.
    pub fn route_with(
        &mut self,
        url: &str,
        mut resource: Resource,
        options: RouteOptions,
    ) -> AppResult<()> {
        let full = self.full_url(url)?;
        if let Some(doc) = &options.doc {
            resource = resource.doc(doc.clone());
        }
        self.add_resource(resource, &full, options)
    }

    /// Mounts `resource` at the absolute `url`.
    ///
    /// A resource carrying a fixed path must be mounted exactly there.
    pub fn add_resource(
        &mut self,
        mut resource: Resource,
        url: &str,
        options: RouteOptions,
    ) -> AppResult<()> {
        match resource.path() {
            None => resource.set_path(url.to_string()),
            Some(fixed) if fixed != url => {
                return Err(AppError::Configuration(format!(
                    "Resource {} is fixed at '{}' but routed to '{}'",
                    resource.name(),
                    fixed,
                    url
                )))
            }
            Some(_) => {}
        }
        let endpoint = default_endpoint(&self.name, resource.name());
        tracing::debug!(namespace = %self.name, %url, %endpoint, "registered resource");
        self.resources.push(RegisteredResource {
            resource,
            url: url.to_string(),
            options,
            endpoint,
        });
        Ok(())
    }

    /// Registers a model. A model with the same name is replaced.
    pub fn add_model(&mut self, model: Model) -> ModelRef {
        let model = Arc::new(model);
        tracing::debug!(namespace = %self.name, model = model.name(), "registered model");
        self.models.insert(model.name().to_string(), model.clone());
        model
    }

    /// Registers a fresh model.
    pub fn model<I, K>(&mut self, name: &str, fields: I) -> ModelRef
    where
        I: IntoIterator<Item = (K, Field)>,
        K: Into<String>,
    {
        self.add_model(Model::new(name, fields))
    }

    /// Registers a fresh model carrying a default mask.
    pub fn model_with_mask<I, K>(&mut self, name: &str, fields: I, mask: Mask) -> ModelRef
    where
        I: IntoIterator<Item = (K, Field)>,
        K: Into<String>,
    {
        self.add_model(Model::new(name, fields).with_mask(mask))
    }

    /// Registers a flattened copy of `sources`.
    pub fn clone_model(&mut self, name: &str, sources: &[ModelSource]) -> ModelRef {
        self.add_model(Model::cloned(name, sources))
    }

    /// Registers a model inheriting from the model sources.
    pub fn inherit(&mut self, name: &str, sources: Vec<ModelSource>) -> ModelRef {
        self.add_model(Model::inherit(name, sources))
    }

    /// Arbitrary documentation.
    pub fn doc(&self, doc: Value) -> DocFragment {
        DocFragment::new(doc)
    }

    /// Sets the operation id.
    pub fn doc_id(&self, id: &str) -> DocFragment {
        DocFragment::new(json!({ "id": id }))
    }

    /// Expected request bodies.
    pub fn expect<I, B>(&self, inputs: I) -> DocFragment
    where
        I: IntoIterator<Item = B>,
        B: Into<Body>,
    {
        let expect: Vec<Value> = inputs.into_iter().map(|b| b.into().to_value()).collect();
        self.expect_values(expect, None)
    }

    /// Expected request body with a description.
    pub fn expect_described(&self, input: impl Into<Body>, description: &str) -> DocFragment {
        let entry = json!({ "model": input.into().to_value(), "description": description });
        self.expect_values(vec![entry], None)
    }

    /// Expected request bodies with an explicit `validate` flag.
    pub fn expect_validated<I, B>(&self, inputs: I, validate: bool) -> DocFragment
    where
        I: IntoIterator<Item = B>,
        B: Into<Body>,
    {
        let expect: Vec<Value> = inputs.into_iter().map(|b| b.into().to_value()).collect();
        self.expect_values(expect, Some(validate))
    }

    fn expect_values(&self, expect: Vec<Value>, validate: Option<bool>) -> DocFragment {
        let mut doc = Map::new();
        if let Some(validate) = validate.or(self.validate) {
            doc.insert("validate".into(), Value::Bool(validate));
        }
        doc.insert("expect".into(), Value::Array(expect));
        DocFragment::new(Value::Object(doc))
    }

    /// Documents the response model for `code`.
    pub fn marshal_with(
        &self,
        model: &ModelRef,
        code: u16,
        description: Option<&str>,
    ) -> DocFragment {
        response_fragment(code, json!([description, Body::from(model).to_value()]))
    }

    /// Documents a list of `model` as the response for `code`.
    pub fn marshal_list_with(
        &self,
        model: &ModelRef,
        code: u16,
        description: Option<&str>,
    ) -> DocFragment {
        response_fragment(code, json!([description, Body::list(model).to_value()]))
    }

    /// Documents one parameter.
    pub fn param(&self, name: &str, param: ParamDoc) -> DocFragment {
        param.into_fragment(name)
    }

    /// Documents one expected response.
    pub fn response(&self, code: u16, description: &str, model: Option<Body>) -> DocFragment {
        let value = match model {
            Some(model) => json!([description, model.to_value()]),
            None => Value::from(description),
        };
        response_fragment(code, value)
    }

    /// Documents one expected request header.
    pub fn header(&self, name: &str, description: &str) -> DocFragment {
        self.param(
            name,
            ParamDoc::new(ParamLocation::Header).with_description(description),
        )
    }

    /// Alternative security requirements, by scheme name.
    pub fn security<I, S>(&self, names: I) -> DocFragment
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<Value> = names.into_iter().map(|s| Value::String(s.into())).collect();
        DocFragment::new(json!({ "security": names }))
    }

    /// Marks the target as deprecated.
    pub fn deprecated(&self) -> DocFragment {
        DocFragment::new(json!({ "deprecated": true }))
    }

    /// Hides the target from the document.
    pub fn hide(&self) -> DocFragment {
        DocFragment::hidden()
    }
}

fn response_fragment(code: u16, value: Value) -> DocFragment {
    let mut responses = Map::new();
    responses.insert(code.to_string(), value);
    DocFragment::new(json!({ "responses": responses }))
}
