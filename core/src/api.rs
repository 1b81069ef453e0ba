//! # Api Aggregator
//!
//! The [`Api`] owns every attached [`Namespace`], global documentation
//! metadata and security declarations, and caches the compiled Swagger
//! document.
//!
//! Every mutation bumps a revision stamp; a cached document is reused only
//! while its stamp matches the current revision.

use crate::error::{AppError, AppResult};
use crate::model::{Model, ModelRef};
use crate::namespace::Namespace;
use crate::naming::{default_id, OperationIdFn};
use crate::swagger::Swagger;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_API_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an [`Api`], recorded by the namespaces attached to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ApiId(u64);

/// Global `info` metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiInfo {
    /// Document title.
    pub title: String,
    /// Api version.
    pub version: String,
    /// Description.
    pub description: Option<String>,
    /// Terms of service URL.
    pub terms_url: Option<String>,
    /// Contact name.
    pub contact: Option<String>,
    /// Contact email.
    pub contact_email: Option<String>,
    /// Contact URL.
    pub contact_url: Option<String>,
    /// License name.
    pub license: Option<String>,
    /// License URL.
    pub license_url: Option<String>,
}

impl Default for ApiInfo {
    fn default() -> Self {
        Self {
            title: "API".into(),
            version: "1.0".into(),
            description: None,
            terms_url: None,
            contact: None,
            contact_email: None,
            contact_url: None,
            license: None,
            license_url: None,
        }
    }
}

/// An explicitly declared tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag name.
    pub name: String,
    /// Tag description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&str> for Tag {
    fn from(name: &str) -> Self {
        Tag {
            name: name.to_string(),
            description: None,
        }
    }
}

impl From<(&str, &str)> for Tag {
    fn from((name, description): (&str, &str)) -> Self {
        Tag {
            name: name.to_string(),
            description: Some(description.to_string()),
        }
    }
}

/// A security scheme declaration (`securityDefinitions` entry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SecurityScheme {
    /// HTTP basic authentication.
    #[serde(rename = "basic")]
    Basic {
        /// Description.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    /// API key in a header or the query string.
    #[serde(rename = "apiKey")]
    ApiKey {
        /// Header or query parameter name.
        name: String,
        /// `header` or `query`.
        #[serde(rename = "in")]
        location: String,
        /// Description.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    /// OAuth2.
    #[serde(rename = "oauth2")]
    OAuth2 {
        /// `implicit`, `password`, `application` or `accessCode`.
        flow: String,
        /// Authorization endpoint.
        #[serde(
            default,
            rename = "authorizationUrl",
            skip_serializing_if = "Option::is_none"
        )]
        authorization_url: Option<String>,
        /// Token endpoint.
        #[serde(default, rename = "tokenUrl", skip_serializing_if = "Option::is_none")]
        token_url: Option<String>,
        /// Scope name to description.
        #[serde(default)]
        scopes: IndexMap<String, String>,
        /// Description.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

/// A shared response emitted under the top-level `responses` key.
///
/// Operations whose docstring carries `:raises Name:` reference the template
/// called `Name` for its `code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseTemplate {
    /// Status code used when an operation raises this response.
    #[serde(default)]
    pub code: Option<String>,
    /// Response description.
    pub description: String,
    /// Body encoded like any other documented body (`"Model"`, `["Model"]`
    /// or an inline schema).
    #[serde(default)]
    pub schema: Option<Value>,
    /// Response headers.
    #[serde(default)]
    pub headers: IndexMap<String, Value>,
}

/// The top-level documentation registry.
#[derive(Debug)]
pub struct Api {
    id: ApiId,
    info: ApiInfo,
    authorizations: IndexMap<String, SecurityScheme>,
    security: Value,
    swagger_path: String,
    default_id: OperationIdFn,
    validate: Option<bool>,
    tags: Vec<Tag>,
    prefix: String,
    produces: Vec<String>,
    namespaces: Vec<Namespace>,
    models: IndexMap<String, ModelRef>,
    responses: IndexMap<String, ResponseTemplate>,
    revision: u64,
    cache: Option<(u64, Arc<Value>)>,
    internal_cache: Option<(u64, Arc<Value>)>,
}

impl Default for Api {
    fn default() -> Self {
        Self::new(ApiInfo::default())
    }
}

impl Api {
    /// An empty Api.
    pub fn new(info: ApiInfo) -> Self {
        Self {
            id: ApiId(NEXT_API_ID.fetch_add(1, Ordering::Relaxed)),
            info,
            authorizations: IndexMap::new(),
            security: Value::Null,
            swagger_path: "/swagger.json".into(),
            default_id,
            validate: None,
            tags: Vec::new(),
            prefix: String::new(),
            produces: vec!["application/json".into()],
            namespaces: Vec::new(),
            models: IndexMap::new(),
            responses: IndexMap::new(),
            revision: 0,
            cache: None,
            internal_cache: None,
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    /// Declares a security scheme.
    pub fn with_authorization(mut self, name: &str, scheme: SecurityScheme) -> Self {
        self.authorizations.insert(name.to_string(), scheme);
        self.touch();
        self
    }

    /// Default security requirement (a scheme name, a requirement map or a list).
    pub fn with_security(mut self, security: Value) -> Self {
        self.security = security;
        self.touch();
        self
    }

    /// Path the document is served at.
    pub fn with_swagger_path(mut self, path: &str) -> Self {
        self.swagger_path = path.to_string();
        self.touch();
        self
    }

    /// Operation id generator.
    pub fn with_default_id(mut self, generator: OperationIdFn) -> Self {
        self.default_id = generator;
        self.touch();
        self
    }

    /// Api-wide request validation flag.
    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = Some(validate);
        self.touch();
        self
    }

    /// Declares a tag.
    pub fn with_tag(mut self, tag: impl Into<Tag>) -> Self {
        self.tags.push(tag.into());
        self.touch();
        self
    }

    /// Base path of every route.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self.touch();
        self
    }

    /// Declares a shared response template.
    pub fn with_response(mut self, name: &str, template: ResponseTemplate) -> Self {
        self.responses.insert(name.to_string(), template);
        self.touch();
        self
    }

    /// Identity recorded by attached namespaces.
    pub fn id(&self) -> ApiId {
        self.id
    }

    /// Global metadata.
    pub fn info(&self) -> &ApiInfo {
        &self.info
    }

    /// Declared security schemes.
    pub fn authorizations(&self) -> &IndexMap<String, SecurityScheme> {
        &self.authorizations
    }

    /// Default security requirement.
    pub fn security(&self) -> &Value {
        &self.security
    }

    /// Path the document is served at.
    pub fn swagger_path(&self) -> &str {
        &self.swagger_path
    }

    /// Operation id for a resource method.
    pub fn operation_id(&self, resource: &str, method: &str) -> String {
        (self.default_id)(resource, method)
    }

    /// Api-wide request validation flag.
    pub fn validate(&self) -> Option<bool> {
        self.validate
    }

    /// Declared tags.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// The base path as declared.
    pub fn base_path(&self) -> &str {
        &self.prefix
    }

    /// Response media types.
    pub fn produces(&self) -> &[String] {
        &self.produces
    }

    /// Attached namespaces, in attachment order.
    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    /// Shared response templates.
    pub fn response_templates(&self) -> &IndexMap<String, ResponseTemplate> {
        &self.responses
    }

    /// Current revision stamp.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Mutable access to the first attached namespace with this name. Counts
    /// as a mutation; resources routed through it are checked again at the
    /// next compilation.
    pub fn namespace_mut(&mut self, name: &str) -> Option<&mut Namespace> {
        self.touch();
        self.namespaces.iter_mut().find(|ns| ns.name() == name)
    }

    /// Registers a model directly on the Api.
    pub fn add_model(&mut self, model: Model) -> ModelRef {
        let model = Arc::new(model);
        self.models.insert(model.name().to_string(), model.clone());
        self.touch();
        model
    }

    /// Every known model by name: Api-level models, then the models of each
    /// namespace in attachment order. Later registrations win.
    pub fn models(&self) -> IndexMap<String, ModelRef> {
        let mut models = self.models.clone();
        for ns in &self.namespaces {
            for (name, model) in ns.models() {
                models.insert(name.clone(), model.clone());
            }
        }
        models
    }

    /// Every registered `(endpoint, url)` pair, the swagger resource last.
    pub fn endpoints(&self) -> Vec<(String, String)> {
        let mut endpoints: Vec<(String, String)> = self
            .namespaces
            .iter()
            .flat_map(|ns| ns.resources())
            .map(|r| (r.endpoint.clone(), r.url.clone()))
            .collect();
        endpoints.push(("specs".into(), self.swagger_path.clone()));
        endpoints
    }

    /// Checks a namespace against this Api without attaching it.
    pub fn check_namespace(&self, ns: &Namespace) -> AppResult<()> {
        for registered in ns.resources() {
            for name in registered.resource.security_names() {
                if !self.authorizations.contains_key(&name) {
                    return Err(AppError::Security(format!(
                        "Namespace {} uses security '{}' missing from the Api authorizations",
                        ns.name(),
                        name
                    )));
                }
            }
            if let Some(fixed) = registered.resource.path() {
                if fixed != registered.url {
                    return Err(AppError::Configuration(format!(
                        "Resource {} is fixed at '{}' but routed to '{}'",
                        registered.resource.name(),
                        fixed,
                        registered.url
                    )));
                }
            }
        }
        Ok(())
    }

    /// Attaches a namespace. Namespaces sharing a name are kept side by side.
    ///
    /// Fails, leaving the Api unchanged, when a resource references an
    /// undeclared security scheme or sits at a conflicting fixed path.
    pub fn add_namespace(&mut self, mut ns: Namespace) -> AppResult<()> {
        self.check_namespace(&ns)?;
        ns.attach(self.id);
        tracing::debug!(
            namespace = ns.name(),
            resources = ns.resources().len(),
            models = ns.models().len(),
            "attached namespace"
        );
        self.namespaces.push(ns);
        self.touch();
        Ok(())
    }

    /// Drops cached documents.
    pub fn invalidate(&mut self) {
        self.cache = None;
        self.internal_cache = None;
    }

    /// The compiled document, recomputed when the registry changed since the
    /// last compilation.
    pub fn schema(&mut self, show_internal: bool) -> AppResult<Arc<Value>> {
        let revision = self.revision;
        let cached = if show_internal {
            &self.internal_cache
        } else {
            &self.cache
        };
        if let Some((stamp, doc)) = cached {
            if *stamp == revision {
                tracing::debug!(show_internal, revision, "swagger cache hit");
                return Ok(doc.clone());
            }
        }

        for ns in &self.namespaces {
            self.check_namespace(ns)?;
        }
        tracing::debug!(show_internal, revision, "compiling swagger document");
        let doc = Arc::new(Swagger::new(self).as_dict(show_internal)?);
        let slot = if show_internal {
            &mut self.internal_cache
        } else {
            &mut self.cache
        };
        *slot = Some((revision, doc.clone()));
        Ok(doc)
    }

    /// Serves the document for a raw `internal` flag (query or path value).
    pub fn serve_swagger(&mut self, internal: Option<&str>) -> AppResult<Arc<Value>> {
        self.schema(parse_internal_flag(internal))
    }
}

/// `true` when the first four characters equal `true`, ignoring case.
pub fn parse_internal_flag(flag: Option<&str>) -> bool {
    flag.and_then(|f| f.get(..4))
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("true"))
}
