#![warn(missing_docs)]

//! # RestPlus Core
//!
//! Documentation layer for REST APIs: resources, namespaces and models are
//! registered on an [`Api`], which compiles them into a Swagger 2.0 document.
//!
//! ```
//! use restplus_core::{Api, Field, HttpMethod, Namespace, Operation, Resource};
//!
//! let mut api = Api::default();
//! let mut ns = Namespace::new("todos").with_path("/todos");
//! let todo = ns.model("Todo", [("task", Field::string().required())]);
//! let list = Resource::new("TodoList").with_operation(
//!     HttpMethod::Get,
//!     Operation::new()
//!         .with_docstring("List all todos")
//!         .doc(ns.marshal_list_with(&todo, 200, None)),
//! );
//! ns.route("/", list).unwrap();
//! api.add_namespace(ns).unwrap();
//!
//! let doc = api.schema(false).unwrap();
//! assert_eq!(doc["paths"]["/todos"]["get"]["summary"], "List all todos");
//! ```

/// Shared error types.
pub mod error;

/// Recursive documentation merge.
pub mod merge;

/// Operation ids, endpoint names and definition keys.
pub mod naming;

/// Field kinds and their schemas.
pub mod fields;

/// Field masks.
pub mod mask;

/// Named models.
pub mod model;

/// Rendering values through models.
pub mod marshal;

/// Docstring summary/details parsing.
pub mod docstring;

/// Request validation descriptors.
pub mod validation;

/// Resources and their operations.
pub mod resource;

/// Namespaces.
pub mod namespace;

/// The top-level registry.
pub mod api;

/// Swagger 2.0 compilation.
pub mod swagger;

/// Declarative definition files.
pub mod loader;

pub use api::{Api, ApiInfo, ResponseTemplate, SecurityScheme, Tag};
pub use docstring::{parse_docstring, Docstring};
pub use error::{AppError, AppResult};
pub use fields::{DateFormat, Field, FieldKind};
pub use loader::{load_api, ApiDefinition};
pub use marshal::marshal;
pub use mask::Mask;
pub use merge::merge;
pub use model::{Model, ModelRef, ModelSource};
pub use namespace::{Namespace, ParamDoc, ParamLocation, RouteOptions};
pub use resource::{Body, DocFragment, HttpMethod, Operation, Resource};
pub use swagger::Swagger;
pub use validation::{Converter, ValidationDescriptor};
