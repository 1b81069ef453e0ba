#![deny(missing_docs)]

//! # Models
//!
//! A [`Model`] is a named, ordered set of [`Field`]s with optional parent
//! models. Models are shared as [`ModelRef`] (`Arc<Model>`) so that fields
//! and registries can point at the same definition.
//!
//! Two composition strategies exist:
//! - [`Model::cloned`] flattens every source into one standalone model,
//! - [`Model::inherit`] keeps the sources as parents and is compiled into an
//!   `allOf` schema.

use crate::error::AppResult;
use crate::fields::Field;
use crate::mask::Mask;
use crate::naming::definition_reference;
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Shared handle to a model.
pub type ModelRef = Arc<Model>;

/// Input to [`Model::cloned`] and [`Model::inherit`].
#[derive(Debug, Clone)]
pub enum ModelSource {
    /// An existing model.
    Model(ModelRef),
    /// A plain field mapping.
    Fields(IndexMap<String, Field>),
}

impl From<ModelRef> for ModelSource {
    fn from(model: ModelRef) -> Self {
        ModelSource::Model(model)
    }
}

impl From<&ModelRef> for ModelSource {
    fn from(model: &ModelRef) -> Self {
        ModelSource::Model(model.clone())
    }
}

impl From<IndexMap<String, Field>> for ModelSource {
    fn from(fields: IndexMap<String, Field>) -> Self {
        ModelSource::Fields(fields)
    }
}

/// A named documentation schema.
#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    fields: IndexMap<String, Field>,
    parents: Vec<ModelRef>,
    mask: Option<Mask>,
}

impl Model {
    /// Creates a model from its own fields.
    pub fn new<I, K>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Field)>,
        K: Into<String>,
    {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(|(k, f)| (k.into(), f)).collect(),
            parents: Vec::new(),
            mask: None,
        }
    }

    /// Flattens the resolved fields of every source into a new standalone
    /// model. Later sources override earlier ones.
    pub fn cloned(name: impl Into<String>, sources: &[ModelSource]) -> Self {
        let mut fields = IndexMap::new();
        for source in sources {
            match source {
                ModelSource::Model(model) => fields.extend(model.resolved_fields()),
                ModelSource::Fields(own) => {
                    fields.extend(own.iter().map(|(k, f)| (k.clone(), f.clone())))
                }
            }
        }
        Self {
            name: name.into(),
            fields,
            parents: Vec::new(),
            mask: None,
        }
    }

    /// Creates a model whose parents are the model sources and whose own
    /// fields are the union of the field mapping sources.
    pub fn inherit(name: impl Into<String>, sources: Vec<ModelSource>) -> Self {
        let mut parents = Vec::new();
        let mut fields = IndexMap::new();
        for source in sources {
            match source {
                ModelSource::Model(model) => parents.push(model),
                ModelSource::Fields(own) => fields.extend(own),
            }
        }
        Self {
            name: name.into(),
            fields,
            parents,
            mask: None,
        }
    }

    /// Attaches a default mask, documented as `x-mask`.
    pub fn with_mask(mut self, mask: Mask) -> Self {
        self.mask = Some(mask);
        self
    }

    /// The model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Own fields, in declaration order.
    pub fn fields(&self) -> &IndexMap<String, Field> {
        &self.fields
    }

    /// Direct parents.
    pub fn parents(&self) -> &[ModelRef] {
        &self.parents
    }

    /// The default mask, if any.
    pub fn mask(&self) -> Option<&Mask> {
        self.mask.as_ref()
    }

    /// Parent fields first (in parent order), then own fields.
    pub fn resolved_fields(&self) -> IndexMap<String, Field> {
        let mut resolved = IndexMap::new();
        for parent in &self.parents {
            resolved.extend(parent.resolved_fields());
        }
        resolved.extend(self.fields.iter().map(|(k, f)| (k.clone(), f.clone())));
        resolved
    }

    /// Names of every transitive parent, excluding this model.
    pub fn ancestors(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for parent in &self.parents {
            names.insert(parent.name.clone());
            names.extend(parent.ancestors());
        }
        names
    }

    /// This model's name plus its ancestors.
    pub(crate) fn lineage(&self) -> BTreeSet<String> {
        let mut names = self.ancestors();
        names.insert(self.name.clone());
        names
    }

    /// Finds `name` among this model and its ancestors.
    pub fn get_parent(self: &Arc<Self>, name: &str) -> Option<ModelRef> {
        if self.name == name {
            return Some(self.clone());
        }
        self.parents.iter().find_map(|parent| parent.get_parent(name))
    }

    /// Name of the discriminator field, searching parents as well.
    pub fn discriminator(&self) -> Option<String> {
        self.resolved_fields()
            .iter()
            .find(|(_, field)| field.is_discriminator())
            .map(|(name, _)| name.clone())
    }

    /// A flattened copy of this model restricted to the fields selected by `mask`.
    pub fn masked(&self, mask: &Mask) -> AppResult<Model> {
        Ok(Self {
            name: self.name.clone(),
            fields: mask.apply_to_fields(&self.resolved_fields())?,
            parents: Vec::new(),
            mask: Some(mask.clone()),
        })
    }

    /// Models referenced by own fields and by parents.
    pub fn references(&self) -> Vec<&ModelRef> {
        self.parents
            .iter()
            .chain(self.fields.values().flat_map(Field::referenced_models))
            .collect()
    }

    /// JSON-Schema definition for this model.
    pub fn schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for (name, field) in &self.fields {
            properties.insert(name.clone(), Value::Object(field.schema()));
            if field.is_required() {
                required.push(name.clone());
            }
        }
        required.sort();

        let mut definition = Map::new();
        if !required.is_empty() {
            definition.insert("required".into(), Value::from(required));
        }
        definition.insert("type".into(), Value::from("object"));
        definition.insert("properties".into(), Value::Object(properties));
        if let Some((name, _)) = self.fields.iter().find(|(_, f)| f.is_discriminator()) {
            definition.insert("discriminator".into(), Value::from(name.clone()));
        }
        if let Some(mask) = &self.mask {
            definition.insert("x-mask".into(), Value::from(mask.to_string()));
        }

        if self.parents.is_empty() {
            return Value::Object(definition);
        }
        let mut all_of: Vec<Value> = self
            .parents
            .iter()
            .map(|parent| json!({"$ref": definition_reference(parent.name())}))
            .collect();
        all_of.push(Value::Object(definition));
        json!({ "allOf": all_of })
    }
}
