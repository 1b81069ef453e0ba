#![deny(missing_docs)]

//! # Field Type System
//!
//! A [`Field`] describes one value slot of a [`Model`](crate::model::Model):
//! common documentation attributes plus a [`FieldKind`] holding the
//! kind-specific constraints.
//!
//! Every field renders a JSON-Schema fragment through [`Field::schema`] and
//! formats values for marshalling through [`Field::format`] (see `format.rs`).

mod format;

use crate::error::{AppError, AppResult};
use crate::mask::Mask;
use crate::model::ModelRef;
use crate::naming::definition_reference;
use crate::validation::{Converter, ValidationDescriptor};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeSet;

pub(crate) use format::is_truthy;

/// Output format of a date-time field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateFormat {
    /// `2024-05-01T10:00:00+02:00`
    #[default]
    Iso8601,
    /// `Wed, 01 May 2024 08:00:00 -0000`
    Rfc822,
}

/// Constraints shared by string-like kinds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringRules {
    /// `minLength`
    pub min_length: Option<u64>,
    /// `maxLength`
    pub max_length: Option<u64>,
    /// `pattern`
    pub pattern: Option<String>,
    /// `enum`
    pub enumeration: Vec<String>,
    /// Marks the field holding the polymorphic type name of its model.
    pub discriminator: bool,
}

/// Constraints shared by numeric kinds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberRules {
    /// `minimum`
    pub minimum: Option<Number>,
    /// `exclusiveMinimum`
    pub exclusive_minimum: Option<bool>,
    /// `maximum`
    pub maximum: Option<Number>,
    /// `exclusiveMaximum`
    pub exclusive_maximum: Option<bool>,
    /// `multipleOf`
    pub multiple_of: Option<Number>,
}

/// The semantic kind of a field and its kind-specific constraints.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Untyped passthrough value.
    Raw,
    /// Text value.
    String(StringRules),
    /// Text interpolated from sibling values: `"Hello {name}"`.
    FormattedString {
        /// Template with `{key}` placeholders.
        template: String,
        /// String constraints.
        rules: StringRules,
    },
    /// Whole number.
    Integer(NumberRules),
    /// IEEE-754 double.
    Float(NumberRules),
    /// Arbitrary precision decimal, rendered as a string.
    Arbitrary(NumberRules),
    /// Decimal quantized to a fixed number of places (half-even).
    Fixed {
        /// Number of decimal places.
        decimals: u32,
        /// Numeric constraints.
        rules: NumberRules,
    },
    /// Truthiness of a value.
    Boolean,
    /// Date and time.
    DateTime {
        /// Output format.
        format: DateFormat,
        /// Earliest accepted value (raw text).
        minimum: Option<String>,
        /// Latest accepted value (raw text).
        maximum: Option<String>,
    },
    /// Calendar date.
    Date {
        /// Earliest accepted value (raw text).
        minimum: Option<String>,
        /// Latest accepted value (raw text).
        maximum: Option<String>,
    },
    /// A nested model.
    Nested {
        /// Target model.
        model: ModelRef,
        /// Document the field as a list of the target model.
        as_list: bool,
        /// Render `null` instead of an empty object when the value is missing.
        allow_null: bool,
    },
    /// A homogeneous list.
    List {
        /// Item field.
        item: Box<Field>,
        /// `minItems`
        min_items: Option<u64>,
        /// `maxItems`
        max_items: Option<u64>,
        /// `uniqueItems`
        unique: Option<bool>,
    },
    /// A nested model chosen among several siblings sharing one ancestor.
    Polymorph {
        /// Type name -> model.
        mapping: IndexMap<String, ModelRef>,
        /// The single common ancestor of every mapped model.
        parent: ModelRef,
    },
}

/// One typed, documented value slot within a model.
#[derive(Debug, Clone)]
pub struct Field {
    kind: FieldKind,
    default: Option<Value>,
    attribute: Option<String>,
    title: Option<String>,
    description: Option<String>,
    example: Option<Value>,
    required: bool,
    readonly: Option<bool>,
    mask: Option<Mask>,
}

impl Field {
    fn of(kind: FieldKind) -> Self {
        Self {
            kind,
            default: None,
            attribute: None,
            title: None,
            description: None,
            example: None,
            required: false,
            readonly: None,
            mask: None,
        }
    }

    /// Untyped passthrough field.
    pub fn raw() -> Self {
        Self::of(FieldKind::Raw)
    }

    /// Text field.
    pub fn string() -> Self {
        Self::of(FieldKind::String(StringRules::default()))
    }

    /// Text interpolated from the values of the marshalled object.
    pub fn formatted_string(template: impl Into<String>) -> Self {
        Self::of(FieldKind::FormattedString {
            template: template.into(),
            rules: StringRules::default(),
        })
    }

    /// Whole number field.
    pub fn integer() -> Self {
        Self::of(FieldKind::Integer(NumberRules::default()))
    }

    /// Floating point field.
    pub fn float() -> Self {
        Self::of(FieldKind::Float(NumberRules::default()))
    }

    /// Arbitrary precision decimal field.
    pub fn arbitrary() -> Self {
        Self::of(FieldKind::Arbitrary(NumberRules::default()))
    }

    /// Fixed precision decimal field.
    pub fn fixed(decimals: u32) -> Self {
        Self::of(FieldKind::Fixed {
            decimals,
            rules: NumberRules::default(),
        })
    }

    /// Boolean field.
    pub fn boolean() -> Self {
        Self::of(FieldKind::Boolean)
    }

    /// Date-time field.
    pub fn datetime(format: DateFormat) -> Self {
        Self::of(FieldKind::DateTime {
            format,
            minimum: None,
            maximum: None,
        })
    }

    /// Date field.
    pub fn date() -> Self {
        Self::of(FieldKind::Date {
            minimum: None,
            maximum: None,
        })
    }

    /// Nested model field.
    pub fn nested(model: &ModelRef) -> Self {
        Self::of(FieldKind::Nested {
            model: model.clone(),
            as_list: false,
            allow_null: false,
        })
    }

    /// List field.
    pub fn list(item: Field) -> Self {
        Self::of(FieldKind::List {
            item: Box::new(item),
            min_items: None,
            max_items: None,
            unique: None,
        })
    }

    /// Polymorphic field.
    ///
    /// Fails with a specs error unless every mapped model shares exactly one
    /// common ancestor (a model counts as its own lineage member).
    pub fn polymorph<I, K>(mapping: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = (K, ModelRef)>,
        K: Into<String>,
    {
        let mapping: IndexMap<String, ModelRef> =
            mapping.into_iter().map(|(k, m)| (k.into(), m)).collect();

        let mut models = mapping.values();
        let first = models
            .next()
            .ok_or_else(|| AppError::Specs("Polymorph mapping is empty".into()))?;

        let mut candidates: BTreeSet<String> = first.lineage();
        for model in models {
            let lineage = model.lineage();
            candidates.retain(|name| lineage.contains(name));
        }

        if candidates.len() != 1 {
            let names: Vec<&str> = mapping.values().map(|m| m.name()).collect();
            return Err(AppError::Specs(format!(
                "Unable to determine the common ancestor for: {}",
                names.join(", ")
            )));
        }

        let parent_name = candidates.into_iter().next().unwrap_or_default();
        let parent = first.get_parent(&parent_name).ok_or_else(|| {
            AppError::Specs(format!("Parent model '{}' not found", parent_name))
        })?;

        Ok(Self::of(FieldKind::Polymorph { mapping, parent }))
    }

    /// Sets the default value.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Reads the value from another key (dotted paths allowed).
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Sets the documentation title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the documentation description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the documentation example.
    pub fn with_example(mut self, example: impl Into<Value>) -> Self {
        self.example = Some(example.into());
        self
    }

    /// Marks the field as mandatory.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the field as read only.
    pub fn readonly(mut self) -> Self {
        self.readonly = Some(true);
        self
    }

    /// Applies a mask to the marshalled output of this field.
    pub fn with_mask(mut self, mask: Mask) -> Self {
        self.mask = Some(mask);
        self
    }

    fn string_rules_mut(&mut self) -> Option<&mut StringRules> {
        match &mut self.kind {
            FieldKind::String(rules) | FieldKind::FormattedString { rules, .. } => Some(rules),
            _ => None,
        }
    }

    fn number_rules_mut(&mut self) -> Option<&mut NumberRules> {
        match &mut self.kind {
            FieldKind::Integer(rules)
            | FieldKind::Float(rules)
            | FieldKind::Arbitrary(rules)
            | FieldKind::Fixed { rules, .. } => Some(rules),
            _ => None,
        }
    }

    /// `minLength` (string kinds only).
    pub fn with_min_length(mut self, len: u64) -> Self {
        if let Some(rules) = self.string_rules_mut() {
            rules.min_length = Some(len);
        }
        self
    }

    /// `maxLength` (string kinds only).
    pub fn with_max_length(mut self, len: u64) -> Self {
        if let Some(rules) = self.string_rules_mut() {
            rules.max_length = Some(len);
        }
        self
    }

    /// `pattern` (string kinds only).
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        if let Some(rules) = self.string_rules_mut() {
            rules.pattern = Some(pattern.into());
        }
        self
    }

    /// `enum` (string kinds only).
    pub fn with_enum<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(rules) = self.string_rules_mut() {
            rules.enumeration = values.into_iter().map(Into::into).collect();
        }
        self
    }

    /// Marks a string field as the discriminator of its model. Implies `required`.
    pub fn discriminator(mut self) -> Self {
        if let Some(rules) = self.string_rules_mut() {
            rules.discriminator = true;
            self.required = true;
        }
        self
    }

    /// `minimum` (numeric kinds only).
    pub fn with_minimum(mut self, minimum: impl Into<Number>) -> Self {
        if let Some(rules) = self.number_rules_mut() {
            rules.minimum = Some(minimum.into());
        }
        self
    }

    /// `maximum` (numeric kinds only).
    pub fn with_maximum(mut self, maximum: impl Into<Number>) -> Self {
        if let Some(rules) = self.number_rules_mut() {
            rules.maximum = Some(maximum.into());
        }
        self
    }

    /// `exclusiveMinimum` (numeric kinds only).
    pub fn exclusive_minimum(mut self) -> Self {
        if let Some(rules) = self.number_rules_mut() {
            rules.exclusive_minimum = Some(true);
        }
        self
    }

    /// `exclusiveMaximum` (numeric kinds only).
    pub fn exclusive_maximum(mut self) -> Self {
        if let Some(rules) = self.number_rules_mut() {
            rules.exclusive_maximum = Some(true);
        }
        self
    }

    /// `multipleOf` (numeric kinds only).
    pub fn with_multiple_of(mut self, multiple: impl Into<Number>) -> Self {
        if let Some(rules) = self.number_rules_mut() {
            rules.multiple_of = Some(multiple.into());
        }
        self
    }

    /// Earliest/latest values of a date or date-time field.
    pub fn with_date_range(mut self, min: Option<&str>, max: Option<&str>) -> Self {
        match &mut self.kind {
            FieldKind::DateTime {
                minimum, maximum, ..
            }
            | FieldKind::Date { minimum, maximum } => {
                *minimum = min.map(str::to_string);
                *maximum = max.map(str::to_string);
            }
            _ => {}
        }
        self
    }

    /// `minItems` (lists only).
    pub fn with_min_items(mut self, count: u64) -> Self {
        if let FieldKind::List { min_items, .. } = &mut self.kind {
            *min_items = Some(count);
        }
        self
    }

    /// `maxItems` (lists only).
    pub fn with_max_items(mut self, count: u64) -> Self {
        if let FieldKind::List { max_items, .. } = &mut self.kind {
            *max_items = Some(count);
        }
        self
    }

    /// `uniqueItems` (lists only).
    pub fn unique(mut self) -> Self {
        if let FieldKind::List { unique, .. } = &mut self.kind {
            *unique = Some(true);
        }
        self
    }

    /// Documents a nested field as a list of its model.
    pub fn as_list(mut self) -> Self {
        if let FieldKind::Nested { as_list, .. } = &mut self.kind {
            *as_list = true;
        }
        self
    }

    /// Lets a nested field render `null` for a missing value.
    pub fn allow_null(mut self) -> Self {
        if let FieldKind::Nested { allow_null, .. } = &mut self.kind {
            *allow_null = true;
        }
        self
    }

    /// The field kind.
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Whether the field is mandatory.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Whether the field is the discriminator of its model.
    pub fn is_discriminator(&self) -> bool {
        match &self.kind {
            FieldKind::String(rules) | FieldKind::FormattedString { rules, .. } => {
                rules.discriminator
            }
            _ => false,
        }
    }

    /// The attribute override, if any.
    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    /// The documentation description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The default value, if any.
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Models this field refers to directly (nested target, list item
    /// targets, polymorph mapping).
    pub fn referenced_models(&self) -> Vec<&ModelRef> {
        match &self.kind {
            FieldKind::Nested { model, .. } => vec![model],
            FieldKind::List { item, .. } => item.referenced_models(),
            FieldKind::Polymorph { mapping, .. } => mapping.values().collect(),
            _ => Vec::new(),
        }
    }

    /// Produces a copy of this field restricted by `mask`.
    ///
    /// Only nested, list, polymorph and raw fields accept a nested mask.
    pub fn masked(&self, mask: &Mask) -> AppResult<Field> {
        let mut cloned = self.clone();
        match &mut cloned.kind {
            FieldKind::Nested { model, .. } => {
                *model = ModelRef::new(model.masked(mask)?);
            }
            FieldKind::List { item, .. } => {
                **item = item.masked(mask)?;
            }
            FieldKind::Polymorph { .. } | FieldKind::Raw => {
                cloned.mask = Some(mask.clone());
            }
            _ => {
                return Err(AppError::Configuration(
                    "Mask is inconsistent with model".into(),
                ))
            }
        }
        Ok(cloned)
    }

    /// Validation descriptor for this field when used as a request value.
    pub fn validation_descriptor(&self, name: &str) -> ValidationDescriptor {
        let convert = match &self.kind {
            FieldKind::Integer(_) => Converter::Integer,
            FieldKind::Float(_) | FieldKind::Arbitrary(_) | FieldKind::Fixed { .. } => {
                Converter::Float
            }
            FieldKind::Boolean => Converter::Boolean,
            FieldKind::List { .. } => Converter::List,
            FieldKind::DateTime { .. } | FieldKind::Date { .. } => Converter::DateTime,
            FieldKind::Raw | FieldKind::Nested { .. } | FieldKind::Polymorph { .. } => {
                Converter::Raw
            }
            _ => Converter::String,
        };
        let pattern = match &self.kind {
            FieldKind::String(rules) | FieldKind::FormattedString { rules, .. } => {
                rules.pattern.clone()
            }
            _ => None,
        };
        ValidationDescriptor {
            name: name.to_string(),
            pattern,
            convert,
            mandatory: self.required,
            description: self.description.clone(),
        }
    }

    fn schema_type(&self) -> (Option<&'static str>, Option<&'static str>) {
        match &self.kind {
            FieldKind::Raw => (Some("object"), None),
            FieldKind::String(_) | FieldKind::FormattedString { .. } => (Some("string"), None),
            FieldKind::Integer(_) => (Some("integer"), None),
            FieldKind::Float(_) | FieldKind::Arbitrary(_) | FieldKind::Fixed { .. } => {
                (Some("number"), None)
            }
            FieldKind::Boolean => (Some("boolean"), None),
            FieldKind::DateTime { .. } => (Some("string"), Some("date-time")),
            FieldKind::Date { .. } => (Some("string"), Some("date")),
            FieldKind::List { .. } => (Some("array"), None),
            FieldKind::Nested { .. } | FieldKind::Polymorph { .. } => (None, None),
        }
    }

    /// JSON-Schema fragment for this field. Absent attributes are omitted.
    pub fn schema(&self) -> Map<String, Value> {
        let mut schema = Map::new();
        let (ty, format) = self.schema_type();
        put(&mut schema, "type", ty.map(Value::from));
        put(&mut schema, "format", format.map(Value::from));
        put(&mut schema, "title", self.title.clone().map(Value::from));
        put(
            &mut schema,
            "description",
            self.description.clone().map(Value::from),
        );
        put(&mut schema, "readOnly", self.readonly.map(Value::from));
        put(&mut schema, "default", self.default.clone());
        put(&mut schema, "example", self.example.clone());

        match &self.kind {
            FieldKind::String(rules) | FieldKind::FormattedString { rules, .. } => {
                put(&mut schema, "minLength", rules.min_length.map(Value::from));
                put(&mut schema, "maxLength", rules.max_length.map(Value::from));
                put(&mut schema, "pattern", rules.pattern.clone().map(Value::from));
                if !rules.enumeration.is_empty() {
                    schema.insert("enum".into(), Value::from(rules.enumeration.clone()));
                    if self.example.is_none() {
                        schema.insert("example".into(), Value::from(rules.enumeration[0].clone()));
                    }
                }
            }
            FieldKind::Integer(rules)
            | FieldKind::Float(rules)
            | FieldKind::Arbitrary(rules)
            | FieldKind::Fixed { rules, .. } => {
                put(&mut schema, "minimum", rules.minimum.clone().map(Value::Number));
                put(
                    &mut schema,
                    "exclusiveMinimum",
                    rules.exclusive_minimum.map(Value::from),
                );
                put(&mut schema, "maximum", rules.maximum.clone().map(Value::Number));
                put(
                    &mut schema,
                    "exclusiveMaximum",
                    rules.exclusive_maximum.map(Value::from),
                );
                put(
                    &mut schema,
                    "multipleOf",
                    rules.multiple_of.clone().map(Value::Number),
                );
            }
            FieldKind::DateTime {
                minimum, maximum, ..
            }
            | FieldKind::Date { minimum, maximum } => {
                let default = self.default.as_ref().map(|d| self.schema_moment(d));
                put(&mut schema, "default", default);
                put(
                    &mut schema,
                    "minimum",
                    minimum.as_ref().map(|m| self.schema_moment(&Value::from(m.clone()))),
                );
                put(
                    &mut schema,
                    "maximum",
                    maximum.as_ref().map(|m| self.schema_moment(&Value::from(m.clone()))),
                );
            }
            FieldKind::Nested { model, as_list, .. } => {
                let reference = definition_reference(model.name());
                if *as_list {
                    schema.insert("type".into(), Value::from("array"));
                    schema.insert("items".into(), ref_object(reference));
                } else {
                    schema.insert("$ref".into(), Value::from(reference));
                }
            }
            FieldKind::Polymorph { parent, .. } => {
                schema.insert(
                    "$ref".into(),
                    Value::from(definition_reference(parent.name())),
                );
            }
            FieldKind::List {
                item,
                min_items,
                max_items,
                unique,
            } => {
                put(&mut schema, "minItems", min_items.map(Value::from));
                put(&mut schema, "maxItems", max_items.map(Value::from));
                put(&mut schema, "uniqueItems", unique.map(Value::from));
                schema.insert("items".into(), Value::Object(item.schema()));
            }
            FieldKind::Raw | FieldKind::Boolean => {}
        }

        schema
    }

    /// Date values in schemas are shown in the field's output format; text
    /// that does not parse is shown verbatim.
    fn schema_moment(&self, value: &Value) -> Value {
        self.format(value).unwrap_or_else(|_| value.clone())
    }
}

fn put(schema: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(v) = value {
        schema.insert(key.to_string(), v);
    }
}

fn ref_object(reference: String) -> Value {
    let mut map = Map::new();
    map.insert("$ref".into(), Value::from(reference));
    Value::Object(map)
}
