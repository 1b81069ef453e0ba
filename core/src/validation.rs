//! # Validation Descriptors
//!
//! Documented parameters and fields produce a [`ValidationDescriptor`]:
//! the information an external request validator needs to check a raw
//! request value. The documentation layer never validates requests on its
//! own; [`ValidationDescriptor::validate`] is offered as a helper for
//! hosting code.

use crate::error::{AppError, AppResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Conversion applied to a raw request value once it matched its pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Converter {
    /// Keep the raw text.
    #[default]
    Raw,
    /// Keep the raw text as a string value.
    String,
    /// Base-10 integer.
    Integer,
    /// Floating point number.
    Float,
    /// `true/yes/on/y/t/1` or `false/no/off/n/f/0`, case-insensitive.
    Boolean,
    /// ISO-8601 / RFC-3339 date or date-time, normalized to ISO-8601.
    DateTime,
    /// Comma separated list of strings.
    List,
}

impl Converter {
    /// Converts `raw` into a JSON value.
    pub fn convert(&self, raw: &str) -> AppResult<Value> {
        let trimmed = raw.trim();
        match self {
            Converter::Raw | Converter::String => Ok(Value::String(raw.to_string())),
            Converter::Integer => trimmed
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| invalid(raw, "integer")),
            Converter::Float => trimmed
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| invalid(raw, "float")),
            Converter::Boolean => asbool(trimmed).map(Value::Bool),
            Converter::DateTime => parse_datetime(trimmed).map(Value::String),
            Converter::List => Ok(Value::Array(
                trimmed
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(|item| Value::String(item.to_string()))
                    .collect(),
            )),
        }
    }
}

fn invalid(raw: &str, kind: &str) -> AppError {
    AppError::Validation(format!("'{}' is not a valid {}", raw, kind))
}

/// Strict truthiness of configuration-style text.
pub fn asbool(value: &str) -> AppResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "y" | "t" | "1" => Ok(true),
        "false" | "no" | "off" | "n" | "f" | "0" => Ok(false),
        _ => Err(AppError::Validation(format!(
            "String is not true/false: '{}'",
            value
        ))),
    }
}

fn parse_datetime(value: &str) -> AppResult<String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.to_rfc3339());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| invalid(value, "datetime"))
}

/// Everything an external validator needs to check one request value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationDescriptor {
    /// Parameter or field name.
    pub name: String,
    /// Regular expression the raw value must match entirely.
    #[serde(default, rename = "re", skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Conversion applied after matching.
    #[serde(default)]
    pub convert: Converter,
    /// Whether the value must be present.
    #[serde(default)]
    pub mandatory: bool,
    /// Human readable description.
    #[serde(default, rename = "doc", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ValidationDescriptor {
    /// A descriptor with no pattern, raw conversion and no requirement.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: None,
            convert: Converter::Raw,
            mandatory: false,
            description: None,
        }
    }

    /// Checks a raw request value. A missing optional value yields `null`.
    pub fn validate(&self, raw: Option<&str>) -> AppResult<Value> {
        let Some(raw) = raw else {
            if self.mandatory {
                return Err(AppError::Validation(format!(
                    "Value for {} must be provided",
                    self.name
                )));
            }
            return Ok(Value::Null);
        };

        if let Some(pattern) = &self.pattern {
            let anchored = format!("^(?:{})$", pattern.trim_start_matches('^').trim_end_matches('$'));
            let re = Regex::new(&anchored).map_err(|e| {
                AppError::Configuration(format!("Invalid pattern for {}: {}", self.name, e))
            })?;
            if !re.is_match(raw) {
                return Err(AppError::Validation(format!(
                    "{} value {} does not validate",
                    self.name, raw
                )));
            }
        }

        self.convert.convert(raw)
    }
}
