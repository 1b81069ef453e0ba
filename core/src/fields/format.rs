//! Value formatting for marshalling.

use super::{DateFormat, Field, FieldKind};
use crate::error::{AppError, AppResult};
use crate::marshal::marshal_fields;
use crate::model::ModelRef;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::{Number, Value};
use std::str::FromStr;

/// Looks up `key` in `data`. Dotted keys walk nested objects; numeric
/// segments index arrays.
pub(crate) fn get_value<'a>(key: &str, data: &'a Value) -> Option<&'a Value> {
    let mut current = data;
    for part in key.split('.') {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn marshalling(message: impl Into<String>) -> AppError {
    AppError::Marshalling(message.into())
}

impl Field {
    /// Reads `key` (or the attribute override) from `data` and formats it.
    ///
    /// Missing values fall back to the field default, then `null`.
    pub fn output(&self, key: &str, data: &Value) -> AppResult<Value> {
        if let FieldKind::FormattedString { template, .. } = &self.kind {
            return interpolate(template, data).map(Value::String);
        }
        let source = self.attribute.as_deref().unwrap_or(key);
        match get_value(source, data) {
            None | Some(Value::Null) => self.output_missing(),
            Some(value) => self.output_value(value),
        }
    }

    fn output_missing(&self) -> AppResult<Value> {
        match &self.kind {
            FieldKind::Nested { allow_null, .. } if *allow_null => Ok(Value::Null),
            FieldKind::Polymorph { .. } if !self.required => Ok(Value::Null),
            FieldKind::Nested { .. } | FieldKind::Polymorph { .. } | FieldKind::List { .. } => {
                Ok(self.default.clone().unwrap_or(Value::Null))
            }
            _ => match &self.default {
                Some(default) if is_truthy(default) => self.format(default),
                Some(default) => Ok(default.clone()),
                None => Ok(Value::Null),
            },
        }
    }

    fn output_value(&self, value: &Value) -> AppResult<Value> {
        let formatted = self.format(value)?;
        match (&self.kind, &self.mask) {
            (FieldKind::Raw, Some(mask)) => Ok(mask.filter(&formatted, false)),
            _ => Ok(formatted),
        }
    }

    /// Formats a present value according to the field kind.
    pub fn format(&self, value: &Value) -> AppResult<Value> {
        match &self.kind {
            FieldKind::Raw => Ok(value.clone()),
            FieldKind::String(_) => Ok(Value::String(text(value))),
            FieldKind::FormattedString { template, .. } => {
                interpolate(template, value).map(Value::String)
            }
            FieldKind::Integer(_) => format_integer(value),
            FieldKind::Float(_) => format_float(value),
            FieldKind::Arbitrary(_) => Ok(Value::String(to_decimal(value)?.normalize().to_string())),
            FieldKind::Fixed { decimals, .. } => format_fixed(value, *decimals),
            FieldKind::Boolean => Ok(Value::Bool(is_truthy(value))),
            FieldKind::DateTime { format, .. } => {
                let moment = Moment::parse(value)?;
                Ok(Value::String(match format {
                    DateFormat::Iso8601 => moment.iso8601(),
                    DateFormat::Rfc822 => moment.rfc822(),
                }))
            }
            FieldKind::Date { .. } => {
                Ok(Value::String(Moment::parse(value)?.date().format("%Y-%m-%d").to_string()))
            }
            FieldKind::Nested { model, .. } => marshal_model(model, value),
            FieldKind::List { item, .. } => match value {
                Value::Array(items) => items
                    .iter()
                    .map(|element| match element {
                        Value::Null => item.output_missing(),
                        present => item.output_value(present),
                    })
                    .collect::<AppResult<Vec<_>>>()
                    .map(Value::Array),
                single => Ok(Value::Array(vec![item.output_value(single)?])),
            },
            FieldKind::Polymorph { mapping, parent } => {
                let discriminator = parent.discriminator().ok_or_else(|| {
                    marshalling(format!(
                        "Model '{}' has no discriminator field",
                        parent.name()
                    ))
                })?;
                let tag = get_value(&discriminator, value)
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        marshalling(format!("Missing discriminator value '{}'", discriminator))
                    })?;
                let candidates: Vec<&ModelRef> = mapping
                    .iter()
                    .filter(|(key, model)| key.as_str() == tag || model.name() == tag)
                    .map(|(_, model)| model)
                    .collect();
                let model = match candidates.as_slice() {
                    [] => {
                        return Err(marshalling(format!(
                            "Unable to determine a candidate for: {}",
                            tag
                        )))
                    }
                    [single] => *single,
                    _ => {
                        return Err(marshalling(format!(
                            "Unable to determine the appropriate candidate for: {}",
                            tag
                        )))
                    }
                };
                let marshalled = marshal_model(model, value)?;
                Ok(match &self.mask {
                    Some(mask) => mask.filter(&marshalled, false),
                    None => marshalled,
                })
            }
        }
    }
}

fn marshal_model(model: &ModelRef, value: &Value) -> AppResult<Value> {
    let fields = model.resolved_fields();
    marshal_fields(value, &fields, false)
}

/// Truthiness of a JSON value: empty text, empty collections, zero, `false`
/// and `null` are falsy.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn interpolate(template: &str, data: &Value) -> AppResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start].replace("}}", "}"));
        let after = &rest[start + 1..];
        if let Some(stripped) = after.strip_prefix('{') {
            out.push('{');
            rest = stripped;
            continue;
        }
        let end = after
            .find('}')
            .ok_or_else(|| marshalling(format!("Unbalanced template: {}", template)))?;
        let key = &after[..end];
        let value = get_value(key, data)
            .ok_or_else(|| marshalling(format!("Missing template key '{}'", key)))?;
        out.push_str(&text(value));
        rest = &after[end + 1..];
    }
    out.push_str(&rest.replace("}}", "}"));
    Ok(out)
}

fn format_integer(value: &Value) -> AppResult<Value> {
    match value {
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                Ok(Value::Number(n.clone()))
            } else {
                let f = n
                    .as_f64()
                    .map(f64::trunc)
                    .ok_or_else(|| marshalling(format!("Invalid integer: {}", n)))?;
                // i64::MAX as f64 rounds up to 2^63, hence the strict bound.
                if f < i64::MIN as f64 || f >= i64::MAX as f64 {
                    return Err(marshalling(format!("Integer out of range: {}", n)));
                }
                Ok(Value::from(f as i64))
            }
        }
        Value::Bool(b) => Ok(Value::from(i64::from(*b))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| marshalling(format!("Invalid integer: {}", s))),
        other => Err(marshalling(format!("Invalid integer: {}", other))),
    }
}

fn format_float(value: &Value) -> AppResult<Value> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| marshalling(format!("Invalid float: {}", value)))
}

fn to_decimal(value: &Value) -> AppResult<Decimal> {
    let raw = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => i64::from(*b).to_string(),
        other => return Err(marshalling(format!("Invalid decimal: {}", other))),
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|_| marshalling(format!("Invalid decimal: {}", raw)))
}

fn format_fixed(value: &Value, decimals: u32) -> AppResult<Value> {
    let decimal =
        to_decimal(value).map_err(|_| marshalling("Invalid Fixed precision number."))?;
    let mut rounded = decimal.round_dp_with_strategy(decimals, RoundingStrategy::MidpointNearestEven);
    rounded.rescale(decimals);
    Ok(Value::String(rounded.to_string()))
}

/// A parsed point in time, keeping track of whether an offset was given.
enum Moment {
    Aware(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

impl Moment {
    fn parse(value: &Value) -> AppResult<Self> {
        let Value::String(raw) = value else {
            return Err(marshalling(format!("Unsupported DateTime format: {}", value)));
        };
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Moment::Aware(dt));
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
            return Ok(Moment::Aware(dt));
        }
        for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(raw, pattern) {
                return Ok(Moment::Naive(dt));
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Moment::Naive)
            .ok_or_else(|| marshalling(format!("Unsupported DateTime format: {}", raw)))
    }

    fn iso8601(&self) -> String {
        match self {
            Moment::Aware(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.f%:z").to_string(),
            Moment::Naive(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
        }
    }

    /// Always rendered in UTC; naive values are assumed to be UTC already.
    fn rfc822(&self) -> String {
        let utc = match self {
            Moment::Aware(dt) => dt.with_timezone(&Utc).naive_utc(),
            Moment::Naive(dt) => *dt,
        };
        utc.format("%a, %d %b %Y %H:%M:%S -0000").to_string()
    }

    fn date(&self) -> NaiveDate {
        match self {
            Moment::Aware(dt) => dt.date_naive(),
            Moment::Naive(dt) => dt.date(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_get_value_dotted() {
        let data = json!({"a": {"b": [10, 20]}});
        assert_eq!(get_value("a.b.1", &data), Some(&json!(20)));
        assert_eq!(get_value("a.c", &data), None);
    }

    #[test]
    fn test_integer_format() {
        let field = Field::integer();
        assert_eq!(field.format(&json!(3.7)).unwrap(), json!(3));
        assert_eq!(field.format(&json!(" 42 ")).unwrap(), json!(42));
        assert_eq!(field.format(&json!(true)).unwrap(), json!(1));
        assert!(field.format(&json!("3.7")).is_err());
    }

    #[test]
    fn test_integer_out_of_range() {
        let field = Field::integer();
        assert_eq!(field.format(&json!(-4.9e3)).unwrap(), json!(-4900));
        assert!(matches!(
            field.format(&json!(1e19)),
            Err(AppError::Marshalling(_))
        ));
        assert!(matches!(
            field.format(&json!(-1e300)),
            Err(AppError::Marshalling(_))
        ));
    }

    #[test]
    fn test_float_format() {
        let field = Field::float();
        assert_eq!(field.format(&json!("1.5")).unwrap(), json!(1.5));
        assert!(field.format(&json!("abc")).is_err());
        assert!(field.format(&json!("nan")).is_err());
    }

    #[test]
    fn test_fixed_half_even() {
        let field = Field::fixed(2);
        assert_eq!(field.format(&json!("2.345")).unwrap(), json!("2.34"));
        assert_eq!(field.format(&json!("2.355")).unwrap(), json!("2.36"));
        assert_eq!(field.format(&json!(3)).unwrap(), json!("3.00"));
        let err = field.format(&json!("inf")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Marshalling Error: Invalid Fixed precision number."
        );
    }

    #[test]
    fn test_fixed_default_places() {
        assert_eq!(
            Field::fixed(5).format(&json!(1.5)).unwrap(),
            json!("1.50000")
        );
    }

    #[test]
    fn test_arbitrary_renders_string() {
        assert_eq!(
            Field::arbitrary().format(&json!("12345678901234567890.123456")).unwrap(),
            json!("12345678901234567890.123456")
        );
    }

    #[test]
    fn test_boolean_truthiness() {
        let field = Field::boolean();
        assert_eq!(field.format(&json!([])).unwrap(), json!(false));
        assert_eq!(field.format(&json!("")).unwrap(), json!(false));
        assert_eq!(field.format(&json!(0)).unwrap(), json!(false));
        assert_eq!(field.format(&json!({"a": 1})).unwrap(), json!(true));
        assert_eq!(field.format(&json!("no")).unwrap(), json!(true));
    }

    #[test]
    fn test_datetime_formats() {
        let iso = Field::datetime(DateFormat::Iso8601);
        assert_eq!(
            iso.format(&json!("2011-01-01T12:30:00+02:00")).unwrap(),
            json!("2011-01-01T12:30:00+02:00")
        );
        assert_eq!(
            iso.format(&json!("2011-01-01")).unwrap(),
            json!("2011-01-01T00:00:00")
        );

        let rfc = Field::datetime(DateFormat::Rfc822);
        assert_eq!(
            rfc.format(&json!("2011-01-01T12:30:00+02:00")).unwrap(),
            json!("Sat, 01 Jan 2011 10:30:00 -0000")
        );
        assert!(rfc.format(&json!(12)).is_err());
    }

    #[test]
    fn test_date_format() {
        assert_eq!(
            Field::date().format(&json!("2011-01-01T12:30:00")).unwrap(),
            json!("2011-01-01")
        );
    }

    #[test]
    fn test_output_default_and_attribute() {
        let data = json!({"user": {"name": "Ann"}});
        let field = Field::string().with_attribute("user.name");
        assert_eq!(field.output("owner", &data).unwrap(), json!("Ann"));

        let defaulted = Field::integer().with_default("7");
        assert_eq!(defaulted.output("count", &data).unwrap(), json!(7));
        assert_eq!(Field::string().output("missing", &data).unwrap(), Value::Null);
    }

    #[test]
    fn test_formatted_string() {
        let field = Field::formatted_string("Hello {name}, {{literal}}");
        assert_eq!(
            field.output("greeting", &json!({"name": "Ann"})).unwrap(),
            json!("Hello Ann, {literal}")
        );
        assert!(field.output("greeting", &json!({})).is_err());
    }

    #[test]
    fn test_nested_output() {
        let address = ModelRef::new(Model::new("Address", [("city", Field::string())]));
        let data = json!({"home": {"city": "Oslo", "zip": "0150"}});

        let field = Field::nested(&address);
        assert_eq!(field.output("home", &data).unwrap(), json!({"city": "Oslo"}));
        assert_eq!(field.output("work", &data).unwrap(), Value::Null);

        let nullable = Field::nested(&address).allow_null();
        assert_eq!(nullable.output("work", &data).unwrap(), Value::Null);
    }

    #[test]
    fn test_list_output() {
        let field = Field::list(Field::integer());
        assert_eq!(
            field.output("ids", &json!({"ids": ["1", 2.9, null]})).unwrap(),
            json!([1, 2, null])
        );
    }

    #[test]
    fn test_polymorph_output() {
        let pet = ModelRef::new(Model::new("Pet", [("kind", Field::string().discriminator())]));
        let dog = ModelRef::new(Model::inherit(
            "Dog",
            vec![
                pet.clone().into(),
                crate::model::ModelSource::Fields(
                    [("bark".to_string(), Field::boolean())].into_iter().collect(),
                ),
            ],
        ));
        let cat = ModelRef::new(Model::inherit("Cat", vec![pet.into()]));
        let field = Field::polymorph([("dog", dog), ("cat", cat)]).unwrap();

        let data = json!({"pet": {"kind": "dog", "bark": 1, "extra": true}});
        assert_eq!(
            field.output("pet", &data).unwrap(),
            json!({"kind": "dog", "bark": true})
        );
        assert_eq!(field.output("other", &data).unwrap(), Value::Null);

        let unknown = json!({"pet": {"kind": "fish"}});
        assert!(field.output("pet", &unknown).is_err());
    }
}
