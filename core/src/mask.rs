//! # Field Masks
//!
//! A mask selects a subset of fields, recursively: `name,address{street,city}`.
//! The `*` token keeps every field not otherwise listed.
//!
//! Masks apply in two places:
//! - to a field mapping, producing a projected mapping (unknown names are a
//!   configuration error),
//! - to marshalled JSON output, filtering keys.

use crate::error::{AppError, AppResult};
use crate::fields::Field;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

const WILDCARD: &str = "*";

/// A single mask entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaskNode {
    /// Keep the field as is.
    Leaf,
    /// Keep the field and apply a nested mask to it.
    Nested(Mask),
}

/// A parsed field mask.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mask {
    entries: IndexMap<String, MaskNode>,
}

#[derive(Debug, PartialEq)]
enum Token<'a> {
    Open,
    Close,
    Comma,
    Word(&'a str),
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '*')
}

fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (idx, c) in input.char_indices() {
        if is_word_char(c) {
            if start.is_none() {
                start = Some(idx);
            }
            continue;
        }
        if let Some(s) = start.take() {
            tokens.push(Token::Word(&input[s..idx]));
        }
        match c {
            '{' => tokens.push(Token::Open),
            '}' => tokens.push(Token::Close),
            ',' => tokens.push(Token::Comma),
            _ => {}
        }
    }
    if let Some(s) = start {
        tokens.push(Token::Word(&input[s..]));
    }
    tokens
}

impl Mask {
    /// Parses a textual mask.
    ///
    /// An optional outer pair of braces is accepted: `{a,b}` equals `a,b`.
    pub fn parse(input: &str) -> AppResult<Self> {
        let cleaned = input.replace('\n', "");
        let mut cleaned = cleaned.trim();
        if cleaned.is_empty() {
            return Ok(Self::default());
        }
        if cleaned.starts_with('{') {
            if !cleaned.ends_with('}') {
                return Err(mask_error("Missing closing bracket"));
            }
            cleaned = &cleaned[1..cleaned.len() - 1];
        }

        // Path of keys from the root to the mask currently being filled.
        let mut stack: Vec<String> = Vec::new();
        let mut root = Mask::default();
        let mut previous: Option<Token<'_>> = None;

        for token in tokenize(cleaned) {
            match &token {
                Token::Open => {
                    let current = root.descend_mut(&stack);
                    let Some(Token::Word(name)) = previous else {
                        return Err(mask_error("Unexpected opening bracket"));
                    };
                    if !current.entries.contains_key(name) {
                        return Err(mask_error("Unexpected opening bracket"));
                    }
                    current
                        .entries
                        .insert(name.to_string(), MaskNode::Nested(Mask::default()));
                    stack.push(name.to_string());
                }
                Token::Close => {
                    if stack.pop().is_none() {
                        return Err(mask_error("Unexpected closing bracket"));
                    }
                }
                Token::Comma => {
                    if matches!(previous, None | Some(Token::Comma) | Some(Token::Open)) {
                        return Err(mask_error("Unexpected comma"));
                    }
                }
                Token::Word(word) => {
                    root.descend_mut(&stack)
                        .entries
                        .insert(word.to_string(), MaskNode::Leaf);
                }
            }
            previous = Some(token);
        }

        if !stack.is_empty() {
            return Err(mask_error("Missing closing bracket"));
        }
        Ok(root)
    }

    fn descend_mut(&mut self, path: &[String]) -> &mut Mask {
        let mut current = self;
        for key in path {
            current = match current.entries.get_mut(key) {
                Some(MaskNode::Nested(inner)) => inner,
                // The parser only pushes keys it just turned into nested masks.
                _ => unreachable!("mask path always points at nested entries"),
            };
        }
        current
    }

    /// Whether the mask selects nothing at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the mask entries in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &MaskNode)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn has_wildcard(&self) -> bool {
        self.entries.contains_key(WILDCARD)
    }

    /// Projects a field mapping through the mask.
    pub fn apply_to_fields(
        &self,
        fields: &IndexMap<String, Field>,
    ) -> AppResult<IndexMap<String, Field>> {
        let mut out = IndexMap::new();
        for (name, node) in &self.entries {
            if name == WILDCARD {
                continue;
            }
            let field = fields.get(name).ok_or_else(|| {
                AppError::Configuration(format!("Mask references unknown field '{}'", name))
            })?;
            let projected = match node {
                MaskNode::Leaf => field.clone(),
                MaskNode::Nested(inner) => field.masked(inner)?,
            };
            out.insert(name.clone(), projected);
        }
        if self.has_wildcard() {
            for (name, field) in fields {
                if !out.contains_key(name) {
                    out.insert(name.clone(), field.clone());
                }
            }
        }
        Ok(out)
    }

    /// Filters marshalled output.
    ///
    /// When `skip` is set, keys missing from the data are left out; otherwise
    /// they are emitted as `null`.
    pub fn filter(&self, data: &Value, skip: bool) -> Value {
        match data {
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| self.filter(item, skip)).collect())
            }
            Value::Object(map) => Value::Object(self.filter_map(map, skip)),
            other => other.clone(),
        }
    }

    fn filter_map(&self, data: &Map<String, Value>, skip: bool) -> Map<String, Value> {
        let mut out = Map::new();
        for (name, node) in &self.entries {
            if name == WILDCARD {
                continue;
            }
            match (node, data.get(name)) {
                (_, None) if skip => {}
                (MaskNode::Nested(_), Some(Value::Null)) if skip => {}
                (MaskNode::Nested(inner), Some(nested)) if !nested.is_null() => {
                    out.insert(name.clone(), inner.filter(nested, skip));
                }
                (_, value) => {
                    out.insert(name.clone(), value.cloned().unwrap_or(Value::Null));
                }
            }
        }
        if self.has_wildcard() {
            for (key, value) in data {
                if !out.contains_key(key) {
                    out.insert(key.clone(), value.clone());
                }
            }
        }
        out
    }
}

fn mask_error(message: &str) -> AppError {
    AppError::Configuration(format!("Invalid mask: {}", message))
}

impl FromStr for Mask {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mask::parse(s)
    }
}

impl fmt::Display for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (idx, (name, node)) in self.entries.iter().enumerate() {
            if idx > 0 {
                write!(f, ",")?;
            }
            match node {
                MaskNode::Leaf => write!(f, "{}", name)?,
                MaskNode::Nested(inner) => write!(f, "{}{}", name, inner)?,
            }
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_flat_and_nested() {
        let mask = Mask::parse("name,address{street,city},age").unwrap();
        assert_eq!(mask.to_string(), "{name,address{street,city},age}");

        let braced = Mask::parse("{name,address{street,city},age}").unwrap();
        assert_eq!(mask, braced);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Mask::parse("{name").is_err());
        assert!(Mask::parse("name}").is_err());
        assert!(Mask::parse(",name").is_err());
        assert!(Mask::parse("{name,,age}").is_err());
        assert!(Mask::parse("name,{age}").is_err());
        assert!(Mask::parse("address{street").is_err());
    }

    #[test]
    fn test_filter_output() {
        let mask = Mask::parse("name,address{city}").unwrap();
        let data = json!({
            "name": "Doug",
            "age": 42,
            "address": {"street": "Main", "city": "Paris"}
        });
        assert_eq!(
            mask.filter(&data, false),
            json!({"name": "Doug", "address": {"city": "Paris"}})
        );
    }

    #[test]
    fn test_filter_missing_keys() {
        let mask = Mask::parse("name,nickname").unwrap();
        let data = json!({"name": "Doug"});
        assert_eq!(
            mask.filter(&data, false),
            json!({"name": "Doug", "nickname": null})
        );
        assert_eq!(mask.filter(&data, true), json!({"name": "Doug"}));
    }

    #[test]
    fn test_filter_wildcard_and_lists() {
        let mask = Mask::parse("tags{name},*").unwrap();
        let data = json!([{"id": 1, "tags": [{"name": "a", "id": 3}]}]);
        assert_eq!(
            mask.filter(&data, false),
            json!([{"tags": [{"name": "a"}], "id": 1}])
        );
    }
}
