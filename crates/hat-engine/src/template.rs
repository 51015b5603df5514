//! Placeholder substitution for request and response templates.
//!
//! Strings use named placeholders resolved against a [`StateStore`]:
//!
//! - `{name}` - replaced with the stored value for `name`
//! - `{{` / `}}` - literal braces
//!
//! Structured templates (mappings and sequences) are resolved recursively.
//! A [`Coercion`] node is substituted first and then parsed into a native
//! JSON integer or boolean, which is how a scenario asks for `{"id": 7}`
//! rather than `{"id": "7"}`.
//!
//! # Example
//!
//! ```yaml
//! body:
//!   id: { $int: "123{testId}" }
//!   username: "user-{testId}"
//! ```

use crate::error::TemplateError;
use crate::store::StateStore;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Mapping key marking an integer coercion node.
pub const INT_TAG: &str = "$int";
/// Mapping key marking a boolean coercion node.
pub const BOOL_TAG: &str = "$bool";

/// Matches escaped braces, `{name}` placeholders and stray single braces.
static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_placeholder_regex() -> &'static Regex {
    PLACEHOLDER_REGEX.get_or_init(|| Regex::new(r"\{\{|\}\}|\{([^{}]*)\}|[{}]").unwrap())
}

/// Native type a [`Coercion`] evaluates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionTarget {
    Integer,
    Boolean,
}

impl CoercionTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoercionTarget::Integer => "integer",
            CoercionTarget::Boolean => "boolean",
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            CoercionTarget::Integer => INT_TAG,
            CoercionTarget::Boolean => BOOL_TAG,
        }
    }
}

/// A string template that must become a JSON number or boolean after
/// substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coercion {
    pub target: CoercionTarget,
    pub template: String,
}

impl Coercion {
    pub fn evaluate(&self, store: &StateStore) -> Result<Value, TemplateError> {
        let text = format_placeholders(&self.template, store)?;
        let trimmed = text.trim();
        let coerced = match self.target {
            CoercionTarget::Integer => trimmed.parse::<i64>().ok().map(Value::from),
            CoercionTarget::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
        };
        coerced.ok_or_else(|| TemplateError::Coercion {
            value: text.clone(),
            target: self.target.as_str(),
        })
    }
}

/// A value that may contain placeholders.
///
/// Deserializes from any JSON/YAML value; single-key mappings tagged `$int`
/// or `$bool` become coercion nodes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub enum Template {
    Text(String),
    Coerce(Coercion),
    Object(BTreeMap<String, Template>),
    Array(Vec<Template>),
    /// Numbers, booleans and null are passed through unchanged.
    Literal(Value),
}

impl Template {
    pub fn text(s: impl Into<String>) -> Self {
        Template::Text(s.into())
    }

    pub fn int(template: impl Into<String>) -> Self {
        Template::Coerce(Coercion {
            target: CoercionTarget::Integer,
            template: template.into(),
        })
    }

    pub fn bool(template: impl Into<String>) -> Self {
        Template::Coerce(Coercion {
            target: CoercionTarget::Boolean,
            template: template.into(),
        })
    }

    /// True for mappings, sequences and coercion nodes, which are sent and
    /// compared as JSON.
    pub fn is_structured(&self) -> bool {
        matches!(
            self,
            Template::Object(_) | Template::Array(_) | Template::Coerce(_)
        )
    }

    /// Resolve every placeholder against `store`.
    ///
    /// Pure: the template is untouched, so the same route can be resolved
    /// again for another host with a different store.
    pub fn substitute(&self, store: &StateStore) -> Result<Value, TemplateError> {
        match self {
            Template::Text(s) => Ok(Value::String(format_placeholders(s, store)?)),
            Template::Coerce(coercion) => coercion.evaluate(store),
            Template::Object(fields) => {
                let mut map = Map::new();
                for (key, value) in fields {
                    map.insert(key.clone(), value.substitute(store)?);
                }
                Ok(Value::Object(map))
            }
            Template::Array(items) => items
                .iter()
                .map(|item| item.substitute(store))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Template::Literal(value) => Ok(value.clone()),
        }
    }

    /// Plain text form used for scalar comparisons and raw bodies.
    pub fn literal_text(&self) -> String {
        match self {
            Template::Text(s) => s.clone(),
            Template::Literal(Value::String(s)) => s.clone(),
            Template::Literal(value) => value.to_string(),
            Template::Coerce(coercion) => coercion.template.clone(),
            other => Value::from(other).to_string(),
        }
    }
}

impl From<Value> for Template {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Template::Text(s),
            Value::Array(items) => Template::Array(items.into_iter().map(Template::from).collect()),
            Value::Object(map) => {
                if map.len() == 1 {
                    if let Some((tag, Value::String(inner))) = map.iter().next() {
                        let target = match tag.as_str() {
                            INT_TAG => Some(CoercionTarget::Integer),
                            BOOL_TAG => Some(CoercionTarget::Boolean),
                            _ => None,
                        };
                        if let Some(target) = target {
                            return Template::Coerce(Coercion {
                                target,
                                template: inner.clone(),
                            });
                        }
                    }
                }
                Template::Object(
                    map.into_iter()
                        .map(|(k, v)| (k, Template::from(v)))
                        .collect(),
                )
            }
            other => Template::Literal(other),
        }
    }
}

impl From<&Template> for Value {
    fn from(template: &Template) -> Self {
        match template {
            Template::Text(s) => Value::String(s.clone()),
            Template::Coerce(coercion) => {
                let mut map = Map::new();
                map.insert(
                    coercion.target.tag().to_string(),
                    Value::String(coercion.template.clone()),
                );
                Value::Object(map)
            }
            Template::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
            Template::Array(items) => Value::Array(items.iter().map(Value::from).collect()),
            Template::Literal(value) => value.clone(),
        }
    }
}

impl From<&str> for Template {
    fn from(s: &str) -> Self {
        Template::Text(s.to_string())
    }
}

impl From<String> for Template {
    fn from(s: String) -> Self {
        Template::Text(s)
    }
}

/// Substitute `{name}` placeholders in a single string.
///
/// A placeholder whose name is absent from `store` is an error; no default
/// is ever filled in.
pub fn format_placeholders(template: &str, store: &StateStore) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in get_placeholder_regex().captures_iter(template) {
        let Some(m) = caps.get(0) else { continue };
        out.push_str(&template[last..m.start()]);
        last = m.end();

        match m.as_str() {
            "{{" => out.push('{'),
            "}}" => out.push('}'),
            "{" => return Err(malformed(template, m.start(), "unmatched '{'")),
            "}" => return Err(malformed(template, m.start(), "single '}' encountered")),
            _ => {
                let name = caps.get(1).map(|n| n.as_str()).unwrap_or_default();
                if name.is_empty() {
                    return Err(malformed(template, m.start(), "empty placeholder"));
                }
                let value = store
                    .display(name)
                    .ok_or_else(|| TemplateError::MissingKey(name.to_string()))?;
                out.push_str(&value);
            }
        }
    }

    out.push_str(&template[last..]);
    Ok(out)
}

fn malformed(template: &str, offset: usize, reason: &'static str) -> TemplateError {
    TemplateError::Malformed {
        template: template.to_string(),
        offset,
        reason,
    }
}
