//! Bound-value rendering
//!
//! Turns bound parameter values into the literal fragments substituted into
//! the statement text. This is textual templating, not parameterized
//! execution: text is wrapped in single quotes and nothing else is escaped.

use std::fmt;

use crate::types::{ParameterType, Value};

/// Separator used when flattening a list into one quoted literal
pub const LIST_SEPARATOR: &str = "', '";

/// Rendered form of one bound value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    /// Text wrapped in single quotes
    Quoted(String),
    /// Scalar passed through unquoted (numbers, booleans)
    Raw(String),
    /// Unquoted null
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quoted(text) => write!(f, "'{text}'"),
            Self::Raw(text) => f.write_str(text),
            Self::Null => f.write_str("null"),
        }
    }
}

/// Prefix a parameter name with `:` unless it already has one
pub fn normalize_parameter(name: &str) -> String {
    if name.starts_with(':') {
        name.to_string()
    } else {
        format!(":{name}")
    }
}

/// Render every bound value, keyed by its normalized placeholder
///
/// Output keeps the iteration order of `bound`. Parameters without a declared
/// type fall back to [`ParameterType::String`].
pub fn separate_bound_values<'a, I, T>(bound: I, types: T) -> Vec<(String, ParameterType, Literal)>
where
    I: IntoIterator<Item = (&'a String, &'a Value)>,
    T: Fn(&str) -> Option<ParameterType>,
{
    bound
        .into_iter()
        .map(|(name, value)| {
            let placeholder = normalize_parameter(name);
            let declared = types(&placeholder).unwrap_or_default();
            let literal = render(value);
            (placeholder, declared, literal)
        })
        .collect()
}

/// Render a single value
pub fn render(value: &Value) -> Literal {
    if let Some(text) = value.to_text() {
        return Literal::Quoted(text);
    }

    match value {
        Value::Null => Literal::Null,
        Value::Bool(b) => Literal::Raw(b.to_string()),
        Value::Int32(n) => Literal::Raw(n.to_string()),
        Value::Int64(n) => Literal::Raw(n.to_string()),
        Value::Float64(n) => Literal::Raw(n.to_string()),
        Value::Decimal(d) => Literal::Raw(d.to_string()),
        Value::Array(items) => Literal::Quoted(flatten(items)),
        Value::Json(serde_json::Value::Array(items)) => {
            let items: Vec<Value> = items.iter().cloned().map(Value::from_json).collect();
            Literal::Quoted(flatten(&items))
        }
        Value::Json(serde_json::Value::String(s)) => Literal::Quoted(s.clone()),
        Value::Json(serde_json::Value::Null) => Literal::Null,
        Value::Json(json) => Literal::Raw(json.to_string()),
        Value::String(_)
        | Value::Date(_)
        | Value::DateTime(_)
        | Value::DateTimeTz(_)
        | Value::Uuid(_) => unreachable!("textual value {value:?} has no text form"),
    }
}

/// Join list elements so that wrapping the result in quotes yields a
/// multi-value literal list
fn flatten(items: &[Value]) -> String {
    items
        .iter()
        .map(element_text)
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

fn element_text(value: &Value) -> String {
    match render(value) {
        Literal::Quoted(text) | Literal::Raw(text) => text,
        Literal::Null => String::new(),
    }
}
