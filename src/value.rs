//! Values held by the path store.
//!
//! Every payload is classified once, at write time, into one of the variants
//! below. Readers never re-derive the kind from a different representation.

use serde::{Deserialize, Serialize};

/// A stored value.
///
/// Integers and floats are kept apart so that output renders the way the
/// payload was written (`20` stays `20`), but both count as numbers for
/// schema purposes.
///
/// # Examples
///
/// ```
/// use topicgraph::Value;
///
/// assert_eq!(Value::infer("22.5"), Value::Float(22.5));
/// assert_eq!(Value::infer("TRUE"), Value::Bool(true));
/// assert_eq!(Value::infer("on"), Value::String("on".to_string()));
/// assert!(Value::infer(r#"{"a":1}"#).is_object());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// A JSON object or array.
    Structured(serde_json::Value),
}

/// Coarse classification used by the schema projector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Structured,
}

impl Value {
    /// Infers a value from payload text.
    ///
    /// Order: strict JSON, then case-insensitive `true`/`false`, then a
    /// finite numeric literal, then the raw text unchanged.
    #[must_use]
    pub fn infer(text: &str) -> Self {
        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(text) {
            return Self::from(parsed);
        }

        let trimmed = text.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        if let Some(number) = parse_number(trimmed) {
            return number;
        }

        Self::String(text.to_string())
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    pub const fn is_number(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }

    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    pub const fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }

    /// True for a structured JSON object (not an array).
    pub const fn is_object(&self) -> bool {
        matches!(self, Self::Structured(serde_json::Value::Object(_)))
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) | Self::Float(_) => ValueKind::Number,
            Self::String(_) => ValueKind::String,
            Self::Structured(_) => ValueKind::Structured,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Structured(serde_json::Value::Array(_)) => "array",
            Self::Structured(_) => "object",
        }
    }

    /// Converts into plain JSON. Non-finite floats become `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(v) => serde_json::Value::Bool(*v),
            Self::Int(v) => serde_json::Value::from(*v),
            Self::Float(v) => serde_json::Number::from_f64(*v)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::String(v) => serde_json::Value::String(v.clone()),
            Self::Structured(v) => v.clone(),
        }
    }
}

fn parse_number(trimmed: &str) -> Option<Value> {
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(Value::Int(v));
    }
    // f64::from_str also accepts "inf" and "NaN", which are not numeric
    // literals for our purposes.
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(Value::Float(v)),
        _ => None,
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Structured(v) => write!(f, "{v}"),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map_or(Self::Null, Self::Float),
            },
            serde_json::Value::String(s) => Self::String(s),
            other @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
                Self::Structured(other)
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_infer_json_scalars() {
        assert_eq!(Value::infer("123"), Value::Int(123));
        assert_eq!(Value::infer("123.45"), Value::Float(123.45));
        assert_eq!(Value::infer("null"), Value::Null);
        assert_eq!(Value::infer("\"quoted\""), Value::String("quoted".into()));
        assert_eq!(Value::infer("true"), Value::Bool(true));
    }

    #[test]
    fn test_infer_booleans_case_insensitive() {
        assert_eq!(Value::infer("FALSE"), Value::Bool(false));
        assert_eq!(Value::infer("True"), Value::Bool(true));
        assert_eq!(Value::infer("  tRuE "), Value::Bool(true));
    }

    #[test]
    fn test_infer_non_json_numbers() {
        assert_eq!(Value::infer("007"), Value::Int(7));
        assert_eq!(Value::infer("+5"), Value::Int(5));
        assert_eq!(Value::infer(".5"), Value::Float(0.5));
        assert_eq!(Value::infer(" 42 "), Value::Int(42));
    }

    #[test]
    fn test_infer_rejects_non_finite_words() {
        assert_eq!(Value::infer("inf"), Value::String("inf".into()));
        assert_eq!(Value::infer("NaN"), Value::String("NaN".into()));
    }

    #[test]
    fn test_infer_fallback_keeps_raw_text() {
        assert_eq!(Value::infer("hello world"), Value::String("hello world".into()));
        assert_eq!(Value::infer(" on "), Value::String(" on ".into()));
        assert_eq!(Value::infer(""), Value::String(String::new()));
        assert_eq!(Value::infer("{broken"), Value::String("{broken".into()));
    }

    #[test]
    fn test_infer_structured() {
        let val = Value::infer(r#"{"foo":"bar","baz":1}"#);
        assert!(val.is_object());
        assert_eq!(val.to_json(), json!({"foo": "bar", "baz": 1}));

        let arr = Value::infer("[1,2]");
        assert!(arr.is_structured());
        assert!(!arr.is_object());
        assert_eq!(arr.type_name(), "array");
    }

    #[test]
    fn test_kind_and_accessors() {
        assert_eq!(Value::Int(3).kind(), ValueKind::Number);
        assert_eq!(Value::Float(3.5).kind(), ValueKind::Number);
        assert_eq!(Value::Int(3).as_float(), Some(3.0));
        assert!(Value::Bool(true).as_float().is_none());
        assert_eq!(Value::from("x").kind(), ValueKind::String);
    }

    #[test]
    fn test_to_json_keeps_integer_form() {
        assert_eq!(Value::Int(20).to_json(), json!(20));
        assert_eq!(Value::Float(20.5).to_json(), json!(20.5));
        assert_eq!(Value::Float(f64::NAN).to_json(), serde_json::Value::Null);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Value::Bool(true)), "true");
        assert_eq!(format!("{}", Value::Int(42)), "42");
        assert_eq!(format!("{}", Value::String("hi".into())), "\"hi\"");
        assert_eq!(format!("{}", Value::Null), "null");
    }

    #[test]
    fn test_serialization_is_plain_json() {
        let val = Value::Int(7);
        assert_eq!(serde_json::to_string(&val).unwrap(), "7");
        let back: Value = serde_json::from_str("7").unwrap();
        assert_eq!(back, val);
    }
}
