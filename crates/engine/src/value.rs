//! Typed domain values for grid cells.
//!
//! A `Value` is what gets persisted; the human-readable rendering
//! lives next to it on the cell (`Cell::text`). The set of variants
//! is closed — column kinds map onto it, never the other way around.

use serde::{Deserialize, Serialize};

use crate::column::ColumnKind;

/// The typed value of one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// No value. Empty optional fields and untouched draft cells.
    Null,
    Text(String),
    Number(f64),
    Bool(bool),
    /// A single foreign reference by record id.
    Ref(i64),
    /// Many foreign references by record id.
    Refs(Vec<i64>),
    /// An array of plain strings.
    List(Vec<String>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    /// True for `Null`, empty/whitespace-only text, and empty arrays.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.trim().is_empty(),
            Value::Refs(ids) => ids.is_empty(),
            Value::List(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Deep equality for diffing and conflict detection.
    ///
    /// Reference arrays compare as sets (order-independent); plain
    /// string lists compare in order. All empty values are mutually
    /// equal so that clearing a cell never diffs against a `Null`
    /// baseline.
    pub fn eq_loose(&self, other: &Value) -> bool {
        if self.is_empty() && other.is_empty() {
            return true;
        }
        match (self, other) {
            (Value::Refs(a), Value::Refs(b)) => {
                if a.len() != b.len() {
                    return false;
                }
                let mut a = a.clone();
                let mut b = b.clone();
                a.sort_unstable();
                b.sort_unstable();
                a == b
            }
            _ => self == other,
        }
    }

    /// Fallback rendering when the caller supplies no display text.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Text(s) => s.clone(),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            Value::Bool(b) => b.to_string(),
            Value::Ref(id) => id.to_string(),
            Value::Refs(ids) => ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            Value::List(items) => items.join(", "),
        }
    }

    /// Interpret a JSON field value through a column kind.
    ///
    /// Shapes that don't fit the column (e.g. a string where a
    /// reference id is expected) come back as `Null` rather than
    /// poisoning the row — the server is authoritative for its own
    /// records.
    pub fn from_json(kind: ColumnKind, json: &serde_json::Value) -> Value {
        if json.is_null() {
            return Value::Null;
        }
        match kind {
            ColumnKind::Text | ColumnKind::Select => {
                json.as_str().map(|s| Value::Text(s.to_string())).unwrap_or(Value::Null)
            }
            ColumnKind::Decimal => match json {
                serde_json::Value::Number(n) => {
                    n.as_f64().map(Value::Number).unwrap_or(Value::Null)
                }
                serde_json::Value::String(s) => Value::Text(s.clone()),
                _ => Value::Null,
            },
            ColumnKind::Boolean => json.as_bool().map(Value::Bool).unwrap_or(Value::Null),
            ColumnKind::Reference => json.as_i64().map(Value::Ref).unwrap_or(Value::Null),
            ColumnKind::MultiReference => match json.as_array() {
                Some(items) => {
                    let ids: Vec<i64> = items.iter().filter_map(|v| v.as_i64()).collect();
                    if ids.len() == items.len() {
                        Value::Refs(ids)
                    } else {
                        Value::Null
                    }
                }
                None => Value::Null,
            },
            ColumnKind::StringList => match json.as_array() {
                Some(items) => {
                    let strings: Vec<String> = items
                        .iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect();
                    if strings.len() == items.len() {
                        Value::List(strings)
                    } else {
                        Value::Null
                    }
                }
                None => Value::Null,
            },
        }
    }

    /// Convert to the JSON shape the wire protocol carries.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Number(n) => serde_json::json!(n),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Ref(id) => serde_json::json!(id),
            Value::Refs(ids) => serde_json::json!(ids),
            Value::List(items) => serde_json::json!(items),
        }
    }
}
