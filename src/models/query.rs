//! Query parameter and result models.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A parameter value for parameterized queries.
///
/// Parameters arrive over the wire as a heterogeneous JSON array and are
/// forwarded to the driver as-is; no coercion beyond what binding requires.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl QueryParam {
    /// Convert a JSON value into a parameter. Arrays and objects are passed
    /// through as their JSON text, matching how dynamic clients send them.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            JsonValue::String(s) => Self::String(s.clone()),
            other => Self::String(other.to_string()),
        }
    }

    /// Convert a JSON array of values into parameters.
    pub fn from_json_array(values: &[JsonValue]) -> Vec<Self> {
        values.iter().map(Self::from_json).collect()
    }
}

/// Result of a non-query statement.
///
/// Either field is `-1` when the driver cannot supply the value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExecOutcome {
    pub rows_affected: i64,
    pub last_insert_id: i64,
}
