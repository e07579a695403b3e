use crate::coords::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize)]
struct ValueColumn<'a> {
    value: &'a PropValue,
}

/// A property or payload value as carried through the pipeline.
///
/// Serializes to plain JSON (no variant tag), so a stored value reads the
/// same as it did in the recording. Deserialization tries the variants in
/// declaration order, which keeps whole numbers as `Int` and only treats an
/// object with exactly `x`, `y` and `z` as a position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Position(Vector3),
    Map(BTreeMap<String, PropValue>),
}

impl PropValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Unsigned view of an integer value; `None` if negative or out of range.
    pub fn as_u32(&self) -> Option<u32> {
        self.as_i64().and_then(|v| u32::try_from(v).ok())
    }

    /// Float view; integers widen so a fraction recorded as `0` still reads.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            PropValue::Float(v) => Some(*v as f32),
            PropValue::Int(v) => Some(*v as f32),
            _ => None,
        }
    }

    pub fn as_position(&self) -> Option<Vector3> {
        match self {
            PropValue::Position(v) => Some(*v),
            _ => None,
        }
    }

    /// Storage form: `{"value": <v>}`
    pub fn to_column_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&ValueColumn { value: self })
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        PropValue::Bool(v)
    }
}

impl From<i64> for PropValue {
    fn from(v: i64) -> Self {
        PropValue::Int(v)
    }
}

impl From<u32> for PropValue {
    fn from(v: u32) -> Self {
        PropValue::Int(v as i64)
    }
}

impl From<i32> for PropValue {
    fn from(v: i32) -> Self {
        PropValue::Int(v as i64)
    }
}

impl From<f64> for PropValue {
    fn from(v: f64) -> Self {
        PropValue::Float(v)
    }
}

impl From<f32> for PropValue {
    fn from(v: f32) -> Self {
        PropValue::Float(v as f64)
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        PropValue::String(v.to_string())
    }
}

impl From<Vector3> for PropValue {
    fn from(v: Vector3) -> Self {
        PropValue::Position(v)
    }
}
