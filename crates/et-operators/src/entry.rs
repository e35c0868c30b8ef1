//! Wire-level building blocks shared by every operator family.
//!
//! The durable form of an operator method is a method name plus a parameter
//! map. Multi-method families serialize to an ordered list of
//! [`MethodEntry`]; single-method families serialize to a
//! [`SingleMethodForm`] whose method may be null.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One encoded operator method: `{"method": ..., "parameters": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodEntry {
    pub method: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl MethodEntry {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            parameters: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }
}

/// Encoded form of a family holding at most one active method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleMethodForm {
    pub method: Option<String>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl SingleMethodForm {
    pub fn empty() -> Self {
        Self {
            method: None,
            parameters: Map::new(),
        }
    }
}

impl Default for SingleMethodForm {
    fn default() -> Self {
        Self::empty()
    }
}

/// Result of decoding an encoded form: the reconstructed settings plus a
/// count of entries that had to be skipped (unknown method names, or known
/// methods missing a parameter that has no default).
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Parameter readers
// ---------------------------------------------------------------------------

pub(crate) fn f64_param(p: &Map<String, Value>, key: &str, default: f64) -> f64 {
    p.get(key).and_then(Value::as_f64).unwrap_or(default)
}

pub(crate) fn bool_param(p: &Map<String, Value>, key: &str, default: bool) -> bool {
    p.get(key).and_then(Value::as_bool).unwrap_or(default)
}

// Counts arrive as integers from our own encoder, but operator-supplied JSON
// may carry them as integral floats. Accept both.
pub(crate) fn count_value(v: &Value) -> Option<u64> {
    v.as_u64()
        .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
}

pub(crate) fn u64_param(p: &Map<String, Value>, key: &str, default: u64) -> u64 {
    p.get(key).and_then(count_value).unwrap_or(default)
}

pub(crate) fn u32_param(p: &Map<String, Value>, key: &str, default: u32) -> u32 {
    u64_param(p, key, default as u64) as u32
}

pub(crate) fn req_f64(p: &Map<String, Value>, key: &str) -> Option<f64> {
    p.get(key).and_then(Value::as_f64)
}

pub(crate) fn req_u32(p: &Map<String, Value>, key: &str) -> Option<u32> {
    p.get(key).and_then(count_value).map(|n| n as u32)
}

pub(crate) fn req_usize(p: &Map<String, Value>, key: &str) -> Option<usize> {
    p.get(key).and_then(count_value).map(|n| n as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_builder_produces_wire_shape() {
        let entry = MethodEntry::new("rank").with("pressure", 1.5).with("exponent", 1.0);
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({"method": "rank", "parameters": {"pressure": 1.5, "exponent": 1.0}})
        );
    }

    #[test]
    fn entry_decodes_without_parameters() {
        let entry: MethodEntry = serde_json::from_value(json!({"method": "swap"})).unwrap();
        assert_eq!(entry.method, "swap");
        assert!(entry.parameters.is_empty());
    }

    #[test]
    fn single_form_empty_wire_shape() {
        assert_eq!(
            serde_json::to_value(SingleMethodForm::empty()).unwrap(),
            json!({"method": null, "parameters": {}})
        );
    }

    #[test]
    fn count_accepts_integral_float() {
        let p: Map<String, Value> = serde_json::from_value(json!({"n": 30.0})).unwrap();
        assert_eq!(u64_param(&p, "n", 0), 30);
    }
}
