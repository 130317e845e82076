// Record and query types plus the exact-match rule used by `find`.
use serde_json::{Map, Number, Value};

use crate::core::error::{Error, ErrorKind};

/// A stored document: one JSON object per line in the collection file.
pub type Record = Map<String, Value>;

/// Accepts `value` as a record if it is a JSON object.
pub fn validate_record(value: Value) -> Result<Record, Error> {
    match value {
        Value::Object(record) => Ok(record),
        Value::Null => Err(Error::new(ErrorKind::InvalidRecord).with_message("record is null")),
        other => Err(Error::new(ErrorKind::InvalidRecord)
            .with_message(format!("record must be a JSON object, got {}", type_name(&other)))),
    }
}

/// Field/value pairs a record must carry to match. Empty matches everything.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    fields: Map<String, Value>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(Error::new(ErrorKind::Usage)
                .with_message(format!("query must be a JSON object, got {}", type_name(&other)))
                .with_hint("Use {} to match every record.")),
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.fields.iter().all(|(key, expected)| {
            record
                .get(key)
                .is_some_and(|actual| values_equal(actual, expected))
        })
    }
}

impl From<Map<String, Value>> for Query {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, a)| b.get(key).is_some_and(|b| values_equal(a, b)))
        }
        _ => a == b,
    }
}

// Integers compare exactly; anything involving a float compares as f64.
fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return a == b;
    }
    if a.is_f64() || b.is_f64() {
        return match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
    }
    false
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
