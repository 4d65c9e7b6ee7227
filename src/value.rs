//! Dynamic value type stored by every driver.

use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// JSON tag for a `Value::Bytes`: `{"$bytes": "<base64>"}`.
pub const BYTES_TAG: &str = "$bytes";
/// JSON tag wrapping a map that would otherwise read as a tag: `{"$map": {...}}`.
pub const MAP_TAG: &str = "$map";

/// A single-entry map keyed `$...` is escaped so it never reads back as a tag.
fn looks_tagged(m: &BTreeMap<String, Value>) -> bool {
    m.len() == 1 && m.keys().all(|k| k.starts_with('$'))
}

/// A cacheable value.
///
/// Drivers accept and return `Value` so a single registry can front backends
/// holding unrelated data. Equality is structural.
///
/// # Example
///
/// ```
/// use cache_facade::Value;
/// use std::collections::BTreeMap;
///
/// let mut profile = BTreeMap::new();
/// profile.insert("name".to_string(), Value::from("Alice"));
/// profile.insert("age".to_string(), Value::from(30));
///
/// let value = Value::Map(profile);
/// assert_eq!(value.get("name"), Some(&Value::from("Alice")));
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Look up a field of a `Map` value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        match self {
            Value::Map(m) => m.get(field),
            _ => None,
        }
    }

    /// Convert into a JSON tree.
    ///
    /// `Bytes` become `{"$bytes": "<base64>"}`. A map holding a single `$`
    /// key is wrapped as `{"$map": {...}}`. [`Value::from_json`] reverses
    /// both.
    ///
    /// # Errors
    ///
    /// `Error::SerializationError` if the value holds a NaN or infinite
    /// float, which JSON cannot represent.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .ok_or_else(|| {
                    Error::SerializationError(format!("non-finite float {} is not encodable", f))
                })?,
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => {
                let mut object = serde_json::Map::with_capacity(1);
                object.insert(BYTES_TAG.to_string(), BASE64.encode(b).into());
                serde_json::Value::Object(object)
            }
            Value::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(Value::to_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Map(m) => {
                let mut object = serde_json::Map::with_capacity(m.len());
                for (k, v) in m {
                    object.insert(k.clone(), v.to_json()?);
                }
                if looks_tagged(m) {
                    let mut wrapper = serde_json::Map::with_capacity(1);
                    wrapper.insert(MAP_TAG.to_string(), serde_json::Value::Object(object));
                    serde_json::Value::Object(wrapper)
                } else {
                    serde_json::Value::Object(object)
                }
            }
        })
    }

    /// Build a value from a JSON tree produced by [`Value::to_json`] or by
    /// any other JSON source.
    ///
    /// Integers that fit `i64` become `Int`; every other number is a
    /// `Float`.
    ///
    /// # Errors
    ///
    /// `Error::DeserializationError` if a `$bytes` tag holds invalid base64.
    pub fn from_json(json: serde_json::Value) -> Result<Value> {
        Ok(match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                // u64 beyond i64::MAX and all floats
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::List(
                items
                    .into_iter()
                    .map(Value::from_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            serde_json::Value::Object(mut m) => {
                if m.len() == 1 {
                    match m.remove(BYTES_TAG) {
                        Some(serde_json::Value::String(encoded)) => {
                            let bytes = BASE64.decode(encoded.as_bytes()).map_err(|e| {
                                Error::DeserializationError(format!("invalid $bytes: {}", e))
                            })?;
                            return Ok(Value::Bytes(bytes));
                        }
                        Some(other) => {
                            m.insert(BYTES_TAG.to_string(), other);
                        }
                        None => {}
                    }
                    match m.remove(MAP_TAG) {
                        Some(serde_json::Value::Object(inner)) => return map_from_json(inner),
                        Some(other) => {
                            m.insert(MAP_TAG.to_string(), other);
                        }
                        None => {}
                    }
                }
                map_from_json(m)?
            }
        })
    }
}

fn map_from_json(object: serde_json::Map<String, serde_json::Value>) -> Result<Value> {
    let mut map = BTreeMap::new();
    for (k, v) in object {
        map.insert(k, Value::from_json(v)?);
    }
    Ok(Value::Map(map))
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i.into())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i.into())
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        i64::try_from(i)
            .map(Value::Int)
            .unwrap_or(Value::Float(i as f64))
    }
}

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        i64::try_from(i)
            .map(Value::Int)
            .unwrap_or(Value::Float(i as f64))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(m: BTreeMap<String, Value>) -> Self {
        Value::Map(m)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
