//! MessagePack mapping of [`Value`].
//!
//! Values are written in their natural MessagePack shape rather than the
//! derived enum layout: `Bytes` is a `bin`, `Map` is a string-keyed map,
//! numbers are plain `int`/`float`. Decoding accepts any MessagePack
//! document of that shape.

use crate::error::Result;
use crate::value::Value;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{self, Serialize, SerializeMap, SerializeSeq, Serializer};
use std::collections::BTreeMap;
use std::fmt;

struct Natural<'a>(&'a Value);

impl Serialize for Natural<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Value::Float(f) => Err(ser::Error::custom(format!(
                "non-finite float {} is not encodable",
                f
            ))),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&Natural(item))?;
                }
                seq.end()
            }
            Value::Map(m) => {
                let mut map = serializer.serialize_map(Some(m.len()))?;
                for (k, v) in m {
                    map.serialize_entry(k, &Natural(v))?;
                }
                map.end()
            }
        }
    }
}

struct Decoded(Value);

impl<'de> Deserialize<'de> for Decoded {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(NaturalVisitor).map(Decoded)
    }
}

struct NaturalVisitor;

impl<'de> Visitor<'de> for NaturalVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a MessagePack value")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> std::result::Result<Value, D::Error> {
        d.deserialize_any(NaturalVisitor)
    }

    fn visit_bool<E: de::Error>(self, b: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(b))
    }

    fn visit_i64<E: de::Error>(self, i: i64) -> std::result::Result<Value, E> {
        Ok(Value::Int(i))
    }

    fn visit_u64<E: de::Error>(self, u: u64) -> std::result::Result<Value, E> {
        Ok(Value::from(u))
    }

    fn visit_f64<E: de::Error>(self, f: f64) -> std::result::Result<Value, E> {
        Ok(Value::Float(f))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> std::result::Result<Value, E> {
        Ok(Value::String(s.to_string()))
    }

    fn visit_string<E: de::Error>(self, s: String) -> std::result::Result<Value, E> {
        Ok(Value::String(s))
    }

    fn visit_bytes<E: de::Error>(self, b: &[u8]) -> std::result::Result<Value, E> {
        Ok(Value::Bytes(b.to_vec()))
    }

    fn visit_byte_buf<E: de::Error>(self, b: Vec<u8>) -> std::result::Result<Value, E> {
        Ok(Value::Bytes(b))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
        while let Some(Decoded(item)) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Value, A::Error> {
        let mut map = BTreeMap::new();
        while let Some((k, Decoded(v))) = access.next_entry::<String, Decoded>()? {
            map.insert(k, v);
        }
        Ok(Value::Map(map))
    }
}

pub(crate) fn encode(value: &Value) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec(&Natural(value))?)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Value> {
    let Decoded(value) = rmp_serde::from_slice(bytes)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_are_bin() {
        let bytes = encode(&Value::Bytes(vec![1, 2, 3])).unwrap();
        // bin 8 marker, length, payload
        assert_eq!(bytes, vec![0xc4, 3, 1, 2, 3]);
        assert_eq!(decode(&bytes).unwrap(), Value::Bytes(vec![1, 2, 3]));
    }

    #[test]
    fn test_natural_shape() {
        let mut m = BTreeMap::new();
        m.insert("a".to_string(), Value::Int(1));
        let bytes = encode(&Value::Map(m.clone())).unwrap();
        // fixmap(1), fixstr "a", positive fixint 1
        assert_eq!(bytes, vec![0x81, 0xa1, b'a', 0x01]);
        assert_eq!(decode(&bytes).unwrap(), Value::Map(m));
    }

    #[test]
    fn test_float_bits_survive() {
        let f = 1.071_566_039_146_582_6e-75;
        assert_eq!(decode(&encode(&Value::Float(f)).unwrap()).unwrap(), Value::Float(f));
    }

    #[test]
    fn test_large_unsigned_reads_as_float() {
        let bytes = rmp_serde::to_vec(&u64::MAX).unwrap();
        assert_eq!(decode(&bytes).unwrap(), Value::Float(u64::MAX as f64));
    }
}
