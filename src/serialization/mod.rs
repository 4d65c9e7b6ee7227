//! Named codecs that turn a [`Value`] into storable bytes and back.
//!
//! | Name                        | Codec                | Format                         |
//! |-----------------------------|----------------------|--------------------------------|
//! | `json` (and anything else)  | [`Codec::Json`]      | UTF-8 JSON                     |
//! | `msgpack`, `messagepack`    | [`Codec::MessagePack`] | MessagePack via `rmp-serde`  |
//! | `native`, `postcard`        | [`Codec::Native`]    | postcard in a `CKIT` envelope  |
//!
//! Codec selection never fails: an empty or unknown name resolves to JSON,
//! so a typo in configuration degrades to the readable format instead of
//! aborting startup.
//!
//! JSON and MessagePack carry the natural shape of the value (a string is a
//! JSON string, a map is a JSON object). Both reject non-finite floats.
//! MessagePack writes `Value::Bytes` as `bin`; JSON writes it as a
//! `{"$bytes": "<base64>"}` object (see [`Value::to_json`]). Every codec
//! decodes what it encoded back to an equal value.
//!
//! ```
//! use cache_facade::serialization::Codec;
//! use cache_facade::Value;
//!
//! let codec = Codec::from_name("msgpack");
//! let bytes = codec.encode(&Value::from("hello")).unwrap();
//! assert_eq!(codec.decode(&bytes).unwrap(), Value::from("hello"));
//!
//! assert_eq!(Codec::from_name("no-such-codec"), Codec::Json);
//! ```

pub mod envelope;
mod msgpack;

use crate::error::Result;
use crate::value::Value;
use std::fmt;

pub use envelope::{CacheEnvelope, CACHE_MAGIC, CURRENT_SCHEMA_VERSION};

/// A stateless encode/decode pair identified by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Codec {
    #[default]
    Json,
    MessagePack,
    Native,
}

impl Codec {
    /// Resolve a configured codec name. Total: unknown names yield `Json`.
    pub fn from_name(name: &str) -> Codec {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => Codec::Json,
            "msgpack" | "messagepack" => Codec::MessagePack,
            "native" | "postcard" => Codec::Native,
            other => {
                if !other.is_empty() {
                    debug!("Unknown serializer '{}', falling back to json", other);
                }
                Codec::Json
            }
        }
    }

    /// Canonical name, as reported in driver stats.
    pub fn name(&self) -> &'static str {
        match self {
            Codec::Json => "json",
            Codec::MessagePack => "msgpack",
            Codec::Native => "native",
        }
    }

    /// Encode a value.
    ///
    /// # Errors
    ///
    /// `Error::SerializationError` if the value has no representation in
    /// this codec.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        match self {
            Codec::Json => Ok(serde_json::to_vec(&value.to_json()?)?),
            Codec::MessagePack => msgpack::encode(value),
            Codec::Native => envelope::seal(value),
        }
    }

    /// Decode bytes produced by [`Codec::encode`] of the same codec.
    ///
    /// # Errors
    ///
    /// `Error::DeserializationError`, `Error::InvalidCacheEntry` or
    /// `Error::VersionMismatch` when the bytes are not a valid encoding.
    pub fn decode(&self, bytes: &[u8]) -> Result<Value> {
        match self {
            Codec::Json => {
                let json: serde_json::Value = serde_json::from_slice(bytes)?;
                Value::from_json(json)
            }
            Codec::MessagePack => msgpack::decode(bytes),
            Codec::Native => envelope::open(bytes),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::collections::BTreeMap;

    fn sample() -> Value {
        let mut inner = BTreeMap::new();
        inner.insert("number".to_string(), Value::Int(42));
        inner.insert("ratio".to_string(), Value::Float(0.25));
        inner.insert("flag".to_string(), Value::Bool(true));
        let mut outer = BTreeMap::new();
        outer.insert("string".to_string(), Value::from("test"));
        outer.insert(
            "list".to_string(),
            Value::List(vec![Value::Null, Value::Map(inner)]),
        );
        Value::Map(outer)
    }

    #[test]
    fn test_from_name_is_total() {
        assert_eq!(Codec::from_name("json"), Codec::Json);
        assert_eq!(Codec::from_name("MsgPack"), Codec::MessagePack);
        assert_eq!(Codec::from_name("messagepack"), Codec::MessagePack);
        assert_eq!(Codec::from_name("native"), Codec::Native);
        assert_eq!(Codec::from_name("postcard"), Codec::Native);
        assert_eq!(Codec::from_name(""), Codec::Json);
        assert_eq!(Codec::from_name("invalid_serializer"), Codec::Json);
    }

    #[test]
    fn test_roundtrip_all_codecs() {
        for codec in [Codec::Json, Codec::MessagePack, Codec::Native] {
            let bytes = codec.encode(&sample()).unwrap();
            assert_eq!(codec.decode(&bytes).unwrap(), sample(), "codec {}", codec);
        }
    }

    #[test]
    fn test_json_is_human_readable() {
        let bytes = Codec::Json.encode(&Value::from("test_value")).unwrap();
        assert_eq!(bytes, br#""test_value""#.to_vec());
    }

    #[test]
    fn test_structured_codecs_reject_nan() {
        for codec in [Codec::Json, Codec::MessagePack] {
            let err = codec.encode(&Value::Float(f64::NAN)).unwrap_err();
            assert!(matches!(err, Error::SerializationError(_)), "codec {}", codec);
            assert!(err.to_string().contains("could not serialize value"));
        }
        // native keeps the bits
        let bytes = Codec::Native.encode(&Value::Float(f64::INFINITY)).unwrap();
        assert_eq!(
            Codec::Native.decode(&bytes).unwrap(),
            Value::Float(f64::INFINITY)
        );
    }

    #[test]
    fn test_every_codec_preserves_bytes() {
        let v = Value::List(vec![Value::Bytes(vec![0, 159, 146, 150]), Value::Bytes(vec![])]);
        for codec in [Codec::Json, Codec::MessagePack, Codec::Native] {
            let bytes = codec.encode(&v).unwrap();
            assert_eq!(codec.decode(&bytes).unwrap(), v, "codec {}", codec);
        }
    }

    #[test]
    fn test_every_codec_preserves_float_bits() {
        let floats = [1.071_566_039_146_582_6e-75, 0.1 + 0.2, f64::MAX, f64::MIN_POSITIVE];
        for codec in [Codec::Json, Codec::MessagePack, Codec::Native] {
            for f in floats {
                let bytes = codec.encode(&Value::Float(f)).unwrap();
                assert_eq!(codec.decode(&bytes).unwrap(), Value::Float(f), "codec {}", codec);
            }
        }
    }

    #[test]
    fn test_cross_codec_bytes_do_not_decode() {
        let bytes = Codec::Json.encode(&sample()).unwrap();
        assert!(Codec::Native.decode(&bytes).is_err());
    }

    #[test]
    fn test_msgpack_smaller_than_json() {
        let json = Codec::Json.encode(&sample()).unwrap();
        let msgpack = Codec::MessagePack.encode(&sample()).unwrap();
        assert!(
            msgpack.len() < json.len(),
            "MessagePack ({} bytes) should be smaller than JSON ({} bytes)",
            msgpack.len(),
            json.len()
        );
    }
}
