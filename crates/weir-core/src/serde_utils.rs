//! Serde helpers for `bytes::Bytes` fields.
//!
//! Plain derives serialize `Bytes` element by element; routing through
//! `serde_bytes` keeps payloads as contiguous byte strings on the binary
//! formats the writer speaks.

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serializer};

/// For `Bytes` fields: `#[serde(with = "bytes_serde")]`.
pub mod bytes_serde {
    use super::*;

    pub fn serialize<S>(val: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde_bytes::serialize(&val[..], serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let buf = serde_bytes::ByteBuf::deserialize(deserializer)?;
        Ok(Bytes::from(buf.into_vec()))
    }
}

/// For `Option<Bytes>` fields: `#[serde(with = "option_bytes_serde")]`.
pub mod option_bytes_serde {
    use super::*;

    pub fn serialize<S>(val: &Option<Bytes>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match val {
            Some(v) => serializer.serialize_some(&serde_bytes::Bytes::new(&v[..])),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Bytes>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let buf: Option<serde_bytes::ByteBuf> = Deserialize::deserialize(deserializer)?;
        Ok(buf.map(|b| Bytes::from(b.into_vec())))
    }
}

#[cfg(test)]
mod tests {
    use crate::Message;

    #[test]
    fn test_message_bincode_roundtrip() {
        let msg = Message::with_key("k", "payload").add_header("trace", vec![7]);
        let encoded = bincode::serialize(&msg).unwrap();
        let restored: Message = bincode::deserialize(&encoded).unwrap();
        assert_eq!(restored, msg);
    }

    #[test]
    fn test_keyless_message_roundtrip() {
        let msg = Message::new("payload");
        let encoded = bincode::serialize(&msg).unwrap();
        let restored: Message = bincode::deserialize(&encoded).unwrap();
        assert!(restored.key.is_none());
        assert_eq!(restored, msg);
    }

    #[test]
    fn test_empty_value_roundtrip() {
        let msg = Message::new("");
        let encoded = bincode::serialize(&msg).unwrap();
        let restored: Message = bincode::deserialize(&encoded).unwrap();
        assert!(restored.value.is_empty());
    }
}
