use crate::serde_utils::{bytes_serde, option_bytes_serde};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A single record bound for one partition of the log.
///
/// Keys and headers are optional; partition routing from a key is the
/// caller's concern, the writer never inspects either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Record key.
    #[serde(with = "option_bytes_serde")]
    pub key: Option<Bytes>,

    /// Record payload.
    #[serde(with = "bytes_serde")]
    pub value: Bytes,

    /// Metadata headers.
    #[serde(default)]
    pub headers: Vec<(String, Vec<u8>)>,
}

impl Message {
    /// Create a new message.
    pub fn new(value: impl Into<Bytes>) -> Self {
        Self {
            key: None,
            value: value.into(),
            headers: Vec::new(),
        }
    }

    /// Create a message with a key.
    pub fn with_key(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            key: Some(key.into()),
            value: value.into(),
            headers: Vec::new(),
        }
    }

    /// Add a header to the message.
    pub fn add_header(mut self, key: impl Into<String>, value: Vec<u8>) -> Self {
        self.headers.push((key.into(), value));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let msg = Message::new("payload");
        assert!(msg.key.is_none());
        assert_eq!(&msg.value[..], b"payload");

        let msg = Message::with_key("k", "v").add_header("trace", vec![1, 2]);
        assert_eq!(msg.key.as_deref(), Some(b"k".as_slice()));
        assert_eq!(msg.headers.len(), 1);
    }
}
