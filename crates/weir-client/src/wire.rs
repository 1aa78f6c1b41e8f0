//! Broker wire protocol.
//!
//! Every message travels as one length-prefixed frame:
//!
//! ```text
//! +------------------+---------------------------+
//! | Length (4 bytes) | Payload (N bytes)         |
//! | big-endian u32   | bincode-serialized value  |
//! +------------------+---------------------------+
//! ```
//!
//! The producer path needs only a handful of operations: locate the leader
//! of a (topic, partition), locate the cluster controller, append a
//! compressed batch, create topics, and read a topic's partition list. Any
//! broker that speaks these frames works, including the in-process mock
//! used by the integration tests.
//!
//! Enum variant order is significant for bincode; reordering breaks wire
//! compatibility with deployed peers.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use weir_core::{Codec, Message};

use crate::{Error, Result};

/// Maximum frame size (64 MiB) - rejects hostile or corrupt length
/// prefixes before they turn into an allocation.
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Client-to-broker requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    /// Which broker currently leads this (topic, partition)?
    FindLeader { topic: String, partition: u32 },

    /// Which broker is the cluster controller?
    FindController,

    /// Append a compressed message batch to a partition. The broker
    /// assigns offsets atomically for the whole batch.
    Produce {
        topic: String,
        partition: u32,
        codec: Codec,
        #[serde(with = "serde_bytes")]
        batch: Vec<u8>,
    },

    /// Create topics on the controller.
    CreateTopics { topics: Vec<TopicSpec> },

    /// Read the partition ids of a topic.
    ReadPartitions { topic: String },
}

/// Broker-to-client responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    /// Leader address as `host:port`.
    Leader { addr: String },

    /// Controller address as `host:port`.
    Controller { addr: String },

    /// Batch accepted; `first_offset` is the offset of the first message.
    Produced { first_offset: u64, high_water_mark: u64 },

    TopicsCreated,

    Partitions { partitions: Vec<u32> },

    Error { message: String },
}

/// Topic creation parameters as they travel to the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSpec {
    pub name: String,
    pub partitions: u32,
    pub replication_factor: u16,
    /// Free-form config entries (`retention.ms`, ...).
    pub configs: Vec<(String, String)>,
}

/// Write one length-prefixed frame.
pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = bincode::serialize(msg)?;
    if payload.len() > MAX_FRAME_SIZE {
        return Err(Error::FrameTooLarge(payload.len(), MAX_FRAME_SIZE));
    }

    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(Error::FrameTooLarge(len, MAX_FRAME_SIZE));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(bincode::deserialize(&payload)?)
}

/// Encode a message batch for a [`Request::Produce`]: bincode, then the
/// codec.
pub fn encode_batch(codec: Codec, messages: &[Message]) -> Result<Vec<u8>> {
    let raw = bincode::serialize(messages)?;
    Ok(codec.compress(&raw)?)
}

/// Decode a batch encoded by [`encode_batch`]. Servers (and the test mock
/// broker) use this on the receiving side.
pub fn decode_batch(codec: Codec, batch: &[u8]) -> Result<Vec<Message>> {
    let raw = codec.decompress(batch)?;
    Ok(bincode::deserialize(&raw)?)
}
