//! # weir-client
//!
//! Partitioned batched writer for the weir event-streaming log: coalesces
//! producer-submitted write events into size- and time-bounded batches,
//! dispatches them over a bounded pool of partition-leader connections,
//! rides out broker failures with reconnect-and-retry, and reports the
//! authoritative server-assigned offsets back to each submitter.
//!
//! ## Features
//!
//! - **Async/Await**: built on Tokio; one driver task per partition plus a
//!   bounded set of worker tasks
//! - **Coalescing**: batches bounded by size and a per-partition time
//!   budget that shrinks under load
//! - **Backpressure**: bounded submit queues block producers instead of
//!   buffering without limit
//! - **At-least-once delivery**: broker I/O errors reconnect and retry
//!   forever; offsets are the only success signal
//! - **Sequential barriers**: an event can fence its partition, draining
//!   in-flight work before and after it
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use weir_client::{WriteEvent, Writer, WriterConfig, PartitionConfig};
//! use weir_core::{Codec, Message};
//!
//! # async fn example() -> weir_client::Result<()> {
//! let writer = Writer::new(WriterConfig {
//!     brokers: vec!["broker1:9092".into(), "broker2:9092".into()],
//!     topic: "orders".into(),
//!     partitions: 8,
//!     partition: PartitionConfig::default(),
//!     codec: Codec::Lz4,
//! });
//!
//! let event = WriteEvent::new(vec![Message::with_key("user-1", "created")]);
//! let receipt = writer.submit(3, event).await?;
//!
//! let ack = receipt.wait().await?;
//! println!("offset {} in batch {}", ack.offset, ack.batch_id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Ordering
//!
//! Per partition, batches dispatch in the order their anchor events were
//! submitted, and events inside a batch are laid down in coalesce order, so
//! the messages of any single event are contiguous in the log. An event
//! flagged [`WriteEvent::sequential`] additionally drains its partition
//! before dispatching and holds new dispatch until it completes. No
//! ordering is implied across partitions.

pub mod admin;
pub mod connection;
pub mod error;
pub mod event;
pub mod manager;
pub mod pipeline;
pub mod pool;
pub mod wire;

pub use admin::{create_topic, TopicSettings};
pub use connection::{ConnStatus, Connection, VERBOSE_WRITES};
pub use error::{Error, Result};
pub use event::{WriteAck, WriteEvent, WriteReceipt};
pub use manager::{Writer, WriterConfig};
pub use pipeline::{PartitionConfig, PartitionTotals};
pub use pool::ConnectionPool;

// Re-export the shared types callers need to build events.
pub use weir_core::{Codec, Message};
