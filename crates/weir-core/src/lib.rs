//! # weir-core
//!
//! Runtime-light building blocks shared by the weir event-streaming writer:
//!
//! - [`OffsetWindow`]: a sliding ring that lets many workers confirm an
//!   ordered offset stream out of order while one consumer reads it back
//!   strictly in order
//! - [`Counter`]: atomic counters with read-and-reset for stat reporting
//! - [`SlicePool`]: reusable scratch buffers for batching hot paths
//! - [`wait_for`]: deadline-bounded predicate polling
//! - [`Message`]: the record type carried to the log
//! - [`Codec`]: block compression for batch payloads
//!
//! The window is freestanding and synchronous (mutex + condition variable,
//! no async runtime required); everything else is usable from both sync and
//! async contexts.

pub mod compression;
pub mod counter;
pub mod message;
pub mod pool;
pub mod serde_utils;
pub mod wait;
pub mod window;

pub use compression::{Codec, CompressionError};
pub use counter::Counter;
pub use message::Message;
pub use pool::SlicePool;
pub use wait::wait_for;
pub use window::OffsetWindow;
