//! Write submissions and their completion handles.

use tokio::sync::oneshot;
use uuid::Uuid;
use weir_core::Message;

use crate::{Error, Result};

/// A caller-owned submission of one or more ordered messages for a single
/// partition.
///
/// The messages of one event always land contiguously in the log, in the
/// order given here, even when the pipeline coalesces several events into
/// one broker write.
#[derive(Debug)]
pub struct WriteEvent {
    /// Ordered, non-empty message sequence.
    pub messages: Vec<Message>,

    /// Sum of value lengths. Authoritative for batch-size bookkeeping; the
    /// pipeline never recomputes it.
    pub total_bytes: usize,

    /// Point barrier: drain all in-flight work on the partition before
    /// dispatching this event, and hold new dispatch until it completes.
    pub sequential: bool,
}

impl WriteEvent {
    /// Build an event, accounting its size as the sum of value lengths.
    ///
    /// # Panics
    ///
    /// Panics when `messages` is empty. An empty event has no offset of
    /// its own to report, so admitting one is a caller bug.
    pub fn new(messages: Vec<Message>) -> Self {
        assert!(
            !messages.is_empty(),
            "write event must carry at least one message"
        );

        let total_bytes = messages.iter().map(|m| m.value.len()).sum();
        Self {
            messages,
            total_bytes,
            sequential: false,
        }
    }

    /// Turn the event into a partition barrier.
    pub fn sequential(mut self) -> Self {
        self.sequential = true;
        self
    }
}

/// What the broker reported for one completed event. Frozen once the
/// receipt resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteAck {
    /// Broker-assigned offset of the event's first message.
    pub offset: u64,

    /// Shared by every event coalesced into the same broker write; useful
    /// for tracing and observer-side deduplication.
    pub batch_id: Uuid,
}

/// Single-shot completion handle returned by `submit`.
#[derive(Debug)]
pub struct WriteReceipt {
    pub(crate) rx: oneshot::Receiver<WriteAck>,
}

impl WriteReceipt {
    /// Wait until the event has been durably accepted by the broker.
    ///
    /// Fails only when the writer shut down before the event was
    /// dispatched.
    pub async fn wait(self) -> Result<WriteAck> {
        self.rx.await.map_err(|_| Error::PipelineClosed)
    }
}
