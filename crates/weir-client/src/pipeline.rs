//! Per-partition batching pipeline.
//!
//! One driver task per partition pulls submitted events off a bounded
//! queue and coalesces them into batches bounded by size, count and a time
//! budget, then hands each batch to a worker task holding one admission
//! permit. Workers check a leader connection out of the pool, append the
//! batch, report the broker-assigned offsets back to each submitter, and
//! return the connection. The bounded queue is the backpressure signal: a
//! partition that cannot keep up blocks its submitters.
//!
//! Sequential events fence the partition: before such a batch dispatches,
//! every previously dispatched worker must have completed, and the driver
//! does not resume until the batch itself has completed. The fence is
//! scoped to one partition; cross-partition ordering is never implied.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot, watch, Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;
use weir_core::{wait_for, Codec, Counter, Message, SlicePool};

use crate::event::WriteAck;
use crate::pool::ConnectionPool;

/// How often the supervisor emits a partition stat line.
const STAT_INTERVAL: Duration = Duration::from_secs(10);

/// Scratch buffers handed out to the coalescer are pre-sized to this many
/// elements and dropped on return once they grow past it.
const SCRATCH_CAPACITY: usize = 10_000;

/// Idle free-list slots per scratch pool; at most `max_conns + 1` buffers
/// are ever out at once, so a small constant suffices.
const SCRATCH_SLOTS: usize = 64;

/// Immutable tuning for one partition, fixed at writer construction.
///
/// Per-call behavior (the sequential barrier) lives on the event itself.
#[derive(Clone)]
pub struct PartitionConfig {
    /// Dispatch concurrency cap; also the working-set size of the
    /// connection pool. Must be non-zero.
    pub max_conns: usize,

    /// Bounded submit-queue length; a full queue blocks submitters. Must
    /// be non-zero.
    pub queue_capacity: usize,

    /// Poll granularity inside the coalesce wait loop.
    pub wait_interval: Duration,

    /// Batch-accumulation time budget as a function of the current
    /// in-flight worker count. Non-increasing in practice, so saturation
    /// trades coalescing latency for throughput.
    pub max_wait: Arc<dyn Fn(i64) -> Duration + Send + Sync>,

    /// Below this accumulated size the coalescer keeps waiting for more
    /// events (until the time budget expires).
    pub min_bytes: usize,

    /// An event that would push the accumulated size above this is held
    /// over as the anchor of the next batch.
    pub max_bytes: usize,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            max_conns: 4,
            queue_capacity: 1024,
            wait_interval: Duration::from_millis(1),
            max_wait: Arc::new(|_| Duration::from_millis(25)),
            min_bytes: 16 * 1024,
            max_bytes: 1024 * 1024,
        }
    }
}

impl fmt::Debug for PartitionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionConfig")
            .field("max_conns", &self.max_conns)
            .field("queue_capacity", &self.queue_capacity)
            .field("wait_interval", &self.wait_interval)
            .field("min_bytes", &self.min_bytes)
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}

/// One event queued into a partition, paired with its completion sender.
pub(crate) struct PendingEvent {
    pub messages: Vec<Message>,
    pub total_bytes: usize,
    pub sequential: bool,
    pub ack: oneshot::Sender<WriteAck>,
}

/// Per-event completion data carried through a batch: how many messages
/// the event contributed and where to report its ack.
struct EventAck {
    count: usize,
    ack: oneshot::Sender<WriteAck>,
}

/// Per-partition counters. The `wrote_*` interval counters are cleared by
/// the stat supervisor on every tick; the `total_*` counters only grow.
#[derive(Default)]
pub(crate) struct PartitionStats {
    pub pending_events: Counter,
    pub pending_messages: Counter,
    pub queued_events: Counter,
    pub queued_bytes: Counter,
    pub wrote_events: Counter,
    pub wrote_messages: Counter,
    pub wrote_bytes: Counter,
    pub total_events: Counter,
    pub total_messages: Counter,
    pub total_bytes: Counter,
}

/// Cumulative write totals for one partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionTotals {
    pub wrote_events: i64,
    pub wrote_messages: i64,
    pub wrote_bytes: i64,
}

pub(crate) struct Pipeline {
    topic: String,
    partition: u32,
    cfg: PartitionConfig,
    codec: Codec,
    pool: ConnectionPool,
    stats: PartitionStats,
    /// Workers dispatched but not yet completed; the serial fence waits on
    /// this reaching zero.
    in_flight: AtomicI64,
    idle: Notify,
    permits: Arc<Semaphore>,
}

impl Pipeline {
    pub(crate) fn new(
        brokers: Vec<String>,
        topic: String,
        partition: u32,
        cfg: PartitionConfig,
        codec: Codec,
    ) -> Arc<Self> {
        assert!(cfg.max_conns > 0, "max_conns must be non-zero");
        assert!(cfg.queue_capacity > 0, "queue_capacity must be non-zero");

        let permits = Arc::new(Semaphore::new(cfg.max_conns));
        let pool = ConnectionPool::new(brokers, topic.clone(), partition);

        Arc::new(Self {
            topic,
            partition,
            cfg,
            codec,
            pool,
            stats: PartitionStats::default(),
            in_flight: AtomicI64::new(0),
            idle: Notify::new(),
            permits,
        })
    }

    /// Start the driver and stat supervisor. Returns the submit sender and
    /// both task handles; dropping every sender drains and stops the
    /// driver, the supervisor stops on the shutdown signal.
    pub(crate) fn spawn(
        self: &Arc<Self>,
        shutdown: watch::Receiver<bool>,
    ) -> (mpsc::Sender<PendingEvent>, JoinHandle<()>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(self.cfg.queue_capacity);
        let driver = tokio::spawn(Arc::clone(self).drive(rx));
        let supervisor = tokio::spawn(Arc::clone(self).supervise(shutdown));
        (tx, driver, supervisor)
    }

    pub(crate) fn stats(&self) -> &PartitionStats {
        &self.stats
    }

    pub(crate) fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub(crate) fn totals(&self) -> PartitionTotals {
        PartitionTotals {
            wrote_events: self.stats.total_events.load(),
            wrote_messages: self.stats.total_messages.load(),
            wrote_bytes: self.stats.total_bytes.load(),
        }
    }

    /// Driver loop: anchor, coalesce, fence, admit, dispatch.
    async fn drive(self: Arc<Self>, mut rx: mpsc::Receiver<PendingEvent>) {
        let messages_pool = Arc::new(SlicePool::<Message>::new(SCRATCH_CAPACITY, SCRATCH_SLOTS));
        let acks_pool = Arc::new(SlicePool::<EventAck>::new(SCRATCH_CAPACITY, SCRATCH_SLOTS));

        // An event that would have overflowed the previous batch, kept as
        // the anchor of the next one.
        let mut held: Option<PendingEvent> = None;

        loop {
            let anchor = match held.take() {
                Some(event) => event,
                None => match rx.recv().await {
                    Some(event) => {
                        self.note_dequeued(&event);
                        event
                    }
                    // Every submitter is gone and the queue is drained.
                    None => break,
                },
            };

            let mut messages = messages_pool.get();
            let mut acks = acks_pool.get();
            let mut total_bytes = anchor.total_bytes;
            let mut sequential = anchor.sequential;
            acks.push(EventAck {
                count: anchor.messages.len(),
                ack: anchor.ack,
            });
            messages.extend(anchor.messages);

            let max_wait = (self.cfg.max_wait)(self.in_flight.load(Ordering::Acquire));
            wait_for(
                || loop {
                    match rx.try_recv() {
                        Ok(event) => {
                            self.note_dequeued(&event);
                            if total_bytes + event.total_bytes > self.cfg.max_bytes {
                                held = Some(event);
                                return true;
                            }
                            total_bytes += event.total_bytes;
                            sequential |= event.sequential;
                            acks.push(EventAck {
                                count: event.messages.len(),
                                ack: event.ack,
                            });
                            messages.extend(event.messages);
                        }
                        Err(TryRecvError::Empty) => return total_bytes > self.cfg.min_bytes,
                        // No more submitters; flush what we have.
                        Err(TryRecvError::Disconnected) => return true,
                    }
                },
                max_wait,
                self.cfg.wait_interval,
            )
            .await;

            // A sequential batch waits for everything already dispatched.
            if sequential {
                self.wait_idle().await;
            }

            let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
                break;
            };

            self.in_flight.fetch_add(1, Ordering::AcqRel);
            self.stats.pending_messages.add(messages.len() as i64);

            tokio::spawn(Arc::clone(&self).write_batch(
                permit,
                messages,
                acks,
                total_bytes,
                Arc::clone(&messages_pool),
                Arc::clone(&acks_pool),
            ));

            // ... and holds the driver until it has itself completed.
            if sequential {
                self.wait_idle().await;
            }
        }

        self.wait_idle().await;
    }

    fn note_dequeued(&self, event: &PendingEvent) {
        self.stats.queued_events.add(-1);
        self.stats.queued_bytes.add(-(event.total_bytes as i64));
    }

    /// One batch write on one checked-out connection.
    async fn write_batch(
        self: Arc<Self>,
        permit: tokio::sync::OwnedSemaphorePermit,
        messages: Vec<Message>,
        mut acks: Vec<EventAck>,
        total_bytes: usize,
        messages_pool: Arc<SlicePool<Message>>,
        acks_pool: Arc<SlicePool<EventAck>>,
    ) {
        let batch_id = Uuid::new_v4();
        let event_count = acks.len() as i64;
        let message_count = messages.len() as i64;

        let mut conn = self.pool.get();
        let first_offset = conn.write_must(self.codec, &messages, batch_id).await;

        self.stats.wrote_events.add(event_count);
        self.stats.wrote_messages.add(message_count);
        self.stats.wrote_bytes.add(total_bytes as i64);
        self.stats.total_events.add(event_count);
        self.stats.total_messages.add(message_count);
        self.stats.total_bytes.add(total_bytes as i64);

        // Events were concatenated in coalesce order, so each one starts
        // where the previous one's messages ended.
        let mut offset = first_offset;
        for entry in acks.drain(..) {
            let _ = entry.ack.send(WriteAck { offset, batch_id });
            offset += entry.count as u64;
        }

        self.pool.put(conn);
        drop(permit);

        self.stats.pending_messages.add(-message_count);
        self.stats.pending_events.add(-event_count);

        messages_pool.put(messages);
        acks_pool.put(acks);

        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.idle.notify_waiters();
    }

    /// Wait until no dispatched worker remains in flight.
    async fn wait_idle(&self) {
        loop {
            if self.in_flight.load(Ordering::Acquire) == 0 {
                return;
            }
            tokio::select! {
                _ = self.idle.notified() => {}
                // Periodic re-check in case a notify slipped past us.
                _ = tokio::time::sleep(Duration::from_millis(10)) => {}
            }
        }
    }

    /// Emit one structured stat line every tick; quiet partitions are
    /// suppressed entirely.
    async fn supervise(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(STAT_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let wrote_events = self.stats.wrote_events.swap_to_zero();
            let wrote_messages = self.stats.wrote_messages.swap_to_zero();
            let wrote_bytes = self.stats.wrote_bytes.swap_to_zero();
            let pending_events = self.stats.pending_events.load();
            let pending_messages = self.stats.pending_messages.load();
            let queued_events = self.stats.queued_events.load();
            let queued_bytes = self.stats.queued_bytes.load();
            let in_flight = self.in_flight.load(Ordering::Acquire);

            if wrote_events == 0
                && wrote_messages == 0
                && wrote_bytes == 0
                && pending_events == 0
                && pending_messages == 0
                && queued_events == 0
                && queued_bytes == 0
                && in_flight == 0
            {
                continue;
            }

            info!(
                topic = %self.topic,
                partition = self.partition,
                pending_events,
                pending_messages,
                in_flight,
                queued_events,
                queued_bytes,
                wrote_events,
                wrote_messages,
                wrote_bytes,
                "partition stats"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = PartitionConfig::default();
        assert!(cfg.max_conns > 0);
        assert!(cfg.queue_capacity > 0);
        assert!(cfg.min_bytes <= cfg.max_bytes);
        assert_eq!((cfg.max_wait)(0), Duration::from_millis(25));
    }

    #[test]
    fn test_config_debug_omits_the_closure() {
        let repr = format!("{:?}", PartitionConfig::default());
        assert!(repr.contains("max_conns"));
        assert!(!repr.contains("max_wait"));
    }

    #[test]
    fn test_totals_snapshot() {
        let pipeline = Pipeline::new(
            vec!["127.0.0.1:9092".into()],
            "orders".into(),
            0,
            PartitionConfig::default(),
            Codec::Lz4,
        );
        pipeline.stats().total_events.add(3);
        pipeline.stats().total_messages.add(7);
        pipeline.stats().total_bytes.add(512);

        assert_eq!(
            pipeline.totals(),
            PartitionTotals {
                wrote_events: 3,
                wrote_messages: 7,
                wrote_bytes: 512,
            }
        );
    }
}
