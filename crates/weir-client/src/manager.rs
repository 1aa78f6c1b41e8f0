//! Topic-level writer: one partition pipeline per partition index.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};
use weir_core::Codec;

use crate::event::{WriteEvent, WriteReceipt};
use crate::pipeline::{PartitionConfig, PartitionTotals, PendingEvent, Pipeline};
use crate::{Error, Result};

/// Construction parameters for a [`Writer`].
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Seed brokers, each `host:port`. Any of them can answer leader
    /// lookups.
    pub brokers: Vec<String>,

    /// Topic every partition of this writer appends to.
    pub topic: String,

    /// Partition count; `submit` accepts indices `0..partitions`.
    pub partitions: u32,

    /// Tuning shared by all partition pipelines.
    pub partition: PartitionConfig,

    /// Compression applied to every batch.
    pub codec: Codec,
}

struct PartitionHandle {
    pipeline: Arc<Pipeline>,
    tx: mpsc::Sender<PendingEvent>,
    driver: JoinHandle<()>,
    supervisor: JoinHandle<()>,
}

/// Moves ordered, partitioned event batches to the log.
///
/// Partition selection (hashing, round-robin, key affinity) is the
/// caller's concern; the writer routes exactly where it is told.
pub struct Writer {
    topic: String,
    handles: Vec<PartitionHandle>,
    shutdown: watch::Sender<bool>,
}

impl Writer {
    /// Spawn one pipeline per partition and start accepting submissions.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(cfg: WriterConfig) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);

        let handles = (0..cfg.partitions)
            .map(|partition| {
                let pipeline = Pipeline::new(
                    cfg.brokers.clone(),
                    cfg.topic.clone(),
                    partition,
                    cfg.partition.clone(),
                    cfg.codec,
                );
                let (tx, driver, supervisor) = pipeline.spawn(shutdown_rx.clone());
                PartitionHandle {
                    pipeline,
                    tx,
                    driver,
                    supervisor,
                }
            })
            .collect();

        info!(
            topic = %cfg.topic,
            partitions = cfg.partitions,
            codec = cfg.codec.name(),
            "writer started"
        );

        Self {
            topic: cfg.topic,
            handles,
            shutdown,
        }
    }

    /// Enqueue one event onto the chosen partition.
    ///
    /// Blocks (awaits) while that partition's queue is full - backpressure
    /// is the signal, not an error. The returned receipt resolves once the
    /// broker has accepted the event.
    pub async fn submit(&self, partition: u32, event: WriteEvent) -> Result<WriteReceipt> {
        let handle = self
            .handles
            .get(partition as usize)
            .ok_or(Error::NoSuchPartition {
                partition,
                partitions: self.handles.len() as u32,
            })?;

        let (ack_tx, ack_rx) = oneshot::channel();
        let total_bytes = event.total_bytes;
        let pending = PendingEvent {
            messages: event.messages,
            total_bytes,
            sequential: event.sequential,
            ack: ack_tx,
        };

        if handle.tx.send(pending).await.is_err() {
            return Err(Error::PipelineClosed);
        }

        // Accounted after the send so an abandoned submit cannot leak
        // gauge counts; the dequeue side may transiently run ahead.
        let stats = handle.pipeline.stats();
        stats.pending_events.add(1);
        stats.queued_events.add(1);
        stats.queued_bytes.add(total_bytes as i64);

        Ok(WriteReceipt { rx: ack_rx })
    }

    /// Check out one connection per partition, force a connect, and return
    /// it to the pool. Surfaces the first failure.
    pub async fn test_connect(&self) -> Result<()> {
        for (partition, handle) in self.handles.iter().enumerate() {
            let mut conn = handle.pipeline.pool().get();
            if let Err(e) = conn.connect().await {
                error!(
                    topic = %self.topic,
                    partition,
                    error = %e,
                    "connectivity check failed"
                );
                return Err(e);
            }
            handle.pipeline.pool().put(conn);
        }
        Ok(())
    }

    /// Partition count this writer serves.
    pub fn partitions(&self) -> u32 {
        self.handles.len() as u32
    }

    /// Cumulative write totals summed across all partitions.
    pub fn totals(&self) -> PartitionTotals {
        self.handles.iter().fold(
            PartitionTotals::default(),
            |mut sum, handle| {
                let t = handle.pipeline.totals();
                sum.wrote_events += t.wrote_events;
                sum.wrote_messages += t.wrote_messages;
                sum.wrote_bytes += t.wrote_bytes;
                sum
            },
        )
    }

    /// Cumulative write totals per partition, indexed by partition.
    pub fn partition_totals(&self) -> Vec<PartitionTotals> {
        self.handles
            .iter()
            .map(|handle| handle.pipeline.totals())
            .collect()
    }

    /// Stop accepting submissions, drain every partition queue, wait for
    /// in-flight workers, and stop the stat supervisors.
    pub async fn close(self) {
        let Writer {
            topic,
            handles,
            shutdown,
        } = self;

        let mut drivers = Vec::with_capacity(handles.len());
        let mut supervisors = Vec::with_capacity(handles.len());
        for handle in handles {
            drop(handle.tx);
            drivers.push(handle.driver);
            supervisors.push(handle.supervisor);
        }

        for driver in drivers {
            let _ = driver.await;
        }

        let _ = shutdown.send(true);
        for supervisor in supervisors {
            let _ = supervisor.await;
        }

        info!(topic = %topic, "writer closed");
    }
}
