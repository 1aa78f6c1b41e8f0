//! A single leader connection.
//!
//! Each connection serves exactly one (topic, partition). Connecting means
//! dialing any seed broker, asking it who currently leads the partition,
//! and dialing that leader. The write path never surfaces broker I/O errors
//! to its caller: the log is the system of record, so a batch retries -
//! reconnecting between attempts with bounded backoff - until the broker
//! accepts it. Bounded latency, where it matters, is the concern of the
//! dispatch layer above.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use weir_core::{Codec, Message};

use crate::wire::{self, Request, Response};
use crate::{Error, Result};

/// Dial timeout for seed and leader sockets.
pub(crate) const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-attempt deadline for a produce round-trip.
const WRITE_DEADLINE: Duration = Duration::from_secs(10);

/// Reconnect backoff cap in seconds.
const MAX_BACKOFF_SECS: u64 = 5;

/// Produce round-trips slower than this get an info line even when
/// [`VERBOSE_WRITES`] is off.
const SLOW_WRITE: Duration = Duration::from_millis(100);

/// Log every produce round-trip, not just the slow ones.
pub static VERBOSE_WRITES: AtomicBool = AtomicBool::new(false);

/// Health label for a connection, as seen by operators in log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnStatus {
    Ok,
    Broken,
}

/// A TCP session to the broker currently leading one (topic, partition).
///
/// Owned exclusively by whichever worker checked it out of the pool.
pub struct Connection {
    brokers: Vec<String>,
    topic: String,
    partition: u32,
    stream: Option<TcpStream>,
    status: ConnStatus,
    status_since: Instant,
    last_write: Instant,
}

impl Connection {
    pub(crate) fn new(brokers: Vec<String>, topic: String, partition: u32) -> Self {
        Self {
            brokers,
            topic,
            partition,
            stream: None,
            status: ConnStatus::Broken,
            status_since: Instant::now(),
            last_write: Instant::now(),
        }
    }

    /// Drop any existing session, then dial a seed broker, ask it for the
    /// current partition leader, and connect to that leader. Seeds are
    /// tried in order; the last error surfaces when all of them fail.
    pub async fn connect(&mut self) -> Result<()> {
        self.close();

        let mut last_err: Option<Error> = None;
        for seed in &self.brokers {
            match Self::dial_leader(seed, &self.topic, self.partition).await {
                Ok(stream) => {
                    debug!(
                        topic = %self.topic,
                        partition = self.partition,
                        leader = ?stream.peer_addr().ok(),
                        "connected to partition leader"
                    );
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(e) => {
                    error!(
                        topic = %self.topic,
                        partition = self.partition,
                        seed = %seed,
                        error = %e,
                        "dial leader via seed failed"
                    );
                    last_err = Some(e);
                }
            }
        }

        Err(Error::AllBrokersFailed(
            last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no seed brokers configured".into()),
        ))
    }

    async fn dial_leader(seed: &str, topic: &str, partition: u32) -> Result<TcpStream> {
        let mut seed_stream = timeout(DIAL_TIMEOUT, TcpStream::connect(seed))
            .await
            .map_err(|_| Error::Timeout(format!("dial seed {seed}")))??;

        wire::write_frame(
            &mut seed_stream,
            &Request::FindLeader {
                topic: topic.to_string(),
                partition,
            },
        )
        .await?;
        let leader = match wire::read_frame::<_, Response>(&mut seed_stream).await? {
            Response::Leader { addr } => addr,
            Response::Error { message } => return Err(Error::ServerError(message)),
            _ => return Err(Error::InvalidResponse),
        };

        let stream = timeout(DIAL_TIMEOUT, TcpStream::connect(&leader))
            .await
            .map_err(|_| Error::Timeout(format!("dial leader {leader}")))??;
        stream.set_nodelay(true).ok();
        Ok(stream)
    }

    /// Idempotent teardown. Dropping the stream closes the socket.
    pub fn close(&mut self) {
        self.stream = None;
    }

    /// Reconnect until it succeeds, sleeping `min(retry, 5)` seconds before
    /// each attempt - the first attempt is immediate, the backoff only
    /// grows across consecutive failures.
    pub(crate) async fn connect_must(&mut self) {
        self.set_status(ConnStatus::Broken);
        let mut retry: u64 = 0;
        loop {
            tokio::time::sleep(Duration::from_secs(retry.min(MAX_BACKOFF_SECS))).await;
            retry += 1;

            if let Err(e) = self.connect().await {
                warn!(
                    topic = %self.topic,
                    partition = self.partition,
                    retry,
                    error = %e,
                    "reconnect failed"
                );
                continue;
            }

            self.set_status(ConnStatus::Ok);
            break;
        }
    }

    /// Append a batch to the partition, retrying forever. Each attempt has
    /// a ten-second deadline; any failure reconnects and retries. Returns
    /// the broker-assigned offset of the first message.
    ///
    /// `batch_id` is opaque trace metadata for the log line only - the
    /// broker never sees it.
    pub(crate) async fn write_must(
        &mut self,
        codec: Codec,
        messages: &[Message],
        batch_id: Uuid,
    ) -> u64 {
        let mut reconnected = false;
        if self.stream.is_none() {
            reconnected = true;
            self.connect_must().await;
        }

        let started = Instant::now();
        let mut try_count = 0u32;

        let first_offset = loop {
            try_count += 1;

            let attempt = timeout(WRITE_DEADLINE, self.produce(codec, messages))
                .await
                .unwrap_or_else(|_| Err(Error::Timeout("produce deadline exceeded".into())));

            match attempt {
                Ok(offset) => {
                    self.last_write = Instant::now();
                    break offset;
                }
                Err(e) => {
                    let total_bytes: usize = messages.iter().map(|m| m.value.len()).sum();
                    error!(
                        topic = %self.topic,
                        partition = self.partition,
                        msgs = messages.len(),
                        total_bytes,
                        try_count,
                        error = %e,
                        "produce failed, reconnecting"
                    );
                    reconnected = true;
                    self.connect_must().await;
                }
            }
        };

        let elapsed = started.elapsed();
        if VERBOSE_WRITES.load(Ordering::Relaxed) || elapsed > SLOW_WRITE {
            info!(
                topic = %self.topic,
                partition = self.partition,
                ?elapsed,
                msgs = messages.len(),
                try_count,
                reconnected,
                batch_id = %batch_id,
                "produce round-trip"
            );
        }

        first_offset
    }

    async fn produce(&mut self, codec: Codec, messages: &[Message]) -> Result<u64> {
        let batch = wire::encode_batch(codec, messages)?;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::ConnectionError("not connected".into()))?;

        wire::write_frame(
            stream,
            &Request::Produce {
                topic: self.topic.clone(),
                partition: self.partition,
                codec,
                batch,
            },
        )
        .await?;

        match wire::read_frame::<_, Response>(stream).await? {
            Response::Produced { first_offset, .. } => Ok(first_offset),
            Response::Error { message } => Err(Error::ServerError(message)),
            _ => Err(Error::InvalidResponse),
        }
    }

    /// Time of the last successful write.
    pub(crate) fn last_write(&self) -> Instant {
        self.last_write
    }

    pub fn status(&self) -> ConnStatus {
        self.status
    }

    /// When the connection entered its current status.
    pub fn status_since(&self) -> Instant {
        self.status_since
    }

    fn set_status(&mut self, status: ConnStatus) {
        self.status = status;
        self.status_since = Instant::now();
    }

    #[cfg(test)]
    pub(crate) fn set_last_write(&mut self, at: Instant) {
        self.last_write = at;
    }
}
