//! In-process broker for exercising the writer end to end.
//!
//! Speaks the real wire protocol over a loopback listener and offers the
//! fault-injection hooks the scenario tests need: fail the next N
//! produces, hold every produce until released, or stretch each produce by
//! a fixed delay. Every accepted batch is captured with its service
//! interval so tests can assert on batch shapes and overlap.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use weir_client::wire::{self, Request, Response, TopicSpec};

/// One accepted produce, as seen by the broker.
#[derive(Debug, Clone)]
pub struct ProducedBatch {
    pub topic: String,
    pub partition: u32,
    pub messages: usize,
    pub value_bytes: usize,
    pub first_offset: u64,
    pub started: Instant,
    pub finished: Instant,
}

#[derive(Default)]
struct BrokerState {
    offsets: Mutex<HashMap<(String, u32), u64>>,
    produced: Mutex<Vec<ProducedBatch>>,
    created: Mutex<Vec<TopicSpec>>,
    fail_remaining: AtomicI64,
    attempts: AtomicU64,
    produce_delay: Mutex<Duration>,
}

pub struct MockBroker {
    pub addr: String,
    state: Arc<BrokerState>,
    gate: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

impl MockBroker {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock broker");
        let addr = listener.local_addr().unwrap().to_string();
        let (gate, gate_rx) = watch::channel(false);
        let state = Arc::new(BrokerState::default());

        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&state),
            addr.clone(),
            gate_rx,
        ));

        Self {
            addr,
            state,
            gate,
            accept_task,
        }
    }

    /// Answer the next `n` produce requests with an error.
    pub fn fail_next_produces(&self, n: i64) {
        self.state.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// Park every produce until [`MockBroker::release_produces`].
    pub fn hold_produces(&self) {
        let _ = self.gate.send(true);
    }

    pub fn release_produces(&self) {
        let _ = self.gate.send(false);
    }

    /// Stretch each produce by a fixed service time.
    pub fn set_produce_delay(&self, delay: Duration) {
        *self.state.produce_delay.lock() = delay;
    }

    /// Pre-position a partition's log-end offset.
    pub fn set_log_end(&self, topic: &str, partition: u32, offset: u64) {
        self.state
            .offsets
            .lock()
            .insert((topic.to_string(), partition), offset);
    }

    /// Produce requests seen, including failed ones.
    pub fn produce_attempts(&self) -> u64 {
        self.state.attempts.load(Ordering::SeqCst)
    }

    /// Accepted batches, in acceptance order.
    pub fn batches(&self) -> Vec<ProducedBatch> {
        self.state.produced.lock().clone()
    }

    /// Topics created through the controller surface.
    pub fn created_topics(&self) -> Vec<TopicSpec> {
        self.state.created.lock().clone()
    }
}

impl Drop for MockBroker {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    state: Arc<BrokerState>,
    addr: String,
    gate: watch::Receiver<bool>,
) {
    loop {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        stream.set_nodelay(true).ok();
        tokio::spawn(serve(stream, Arc::clone(&state), addr.clone(), gate.clone()));
    }
}

async fn serve(
    mut stream: TcpStream,
    state: Arc<BrokerState>,
    addr: String,
    mut gate: watch::Receiver<bool>,
) {
    loop {
        let request: Request = match wire::read_frame(&mut stream).await {
            Ok(request) => request,
            Err(_) => return,
        };

        let response = match request {
            Request::FindLeader { .. } => Response::Leader { addr: addr.clone() },

            Request::FindController => Response::Controller { addr: addr.clone() },

            Request::CreateTopics { topics } => {
                state.created.lock().extend(topics);
                Response::TopicsCreated
            }

            Request::ReadPartitions { topic } => {
                let created = state.created.lock();
                match created.iter().find(|spec| spec.name == topic) {
                    Some(spec) => Response::Partitions {
                        partitions: (0..spec.partitions).collect(),
                    },
                    None => Response::Error {
                        message: format!("unknown topic {topic}"),
                    },
                }
            }

            Request::Produce {
                topic,
                partition,
                codec,
                batch,
            } => {
                let started = Instant::now();
                state.attempts.fetch_add(1, Ordering::SeqCst);

                if state.fail_remaining.fetch_sub(1, Ordering::SeqCst) > 0 {
                    Response::Error {
                        message: "injected produce failure".into(),
                    }
                } else {
                    let delay = *state.produce_delay.lock();
                    if delay > Duration::ZERO {
                        tokio::time::sleep(delay).await;
                    }
                    while *gate.borrow() {
                        if gate.changed().await.is_err() {
                            return;
                        }
                    }

                    match wire::decode_batch(codec, &batch) {
                        Ok(messages) => {
                            let message_count = messages.len() as u64;
                            let value_bytes = messages.iter().map(|m| m.value.len()).sum();
                            let first_offset = {
                                let mut offsets = state.offsets.lock();
                                let cursor =
                                    offsets.entry((topic.clone(), partition)).or_insert(0);
                                let first = *cursor;
                                *cursor += message_count;
                                first
                            };

                            state.produced.lock().push(ProducedBatch {
                                topic,
                                partition,
                                messages: messages.len(),
                                value_bytes,
                                first_offset,
                                started,
                                finished: Instant::now(),
                            });

                            Response::Produced {
                                first_offset,
                                high_water_mark: first_offset + message_count,
                            }
                        }
                        Err(e) => Response::Error {
                            message: format!("bad batch: {e}"),
                        },
                    }
                }
            }
        };

        if wire::write_frame(&mut stream, &response).await.is_err() {
            return;
        }
    }
}

/// Initialize tracing for a test binary; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
