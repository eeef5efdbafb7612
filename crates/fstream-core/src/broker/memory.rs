use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{BrokerConfig, EventBroker};
use crate::error::FsError;
use crate::event::Record;
use crate::model::TopicConfig;

/// Operations serialized through the broker task.
enum Op {
    Register { topic: String, subscriber: Subscriber },
    Unregister { topic: String, subscriber_id: u64 },
    Write { topic: String, record: Record },
}

#[derive(Clone)]
struct Subscriber {
    id: u64,
    ctx: CancellationToken,
    tx: mpsc::Sender<Record>,
}

/// In-memory event broker.
///
/// A single task owns the topic → subscriber map; every other task talks to
/// it through one bounded operation queue, so registrations and writes are
/// totally ordered without locks.
///
/// # Backpressure
///
/// The broker task hands each event to the topic's subscriber and waits
/// until the subscriber's conduit accepts it. One slow subscriber therefore
/// stalls every topic on the broker until it catches up or its context
/// ends. This keeps the broker trivially ordered and is acceptable for a
/// development backend; durable brokers should not inherit it.
///
/// Only one subscriber per topic is representable: a later `read` on the same
/// topic replaces the earlier binding.
pub struct MemoryBroker {
    ops: mpsc::Sender<Op>,
    root: CancellationToken,
    next_subscriber: AtomicU64,
    subscriber_buffer: usize,
}

impl MemoryBroker {
    /// Start the broker task. It runs until `root` is cancelled, at which
    /// point every registered conduit is closed.
    pub fn spawn(root: CancellationToken, config: BrokerConfig) -> Arc<Self> {
        let (ops_tx, ops_rx) = mpsc::channel(config.queue_capacity.max(1));
        tokio::spawn(run_broker(root.clone(), ops_rx));
        tracing::info!(
            queue_capacity = config.queue_capacity,
            subscriber_buffer = config.subscriber_buffer,
            "Memory broker started"
        );
        Arc::new(Self {
            ops: ops_tx,
            root,
            next_subscriber: AtomicU64::new(1),
            subscriber_buffer: config.subscriber_buffer.max(1),
        })
    }

    async fn enqueue(&self, ctx: &CancellationToken, op: Op) -> Result<(), FsError> {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(FsError::Cancelled),
            res = self.ops.send(op) => res.map_err(|_| FsError::BrokerClosed),
        }
    }

    async fn subscribe(
        &self,
        ctx: CancellationToken,
        topics: &[TopicConfig],
    ) -> Result<mpsc::Receiver<Record>, FsError> {
        let (tx, rx) = mpsc::channel(self.subscriber_buffer);
        let subscriber_id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let names: Vec<String> = topics.iter().map(|t| t.name.clone()).collect();
        tracing::debug!(subscriber_id, topics = ?names, "Reading events");

        // Unregistration is armed before registering so a cancellation that
        // lands midway still cleans up whatever got registered.
        let ops = self.ops.clone();
        let root = self.root.clone();
        let watch_ctx = ctx.clone();
        let watch_names = names.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = watch_ctx.cancelled() => {}
                _ = root.cancelled() => return,
            }
            for topic in watch_names {
                let op = Op::Unregister {
                    topic,
                    subscriber_id,
                };
                if ops.send(op).await.is_err() {
                    break;
                }
            }
        });

        for topic in names {
            let subscriber = Subscriber {
                id: subscriber_id,
                ctx: ctx.clone(),
                tx: tx.clone(),
            };
            self.enqueue(&ctx, Op::Register { topic, subscriber }).await?;
        }
        Ok(rx)
    }
}

async fn run_broker(root: CancellationToken, mut ops: mpsc::Receiver<Op>) {
    let mut topics: HashMap<String, Subscriber> = HashMap::new();

    loop {
        let op = tokio::select! {
            biased;
            _ = root.cancelled() => break,
            op = ops.recv() => match op {
                Some(op) => op,
                None => break,
            },
        };

        match op {
            Op::Register { topic, subscriber } => {
                let id = subscriber.id;
                if let Some(prev) = topics.insert(topic.clone(), subscriber) {
                    tracing::debug!(topic, previous = prev.id, subscriber_id = id, "Replaced topic reader");
                } else {
                    tracing::debug!(topic, subscriber_id = id, "Registered topic reader");
                }
            }
            Op::Unregister {
                topic,
                subscriber_id,
            } => {
                if topics.get(&topic).is_some_and(|s| s.id == subscriber_id) {
                    topics.remove(&topic);
                    tracing::debug!(topic, subscriber_id, "Unregistered topic reader");
                }
            }
            Op::Write { topic, record } => {
                let commit = record.commit_handle();
                if let Some(subscriber) = topics.get(&topic).cloned() {
                    // The reader's unregister may still be queued behind this
                    // write; a cancelled reader never receives another event.
                    if subscriber.ctx.is_cancelled() {
                        topics.remove(&topic);
                        tracing::debug!(topic, subscriber_id = subscriber.id, "Dropped cancelled topic reader");
                        commit.commit();
                        continue;
                    }
                    tracing::debug!(topic, event_id = record.id(), "Delivering event");
                    tokio::select! {
                        biased;
                        _ = root.cancelled() => break,
                        _ = subscriber.ctx.cancelled() => {
                            topics.remove(&topic);
                            tracing::debug!(topic, subscriber_id = subscriber.id, "Reader gone before delivery");
                        }
                        res = subscriber.tx.send(record) => {
                            if res.is_err() {
                                topics.remove(&topic);
                                tracing::debug!(topic, subscriber_id = subscriber.id, "Dropped closed topic reader");
                            }
                        }
                    }
                }
                // Memory delivery is synchronous: acknowledge at write time.
                commit.commit();
            }
        }
    }

    let readers = topics.len();
    topics.clear();
    tracing::info!(readers, "Memory broker stopped");
}

impl EventBroker for MemoryBroker {
    fn read<'a>(
        &'a self,
        ctx: CancellationToken,
        topics: &'a [TopicConfig],
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<Record>, FsError>> + Send + 'a>> {
        Box::pin(self.subscribe(ctx, topics))
    }

    fn write<'a>(
        &'a self,
        ctx: &'a CancellationToken,
        record: Record,
        topic: &'a TopicConfig,
    ) -> Pin<Box<dyn Future<Output = Result<(), FsError>> + Send + 'a>> {
        Box::pin(async move {
            tracing::debug!(topic = %topic.name, event_id = record.id(), "Writing event");
            self.enqueue(
                ctx,
                Op::Write {
                    topic: topic.name.clone(),
                    record,
                },
            )
            .await
        })
    }

    fn commit<'a>(
        &'a self,
        _ctx: &'a CancellationToken,
        _event_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), FsError>> + Send + 'a>> {
        // Already acknowledged when the event was written.
        Box::pin(async { Ok(()) })
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
