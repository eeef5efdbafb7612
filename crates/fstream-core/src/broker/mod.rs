pub mod memory;

use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::FsError;
use crate::event::Record;
use crate::model::TopicConfig;

/// Topic-addressed publish/subscribe with explicit acknowledgement.
///
/// Uses Pin<Box<dyn Future>> for dyn-compatibility.
pub trait EventBroker: Send + Sync {
    /// Subscribe to every listed topic through one shared conduit.
    ///
    /// The conduit is closed once `ctx` is cancelled and every topic has been
    /// unregistered.
    fn read<'a>(
        &'a self,
        ctx: CancellationToken,
        topics: &'a [TopicConfig],
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<Record>, FsError>> + Send + 'a>>;

    /// Publish `record` to `topic`. Returns once the broker has accepted it;
    /// delivery is signalled through the record's commit observer.
    fn write<'a>(
        &'a self,
        ctx: &'a CancellationToken,
        record: Record,
        topic: &'a TopicConfig,
    ) -> Pin<Box<dyn Future<Output = Result<(), FsError>> + Send + 'a>>;

    /// Acknowledge a previously read event.
    fn commit<'a>(
        &'a self,
        ctx: &'a CancellationToken,
        event_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), FsError>> + Send + 'a>>;

    /// Backend name for logging.
    fn backend_name(&self) -> &str;
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Capacity of the serialized operation queue feeding the broker task.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Buffer of each reader's output conduit.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

fn default_queue_capacity() -> usize {
    100
}
fn default_subscriber_buffer() -> usize {
    1
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            subscriber_buffer: default_subscriber_buffer(),
        }
    }
}
