use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::error::FsError;

/// Schema id carried by records that have no registered schema.
pub const NO_SCHEMA: i64 = -1;

/// One unit of payload flowing through a topic.
///
/// A record carries its own commit signal. Whoever holds the record (or a
/// [`CommitHandle`] cloned from it) may commit it; the producer awaits the
/// matching [`CommitObserver`] to learn that the record was accepted
/// downstream.
#[derive(Debug)]
pub struct Record {
    id: String,
    schema_id: i64,
    payload: Vec<u8>,
    properties: HashMap<String, String>,
    commit: CommitHandle,
}

impl Record {
    /// A fire-and-forget record: empty id, no schema.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: String::new(),
            schema_id: NO_SCHEMA,
            payload: payload.into(),
            properties: HashMap::new(),
            commit: CommitHandle::new(),
        }
    }

    /// Serialize `value` as the JSON payload of a new record.
    pub fn from_json<T: Serialize>(id: impl Into<String>, value: &T) -> Result<Self, FsError> {
        let payload = serde_json::to_vec(value)?;
        Ok(Self::new(payload).with_id(id))
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_schema_id(mut self, schema_id: i64) -> Self {
        self.schema_id = schema_id;
        self
    }

    pub fn with_properties(mut self, properties: HashMap<String, String>) -> Self {
        self.properties = properties;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn schema_id(&self) -> i64 {
        self.schema_id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The payload as a readable stream.
    pub fn reader(&self) -> impl std::io::Read + '_ {
        self.payload.as_slice()
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    /// Signal that this record's side effects are durable. Idempotent.
    pub fn commit(&self) {
        self.commit.commit();
    }

    pub fn is_committed(&self) -> bool {
        self.commit.is_committed()
    }

    /// A detached signal side, usable after the record itself has been handed off.
    pub fn commit_handle(&self) -> CommitHandle {
        self.commit.clone()
    }

    /// Await side of this record's commit signal.
    pub fn observer(&self) -> CommitObserver {
        CommitObserver {
            rx: self.commit.tx.subscribe(),
        }
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

/// Signal side of a record's one-shot commit.
///
/// Cloning shares the same signal; committing more than once is a no-op and
/// never blocks.
#[derive(Debug, Clone)]
pub struct CommitHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CommitHandle {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn commit(&self) {
        self.tx.send_if_modified(|committed| {
            if *committed {
                false
            } else {
                *committed = true;
                true
            }
        });
    }

    pub fn is_committed(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Await side of a record's commit.
#[derive(Debug)]
pub struct CommitObserver {
    rx: watch::Receiver<bool>,
}

impl CommitObserver {
    /// Resolves `true` once the record is committed, or `false` if every
    /// commit handle was dropped without committing.
    pub async fn committed(&mut self) -> bool {
        self.rx.wait_for(|committed| *committed).await.is_ok()
    }
}
