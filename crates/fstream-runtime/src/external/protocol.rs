//! Messages exchanged with out-of-process workers.
//!
//! Every message is one JSON object per line. Requests are tagged by
//! `method`, responses by `kind`.

use std::collections::HashMap;

use fstream_core::{ConfigMap, Function, FsError, Record};
use serde::{Deserialize, Serialize};

/// What a worker needs to start executing a function instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    pub package: String,
    pub module: String,
    #[serde(default)]
    pub config: ConfigMap,
}

impl From<&Function> for FunctionDescriptor {
    fn from(function: &Function) -> Self {
        Self {
            name: function.name.clone(),
            package: function.package.clone(),
            module: function.module.clone(),
            config: function.config.clone(),
        }
    }
}

/// Lifecycle notification pushed down a worker's registration stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FunctionEvent {
    Deploy { function: FunctionDescriptor },
    Delete { function_name: String },
}

impl FunctionEvent {
    pub fn function_name(&self) -> &str {
        match self {
            FunctionEvent::Deploy { function } => &function.name,
            FunctionEvent::Delete { function_name } => function_name,
        }
    }
}

/// An event streamed to a worker's `read` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,
    pub schema_id: i64,
    pub payload: Vec<u8>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl From<&Record> for EventMessage {
    fn from(record: &Record) -> Self {
        Self {
            id: record.id().to_string(),
            schema_id: record.schema_id(),
            payload: record.payload().to_vec(),
            properties: record.properties().clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Request {
    /// Claim `modules` and receive deploy/delete notifications for them.
    OnEvent {
        service_id: String,
        modules: Vec<String>,
    },
    /// Stream the events of a deployed function's source topics.
    Read { function_name: String },
    Write {
        function_name: String,
        payload: Vec<u8>,
    },
    Commit {
        function_name: String,
        event_id: String,
    },
    PutState {
        function_name: String,
        key: String,
        value: Vec<u8>,
    },
    GetState {
        function_name: String,
        key: String,
    },
    ListStates {
        function_name: String,
        start_inclusive: String,
        end_exclusive: String,
    },
    DeleteState {
        function_name: String,
        key: String,
    },
}

impl Request {
    /// Streaming requests take over the connection until the stream ends.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Request::OnEvent { .. } | Request::Read { .. })
    }

    pub fn method(&self) -> &'static str {
        match self {
            Request::OnEvent { .. } => "on_event",
            Request::Read { .. } => "read",
            Request::Write { .. } => "write",
            Request::Commit { .. } => "commit",
            Request::PutState { .. } => "put_state",
            Request::GetState { .. } => "get_state",
            Request::ListStates { .. } => "list_states",
            Request::DeleteState { .. } => "delete_state",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Response {
    FunctionEvent { event: FunctionEvent },
    Event { event: EventMessage },
    Ack,
    State { value: Vec<u8> },
    Keys { keys: Vec<String> },
    Error { code: StatusCode, message: String },
}

impl From<&FsError> for Response {
    fn from(err: &FsError) -> Self {
        Response::Error {
            code: StatusCode::from(err),
            message: err.to_string(),
        }
    }
}

/// Coarse error class carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    FailedPrecondition,
    Unavailable,
    Cancelled,
    Internal,
}

impl From<&FsError> for StatusCode {
    fn from(err: &FsError) -> Self {
        match err {
            FsError::Validation(_) | FsError::Protocol(_) | FsError::Serialization(_) => {
                StatusCode::InvalidArgument
            }
            FsError::PackageNotFound(_)
            | FsError::FunctionNotFound(_)
            | FsError::ModuleNotFound(_)
            | FsError::StateNotFound(_) => StatusCode::NotFound,
            FsError::PackageAlreadyExists(_) | FsError::AlreadyClaimed(_) => {
                StatusCode::AlreadyExists
            }
            FsError::PackageMismatch(_) | FsError::RuntimeNotFound(_) => {
                StatusCode::FailedPrecondition
            }
            FsError::Unavailable(_) | FsError::BrokerClosed => StatusCode::Unavailable,
            FsError::Cancelled => StatusCode::Cancelled,
            FsError::StateBackend(_) | FsError::Io(_) => StatusCode::Internal,
        }
    }
}
