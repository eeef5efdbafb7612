//! Runtime adapter for functions executed by out-of-process workers.

pub mod adapter;
pub mod protocol;
pub mod server;

use serde::Deserialize;

pub use adapter::ExternalAdapter;
pub use server::WorkerServer;

#[derive(Debug, Clone, Deserialize)]
pub struct AdapterConfig {
    /// Name used in logs.
    #[serde(default = "default_name")]
    pub name: String,
    /// Package type this adapter is registered for with the manager.
    #[serde(default = "default_package_type")]
    pub package_type: String,
    /// Buffer of each outbound worker stream.
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
    /// Buffer of each registration's delivery conduit.
    #[serde(default = "default_delivery_buffer")]
    pub delivery_buffer: usize,
    /// Longest request line the worker server accepts, newline included.
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
}

fn default_name() -> String {
    "external".into()
}

fn default_package_type() -> String {
    "external".into()
}

fn default_stream_buffer() -> usize {
    16
}

fn default_delivery_buffer() -> usize {
    1
}

fn default_max_request_bytes() -> usize {
    1024 * 1024
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            package_type: default_package_type(),
            stream_buffer: default_stream_buffer(),
            delivery_buffer: default_delivery_buffer(),
            max_request_bytes: default_max_request_bytes(),
        }
    }
}
