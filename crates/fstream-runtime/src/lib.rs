//! Deployment and worker runtime for fstream.
//!
//! Provides [`FunctionManager`], which validates and tracks deployments,
//! and [`ExternalAdapter`], which hands deployed functions to workers
//! running in other processes. [`WorkerServer`] exposes the adapter to
//! those workers over TCP.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use fstream_core::{
//!     BrokerConfig, MemoryBroker, MemoryPackageCatalog, MemoryStateStore, RuntimeAdapter,
//! };
//! use fstream_runtime::{AdapterConfig, ExternalAdapter, FunctionManager, ManagerConfig, WorkerServer};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), fstream_core::FsError> {
//! let root = CancellationToken::new();
//! let adapter = Arc::new(ExternalAdapter::new(AdapterConfig::default()));
//! let manager = FunctionManager::new(
//!     root.clone(),
//!     ManagerConfig {
//!         runtimes: HashMap::from([("external".to_string(), adapter.clone() as Arc<dyn RuntimeAdapter>)]),
//!         package_catalog: Arc::new(MemoryPackageCatalog::new()),
//!         state_store: Arc::new(MemoryStateStore::new()),
//!         event_broker: MemoryBroker::spawn(root.clone(), BrokerConfig::default()),
//!     },
//! );
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:7400").await?;
//! WorkerServer::new(adapter).serve(listener, root).await?;
//! # drop(manager);
//! # Ok(())
//! # }
//! ```

pub mod external;
pub mod manager;
pub mod metrics;

pub use external::protocol::{EventMessage, FunctionDescriptor, FunctionEvent, Request, Response, StatusCode};
pub use external::{AdapterConfig, ExternalAdapter, WorkerServer};
pub use manager::{FunctionManager, ManagerConfig};
pub use metrics::{LoggingMetricsBackend, MetricsBackend, MetricsSnapshot, RuntimeMetrics};
