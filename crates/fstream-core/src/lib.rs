//! Core contracts of the function-stream platform.
//!
//! Defines the function and package model, the [`Record`] event unit with
//! its commit signal, and the three contracts a runtime builds on:
//! [`EventBroker`], [`StateStore`] and [`PackageCatalog`]. In-memory
//! implementations of each live next to their trait.

pub mod broker;
pub mod error;
pub mod event;
pub mod instance;
pub mod model;
pub mod package;
pub mod state;

pub use broker::memory::MemoryBroker;
pub use broker::{BrokerConfig, EventBroker};
pub use error::{FieldViolation, FsError, ValidationErrors};
pub use event::{CommitHandle, CommitObserver, NO_SCHEMA, Record};
pub use instance::{Instance, RuntimeAdapter};
pub use model::{ConfigMap, Function, ModuleConfig, ModuleConfigItem, Package, TopicConfig};
pub use package::{MemoryPackageCatalog, PackageCatalog};
pub use state::StateStore;
pub use state::memory::MemoryStateStore;
