//! Runtime-agnostic vocabulary for the cosim co-simulation bridge.
//!
//! Everything in this crate is statically typed and knows nothing about the
//! embedded runtime. The runtime side plugs in through [`ModelInstance`], the
//! single capability interface the slave adapter drives.

pub mod config;
pub mod error;
pub mod model;
pub mod snapshot;
pub mod state;
pub mod status;
pub mod types;

pub use config::BridgeConfig;
pub use error::{BridgeError, ConfigError};
pub use model::ModelInstance;
pub use snapshot::{SnapshotStore, StateId};
pub use state::{Operation, SlaveState};
pub use status::Fmi2Status;
pub use types::{ExperimentSetup, InstanceConfig, LogRecord, ScalarKind, ValueReference};
