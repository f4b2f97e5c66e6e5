//! FMI 2.0 co-simulation component backed by an embedded Python model.
//!
//! The shared library exports the `fmi2*` entry points from [`fmi2`]. Each
//! component wraps a [`SlaveAdapter`] that enforces the slave state machine,
//! owns the component's FMU states, and relays model log records to the
//! host through [`LogRelay`].

pub mod adapter;
pub mod fmi2;
pub mod relay;
pub mod telemetry;
pub mod types;
pub mod unload;

pub use adapter::{SlaveAdapter, StepOutcome};
pub use relay::{HostLogger, LogRelay};
