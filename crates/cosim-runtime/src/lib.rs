//! Embedded Python runtime for cosim.
//!
//! Provides [`RuntimeHandle`], the shared reference to the one interpreter a
//! process hosts, and [`PyModel`], which drives a Python model class through
//! the [`cosim_core::ModelInstance`] interface.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use cosim_core::{BridgeConfig, InstanceConfig, ModelInstance};
//! use cosim_runtime::{PyModel, lifecycle};
//!
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let bridge = BridgeConfig::default();
//! let runtime = lifecycle::acquire(&bridge.runtime)?;
//!
//! // The resource directory holds slavemodule.txt and the module it names.
//! let config = InstanceConfig::new("m1", "/path/to/resources");
//! let mut model = PyModel::instantiate(runtime, config, &bridge)?;
//! model.set_real(&[0], &[2.0])?;
//! let proceed = model.do_step(0.0, 0.1)?;
//! # let _ = proceed;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod error;
pub mod facade;
pub mod interpreter;
pub mod lifecycle;
pub mod resolver;

pub use bridge::PyModel;
pub use error::RuntimeError;
pub use interpreter::{Interpreter, PythonInterpreter};
pub use lifecycle::{LifecyclePhase, RuntimeHandle, Teardown};
