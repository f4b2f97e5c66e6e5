use thiserror::Error;

use crate::state::{Operation, SlaveState};
use crate::status::Fmi2Status;

/// Failure of a single protocol call.
///
/// Every variant carries its message as an owned string so that nothing
/// borrowed from the embedded runtime outlives the call that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The model raised during a call. The component stays usable.
    #[error("model error: {0}")]
    Model(String),

    /// The component cannot continue. Only `fmi2FreeInstance` is meaningful
    /// afterwards.
    #[error("fatal: {0}")]
    Fatal(String),

    #[error("{operation} is not allowed in state {state}")]
    IllegalCall {
        operation: Operation,
        state: SlaveState,
    },
}

impl BridgeError {
    pub fn model(msg: impl Into<String>) -> Self {
        BridgeError::Model(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        BridgeError::Fatal(msg.into())
    }

    pub fn status(&self) -> Fmi2Status {
        match self {
            BridgeError::Model(_) | BridgeError::IllegalCall { .. } => Fmi2Status::Error,
            BridgeError::Fatal(_) => Fmi2Status::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, BridgeError::Fatal(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
