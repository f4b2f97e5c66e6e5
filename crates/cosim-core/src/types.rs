use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::status::Fmi2Status;

/// Opaque integer naming a model variable. Scoped per [`ScalarKind`].
pub type ValueReference = u32;

/// The four scalar kinds exchanged with the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    Real,
    Integer,
    Boolean,
    String,
}

impl ScalarKind {
    /// Name of the getter method on the model instance.
    pub fn getter(self) -> &'static str {
        match self {
            ScalarKind::Real => "get_real",
            ScalarKind::Integer => "get_integer",
            ScalarKind::Boolean => "get_boolean",
            ScalarKind::String => "get_string",
        }
    }

    /// Name of the setter method on the model instance.
    pub fn setter(self) -> &'static str {
        match self {
            ScalarKind::Real => "set_real",
            ScalarKind::Integer => "set_integer",
            ScalarKind::Boolean => "set_boolean",
            ScalarKind::String => "set_string",
        }
    }
}

impl std::fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarKind::Real => write!(f, "real"),
            ScalarKind::Integer => write!(f, "integer"),
            ScalarKind::Boolean => write!(f, "boolean"),
            ScalarKind::String => write!(f, "string"),
        }
    }
}

/// A deferred log record produced by model code.
///
/// Records are queued runtime-side during a call and forwarded to the host
/// logger after the call completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub status: Fmi2Status,
    pub category: Option<String>,
    pub message: String,
    /// Debug records are only forwarded while debug logging is enabled.
    pub debug: bool,
}

impl LogRecord {
    pub fn new(status: Fmi2Status, message: impl Into<String>) -> Self {
        Self {
            status,
            category: None,
            message: message.into(),
            debug: false,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn as_debug(mut self) -> Self {
        self.debug = true;
        self
    }
}

/// Arguments of `setupExperiment`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExperimentSetup {
    pub start_time: f64,
    pub stop_time: Option<f64>,
    pub tolerance: Option<f64>,
}

/// Everything the host supplies when creating a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceConfig {
    pub instance_name: String,
    /// Filesystem path of the unpacked resource directory.
    pub resource_location: PathBuf,
    pub visible: bool,
    pub logging_on: bool,
}

impl InstanceConfig {
    pub fn new(instance_name: impl Into<String>, resource_location: impl Into<PathBuf>) -> Self {
        Self {
            instance_name: instance_name.into(),
            resource_location: resource_location.into(),
            visible: false,
            logging_on: false,
        }
    }
}
