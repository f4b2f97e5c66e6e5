use std::path::PathBuf;

use cosim_core::BridgeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Runtime initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Runtime was already finalized in this process")]
    AlreadyFinalized,

    #[error("Model source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Module file {} does not name a module", .0.display())]
    EmptyModuleFile(PathBuf),

    #[error("Compilation of {module} failed: {message}")]
    CompilationFailed { module: String, message: String },

    #[error("Executing module {module} failed: {message}")]
    ModuleExecutionFailed { module: String, message: String },

    #[error("No class deriving from {marker} found in module {module}")]
    NoModelClass { marker: String, module: String },

    #[error("Python error: {0}")]
    Python(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<RuntimeError> for BridgeError {
    fn from(err: RuntimeError) -> Self {
        BridgeError::Fatal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_runtime_error_is_fatal_for_the_bridge() {
        let err: BridgeError = RuntimeError::NoModelClass {
            marker: "Fmi2Slave".into(),
            module: "model".into(),
        }
        .into();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("Fmi2Slave"));

        let err: BridgeError = RuntimeError::SourceNotFound("/res/model.py".into()).into();
        assert!(err.to_string().contains("/res/model.py"));
    }
}
