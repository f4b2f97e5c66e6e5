use crate::error::BridgeError;
use crate::types::{ExperimentSetup, LogRecord, ValueReference};

/// The fixed capability interface a live model instance exposes to the slave
/// adapter.
///
/// Implementations confine all dynamic dispatch into the embedded runtime.
/// Everything above this trait is statically typed.
///
/// Getters return values in the order the references were supplied and must
/// return exactly `refs.len()` of them. Setters either apply every pair or
/// none.
pub trait ModelInstance {
    /// Runtime-owned snapshot of the model's logical state.
    type Snapshot;

    fn setup_experiment(&mut self, setup: ExperimentSetup) -> Result<(), BridgeError>;
    fn enter_initialization_mode(&mut self) -> Result<(), BridgeError>;
    fn exit_initialization_mode(&mut self) -> Result<(), BridgeError>;

    /// Advances the model. `Ok(false)` means the model stopped at the
    /// requested point and the step should be reported as discarded.
    fn do_step(&mut self, current_time: f64, step_size: f64) -> Result<bool, BridgeError>;

    fn terminate(&mut self) -> Result<(), BridgeError>;

    /// Discards the live instance and constructs a fresh one from the same
    /// resolved type and configuration.
    fn reset(&mut self) -> Result<(), BridgeError>;

    fn get_real(&mut self, refs: &[ValueReference]) -> Result<Vec<f64>, BridgeError>;
    fn get_integer(&mut self, refs: &[ValueReference]) -> Result<Vec<i32>, BridgeError>;
    fn get_boolean(&mut self, refs: &[ValueReference]) -> Result<Vec<bool>, BridgeError>;
    fn get_string(&mut self, refs: &[ValueReference]) -> Result<Vec<String>, BridgeError>;

    fn set_real(&mut self, refs: &[ValueReference], values: &[f64]) -> Result<(), BridgeError>;
    fn set_integer(&mut self, refs: &[ValueReference], values: &[i32]) -> Result<(), BridgeError>;
    fn set_boolean(&mut self, refs: &[ValueReference], values: &[bool])
    -> Result<(), BridgeError>;
    fn set_string(&mut self, refs: &[ValueReference], values: &[String])
    -> Result<(), BridgeError>;

    fn get_state(&mut self) -> Result<Self::Snapshot, BridgeError>;

    /// Restores the live instance from `snapshot` without consuming it.
    fn set_state(&mut self, snapshot: &Self::Snapshot) -> Result<(), BridgeError>;

    fn encode_state(&mut self, snapshot: &Self::Snapshot) -> Result<Vec<u8>, BridgeError>;
    fn decode_state(&mut self, bytes: &[u8]) -> Result<Self::Snapshot, BridgeError>;

    /// Releases a snapshot inside the runtime.
    fn release_state(&mut self, snapshot: Self::Snapshot);

    /// Takes every log record queued since the last drain, oldest first.
    fn drain_log(&mut self) -> Vec<LogRecord>;
}
