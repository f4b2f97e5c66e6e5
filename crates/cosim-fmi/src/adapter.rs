use cosim_core::{
    BridgeError, ExperimentSetup, Fmi2Status, ModelInstance, Operation, SlaveState,
    SnapshotStore, StateId, ValueReference,
};

use crate::relay::{HostLogger, LogRelay};

/// Result of a communication step that did not fail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    Completed,
    /// The model stopped at `reached` instead of the requested end point.
    Discarded { reached: f64 },
}

/// One co-simulation slave: the protocol state machine around a live model.
///
/// Every call is checked against the slave state machine, forwarded to the
/// model, and followed by a log relay pass. A fatal failure releases the
/// model and every snapshot the component still holds; afterwards each call
/// fails with a fatal status.
pub struct SlaveAdapter<M: ModelInstance, L> {
    name: String,
    state: SlaveState,
    model: Option<M>,
    snapshots: SnapshotStore<M::Snapshot>,
    relay: LogRelay<L>,
    last_successful_time: f64,
    wants_to_terminate: bool,
}

impl<M: ModelInstance, L: HostLogger> SlaveAdapter<M, L> {
    pub fn new(name: impl Into<String>, mut model: M, relay: LogRelay<L>) -> Self {
        relay.relay(model.drain_log());
        let name = name.into();
        tracing::info!(instance = %name, "Slave instantiated");
        Self {
            name,
            state: SlaveState::Instantiated,
            model: Some(model),
            snapshots: SnapshotStore::new(),
            relay,
            last_successful_time: f64::NAN,
            wants_to_terminate: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SlaveState {
        self.state
    }

    /// Whether the model is still alive, i.e. no fatal failure happened.
    pub fn is_alive(&self) -> bool {
        self.model.is_some()
    }

    pub fn last_successful_time(&self) -> f64 {
        self.last_successful_time
    }

    pub fn wants_to_terminate(&self) -> bool {
        self.wants_to_terminate
    }

    pub fn outstanding_snapshots(&self) -> usize {
        self.snapshots.len()
    }

    pub fn relay(&self) -> &LogRelay<L> {
        &self.relay
    }

    pub fn set_debug_logging(&mut self, on: bool, categories: Vec<String>) {
        self.relay.set_debug_logging(on, categories);
    }

    /// Logs that `function` is not implemented and hands back `status`.
    pub fn unsupported(&self, function: &str, status: Fmi2Status) -> Fmi2Status {
        self.relay
            .emit(status, None, &format!("FMI function not supported: {function}"));
        status
    }

    /// Reports a failure detected before the model was reached, such as an
    /// invalid argument from the host.
    pub fn reject(&self, err: BridgeError) -> BridgeError {
        self.relay.report(&err);
        err
    }

    pub fn setup_experiment(&mut self, setup: ExperimentSetup) -> Result<(), BridgeError> {
        self.invoke(Operation::SetupExperiment, |model, _| model.setup_experiment(setup))
    }

    pub fn enter_initialization_mode(&mut self) -> Result<(), BridgeError> {
        self.invoke(Operation::EnterInitializationMode, |model, _| {
            model.enter_initialization_mode()
        })
    }

    pub fn exit_initialization_mode(&mut self) -> Result<(), BridgeError> {
        self.invoke(Operation::ExitInitializationMode, |model, _| {
            model.exit_initialization_mode()
        })
    }

    pub fn do_step(&mut self, current_time: f64, step_size: f64) -> Result<StepOutcome, BridgeError> {
        let proceed = self.invoke(Operation::DoStep, |model, _| {
            model.do_step(current_time, step_size)
        })?;
        if proceed {
            self.last_successful_time = current_time + step_size;
            Ok(StepOutcome::Completed)
        } else {
            self.last_successful_time = current_time;
            self.wants_to_terminate = true;
            tracing::debug!(instance = %self.name, reached = current_time, "Step discarded by model");
            Ok(StepOutcome::Discarded {
                reached: current_time,
            })
        }
    }

    pub fn terminate(&mut self) -> Result<(), BridgeError> {
        self.invoke(Operation::Terminate, |model, _| model.terminate())
    }

    pub fn reset(&mut self) -> Result<(), BridgeError> {
        self.invoke(Operation::Reset, |model, _| model.reset())?;
        self.last_successful_time = f64::NAN;
        self.wants_to_terminate = false;
        Ok(())
    }

    pub fn get_real(&mut self, refs: &[ValueReference]) -> Result<Vec<f64>, BridgeError> {
        self.invoke(Operation::GetValues, |model, _| model.get_real(refs))
    }

    pub fn get_integer(&mut self, refs: &[ValueReference]) -> Result<Vec<i32>, BridgeError> {
        self.invoke(Operation::GetValues, |model, _| model.get_integer(refs))
    }

    pub fn get_boolean(&mut self, refs: &[ValueReference]) -> Result<Vec<bool>, BridgeError> {
        self.invoke(Operation::GetValues, |model, _| model.get_boolean(refs))
    }

    pub fn get_string(&mut self, refs: &[ValueReference]) -> Result<Vec<String>, BridgeError> {
        self.invoke(Operation::GetValues, |model, _| model.get_string(refs))
    }

    pub fn set_real(&mut self, refs: &[ValueReference], values: &[f64]) -> Result<(), BridgeError> {
        self.invoke(Operation::SetValues, |model, _| model.set_real(refs, values))
    }

    pub fn set_integer(&mut self, refs: &[ValueReference], values: &[i32]) -> Result<(), BridgeError> {
        self.invoke(Operation::SetValues, |model, _| model.set_integer(refs, values))
    }

    pub fn set_boolean(&mut self, refs: &[ValueReference], values: &[bool]) -> Result<(), BridgeError> {
        self.invoke(Operation::SetValues, |model, _| model.set_boolean(refs, values))
    }

    pub fn set_string(&mut self, refs: &[ValueReference], values: &[String]) -> Result<(), BridgeError> {
        self.invoke(Operation::SetValues, |model, _| model.set_string(refs, values))
    }

    /// Takes a snapshot. With `reuse`, the snapshot behind that id is
    /// overwritten in place and the same id is returned.
    pub fn get_state(&mut self, reuse: Option<StateId>) -> Result<StateId, BridgeError> {
        self.invoke(Operation::GetState, |model, snapshots| {
            if let Some(id) = reuse {
                // Validate before asking the model for anything.
                snapshots.get(id)?;
            }
            let snapshot = model.get_state()?;
            match reuse {
                Some(id) => {
                    let previous = snapshots.replace(id, snapshot)?;
                    model.release_state(previous);
                    Ok(id)
                }
                None => Ok(snapshots.insert(snapshot)),
            }
        })
    }

    pub fn set_state(&mut self, id: StateId) -> Result<(), BridgeError> {
        self.invoke(Operation::SetState, |model, snapshots| {
            model.set_state(snapshots.get(id)?)
        })
    }

    /// Releases a snapshot. Unknown ids are ignored.
    pub fn free_state(&mut self, id: StateId) -> Result<(), BridgeError> {
        if self.model.is_none() {
            // Everything was already released by the fatal failure.
            return Ok(());
        }
        self.invoke(Operation::FreeState, |model, snapshots| {
            if let Some(snapshot) = snapshots.remove(id) {
                model.release_state(snapshot);
            }
            Ok(())
        })
    }

    /// Encodes the snapshot and returns its size. The encoding is kept for
    /// the following [`serialize_state`](Self::serialize_state).
    pub fn serialized_state_size(&mut self, id: StateId) -> Result<usize, BridgeError> {
        self.invoke(Operation::SerializedStateSize, |model, snapshots| {
            let bytes = model.encode_state(snapshots.get(id)?)?;
            snapshots.cache_encoded(id, bytes)
        })
    }

    /// Writes the encoding from the last size query into `buffer`, whose
    /// length must equal that size.
    pub fn serialize_state(&mut self, id: StateId, buffer: &mut [u8]) -> Result<(), BridgeError> {
        self.invoke(Operation::SerializeState, |_, snapshots| {
            let bytes = snapshots.encoded(id, buffer.len())?;
            buffer.copy_from_slice(bytes);
            Ok(())
        })
    }

    pub fn deserialize_state(&mut self, bytes: &[u8]) -> Result<StateId, BridgeError> {
        self.invoke(Operation::DeserializeState, |model, snapshots| {
            let snapshot = model.decode_state(bytes)?;
            Ok(snapshots.insert(snapshot))
        })
    }

    fn invoke<T>(
        &mut self,
        operation: Operation,
        call: impl FnOnce(&mut M, &mut SnapshotStore<M::Snapshot>) -> Result<T, BridgeError>,
    ) -> Result<T, BridgeError> {
        if self.model.is_none() {
            return Err(self.reject(BridgeError::fatal(format!(
                "{operation} called after a fatal error released the model"
            ))));
        }
        let next = match self.state.transition(operation) {
            Ok(next) => next,
            Err(e) => {
                self.relay.report(&e);
                return Err(e);
            }
        };

        let Some(model) = self.model.as_mut() else {
            return Err(BridgeError::fatal("model is not available"));
        };
        let result = call(model, &mut self.snapshots);
        self.relay.relay(model.drain_log());

        match result {
            Ok(value) => {
                self.state = next;
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(instance = %self.name, %operation, error = %e, "Model call failed");
                self.relay.report(&e);
                if e.is_fatal() {
                    self.release_all();
                }
                Err(e)
            }
        }
    }

    fn release_all(&mut self) {
        if let Some(mut model) = self.model.take() {
            let released = self.snapshots.len();
            for snapshot in self.snapshots.drain() {
                model.release_state(snapshot);
            }
            drop(model);
            tracing::warn!(
                instance = %self.name,
                snapshots = released,
                "Released model after fatal error"
            );
        }
    }
}

impl<M: ModelInstance, L> Drop for SlaveAdapter<M, L> {
    fn drop(&mut self) {
        if let Some(mut model) = self.model.take() {
            for snapshot in self.snapshots.drain() {
                model.release_state(snapshot);
            }
        }
    }
}
