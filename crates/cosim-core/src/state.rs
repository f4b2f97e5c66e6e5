use crate::error::BridgeError;

/// Lifecycle state of one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlaveState {
    Instantiated,
    ExperimentConfigured,
    Initializing,
    Initialized,
    Stepping,
    Terminated,
}

impl std::fmt::Display for SlaveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SlaveState::Instantiated => "instantiated",
            SlaveState::ExperimentConfigured => "experiment-configured",
            SlaveState::Initializing => "initializing",
            SlaveState::Initialized => "initialized",
            SlaveState::Stepping => "stepping",
            SlaveState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Protocol operations that are subject to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SetupExperiment,
    EnterInitializationMode,
    ExitInitializationMode,
    DoStep,
    Terminate,
    Reset,
    GetValues,
    SetValues,
    GetState,
    SetState,
    FreeState,
    SerializedStateSize,
    SerializeState,
    DeserializeState,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::SetupExperiment => "fmi2SetupExperiment",
            Operation::EnterInitializationMode => "fmi2EnterInitializationMode",
            Operation::ExitInitializationMode => "fmi2ExitInitializationMode",
            Operation::DoStep => "fmi2DoStep",
            Operation::Terminate => "fmi2Terminate",
            Operation::Reset => "fmi2Reset",
            Operation::GetValues => "fmi2Get*",
            Operation::SetValues => "fmi2Set*",
            Operation::GetState => "fmi2GetFMUstate",
            Operation::SetState => "fmi2SetFMUstate",
            Operation::FreeState => "fmi2FreeFMUstate",
            Operation::SerializedStateSize => "fmi2SerializedFMUstateSize",
            Operation::SerializeState => "fmi2SerializeFMUstate",
            Operation::DeserializeState => "fmi2DeSerializeFMUstate",
        };
        f.write_str(name)
    }
}

impl SlaveState {
    /// State reached by performing `op` from `self`, or `IllegalCall`.
    ///
    /// Operations that do not move the lifecycle return `self` unchanged.
    pub fn transition(self, op: Operation) -> Result<SlaveState, BridgeError> {
        use Operation as Op;
        use SlaveState as S;

        let next = match (op, self) {
            (Op::SetupExperiment, S::Instantiated) => Some(S::ExperimentConfigured),
            (Op::EnterInitializationMode, S::ExperimentConfigured) => Some(S::Initializing),
            (Op::ExitInitializationMode, S::Initializing) => Some(S::Initialized),
            (Op::DoStep, S::Initialized | S::Stepping) => Some(S::Stepping),
            (Op::Terminate, S::Initialized | S::Stepping) => Some(S::Terminated),
            (Op::Reset, _) => Some(S::Instantiated),
            (Op::GetValues | Op::SetValues | Op::GetState | Op::SetState, s) => {
                (s != S::Terminated).then_some(s)
            }
            (
                Op::FreeState | Op::SerializedStateSize | Op::SerializeState | Op::DeserializeState,
                s,
            ) => Some(s),
            _ => None,
        };

        next.ok_or(BridgeError::IllegalCall {
            operation: op,
            state: self,
        })
    }

    /// Whether the host may still drive the model.
    pub fn is_live(self) -> bool {
        self != SlaveState::Terminated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_terminated() {
        let s = SlaveState::Instantiated;
        let s = s.transition(Operation::SetupExperiment).unwrap();
        assert_eq!(s, SlaveState::ExperimentConfigured);
        let s = s.transition(Operation::EnterInitializationMode).unwrap();
        assert_eq!(s, SlaveState::Initializing);
        let s = s.transition(Operation::ExitInitializationMode).unwrap();
        assert_eq!(s, SlaveState::Initialized);
        let s = s.transition(Operation::DoStep).unwrap();
        assert_eq!(s, SlaveState::Stepping);
        let s = s.transition(Operation::DoStep).unwrap();
        assert_eq!(s, SlaveState::Stepping);
        let s = s.transition(Operation::Terminate).unwrap();
        assert_eq!(s, SlaveState::Terminated);
    }

    #[test]
    fn exit_before_enter_is_illegal() {
        let err = SlaveState::Instantiated
            .transition(Operation::ExitInitializationMode)
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::IllegalCall {
                operation: Operation::ExitInitializationMode,
                state: SlaveState::Instantiated,
            }
        );
    }

    #[test]
    fn step_before_initialization_is_illegal() {
        for s in [
            SlaveState::Instantiated,
            SlaveState::ExperimentConfigured,
            SlaveState::Initializing,
            SlaveState::Terminated,
        ] {
            assert!(s.transition(Operation::DoStep).is_err(), "{s}");
        }
    }

    #[test]
    fn reset_is_allowed_from_every_state() {
        for s in [
            SlaveState::Instantiated,
            SlaveState::ExperimentConfigured,
            SlaveState::Initializing,
            SlaveState::Initialized,
            SlaveState::Stepping,
            SlaveState::Terminated,
        ] {
            assert_eq!(s.transition(Operation::Reset).unwrap(), SlaveState::Instantiated);
        }
    }

    #[test]
    fn value_access_does_not_move_state() {
        let s = SlaveState::Initializing;
        assert_eq!(s.transition(Operation::SetValues).unwrap(), s);
        assert_eq!(s.transition(Operation::GetState).unwrap(), s);
        assert!(SlaveState::Terminated.transition(Operation::GetValues).is_err());
        assert_eq!(
            SlaveState::Terminated.transition(Operation::FreeState).unwrap(),
            SlaveState::Terminated
        );
    }

    #[test]
    fn setup_only_once() {
        assert!(SlaveState::ExperimentConfigured
            .transition(Operation::SetupExperiment)
            .is_err());
    }
}
