/// Process-wide runtime teardown through the exported unload entry point.
///
/// Finalizing the interpreter cannot be undone in a process, so this binary
/// holds a single test and shares nothing with `fmi2_abi`.
///
/// Run with: `cargo test -p cosim-fmi --test runtime_teardown`
use std::ffi::{CStr, CString};
use std::os::raw::c_void;
use std::sync::Mutex;

use cosim_core::Fmi2Status;
use cosim_fmi::fmi2::*;
use cosim_fmi::types::*;
use cosim_fmi::unload::cosim_finalize_runtime;
use cosim_runtime::LifecyclePhase;
use cosim_runtime::lifecycle;

const COUNTER_MODEL: &str = r#"
from pythonfmu import Fmi2Slave, Fmi2Causality, Integer


class Counter(Fmi2Slave):
    def __init__(self, **kwargs):
        super().__init__(**kwargs)
        self.count = 0
        self.register_variable(Integer("count", causality=Fmi2Causality.output))

    def do_step(self, current_time, step_size):
        self.count += 1
        return True
"#;

type Records = Mutex<Vec<(Fmi2Status, String)>>;

unsafe extern "C" fn record(
    environment: fmi2ComponentEnvironment,
    _instance: fmi2String,
    status: Fmi2Status,
    _category: fmi2String,
    message: fmi2String,
) {
    let records = unsafe { &*(environment as *const Records) };
    let message = unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned();
    records.lock().unwrap().push((status, message));
}

fn callbacks(records: &Records) -> fmi2CallbackFunctions {
    // SAFETY: the bridge never passes varargs, so a callee with the five
    // fixed parameters reads exactly what the caller provides.
    let logger = unsafe {
        std::mem::transmute::<
            unsafe extern "C" fn(
                fmi2ComponentEnvironment,
                fmi2String,
                Fmi2Status,
                fmi2String,
                fmi2String,
            ),
            fmi2CallbackLogger,
        >(record)
    };
    fmi2CallbackFunctions {
        logger: Some(logger),
        allocate_memory: None,
        free_memory: None,
        step_finished: None,
        component_environment: records as *const Records as *mut c_void,
    }
}

fn instantiate(name: &str, resources: &CStr, functions: &fmi2CallbackFunctions) -> fmi2Component {
    let name = CString::new(name).unwrap();
    fmi2Instantiate(
        name.as_ptr(),
        FMI2_CO_SIMULATION,
        c"{cosim-teardown}".as_ptr(),
        resources.as_ptr(),
        functions,
        FMI2_FALSE,
        FMI2_FALSE,
    )
}

fn initialize(c: fmi2Component) {
    assert_eq!(fmi2SetupExperiment(c, FMI2_FALSE, 0.0, 0.0, FMI2_FALSE, 0.0), Fmi2Status::Ok);
    assert_eq!(fmi2EnterInitializationMode(c), Fmi2Status::Ok);
    assert_eq!(fmi2ExitInitializationMode(c), Fmi2Status::Ok);
}

#[test]
fn finalized_runtime_is_never_restarted() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("slavemodule.txt"), "teardown_counter\n").unwrap();
    std::fs::write(dir.path().join("teardown_counter.py"), COUNTER_MODEL).unwrap();
    let resources = CString::new(dir.path().to_string_lossy().into_owned()).unwrap();

    let records: Records = Mutex::default();
    let functions = callbacks(&records);
    assert_eq!(lifecycle::process_phase(), LifecyclePhase::Uninitialized);

    // A freed component leaves the runtime to the process slot.
    let c = instantiate("first", &resources, &functions);
    assert!(!c.is_null(), "{:?}", records.lock().unwrap());
    initialize(c);
    assert_eq!(fmi2DoStep(c, 0.0, 0.1, FMI2_TRUE), Fmi2Status::Ok);
    fmi2FreeInstance(c);
    assert_eq!(lifecycle::process_phase(), LifecyclePhase::Ready);

    // A live component keeps the runtime up past the unload call.
    let c = instantiate("second", &resources, &functions);
    assert!(!c.is_null(), "{:?}", records.lock().unwrap());
    initialize(c);
    cosim_finalize_runtime();
    assert_eq!(lifecycle::process_phase(), LifecyclePhase::Ready);
    assert_eq!(fmi2DoStep(c, 0.0, 0.1, FMI2_TRUE), Fmi2Status::Ok);
    let mut count = 0;
    assert_eq!(fmi2GetInteger(c, [0].as_ptr(), 1, &mut count), Fmi2Status::Ok);
    assert_eq!(count, 1);

    fmi2FreeInstance(c);
    assert_eq!(lifecycle::process_phase(), LifecyclePhase::Finalized);

    // Repeated unload calls are harmless.
    cosim_finalize_runtime();
    assert_eq!(lifecycle::process_phase(), LifecyclePhase::Finalized);

    records.lock().unwrap().clear();
    let c = instantiate("third", &resources, &functions);
    assert!(c.is_null());
    let records = records.lock().unwrap();
    assert!(
        records
            .iter()
            .any(|(status, message)| *status == Fmi2Status::Fatal && message.contains("finalized")),
        "{records:?}"
    );
    assert_eq!(lifecycle::process_phase(), LifecyclePhase::Finalized);
}
