//! FMI 2.0 co-simulation entry points.
//!
//! Every function here is `extern "C"` with an unmangled `fmi2*` name so the
//! library can be loaded by any FMI 2.0 host.
//!
//! # Safety contract
//!
//! * The component pointer and every array pointer are checked for null
//!   before dereference. Array lengths are trusted as given by the host.
//! * Panics are caught with [`std::panic::catch_unwind`] and reported as a
//!   fatal status; they never cross the FFI boundary.
//! * Every failure is delivered through the host logger before the status
//!   code is returned.

#![allow(non_snake_case)]

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::ptr;

use cosim_core::{BridgeConfig, BridgeError, ExperimentSetup, Fmi2Status, InstanceConfig, StateId};
use cosim_runtime::{PyModel, lifecycle};
use url::Url;

use crate::adapter::{SlaveAdapter, StepOutcome};
use crate::relay::{HostLogger, LogRelay};
use crate::telemetry;
use crate::types::{
    FMI2_CO_SIMULATION, FMI2_FALSE, FMI2_LAST_SUCCESSFUL_TIME, FMI2_TERMINATED,
    FMI2_TYPES_PLATFORM, FMI2_VERSION, fmi2Boolean, fmi2Byte, fmi2CallbackFunctions,
    fmi2CallbackLogger, fmi2Component, fmi2ComponentEnvironment, fmi2FMUstate, fmi2Integer,
    fmi2Real, fmi2StatusKind, fmi2String, fmi2Type, fmi2ValueReference, to_fmi2_boolean,
};

// ---------------------------------------------------------------------------
// Host logger and component
// ---------------------------------------------------------------------------

/// The host's `fmi2CallbackLogger`, bound to one instance name.
pub struct CallbackLogger {
    logger: Option<fmi2CallbackLogger>,
    environment: fmi2ComponentEnvironment,
    instance_name: CString,
}

impl CallbackLogger {
    /// # Safety
    ///
    /// `functions` must be null or point to callbacks that stay valid for the
    /// lifetime of the component.
    unsafe fn new(functions: *const fmi2CallbackFunctions, instance_name: &str) -> Self {
        let (logger, environment) = match unsafe { functions.as_ref() } {
            Some(f) => (f.logger, f.component_environment),
            None => (None, ptr::null_mut()),
        };
        Self {
            logger,
            environment,
            instance_name: CString::new(instance_name.replace('\0', " ")).unwrap_or_default(),
        }
    }
}

impl HostLogger for CallbackLogger {
    fn log(&self, status: Fmi2Status, category: Option<&CStr>, message: &CStr) {
        let Some(logger) = self.logger else {
            tracing::debug!(status = %status, message = ?message, "No host logger installed");
            return;
        };
        let category = category.map_or(ptr::null(), CStr::as_ptr);
        // SAFETY: all strings are owned here and NUL-terminated; the message
        // has its format directives escaped, so no varargs are read.
        unsafe {
            logger(
                self.environment,
                self.instance_name.as_ptr(),
                status,
                category,
                message.as_ptr(),
            )
        };
    }
}

/// What an `fmi2Component` points to.
pub struct Component {
    adapter: SlaveAdapter<PyModel, CallbackLogger>,
    /// Backing storage for the last `fmi2GetString` result.
    strings: Vec<CString>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Runs `f` against the component behind `c`, turning errors and panics into
/// a status code.
fn call(
    c: fmi2Component,
    function: &'static str,
    f: impl FnOnce(&mut Component) -> Result<Fmi2Status, BridgeError>,
) -> Fmi2Status {
    let component = c.cast::<Component>();
    if component.is_null() {
        tracing::error!(function, "Called with a null component");
        return Fmi2Status::Error;
    }
    // SAFETY: non-null components were produced by fmi2Instantiate and the
    // host does not call into one component concurrently.
    let outcome = catch_unwind(AssertUnwindSafe(|| f(unsafe { &mut *component })));
    match outcome {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => e.status(),
        Err(_) => {
            tracing::error!(function, "Panic inside FMI call");
            let _ = catch_unwind(AssertUnwindSafe(|| {
                let component = unsafe { &*component };
                component
                    .adapter
                    .reject(BridgeError::fatal(format!("panic during {function}")));
            }));
            Fmi2Status::Fatal
        }
    }
}

/// Borrows a host input array. Empty arrays may be null.
unsafe fn input<'a, T>(data: *const T, len: usize) -> Result<&'a [T], BridgeError> {
    if len == 0 {
        return Ok(Default::default());
    }
    if data.is_null() {
        return Err(BridgeError::model("null array argument"));
    }
    Ok(unsafe { std::slice::from_raw_parts(data, len) })
}

/// Borrows a host output array. Empty arrays may be null.
unsafe fn output<'a, T>(data: *mut T, len: usize) -> Result<&'a mut [T], BridgeError> {
    if len == 0 {
        return Ok(Default::default());
    }
    if data.is_null() {
        return Err(BridgeError::model("null array argument"));
    }
    Ok(unsafe { std::slice::from_raw_parts_mut(data, len) })
}

fn fill<T>(out: &mut [T], values: impl ExactSizeIterator<Item = T>) -> Result<(), BridgeError> {
    if values.len() != out.len() {
        return Err(BridgeError::fatal(format!(
            "model returned {} values for {} references",
            values.len(),
            out.len()
        )));
    }
    for (slot, value) in out.iter_mut().zip(values) {
        *slot = value;
    }
    Ok(())
}

unsafe fn owned_string(s: fmi2String) -> Option<String> {
    if s.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(s) }.to_string_lossy().into_owned())
}

fn state_id(handle: fmi2FMUstate) -> Option<StateId> {
    StateId::from_raw(handle as usize as u64)
}

fn state_handle(id: StateId) -> fmi2FMUstate {
    id.as_raw() as usize as fmi2FMUstate
}

/// Converts an `fmuResourceLocation` to a directory path. `file:` URIs are
/// percent-decoded; anything else is taken as a plain path.
pub fn resource_path(location: &str) -> Result<PathBuf, BridgeError> {
    if !location.starts_with("file:") {
        return Ok(PathBuf::from(location));
    }
    let url = Url::parse(location)
        .map_err(|e| BridgeError::fatal(format!("invalid resource URI {location}: {e}")))?;
    url.to_file_path()
        .map_err(|()| BridgeError::fatal(format!("resource URI {location} is not a local path")))
}

fn build_model(
    name: &str,
    fmu_type: fmi2Type,
    resource_location: fmi2String,
    visible: bool,
    logging_on: bool,
) -> Result<PyModel, BridgeError> {
    if fmu_type != FMI2_CO_SIMULATION {
        return Err(BridgeError::fatal(format!(
            "only co-simulation is supported, got fmuType {fmu_type}"
        )));
    }
    let location = unsafe { owned_string(resource_location) }
        .ok_or_else(|| BridgeError::fatal("missing resource location"))?;
    let resources = resource_path(&location)?;

    let config = BridgeConfig::load_or_default(&resources)
        .map_err(|e| BridgeError::fatal(format!("invalid configuration: {e}")))?;
    telemetry::init(&config.logging);

    let runtime = lifecycle::acquire(&config.runtime)?;
    let mut instance = InstanceConfig::new(name, resources);
    instance.visible = visible;
    instance.logging_on = logging_on;
    PyModel::instantiate(runtime, instance, &config)
}

// ---------------------------------------------------------------------------
// Inquiry and lifecycle
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub extern "C" fn fmi2GetTypesPlatform() -> *const c_char {
    FMI2_TYPES_PLATFORM.as_ptr()
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2GetVersion() -> *const c_char {
    FMI2_VERSION.as_ptr()
}

/// Creates a component backed by the model class found in the resource
/// directory. Returns null on failure after logging a fatal message.
#[unsafe(no_mangle)]
pub extern "C" fn fmi2Instantiate(
    instance_name: fmi2String,
    fmu_type: fmi2Type,
    _fmu_guid: fmi2String,
    fmu_resource_location: fmi2String,
    functions: *const fmi2CallbackFunctions,
    visible: fmi2Boolean,
    logging_on: fmi2Boolean,
) -> fmi2Component {
    catch_unwind(AssertUnwindSafe(|| {
        let name = unsafe { owned_string(instance_name) }.unwrap_or_default();
        let logger = unsafe { CallbackLogger::new(functions, &name) };
        let relay = LogRelay::new(logger, logging_on != FMI2_FALSE);

        match build_model(
            &name,
            fmu_type,
            fmu_resource_location,
            visible != FMI2_FALSE,
            logging_on != FMI2_FALSE,
        ) {
            Ok(model) => {
                let component = Component {
                    adapter: SlaveAdapter::new(name, model, relay),
                    strings: Vec::new(),
                };
                Box::into_raw(Box::new(component)).cast()
            }
            Err(e) => {
                tracing::error!(instance = %name, error = %e, "Instantiation failed");
                relay.report(&e);
                ptr::null_mut()
            }
        }
    }))
    .unwrap_or_else(|_| {
        tracing::error!("Panic during fmi2Instantiate");
        ptr::null_mut()
    })
}

/// Frees a component and everything it owns, including outstanding
/// FMU states. Null is ignored.
#[unsafe(no_mangle)]
pub extern "C" fn fmi2FreeInstance(c: fmi2Component) {
    if c.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: produced by Box::into_raw in fmi2Instantiate, freed once.
        let component = unsafe { Box::from_raw(c.cast::<Component>()) };
        tracing::info!(instance = %component.adapter.name(), "Freeing instance");
        drop(component);
    }));
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2SetDebugLogging(
    c: fmi2Component,
    logging_on: fmi2Boolean,
    n_categories: usize,
    categories: *const fmi2String,
) -> Fmi2Status {
    call(c, "fmi2SetDebugLogging", |c| {
        let names = unsafe { input(categories, n_categories) }.map_err(|e| c.adapter.reject(e))?;
        let names = names
            .iter()
            .filter_map(|&s| unsafe { owned_string(s) })
            .collect();
        c.adapter.set_debug_logging(logging_on != FMI2_FALSE, names);
        Ok(Fmi2Status::Ok)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2SetupExperiment(
    c: fmi2Component,
    tolerance_defined: fmi2Boolean,
    tolerance: fmi2Real,
    start_time: fmi2Real,
    stop_time_defined: fmi2Boolean,
    stop_time: fmi2Real,
) -> Fmi2Status {
    call(c, "fmi2SetupExperiment", |c| {
        let setup = ExperimentSetup {
            start_time,
            stop_time: (stop_time_defined != FMI2_FALSE).then_some(stop_time),
            tolerance: (tolerance_defined != FMI2_FALSE).then_some(tolerance),
        };
        c.adapter.setup_experiment(setup)?;
        Ok(Fmi2Status::Ok)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2EnterInitializationMode(c: fmi2Component) -> Fmi2Status {
    call(c, "fmi2EnterInitializationMode", |c| {
        c.adapter.enter_initialization_mode()?;
        Ok(Fmi2Status::Ok)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2ExitInitializationMode(c: fmi2Component) -> Fmi2Status {
    call(c, "fmi2ExitInitializationMode", |c| {
        c.adapter.exit_initialization_mode()?;
        Ok(Fmi2Status::Ok)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2Terminate(c: fmi2Component) -> Fmi2Status {
    call(c, "fmi2Terminate", |c| {
        c.adapter.terminate()?;
        Ok(Fmi2Status::Ok)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2Reset(c: fmi2Component) -> Fmi2Status {
    call(c, "fmi2Reset", |c| {
        c.adapter.reset()?;
        Ok(Fmi2Status::Ok)
    })
}

// ---------------------------------------------------------------------------
// Variable access
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub extern "C" fn fmi2GetReal(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *mut fmi2Real,
) -> Fmi2Status {
    call(c, "fmi2GetReal", |c| {
        let refs = unsafe { input(vr, nvr) }.map_err(|e| c.adapter.reject(e))?;
        let out = unsafe { output(value, nvr) }.map_err(|e| c.adapter.reject(e))?;
        let values = c.adapter.get_real(refs)?;
        fill(out, values.into_iter()).map_err(|e| c.adapter.reject(e))?;
        Ok(Fmi2Status::Ok)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2GetInteger(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *mut fmi2Integer,
) -> Fmi2Status {
    call(c, "fmi2GetInteger", |c| {
        let refs = unsafe { input(vr, nvr) }.map_err(|e| c.adapter.reject(e))?;
        let out = unsafe { output(value, nvr) }.map_err(|e| c.adapter.reject(e))?;
        let values = c.adapter.get_integer(refs)?;
        fill(out, values.into_iter()).map_err(|e| c.adapter.reject(e))?;
        Ok(Fmi2Status::Ok)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2GetBoolean(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *mut fmi2Boolean,
) -> Fmi2Status {
    call(c, "fmi2GetBoolean", |c| {
        let refs = unsafe { input(vr, nvr) }.map_err(|e| c.adapter.reject(e))?;
        let out = unsafe { output(value, nvr) }.map_err(|e| c.adapter.reject(e))?;
        let values = c.adapter.get_boolean(refs)?;
        fill(out, values.into_iter().map(to_fmi2_boolean)).map_err(|e| c.adapter.reject(e))?;
        Ok(Fmi2Status::Ok)
    })
}

/// The returned strings stay valid until the next `fmi2GetString` on the same
/// component or until it is freed.
#[unsafe(no_mangle)]
pub extern "C" fn fmi2GetString(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *mut fmi2String,
) -> Fmi2Status {
    call(c, "fmi2GetString", |c| {
        let refs = unsafe { input(vr, nvr) }.map_err(|e| c.adapter.reject(e))?;
        let out = unsafe { output(value, nvr) }.map_err(|e| c.adapter.reject(e))?;
        let values = c.adapter.get_string(refs)?;
        c.strings = values
            .into_iter()
            .map(|s| CString::new(s.replace('\0', " ")).unwrap_or_default())
            .collect();
        fill(out, c.strings.iter().map(|s| s.as_ptr())).map_err(|e| c.adapter.reject(e))?;
        Ok(Fmi2Status::Ok)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2SetReal(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *const fmi2Real,
) -> Fmi2Status {
    call(c, "fmi2SetReal", |c| {
        let refs = unsafe { input(vr, nvr) }.map_err(|e| c.adapter.reject(e))?;
        let values = unsafe { input(value, nvr) }.map_err(|e| c.adapter.reject(e))?;
        c.adapter.set_real(refs, values)?;
        Ok(Fmi2Status::Ok)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2SetInteger(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *const fmi2Integer,
) -> Fmi2Status {
    call(c, "fmi2SetInteger", |c| {
        let refs = unsafe { input(vr, nvr) }.map_err(|e| c.adapter.reject(e))?;
        let values = unsafe { input(value, nvr) }.map_err(|e| c.adapter.reject(e))?;
        c.adapter.set_integer(refs, values)?;
        Ok(Fmi2Status::Ok)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2SetBoolean(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *const fmi2Boolean,
) -> Fmi2Status {
    call(c, "fmi2SetBoolean", |c| {
        let refs = unsafe { input(vr, nvr) }.map_err(|e| c.adapter.reject(e))?;
        let values: Vec<bool> = unsafe { input(value, nvr) }
            .map_err(|e| c.adapter.reject(e))?
            .iter()
            .map(|&b| b != FMI2_FALSE)
            .collect();
        c.adapter.set_boolean(refs, &values)?;
        Ok(Fmi2Status::Ok)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2SetString(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *const fmi2String,
) -> Fmi2Status {
    call(c, "fmi2SetString", |c| {
        let refs = unsafe { input(vr, nvr) }.map_err(|e| c.adapter.reject(e))?;
        let raw = unsafe { input(value, nvr) }.map_err(|e| c.adapter.reject(e))?;
        let values = raw
            .iter()
            .map(|&s| unsafe { owned_string(s) })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| c.adapter.reject(BridgeError::model("null string value")))?;
        c.adapter.set_string(refs, &values)?;
        Ok(Fmi2Status::Ok)
    })
}

// ---------------------------------------------------------------------------
// FMU state
// ---------------------------------------------------------------------------

/// Stores a snapshot in `*state`. A non-null `*state` from an earlier call is
/// overwritten in place.
#[unsafe(no_mangle)]
pub extern "C" fn fmi2GetFMUstate(c: fmi2Component, state: *mut fmi2FMUstate) -> Fmi2Status {
    call(c, "fmi2GetFMUstate", |c| {
        if state.is_null() {
            return Err(c.adapter.reject(BridgeError::model("null FMU state pointer")));
        }
        let reuse = state_id(unsafe { *state });
        let id = c.adapter.get_state(reuse)?;
        unsafe { *state = state_handle(id) };
        Ok(Fmi2Status::Ok)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2SetFMUstate(c: fmi2Component, state: fmi2FMUstate) -> Fmi2Status {
    call(c, "fmi2SetFMUstate", |c| {
        let id = state_id(state)
            .ok_or_else(|| c.adapter.reject(BridgeError::model("null FMU state")))?;
        c.adapter.set_state(id)?;
        Ok(Fmi2Status::Ok)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2FreeFMUstate(c: fmi2Component, state: *mut fmi2FMUstate) -> Fmi2Status {
    call(c, "fmi2FreeFMUstate", |c| {
        if state.is_null() {
            return Ok(Fmi2Status::Ok);
        }
        if let Some(id) = state_id(unsafe { *state }) {
            c.adapter.free_state(id)?;
        }
        unsafe { *state = ptr::null_mut() };
        Ok(Fmi2Status::Ok)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2SerializedFMUstateSize(
    c: fmi2Component,
    state: fmi2FMUstate,
    size: *mut usize,
) -> Fmi2Status {
    call(c, "fmi2SerializedFMUstateSize", |c| {
        let id = state_id(state)
            .ok_or_else(|| c.adapter.reject(BridgeError::model("null FMU state")))?;
        if size.is_null() {
            return Err(c.adapter.reject(BridgeError::model("null size pointer")));
        }
        let len = c.adapter.serialized_state_size(id)?;
        unsafe { *size = len };
        Ok(Fmi2Status::Ok)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2SerializeFMUstate(
    c: fmi2Component,
    state: fmi2FMUstate,
    serialized_state: *mut fmi2Byte,
    size: usize,
) -> Fmi2Status {
    call(c, "fmi2SerializeFMUstate", |c| {
        let id = state_id(state)
            .ok_or_else(|| c.adapter.reject(BridgeError::model("null FMU state")))?;
        let buffer = unsafe { output(serialized_state.cast::<u8>(), size) }
            .map_err(|e| c.adapter.reject(e))?;
        c.adapter.serialize_state(id, buffer)?;
        Ok(Fmi2Status::Ok)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2DeSerializeFMUstate(
    c: fmi2Component,
    serialized_state: *const fmi2Byte,
    size: usize,
    state: *mut fmi2FMUstate,
) -> Fmi2Status {
    call(c, "fmi2DeSerializeFMUstate", |c| {
        if state.is_null() {
            return Err(c.adapter.reject(BridgeError::model("null FMU state pointer")));
        }
        let bytes = unsafe { input(serialized_state.cast::<u8>(), size) }
            .map_err(|e| c.adapter.reject(e))?;
        let id = c.adapter.deserialize_state(bytes)?;
        unsafe { *state = state_handle(id) };
        Ok(Fmi2Status::Ok)
    })
}

// ---------------------------------------------------------------------------
// Co-simulation
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub extern "C" fn fmi2DoStep(
    c: fmi2Component,
    current_communication_point: fmi2Real,
    communication_step_size: fmi2Real,
    _no_set_fmu_state_prior_to_current_point: fmi2Boolean,
) -> Fmi2Status {
    call(c, "fmi2DoStep", |c| {
        match c
            .adapter
            .do_step(current_communication_point, communication_step_size)?
        {
            StepOutcome::Completed => Ok(Fmi2Status::Ok),
            StepOutcome::Discarded { .. } => Ok(Fmi2Status::Discard),
        }
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2CancelStep(c: fmi2Component) -> Fmi2Status {
    call(c, "fmi2CancelStep", |c| {
        Ok(c.adapter.unsupported("fmi2CancelStep", Fmi2Status::Error))
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2GetStatus(
    c: fmi2Component,
    _kind: fmi2StatusKind,
    _value: *mut Fmi2Status,
) -> Fmi2Status {
    call(c, "fmi2GetStatus", |c| {
        Ok(c.adapter.unsupported("fmi2GetStatus", Fmi2Status::Error))
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2GetRealStatus(
    c: fmi2Component,
    kind: fmi2StatusKind,
    value: *mut fmi2Real,
) -> Fmi2Status {
    call(c, "fmi2GetRealStatus", |c| {
        if kind != FMI2_LAST_SUCCESSFUL_TIME {
            c.adapter.relay().emit(
                Fmi2Status::Discard,
                None,
                "Invalid status inquiry for fmi2GetRealStatus",
            );
            return Ok(Fmi2Status::Discard);
        }
        if value.is_null() {
            return Err(c.adapter.reject(BridgeError::model("null status value pointer")));
        }
        unsafe { *value = c.adapter.last_successful_time() };
        Ok(Fmi2Status::Ok)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2GetIntegerStatus(
    c: fmi2Component,
    _kind: fmi2StatusKind,
    _value: *mut fmi2Integer,
) -> Fmi2Status {
    call(c, "fmi2GetIntegerStatus", |c| {
        Ok(c.adapter.unsupported("fmi2GetIntegerStatus", Fmi2Status::Discard))
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2GetBooleanStatus(
    c: fmi2Component,
    kind: fmi2StatusKind,
    value: *mut fmi2Boolean,
) -> Fmi2Status {
    call(c, "fmi2GetBooleanStatus", |c| {
        if kind != FMI2_TERMINATED {
            return Ok(c.adapter.unsupported("fmi2GetBooleanStatus", Fmi2Status::Discard));
        }
        if value.is_null() {
            return Err(c.adapter.reject(BridgeError::model("null status value pointer")));
        }
        unsafe { *value = to_fmi2_boolean(c.adapter.wants_to_terminate()) };
        Ok(Fmi2Status::Ok)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2GetStringStatus(
    c: fmi2Component,
    _kind: fmi2StatusKind,
    _value: *mut fmi2String,
) -> Fmi2Status {
    call(c, "fmi2GetStringStatus", |c| {
        Ok(c.adapter.unsupported("fmi2GetStringStatus", Fmi2Status::Discard))
    })
}

// ---------------------------------------------------------------------------
// Derivatives (not provided by co-simulation models)
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub extern "C" fn fmi2GetDirectionalDerivative(
    c: fmi2Component,
    _v_unknown_ref: *const fmi2ValueReference,
    _n_unknown: usize,
    _v_known_ref: *const fmi2ValueReference,
    _n_known: usize,
    _dv_known: *const fmi2Real,
    _dv_unknown: *mut fmi2Real,
) -> Fmi2Status {
    call(c, "fmi2GetDirectionalDerivative", |c| {
        Ok(c.adapter.unsupported("fmi2GetDirectionalDerivative", Fmi2Status::Error))
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2SetRealInputDerivatives(
    c: fmi2Component,
    _vr: *const fmi2ValueReference,
    _nvr: usize,
    _order: *const fmi2Integer,
    _value: *const fmi2Real,
) -> Fmi2Status {
    call(c, "fmi2SetRealInputDerivatives", |c| {
        Ok(c.adapter.unsupported("fmi2SetRealInputDerivatives", Fmi2Status::Error))
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fmi2GetRealOutputDerivatives(
    c: fmi2Component,
    _vr: *const fmi2ValueReference,
    _nvr: usize,
    _order: *const fmi2Integer,
    _value: *mut fmi2Real,
) -> Fmi2Status {
    call(c, "fmi2GetRealOutputDerivatives", |c| {
        Ok(c.adapter.unsupported("fmi2GetRealOutputDerivatives", Fmi2Status::Error))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_pass_through() {
        assert_eq!(resource_path("/res").unwrap(), PathBuf::from("/res"));
        assert_eq!(resource_path("res dir").unwrap(), PathBuf::from("res dir"));
    }

    #[cfg(unix)]
    #[test]
    fn file_uris_are_decoded() {
        assert_eq!(
            resource_path("file:///tmp/my%20model/resources").unwrap(),
            PathBuf::from("/tmp/my model/resources")
        );
        assert_eq!(resource_path("file:/res").unwrap(), PathBuf::from("/res"));
    }

    #[cfg(unix)]
    #[test]
    fn remote_uris_are_fatal() {
        let err = resource_path("file://remote-host/share").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn state_handles_roundtrip_and_null_is_none() {
        let id = StateId::from_raw(7).unwrap();
        assert_eq!(state_id(state_handle(id)), Some(id));
        assert_eq!(state_id(ptr::null_mut()), None);
    }

    #[test]
    fn null_arrays_are_rejected_unless_empty() {
        let empty = unsafe { input::<u32>(ptr::null(), 0) }.unwrap();
        assert!(empty.is_empty());
        assert!(unsafe { input::<u32>(ptr::null(), 2) }.is_err());
        assert!(unsafe { output::<f64>(ptr::null_mut(), 1) }.is_err());
    }

    #[test]
    fn fill_checks_length() {
        let mut out = [0.0; 2];
        fill(&mut out, vec![1.0, 2.0].into_iter()).unwrap();
        assert_eq!(out, [1.0, 2.0]);
        assert!(fill(&mut out, vec![1.0].into_iter()).unwrap_err().is_fatal());
    }

    #[test]
    fn null_component_is_an_error() {
        assert_eq!(fmi2EnterInitializationMode(ptr::null_mut()), Fmi2Status::Error);
        fmi2FreeInstance(ptr::null_mut());
    }

    #[test]
    fn version_strings() {
        let platform = unsafe { CStr::from_ptr(fmi2GetTypesPlatform()) };
        let version = unsafe { CStr::from_ptr(fmi2GetVersion()) };
        assert_eq!(platform.to_str().unwrap(), "default");
        assert_eq!(version.to_str().unwrap(), "2.0");
    }
}
