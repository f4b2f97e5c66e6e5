//! C-compatible FMI 2.0 types.
//!
//! These mirror `fmi2TypesPlatform.h` and `fmi2FunctionTypes.h` for the
//! "default" platform and use `#[repr(C)]` layouts so the host can pass them
//! straight through.

#![allow(non_camel_case_types)]

use std::os::raw::{c_char, c_int, c_uint, c_void};

use cosim_core::Fmi2Status;

pub type fmi2Component = *mut c_void;
pub type fmi2ComponentEnvironment = *mut c_void;
pub type fmi2FMUstate = *mut c_void;
pub type fmi2ValueReference = c_uint;
pub type fmi2Real = f64;
pub type fmi2Integer = c_int;
pub type fmi2Boolean = c_int;
pub type fmi2Char = c_char;
pub type fmi2String = *const fmi2Char;
pub type fmi2Byte = c_char;
pub type fmi2Type = c_int;
pub type fmi2StatusKind = c_int;

pub const FMI2_TYPES_PLATFORM: &std::ffi::CStr = c"default";
pub const FMI2_VERSION: &std::ffi::CStr = c"2.0";

pub const FMI2_TRUE: fmi2Boolean = 1;
pub const FMI2_FALSE: fmi2Boolean = 0;

pub const FMI2_MODEL_EXCHANGE: fmi2Type = 0;
pub const FMI2_CO_SIMULATION: fmi2Type = 1;

pub const FMI2_DO_STEP_STATUS: fmi2StatusKind = 0;
pub const FMI2_PENDING_STATUS: fmi2StatusKind = 1;
pub const FMI2_LAST_SUCCESSFUL_TIME: fmi2StatusKind = 2;
pub const FMI2_TERMINATED: fmi2StatusKind = 3;

/// `fmi2CallbackLogger`. The trailing arguments are printf-style varargs;
/// this crate never passes any.
pub type fmi2CallbackLogger = unsafe extern "C" fn(
    fmi2ComponentEnvironment,
    fmi2String,
    Fmi2Status,
    fmi2String,
    fmi2String,
    ...
);

pub type fmi2CallbackAllocateMemory = unsafe extern "C" fn(usize, usize) -> *mut c_void;
pub type fmi2CallbackFreeMemory = unsafe extern "C" fn(*mut c_void);
pub type fmi2StepFinished = unsafe extern "C" fn(fmi2ComponentEnvironment, Fmi2Status);

/// Callbacks handed over by the host in `fmi2Instantiate`.
#[repr(C)]
pub struct fmi2CallbackFunctions {
    pub logger: Option<fmi2CallbackLogger>,
    pub allocate_memory: Option<fmi2CallbackAllocateMemory>,
    pub free_memory: Option<fmi2CallbackFreeMemory>,
    pub step_finished: Option<fmi2StepFinished>,
    pub component_environment: fmi2ComponentEnvironment,
}

pub fn to_fmi2_boolean(value: bool) -> fmi2Boolean {
    if value { FMI2_TRUE } else { FMI2_FALSE }
}
