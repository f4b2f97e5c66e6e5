//! Bundled fallback for the `pythonfmu` package.

use std::ffi::CString;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

/// Module name model sources import their base class from.
pub const FACADE_MODULE: &str = "pythonfmu";

const FACADE_SOURCE: &str = include_str!("../python/pythonfmu_facade.py");

/// Registers the facade as `pythonfmu` unless the real package imports.
///
/// Returns whether the facade was installed.
pub fn install(py: Python<'_>) -> PyResult<bool> {
    if py.import(FACADE_MODULE).is_ok() {
        tracing::debug!(module = FACADE_MODULE, "Using installed package");
        return Ok(false);
    }
    load(py, FACADE_MODULE)?;
    tracing::info!(module = FACADE_MODULE, "Installed bundled facade module");
    Ok(true)
}

/// Executes the facade source as a module named `name` and registers it in
/// `sys.modules`.
pub fn load<'py>(py: Python<'py>, name: &str) -> PyResult<Bound<'py, PyModule>> {
    let code = CString::new(FACADE_SOURCE).map_err(|e| PyValueError::new_err(e.to_string()))?;
    let file_name = CString::new(format!("<{name}>")).map_err(|e| PyValueError::new_err(e.to_string()))?;
    let module_name = CString::new(name).map_err(|e| PyValueError::new_err(e.to_string()))?;
    PyModule::from_code(py, &code, &file_name, &module_name)
}
