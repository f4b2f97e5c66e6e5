use std::ptr;

use anyhow::bail;
use pyo3::ffi;

/// Process-level init and teardown of an embedded interpreter.
///
/// All three methods are only ever called from the runtime lifecycle thread.
pub trait Interpreter: Send + 'static {
    /// Whether the interpreter is already running in this process.
    fn is_initialized(&self) -> bool;

    /// Starts the interpreter and releases the global execution lock so other
    /// threads can take it.
    fn initialize(&mut self) -> anyhow::Result<()>;

    /// Re-acquires the global execution lock and shuts the interpreter down.
    fn finalize(&mut self) -> anyhow::Result<()>;
}

/// The CPython interpreter linked into this library.
pub struct PythonInterpreter {
    saved: *mut ffi::PyThreadState,
}

// SAFETY: the saved thread state is produced and consumed on the lifecycle
// thread only; the struct is merely moved there once.
unsafe impl Send for PythonInterpreter {}

impl PythonInterpreter {
    pub fn new() -> Self {
        Self {
            saved: ptr::null_mut(),
        }
    }
}

impl Default for PythonInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter for PythonInterpreter {
    fn is_initialized(&self) -> bool {
        // SAFETY: Py_IsInitialized may be called at any time.
        unsafe { ffi::Py_IsInitialized() != 0 }
    }

    fn initialize(&mut self) -> anyhow::Result<()> {
        // SAFETY: called once, on the lifecycle thread, while the interpreter
        // is not running. Signal handlers stay with the host.
        unsafe {
            ffi::Py_InitializeEx(0);
            if ffi::Py_IsInitialized() == 0 {
                bail!("Py_InitializeEx returned without an interpreter");
            }
            self.saved = ffi::PyEval_SaveThread();
        }
        tracing::info!("Embedded Python interpreter initialized");
        Ok(())
    }

    fn finalize(&mut self) -> anyhow::Result<()> {
        if self.saved.is_null() {
            bail!("interpreter was not initialized by this library");
        }
        // SAFETY: `saved` came from PyEval_SaveThread on this same thread.
        let rc = unsafe {
            ffi::PyEval_RestoreThread(self.saved);
            self.saved = ptr::null_mut();
            ffi::Py_FinalizeEx()
        };
        if rc != 0 {
            bail!("Py_FinalizeEx could not flush buffered data");
        }
        tracing::info!("Embedded Python interpreter finalized");
        Ok(())
    }
}
