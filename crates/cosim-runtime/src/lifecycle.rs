use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use cosim_core::config::RuntimeConfig;
use pyo3::Python;

use crate::error::RuntimeError;
use crate::facade;
use crate::interpreter::{Interpreter, PythonInterpreter};

const LIFECYCLE_THREAD: &str = "cosim-runtime-lifecycle";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Uninitialized,
    Initializing,
    Ready,
    TeardownRequested,
    Finalized,
}

/// Who is responsible for finalizing the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// This library started the interpreter and will finalize it.
    Owned,
    /// The interpreter was running before we attached. Never finalized here.
    External,
}

/// How a teardown waits for the lifecycle thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// Block until the interpreter is finalized.
    Join,
    /// Only signal. Used from library-unload hooks where joining can deadlock.
    Detach,
}

struct Shared {
    phase: LifecyclePhase,
    ownership: Option<Ownership>,
    error: Option<String>,
}

struct Signal {
    state: Mutex<Shared>,
    changed: Condvar,
}

impl Signal {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: LifecyclePhase) {
        self.lock().phase = phase;
        self.changed.notify_all();
    }

    fn wait_while<'a>(
        &'a self,
        mut guard: MutexGuard<'a, Shared>,
        pending: impl Fn(LifecyclePhase) -> bool,
    ) -> MutexGuard<'a, Shared> {
        while pending(guard.phase) {
            guard = self
                .changed
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
        guard
    }
}

/// Shared reference to the embedded runtime.
///
/// Init and teardown both run on one dedicated thread owned by the handle, so
/// components may be created and destroyed from any host thread. Dropping the
/// last reference requests teardown.
pub struct RuntimeHandle {
    signal: Arc<Signal>,
    worker: Mutex<Option<JoinHandle<()>>>,
    detached: AtomicBool,
}

impl RuntimeHandle {
    /// Spawns the lifecycle thread and blocks until the interpreter is ready.
    pub fn start(interpreter: Box<dyn Interpreter>) -> Result<Arc<Self>, RuntimeError> {
        let signal = Arc::new(Signal {
            state: Mutex::new(Shared {
                phase: LifecyclePhase::Uninitialized,
                ownership: None,
                error: None,
            }),
            changed: Condvar::new(),
        });

        let worker_signal = Arc::clone(&signal);
        let worker = thread::Builder::new()
            .name(LIFECYCLE_THREAD.into())
            .spawn(move || run_lifecycle(interpreter, &worker_signal))?;

        let failure = {
            let guard = signal.lock();
            let mut guard = signal.wait_while(guard, |phase| {
                matches!(
                    phase,
                    LifecyclePhase::Uninitialized | LifecyclePhase::Initializing
                )
            });
            guard.error.take()
        };

        if let Some(message) = failure {
            if worker.join().is_err() {
                tracing::warn!("Runtime lifecycle thread panicked");
            }
            return Err(RuntimeError::InitializationFailed(message));
        }

        Ok(Arc::new(Self {
            signal,
            worker: Mutex::new(Some(worker)),
            detached: AtomicBool::new(false),
        }))
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.signal.lock().phase
    }

    pub fn ownership(&self) -> Option<Ownership> {
        self.signal.lock().ownership
    }

    /// Asks the lifecycle thread to finalize. Idempotent; only signals.
    pub fn request_teardown(&self) {
        let mut guard = self.signal.lock();
        if guard.phase != LifecyclePhase::Ready {
            return;
        }
        guard.phase = match guard.ownership {
            Some(Ownership::Owned) => LifecyclePhase::TeardownRequested,
            _ => LifecyclePhase::Finalized,
        };
        drop(guard);
        self.signal.changed.notify_all();
        tracing::debug!("Runtime teardown requested");
    }

    /// Makes the eventual drop signal teardown without waiting for it.
    pub fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
    }
}

impl Drop for RuntimeHandle {
    fn drop(&mut self) {
        self.request_teardown();
        if self.detached.load(Ordering::SeqCst) {
            return;
        }
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker
            && worker.join().is_err()
        {
            tracing::warn!("Runtime lifecycle thread panicked during teardown");
        }
    }
}

fn run_lifecycle(mut interpreter: Box<dyn Interpreter>, signal: &Signal) {
    signal.set_phase(LifecyclePhase::Initializing);

    if interpreter.is_initialized() {
        let mut guard = signal.lock();
        guard.ownership = Some(Ownership::External);
        guard.phase = LifecyclePhase::Ready;
        drop(guard);
        signal.changed.notify_all();
        tracing::info!("Attached to an externally owned interpreter; teardown is skipped");
        return;
    }

    if let Err(e) = interpreter.initialize() {
        let mut guard = signal.lock();
        guard.error = Some(format!("{e:#}"));
        guard.phase = LifecyclePhase::Finalized;
        drop(guard);
        signal.changed.notify_all();
        return;
    }

    {
        let mut guard = signal.lock();
        guard.ownership = Some(Ownership::Owned);
        guard.phase = LifecyclePhase::Ready;
    }
    signal.changed.notify_all();

    let guard = signal.lock();
    drop(signal.wait_while(guard, |phase| phase != LifecyclePhase::TeardownRequested));

    if let Err(e) = interpreter.finalize() {
        tracing::warn!(error = %e, "Interpreter finalization reported an error");
    }
    signal.set_phase(LifecyclePhase::Finalized);
}

struct ProcessSlot {
    handle: Option<Arc<RuntimeHandle>>,
    /// Set once a runtime has started; it outlives the handle so the phase
    /// stays observable after teardown.
    signal: Option<Arc<Signal>>,
    facade_installed: bool,
}

impl ProcessSlot {
    const fn new() -> Self {
        Self {
            handle: None,
            signal: None,
            facade_installed: false,
        }
    }

    fn acquire(
        &mut self,
        install_facade: bool,
        start: impl FnOnce() -> Result<Arc<RuntimeHandle>, RuntimeError>,
        install: impl FnOnce() -> Result<(), RuntimeError>,
    ) -> Result<Arc<RuntimeHandle>, RuntimeError> {
        let handle = match &self.handle {
            Some(handle) => Arc::clone(handle),
            None if self.signal.is_some() => return Err(RuntimeError::AlreadyFinalized),
            None => {
                let handle = start()?;
                self.signal = Some(Arc::clone(&handle.signal));
                self.handle = Some(Arc::clone(&handle));
                handle
            }
        };

        // The slot already holds the runtime, so a failed install leaves it
        // running and the next acquire tries again.
        if install_facade && !self.facade_installed {
            install()?;
            self.facade_installed = true;
        }
        Ok(handle)
    }

    fn release(&mut self, mode: Teardown) {
        if let Some(handle) = self.handle.take() {
            if mode == Teardown::Detach {
                handle.detach();
            }
            tracing::debug!(?mode, "Releasing process runtime reference");
            drop(handle);
        }
    }

    fn phase(&self) -> LifecyclePhase {
        self.signal
            .as_ref()
            .map_or(LifecyclePhase::Uninitialized, |signal| signal.lock().phase)
    }
}

static PROCESS: Mutex<ProcessSlot> = Mutex::new(ProcessSlot::new());

fn process_slot() -> MutexGuard<'static, ProcessSlot> {
    PROCESS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared reference to the process-wide Python runtime, starting it on first
/// use.
///
/// The process slot keeps its own reference, so the runtime outlives its
/// components until [`finalize_process_runtime`] runs. Once finalized it is
/// never restarted.
pub fn acquire(config: &RuntimeConfig) -> Result<Arc<RuntimeHandle>, RuntimeError> {
    process_slot().acquire(
        config.install_facade,
        || RuntimeHandle::start(Box::new(PythonInterpreter::new())),
        || {
            Python::with_gil(facade::install)
                .map(drop)
                .map_err(|e| RuntimeError::Python(e.to_string()))
        },
    )
}

/// Drops the process slot's runtime reference.
///
/// Teardown happens on the lifecycle thread once the last component holding a
/// reference is freed. Safe to call repeatedly.
pub fn finalize_process_runtime(mode: Teardown) {
    process_slot().release(mode);
}

/// Phase of the process-wide runtime; `Uninitialized` until the first
/// successful [`acquire`].
pub fn process_phase() -> LifecyclePhase {
    process_slot().phase()
}
