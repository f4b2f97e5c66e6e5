use std::sync::Arc;

use cosim_core::{
    BridgeConfig, BridgeError, ExperimentSetup, Fmi2Status, InstanceConfig, LogRecord,
    ModelInstance, ScalarKind, ValueReference,
};
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyDict, PyList, PyTuple};

use crate::lifecycle::RuntimeHandle;
use crate::resolver;

/// A live Python model instance behind the [`ModelInstance`] interface.
///
/// Every call runs under the global interpreter lock. Exceptions raised by
/// model code become [`BridgeError::Model`]; anything that breaks the calling
/// contract (missing method, wrong result shape) is fatal. Log records the
/// model queued are drained before the lock is released.
pub struct PyModel {
    class: Option<Py<PyAny>>,
    instance: Option<Py<PyAny>>,
    log_queue: Option<Py<PyAny>>,
    pending: Vec<LogRecord>,
    config: InstanceConfig,
    class_name: String,
    sys_path: resolver::SysPathLease,
    // Declared last: Python objects above are released before the runtime.
    runtime: Arc<RuntimeHandle>,
}

impl PyModel {
    /// Resolves the model class from the resource directory and constructs
    /// the first live instance.
    pub fn instantiate(
        runtime: Arc<RuntimeHandle>,
        config: InstanceConfig,
        bridge: &BridgeConfig,
    ) -> Result<Self, BridgeError> {
        let search_paths = bridge.python_paths(&config.resource_location);
        Python::with_gil(|py| {
            let resolved =
                resolver::resolve(py, &config.resource_location, &search_paths, &bridge.resolver)?;
            let mut pending = Vec::new();
            let (instance, log_queue) =
                construct(py, resolved.class.bind(py), &config, &mut pending)?;
            tracing::debug!(
                instance = %config.instance_name,
                module = %resolved.module_name,
                class = %resolved.class_name,
                "Model instance constructed"
            );
            Ok(Self {
                class: Some(resolved.class),
                instance: Some(instance),
                log_queue,
                pending,
                config,
                class_name: resolved.class_name,
                sys_path: resolved.sys_path,
                runtime,
            })
        })
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    pub fn runtime(&self) -> &Arc<RuntimeHandle> {
        &self.runtime
    }

    /// `sys.path` entries this model keeps alive.
    pub fn import_paths(&self) -> &[String] {
        self.sys_path.entries()
    }

    /// Runs `f` against the live instance under the lock, then drains the
    /// model's log queue.
    fn with_instance<T>(
        &mut self,
        f: impl for<'py> FnOnce(Python<'py>, &Bound<'py, PyAny>) -> Result<T, BridgeError>,
    ) -> Result<T, BridgeError> {
        Python::with_gil(|py| {
            let result = match &self.instance {
                Some(instance) => f(py, instance.bind(py)),
                None => Err(BridgeError::fatal("model instance is not available")),
            };
            drain_log_queue(py, self.log_queue.as_ref(), &mut self.pending);
            result
        })
    }

    fn with_class<T>(
        &mut self,
        f: impl for<'py> FnOnce(Python<'py>, &Bound<'py, PyAny>) -> Result<T, BridgeError>,
    ) -> Result<T, BridgeError> {
        Python::with_gil(|py| {
            let result = match &self.class {
                Some(class) => f(py, class.bind(py)),
                None => Err(BridgeError::fatal("model class is not available")),
            };
            drain_log_queue(py, self.log_queue.as_ref(), &mut self.pending);
            result
        })
    }

    fn get_values<T>(
        &mut self,
        kind: ScalarKind,
        refs: &[ValueReference],
        convert: impl for<'py> Fn(&Bound<'py, PyAny>) -> PyResult<T>,
    ) -> Result<Vec<T>, BridgeError> {
        let method = kind.getter();
        self.with_instance(|py, instance| {
            let vrs = PyList::new(py, refs.iter().copied()).map_err(|e| marshal_error(method, e))?;
            let out = invoke(instance, method, arguments(py, method, [vrs])?)?;
            let values = out
                .extract::<Vec<Bound<'_, PyAny>>>()
                .and_then(|items| items.iter().map(&convert).collect::<PyResult<Vec<T>>>())
                .map_err(|e| {
                    BridgeError::fatal(format!("{method} returned values that are not {kind}: {e}"))
                })?;
            if values.len() != refs.len() {
                return Err(BridgeError::fatal(format!(
                    "{method} returned {} values for {} references",
                    values.len(),
                    refs.len()
                )));
            }
            Ok(values)
        })
    }

    fn set_values<T>(
        &mut self,
        kind: ScalarKind,
        refs: &[ValueReference],
        values: &[T],
    ) -> Result<(), BridgeError>
    where
        T: Clone + for<'py> IntoPyObject<'py>,
    {
        let method = kind.setter();
        if refs.len() != values.len() {
            return Err(BridgeError::fatal(format!(
                "{method} called with {} references and {} values",
                refs.len(),
                values.len()
            )));
        }
        self.with_instance(|py, instance| {
            // Both lists are complete before the model sees either.
            let vrs = PyList::new(py, refs.iter().copied()).map_err(|e| marshal_error(method, e))?;
            let vals = PyList::new(py, values.iter().cloned()).map_err(|e| marshal_error(method, e))?;
            invoke(instance, method, arguments(py, method, [vrs, vals])?)?;
            Ok(())
        })
    }
}

impl ModelInstance for PyModel {
    type Snapshot = Py<PyAny>;

    fn setup_experiment(&mut self, setup: ExperimentSetup) -> Result<(), BridgeError> {
        const METHOD: &str = "setup_experiment";
        self.with_instance(|py, instance| {
            let args = arguments(
                py,
                METHOD,
                [Some(setup.start_time), setup.stop_time, setup.tolerance],
            )?;
            invoke(instance, METHOD, args)?;
            Ok(())
        })
    }

    fn enter_initialization_mode(&mut self) -> Result<(), BridgeError> {
        self.with_instance(|py, instance| {
            invoke(instance, "enter_initialization_mode", PyTuple::empty(py))?;
            Ok(())
        })
    }

    fn exit_initialization_mode(&mut self) -> Result<(), BridgeError> {
        self.with_instance(|py, instance| {
            invoke(instance, "exit_initialization_mode", PyTuple::empty(py))?;
            Ok(())
        })
    }

    fn do_step(&mut self, current_time: f64, step_size: f64) -> Result<bool, BridgeError> {
        self.with_instance(|py, instance| {
            let args = arguments(py, "do_step", [current_time, step_size])?;
            let out = invoke(instance, "do_step", args)?;
            out.is_truthy()
                .map_err(|e| BridgeError::fatal(format!("do_step result is not a truth value: {e}")))
        })
    }

    fn terminate(&mut self) -> Result<(), BridgeError> {
        self.with_instance(|py, instance| {
            invoke(instance, "terminate", PyTuple::empty(py))?;
            Ok(())
        })
    }

    fn reset(&mut self) -> Result<(), BridgeError> {
        Python::with_gil(|py| {
            // The old instance and its queue go first; only the class survives.
            drain_log_queue(py, self.log_queue.as_ref(), &mut self.pending);
            self.instance.take();
            self.log_queue.take();

            let class = self
                .class
                .as_ref()
                .ok_or_else(|| BridgeError::fatal("model class is not available"))?
                .bind(py);
            let (instance, log_queue) = construct(py, class, &self.config, &mut self.pending)?;
            self.instance = Some(instance);
            self.log_queue = log_queue;
            tracing::debug!(instance = %self.config.instance_name, "Model instance recreated");
            Ok(())
        })
    }

    fn get_real(&mut self, refs: &[ValueReference]) -> Result<Vec<f64>, BridgeError> {
        self.get_values(ScalarKind::Real, refs, |v| v.extract())
    }

    fn get_integer(&mut self, refs: &[ValueReference]) -> Result<Vec<i32>, BridgeError> {
        self.get_values(ScalarKind::Integer, refs, |v| v.extract())
    }

    fn get_boolean(&mut self, refs: &[ValueReference]) -> Result<Vec<bool>, BridgeError> {
        // Any object with a truth value is accepted, such as 0 and 1.
        self.get_values(ScalarKind::Boolean, refs, |v| v.is_truthy())
    }

    fn get_string(&mut self, refs: &[ValueReference]) -> Result<Vec<String>, BridgeError> {
        self.get_values(ScalarKind::String, refs, |v| v.extract())
    }

    fn set_real(&mut self, refs: &[ValueReference], values: &[f64]) -> Result<(), BridgeError> {
        self.set_values(ScalarKind::Real, refs, values)
    }

    fn set_integer(&mut self, refs: &[ValueReference], values: &[i32]) -> Result<(), BridgeError> {
        self.set_values(ScalarKind::Integer, refs, values)
    }

    fn set_boolean(&mut self, refs: &[ValueReference], values: &[bool]) -> Result<(), BridgeError> {
        self.set_values(ScalarKind::Boolean, refs, values)
    }

    fn set_string(&mut self, refs: &[ValueReference], values: &[String]) -> Result<(), BridgeError> {
        self.set_values(ScalarKind::String, refs, values)
    }

    fn get_state(&mut self) -> Result<Self::Snapshot, BridgeError> {
        self.with_instance(|py, instance| {
            Ok(invoke(instance, "_get_fmu_state", PyTuple::empty(py))?.unbind())
        })
    }

    fn set_state(&mut self, snapshot: &Self::Snapshot) -> Result<(), BridgeError> {
        self.with_instance(|py, instance| {
            let args = arguments(py, "_set_fmu_state", [snapshot.bind(py)])?;
            invoke(instance, "_set_fmu_state", args)?;
            Ok(())
        })
    }

    fn encode_state(&mut self, snapshot: &Self::Snapshot) -> Result<Vec<u8>, BridgeError> {
        self.with_class(|py, class| {
            let args = arguments(py, "_fmu_state_to_bytes", [snapshot.bind(py)])?;
            let out = invoke(class, "_fmu_state_to_bytes", args)?;
            let bytes = out.downcast::<PyBytes>().map_err(|_| {
                BridgeError::fatal("_fmu_state_to_bytes did not return bytes")
            })?;
            Ok(bytes.as_bytes().to_vec())
        })
    }

    fn decode_state(&mut self, bytes: &[u8]) -> Result<Self::Snapshot, BridgeError> {
        self.with_class(|py, class| {
            let buffer = PyBytes::new(py, bytes);
            let args = arguments(py, "_fmu_state_from_bytes", [buffer])?;
            Ok(invoke(class, "_fmu_state_from_bytes", args)?.unbind())
        })
    }

    fn release_state(&mut self, snapshot: Self::Snapshot) {
        Python::with_gil(|_| drop(snapshot));
    }

    fn drain_log(&mut self) -> Vec<LogRecord> {
        std::mem::take(&mut self.pending)
    }
}

impl Drop for PyModel {
    fn drop(&mut self) {
        Python::with_gil(|_| {
            self.instance.take();
            self.log_queue.take();
            self.class.take();
        });
    }
}

/// Calls the model class with its configuration and fetches its log queue.
fn construct(
    py: Python<'_>,
    class: &Bound<'_, PyAny>,
    config: &InstanceConfig,
    pending: &mut Vec<LogRecord>,
) -> Result<(Py<PyAny>, Option<Py<PyAny>>), BridgeError> {
    let construct_error =
        |e: PyErr| BridgeError::fatal(format!("failed to construct model instance: {e}"));

    let kwargs = PyDict::new(py);
    kwargs
        .set_item("instance_name", config.instance_name.as_str())
        .map_err(construct_error)?;
    kwargs
        .set_item("resources", config.resource_location.to_string_lossy().as_ref())
        .map_err(construct_error)?;
    kwargs
        .set_item("visible", config.visible)
        .map_err(construct_error)?;

    let instance = class.call((), Some(&kwargs)).map_err(construct_error)?;

    let log_queue = if instance.hasattr("_get_log_queue").map_err(construct_error)? {
        Some(
            instance
                .call_method0("_get_log_queue")
                .map_err(construct_error)?
                .unbind(),
        )
    } else {
        tracing::debug!(instance = %config.instance_name, "Model has no log queue");
        None
    };
    drain_log_queue(py, log_queue.as_ref(), pending);

    Ok((instance.unbind(), log_queue))
}

/// Looks up `method` and calls it. A missing method is a contract violation;
/// an exception raised inside it is a model error.
fn invoke<'py>(
    target: &Bound<'py, PyAny>,
    method: &str,
    args: Bound<'py, PyTuple>,
) -> Result<Bound<'py, PyAny>, BridgeError> {
    let callable = target
        .getattr(method)
        .map_err(|e| BridgeError::fatal(format!("model does not provide {method}: {e}")))?;
    callable
        .call1(args)
        .map_err(|e| BridgeError::model(format!("{method} raised {e}")))
}

fn arguments<'py, T, const N: usize>(
    py: Python<'py>,
    method: &str,
    items: [T; N],
) -> Result<Bound<'py, PyTuple>, BridgeError>
where
    T: IntoPyObject<'py>,
{
    PyTuple::new(py, items).map_err(|e| marshal_error(method, e))
}

fn marshal_error(method: &str, err: PyErr) -> BridgeError {
    BridgeError::fatal(format!("failed to marshal arguments for {method}: {err}"))
}

/// Moves every queued record into `pending` and clears the runtime queue.
fn drain_log_queue(py: Python<'_>, queue: Option<&Py<PyAny>>, pending: &mut Vec<LogRecord>) {
    let Some(queue) = queue else {
        return;
    };
    let queue = queue.bind(py);
    let Ok(list) = queue.downcast::<PyList>() else {
        tracing::warn!("Model log queue is not a list; records dropped");
        return;
    };
    if list.is_empty() {
        return;
    }
    for item in list.iter() {
        match to_log_record(&item) {
            Ok(record) => pending.push(record),
            Err(e) => pending.push(LogRecord::new(
                Fmi2Status::Warning,
                format!("unreadable log record: {e}"),
            )),
        }
    }
    if let Err(e) = list.call_method0("clear") {
        tracing::warn!(error = %e, "Failed to clear model log queue");
    }
}

fn to_log_record(item: &Bound<'_, PyAny>) -> PyResult<LogRecord> {
    let status = item.getattr("status")?;
    let raw: i64 = match status.extract() {
        Ok(raw) => raw,
        Err(_) => status.getattr("value")?.extract()?,
    };
    let category: Option<String> = item.getattr("category")?.extract()?;
    let message = item.getattr("msg")?.str()?.to_string();
    let debug = match item.getattr("debug") {
        Ok(flag) => flag.is_truthy()?,
        Err(_) => false,
    };
    Ok(LogRecord {
        status: Fmi2Status::from_raw(raw).unwrap_or(Fmi2Status::Warning),
        category,
        message,
        debug,
    })
}
