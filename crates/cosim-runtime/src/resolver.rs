use std::collections::BTreeMap;
use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use cosim_core::config::ResolverConfig;
use pyo3::exceptions::PySyntaxError;
use pyo3::prelude::*;
use pyo3::types::{PyList, PyTuple, PyType};

use crate::error::RuntimeError;

/// Where the model's source lives inside a resource directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSource {
    pub module_name: String,
    pub path: PathBuf,
}

/// A top-level type found in the model module, with the `__name__` of every
/// entry in its method resolution order. `ancestors[0]` is the type itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassCandidate {
    pub name: String,
    pub ancestors: Vec<String>,
}

impl ClassCandidate {
    /// How far below the marker this type sits, or `None` if it does not
    /// derive from the marker. The marker type itself does not qualify.
    pub fn marker_depth(&self, marker: &str) -> Option<usize> {
        self.ancestors
            .iter()
            .rposition(|a| a == marker)
            .filter(|&depth| depth > 0)
    }
}

/// Picks the most-derived candidate deriving from `marker`. Ties go to the
/// candidate defined first.
pub fn select_model_class<'a>(
    candidates: &'a [ClassCandidate],
    marker: &str,
) -> Option<&'a ClassCandidate> {
    let mut best: Option<(&ClassCandidate, usize)> = None;
    for candidate in candidates {
        let Some(depth) = candidate.marker_depth(marker) else {
            continue;
        };
        if best.is_none_or(|(_, d)| depth > d) {
            best = Some((candidate, depth));
        }
    }
    best.map(|(c, _)| c)
}

/// Reads the module file and checks that the named source exists.
pub fn locate(resources: &Path, config: &ResolverConfig) -> Result<ModelSource, RuntimeError> {
    let module_file = resources.join(&config.module_file);
    if !module_file.is_file() {
        return Err(RuntimeError::SourceNotFound(module_file));
    }
    let content = std::fs::read_to_string(&module_file)?;
    let module_name = content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| RuntimeError::EmptyModuleFile(module_file.clone()))?
        .to_string();

    let path = resources.join(format!("{module_name}.py"));
    if !path.is_file() {
        return Err(RuntimeError::SourceNotFound(path));
    }
    Ok(ModelSource { module_name, path })
}

/// The model class chosen for a resource directory.
pub struct ResolvedClass {
    pub module_name: String,
    pub class_name: String,
    pub class: Py<PyAny>,
    pub sys_path: SysPathLease,
}

/// Loads the model source and resolves its implementing class.
///
/// `search_paths` are prepended to `sys.path` along with the resource
/// directory so the model can import sibling modules.
pub fn resolve(
    py: Python<'_>,
    resources: &Path,
    search_paths: &[PathBuf],
    config: &ResolverConfig,
) -> Result<ResolvedClass, RuntimeError> {
    let source = locate(resources, config)?;

    let mut import_paths = vec![resources.to_path_buf()];
    import_paths.extend(search_paths.iter().cloned());
    let sys_path = SysPathLease::acquire(py, &import_paths)?;

    let module = load_module(py, &source)?;
    let candidates =
        collect_candidates(&module).map_err(|e| RuntimeError::Python(e.to_string()))?;

    let chosen = select_model_class(&candidates, &config.marker_class).ok_or_else(|| {
        RuntimeError::NoModelClass {
            marker: config.marker_class.clone(),
            module: source.module_name.clone(),
        }
    })?;

    let class = module
        .getattr(chosen.name.as_str())
        .map_err(|e| RuntimeError::Python(e.to_string()))?;

    tracing::info!(
        module = %source.module_name,
        class = %chosen.name,
        "Resolved model class"
    );

    Ok(ResolvedClass {
        module_name: source.module_name,
        class_name: chosen.name.clone(),
        class: class.unbind(),
        sys_path,
    })
}

/// Number of live leases per `sys.path` entry this crate inserted.
static SYS_PATH_USERS: Mutex<BTreeMap<String, usize>> = Mutex::new(BTreeMap::new());

/// `sys.path` entries held on behalf of one model. The last lease on an
/// entry removes it again. Entries that were present before any lease are
/// never touched.
#[derive(Debug, Default)]
pub struct SysPathLease {
    entries: Vec<String>,
}

impl SysPathLease {
    /// Prepends `paths` to `sys.path`, keeping their order.
    pub fn acquire(py: Python<'_>, paths: &[PathBuf]) -> Result<Self, RuntimeError> {
        let python_error = |e: PyErr| RuntimeError::Python(e.to_string());
        let sys_path = sys_path(py).map_err(python_error)?;
        let mut lease = Self::default();
        // The map is unlocked before an early return drops the lease.
        let outcome = {
            let mut users = SYS_PATH_USERS.lock().unwrap_or_else(PoisonError::into_inner);
            // Reverse so the first entry ends up first.
            paths.iter().rev().try_for_each(|path| -> PyResult<()> {
                let entry = path.to_string_lossy().into_owned();
                if lease.entries.contains(&entry) {
                    return Ok(());
                }
                let present = sys_path.contains(entry.as_str())?;
                match users.get_mut(&entry) {
                    Some(count) => *count += 1,
                    None if present => return Ok(()),
                    None => {
                        users.insert(entry.clone(), 1);
                    }
                }
                lease.entries.push(entry.clone());
                if !present {
                    sys_path.insert(0, entry.as_str())?;
                }
                Ok(())
            })
        };
        outcome.map_err(python_error)?;
        Ok(lease)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    fn release(&mut self, py: Python<'_>) -> PyResult<()> {
        let sys_path = sys_path(py)?;
        let entries = std::mem::take(&mut self.entries);
        let mut users = SYS_PATH_USERS.lock().unwrap_or_else(PoisonError::into_inner);
        for entry in entries {
            let Some(count) = users.get_mut(&entry) else {
                continue;
            };
            *count -= 1;
            if *count == 0 {
                users.remove(&entry);
                if sys_path.contains(entry.as_str())? {
                    sys_path.call_method1("remove", (entry.as_str(),))?;
                }
            }
        }
        Ok(())
    }
}

impl Drop for SysPathLease {
    fn drop(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        if let Err(e) = Python::with_gil(|py| self.release(py)) {
            tracing::warn!(error = %e, "Failed to remove model entries from sys.path");
        }
    }
}

fn sys_path(py: Python<'_>) -> PyResult<Bound<'_, PyList>> {
    Ok(py.import("sys")?.getattr("path")?.downcast_into::<PyList>()?)
}

fn load_module<'py>(py: Python<'py>, source: &ModelSource) -> Result<Bound<'py, PyModule>, RuntimeError> {
    let compile_error = |message: String| RuntimeError::CompilationFailed {
        module: source.module_name.clone(),
        message,
    };

    let code = std::fs::read_to_string(&source.path)?;
    let code = CString::new(code).map_err(|e| compile_error(e.to_string()))?;
    let file_name = CString::new(source.path.to_string_lossy().into_owned())
        .map_err(|e| compile_error(e.to_string()))?;
    let module_name =
        CString::new(source.module_name.as_str()).map_err(|e| compile_error(e.to_string()))?;

    PyModule::from_code(py, &code, &file_name, &module_name).map_err(|err| {
        let message = err.to_string();
        if err.is_instance_of::<PySyntaxError>(py) {
            compile_error(message)
        } else {
            RuntimeError::ModuleExecutionFailed {
                module: source.module_name.clone(),
                message,
            }
        }
    })
}

fn collect_candidates(module: &Bound<'_, PyModule>) -> PyResult<Vec<ClassCandidate>> {
    let mut candidates = Vec::new();
    for (key, value) in module.dict().iter() {
        let Ok(ty) = value.downcast::<PyType>() else {
            continue;
        };
        let mro = ty.getattr("__mro__")?.downcast_into::<PyTuple>()?;
        let ancestors = mro
            .iter()
            .map(|base| base.getattr("__name__")?.extract::<String>())
            .collect::<PyResult<Vec<_>>>()?;
        candidates.push(ClassCandidate {
            name: key.extract()?,
            ancestors,
        });
    }
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, ancestors: &[&str]) -> ClassCandidate {
        ClassCandidate {
            name: name.into(),
            ancestors: ancestors.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn most_derived_marker_match_wins() {
        let candidates = vec![
            candidate("Fmi2Slave", &["Fmi2Slave", "object"]),
            candidate("Base", &["Base", "Fmi2Slave", "object"]),
            candidate("Model", &["Model", "Base", "Fmi2Slave", "object"]),
            candidate("Real", &["Real", "ScalarVariable", "object"]),
        ];
        let chosen = select_model_class(&candidates, "Fmi2Slave").unwrap();
        assert_eq!(chosen.name, "Model");
    }

    #[test]
    fn marker_itself_is_not_a_model() {
        let candidates = vec![candidate("Fmi2Slave", &["Fmi2Slave", "ABC", "object"])];
        assert!(select_model_class(&candidates, "Fmi2Slave").is_none());
    }

    #[test]
    fn ties_go_to_first_defined() {
        let candidates = vec![
            candidate("First", &["First", "Fmi2Slave", "object"]),
            candidate("Second", &["Second", "Fmi2Slave", "object"]),
        ];
        assert_eq!(select_model_class(&candidates, "Fmi2Slave").unwrap().name, "First");
    }

    #[test]
    fn no_marker_means_no_model() {
        let candidates = vec![candidate("Helper", &["Helper", "object"])];
        assert!(select_model_class(&candidates, "Fmi2Slave").is_none());
    }

    #[test]
    fn locate_reads_first_non_empty_line() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("slavemodule.txt"), "\n  model  \nignored\n").unwrap();
        std::fs::write(dir.path().join("model.py"), "").unwrap();

        let source = locate(dir.path(), &ResolverConfig::default()).unwrap();
        assert_eq!(source.module_name, "model");
        assert_eq!(source.path, dir.path().join("model.py"));
    }

    #[test]
    fn locate_fails_without_source() {
        let dir = tempfile::tempdir().unwrap();
        let err = locate(dir.path(), &ResolverConfig::default()).unwrap_err();
        assert!(matches!(err, RuntimeError::SourceNotFound(_)));

        std::fs::write(dir.path().join("slavemodule.txt"), "missing\n").unwrap();
        let err = locate(dir.path(), &ResolverConfig::default()).unwrap_err();
        assert!(matches!(err, RuntimeError::SourceNotFound(p) if p.ends_with("missing.py")));

        std::fs::write(dir.path().join("slavemodule.txt"), "  \n").unwrap();
        let err = locate(dir.path(), &ResolverConfig::default()).unwrap_err();
        assert!(matches!(err, RuntimeError::EmptyModuleFile(_)));
    }
}
