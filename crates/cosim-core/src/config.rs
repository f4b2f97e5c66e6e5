use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// Name of the optional configuration file inside the resource directory.
pub const CONFIG_FILE: &str = "cosim.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResolverConfig {
    /// File in the resource directory whose first line names the model module.
    #[serde(default = "default_module_file")]
    pub module_file: String,
    /// Name of the marker base type a model class must derive from.
    #[serde(default = "default_marker_class")]
    pub marker_class: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            module_file: default_module_file(),
            marker_class: default_marker_class(),
        }
    }
}

fn default_module_file() -> String {
    "slavemodule.txt".into()
}
fn default_marker_class() -> String {
    "Fmi2Slave".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuntimeConfig {
    /// Register the bundled `pythonfmu` module when the real one is missing.
    #[serde(default = "default_install_facade")]
    pub install_facade: bool,
    /// Extra import paths, relative to the resource directory unless absolute.
    #[serde(default)]
    pub python_paths: Vec<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            install_facade: default_install_facade(),
            python_paths: Vec::new(),
        }
    }
}

fn default_install_facade() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Tracing filter used when `COSIM_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            format: LogFormat::default(),
        }
    }
}

/// Output format of the diagnostic log written to stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_filter() -> String {
    "warn".into()
}

impl BridgeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reads `cosim.toml` from the resource directory, or returns defaults
    /// when the file does not exist.
    pub fn load_or_default(resources: &Path) -> Result<Self, ConfigError> {
        let path = resources.join(CONFIG_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        tracing::debug!(path = %path.display(), "Loading bridge configuration");
        Self::from_file(&path)
    }

    /// Import paths resolved against the resource directory.
    pub fn python_paths(&self, resources: &Path) -> Vec<PathBuf> {
        self.runtime
            .python_paths
            .iter()
            .map(|p| {
                if p.is_absolute() {
                    p.clone()
                } else {
                    resources.join(p)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = BridgeConfig::from_toml_str("").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.resolver.module_file, "slavemodule.txt");
        assert_eq!(config.resolver.marker_class, "Fmi2Slave");
        assert!(config.runtime.install_facade);
        assert_eq!(config.logging.filter, "warn");
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn parses_full_config() {
        let toml_str = r#"
[resolver]
module_file = "model.txt"
marker_class = "Slave"

[runtime]
install_facade = false
python_paths = ["lib", "/opt/shared"]

[logging]
filter = "cosim=debug"
format = "json"
"#;
        let config = BridgeConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.resolver.module_file, "model.txt");
        assert_eq!(config.resolver.marker_class, "Slave");
        assert!(!config.runtime.install_facade);
        assert_eq!(config.logging.filter, "cosim=debug");
        assert_eq!(config.logging.format, LogFormat::Json);

        let paths = config.python_paths(Path::new("/res"));
        assert_eq!(paths[0], PathBuf::from("/res/lib"));
        assert_eq!(paths[1], PathBuf::from("/opt/shared"));
    }

    #[test]
    fn malformed_config_is_rejected() {
        let err = BridgeConfig::from_toml_str("[resolver\nmodule_file = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BridgeConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config, BridgeConfig::default());

        std::fs::write(dir.path().join(CONFIG_FILE), "[logging]\nfilter = \"info\"\n").unwrap();
        let config = BridgeConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config.logging.filter, "info");
    }
}
