use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::TaskRunnerError;

const MAX_CONFIG_FILE_SIZE: u64 = 64 * 1024; // 64 KiB

pub const DEFAULT_CONFIG_PATH: &str = "taskrunner.toml";
pub const CONFIG_PATH_ENV: &str = "TASKRUNNER_CONFIG";
pub const STORAGE_ENV: &str = "TASKRUNNER_STORAGE";
pub const DATA_DIR_ENV: &str = "TASKRUNNER_DATA_DIR";
pub const TIMEOUT_ENV: &str = "TASKRUNNER_TIMEOUT_SECS";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    File,
}

impl FromStr for StorageBackend {
    type Err = TaskRunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            other => Err(TaskRunnerError::ConfigValidation(format!(
                "unknown storage backend '{other}' (expected 'memory' or 'file')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorConfig {
    /// Unset means commands may run forever.
    pub timeout_secs: Option<u64>,
}

impl ExecutorConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl FromStr for Config {
    type Err = TaskRunnerError;

    /// Parse a config from a TOML string. Does not validate.
    fn from_str(content: &str) -> Result<Self, TaskRunnerError> {
        toml::from_str(content).map_err(|e| TaskRunnerError::ConfigLoad(e.to_string()))
    }
}

impl Config {
    /// Load a config from a TOML file. Checks file size before reading.
    pub fn load(path: &Path) -> Result<Self, TaskRunnerError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            TaskRunnerError::ConfigLoad(format!("cannot read {}: {e}", path.display()))
        })?;

        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(TaskRunnerError::ConfigLoad(format!(
                "config file exceeds {MAX_CONFIG_FILE_SIZE} byte limit"
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            TaskRunnerError::ConfigLoad(format!("cannot read {}: {e}", path.display()))
        })?;

        content.parse()
    }

    /// Resolve the config the binary runs with: the file named by
    /// `TASKRUNNER_CONFIG` (must exist), else `taskrunner.toml` if present,
    /// else defaults. Environment overrides are applied last.
    pub fn from_env() -> Result<Self, TaskRunnerError> {
        let mut config = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::load(Path::new(&path))?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::load(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TASKRUNNER_*` overrides read through `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), TaskRunnerError> {
        if let Some(backend) = lookup(STORAGE_ENV) {
            self.storage.backend = backend.parse()?;
        }
        if let Some(dir) = lookup(DATA_DIR_ENV) {
            self.storage.path = Some(PathBuf::from(dir));
        }
        if let Some(secs) = lookup(TIMEOUT_ENV) {
            let secs = secs.trim().parse().map_err(|e| {
                TaskRunnerError::ConfigValidation(format!("{TIMEOUT_ENV}='{secs}': {e}"))
            })?;
            self.executor.timeout_secs = Some(secs);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), TaskRunnerError> {
        if self.executor.timeout_secs == Some(0) {
            return Err(TaskRunnerError::ConfigValidation(
                "executor.timeout_secs must be greater than zero".to_owned(),
            ));
        }
        if self.storage.backend == StorageBackend::File && self.storage.path.is_none() {
            return Err(TaskRunnerError::ConfigValidation(
                "storage.path is required for the file backend".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const FULL_CONFIG: &str = r#"
[storage]
backend = "file"
path = "/var/lib/taskrunner"

[executor]
timeout_secs = 30
"#;

    #[test]
    fn parse_full_config() {
        let config: Config = FULL_CONFIG.parse().expect("full config should parse");
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.storage.path, Some(PathBuf::from("/var/lib/taskrunner")));
        assert_eq!(config.executor.timeout(), Some(Duration::from_secs(30)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = "".parse().expect("empty config should parse");
        assert_eq!(config, Config::default());
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.executor.timeout(), None);
    }

    #[test]
    fn unknown_field_rejected() {
        let err = "[executor]\nretries = 3\n".parse::<Config>().unwrap_err();
        assert!(matches!(err, TaskRunnerError::ConfigLoad(_)));
    }

    #[test]
    fn unknown_backend_rejected() {
        let err = "[storage]\nbackend = \"mongo\"\n".parse::<Config>().unwrap_err();
        assert!(matches!(err, TaskRunnerError::ConfigLoad(_)));
    }

    #[test]
    fn zero_timeout_invalid() {
        let config: Config = "[executor]\ntimeout_secs = 0\n".parse().unwrap();
        assert!(matches!(
            config.validate(),
            Err(TaskRunnerError::ConfigValidation(_))
        ));
    }

    #[test]
    fn file_backend_requires_path() {
        let config: Config = "[storage]\nbackend = \"file\"\n".parse().unwrap();
        assert!(matches!(
            config.validate(),
            Err(TaskRunnerError::ConfigValidation(_))
        ));
    }

    #[test]
    fn env_overrides_applied() {
        let env: HashMap<&str, &str> = [
            (STORAGE_ENV, "FILE"),
            (DATA_DIR_ENV, "/tmp/tasks"),
            (TIMEOUT_ENV, " 5 "),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.storage.path, Some(PathBuf::from("/tmp/tasks")));
        assert_eq!(config.executor.timeout_secs, Some(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bad_timeout_override_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|key| (key == TIMEOUT_ENV).then(|| "soon".to_owned()))
            .unwrap_err();
        assert!(matches!(err, TaskRunnerError::ConfigValidation(_)));
    }

    #[test]
    fn load_missing_file_fails() {
        let err = Config::load(Path::new("/nonexistent/taskrunner.toml")).unwrap_err();
        assert!(matches!(err, TaskRunnerError::ConfigLoad(_)));
    }

    #[test]
    fn load_oversized_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.toml");
        std::fs::write(&path, "#".repeat(MAX_CONFIG_FILE_SIZE as usize + 1)).unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, TaskRunnerError::ConfigLoad(_)));
    }
}
