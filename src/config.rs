use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::store::STATE_KEY;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Which store backs the rotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Remote,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Local => write!(f, "local"),
            BackendKind::Remote => write!(f, "remote"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(BackendKind::Local),
            "remote" => Ok(BackendKind::Remote),
            _ => Err(format!(
                "Invalid backend '{}'. Valid options: local, remote",
                s
            )),
        }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub backend: ConfigValue<BackendKind>,
    /// Where the local store saves its state
    pub state_path: ConfigValue<PathBuf>,
    /// SQLite database for the remote store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<ConfigValue<PathBuf>>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    backend: Option<BackendKind>,
    state_path: Option<PathBuf>,
    database_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::load_with_env(config_path, |key| std::env::var(key).ok())
    }

    fn load_with_env<F>(config_path: Option<PathBuf>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut backend = ConfigValue::new(BackendKind::default(), ConfigSource::Default);
        let mut state_path = ConfigValue::new(Self::default_state_path(), ConfigSource::Default);
        let mut database_path = None;
        let mut config_file = None;

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            if let Some(kind) = file_config.backend {
                backend = ConfigValue::new(kind, ConfigSource::File);
            }
            if let Some(state) = file_config.state_path {
                state_path = ConfigValue::new(resolve_relative(&path, state), ConfigSource::File);
            }
            if let Some(db_path) = file_config.database_path {
                database_path = Some(ConfigValue::new(
                    resolve_relative(&path, db_path),
                    ConfigSource::File,
                ));
            }
            config_file = Some(path);
        }

        if let Some(kind) = env("FOODROTA_BACKEND") {
            let kind = kind.parse().map_err(ConfigError::InvalidValue)?;
            backend = ConfigValue::new(kind, ConfigSource::Environment);
        }
        if let Some(state) = env("FOODROTA_STATE_PATH") {
            state_path = ConfigValue::new(PathBuf::from(state), ConfigSource::Environment);
        }
        if let Some(db_path) = env("FOODROTA_DATABASE_PATH") {
            database_path = Some(ConfigValue::new(
                PathBuf::from(db_path),
                ConfigSource::Environment,
            ));
        }

        Ok(Self {
            backend,
            state_path,
            database_path,
            config_file,
        })
    }

    /// Default config directory (platform-specific), e.g. ~/.config/foodrota/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("foodrota")
    }

    /// Default data directory (platform-specific), e.g. ~/.local/share/foodrota/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("foodrota")
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }

    pub fn default_state_path() -> PathBuf {
        Self::default_data_dir().join(format!("{}.json", STATE_KEY))
    }
}

/// Resolves a path from the config file against the file's directory.
fn resolve_relative(config_file: &Path, value: PathBuf) -> PathBuf {
    if value.is_relative() {
        config_file
            .parent()
            .map(|dir| dir.join(&value))
            .unwrap_or(value)
    } else {
        value
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::tempdir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_config(dir: &Path, lines: &[&str]) -> PathBuf {
        let config_path = dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        config_path
    }

    #[test]
    fn test_defaults_without_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load_with_env(Some(config_path), no_env).unwrap();
        assert_eq!(config.backend.value, BackendKind::Local);
        assert_eq!(config.backend.source, ConfigSource::Default);
        assert!(config
            .state_path
            .value
            .ends_with("foodrota/dog-food-tracker-state.json"));
        assert!(config.database_path.is_none());
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_load_from_file_resolves_relative_paths() {
        let temp_dir = tempdir().unwrap();
        let config_path = write_config(
            temp_dir.path(),
            &[
                "backend: remote",
                "database_path: data/rota.db",
                "state_path: /abs/state.json",
            ],
        );

        let config = Config::load_with_env(Some(config_path.clone()), no_env).unwrap();
        assert_eq!(config.backend.value, BackendKind::Remote);
        assert_eq!(config.backend.source, ConfigSource::File);

        let db = config.database_path.unwrap();
        assert_eq!(db.value, temp_dir.path().join("data/rota.db"));
        assert_eq!(db.source, ConfigSource::File);
        assert_eq!(config.state_path.value, PathBuf::from("/abs/state.json"));
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_env_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = write_config(temp_dir.path(), &["backend: local"]);
        let env: HashMap<&str, &str> = HashMap::from([
            ("FOODROTA_BACKEND", "Remote"),
            ("FOODROTA_DATABASE_PATH", "/tmp/env.db"),
        ]);

        let config = Config::load_with_env(Some(config_path), |key| {
            env.get(key).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.backend.value, BackendKind::Remote);
        assert_eq!(config.backend.source, ConfigSource::Environment);
        let db = config.database_path.unwrap();
        assert_eq!(db.value, PathBuf::from("/tmp/env.db"));
        assert_eq!(db.source, ConfigSource::Environment);
    }

    #[test]
    fn test_invalid_backend_env() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let err = Config::load_with_env(Some(config_path), |key| {
            (key == "FOODROTA_BACKEND").then(|| "cloud".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("Invalid backend 'cloud'"));
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = write_config(temp_dir.path(), &["backend: [nope"]);

        let err = Config::load_with_env(Some(config_path), no_env).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_backend_kind_from_str() {
        assert_eq!("LOCAL".parse::<BackendKind>().unwrap(), BackendKind::Local);
        assert_eq!(BackendKind::Remote.to_string(), "remote");
        assert!("".parse::<BackendKind>().is_err());
    }
}
