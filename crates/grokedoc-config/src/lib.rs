use grokedoc_engine::editing::{EngineOptions, Table};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid setting in {config_path}: {message}")]
    InvalidSetting {
        config_path: PathBuf,
        message: String,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineOptions,
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        config
            .validate()
            .map_err(|message| ConfigError::InvalidSetting {
                config_path: config_path.to_path_buf(),
                message,
            })?;

        Ok(Some(config))
    }

    /// Load the user's config, falling back to defaults when there is none.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        Ok(Self::load_from_path(&config_path)?.unwrap_or_default())
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/grokedoc");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    fn validate(&self) -> Result<(), String> {
        let sentinel = self.engine.sentinel;
        if sentinel == Table::COLUMN_SEPARATOR || sentinel == Table::ROW_SEPARATOR {
            return Err(format!(
                "engine.sentinel {sentinel:?} collides with a table separator"
            ));
        }
        if self.engine.history_limit == 0 {
            return Err("engine.history_limit must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grokedoc_engine::editing::EditorEngine;
    use tempfile::TempDir;

    fn write_config(content: &str) -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, content).unwrap();
        (temp_dir, config_file)
    }

    #[test]
    fn test_config_path() {
        let config_path = Config::config_path();
        let path_str = config_path.to_string_lossy();

        // Should not contain tilde anymore
        assert!(!path_str.starts_with('~'));
        assert!(path_str.ends_with(".config/grokedoc/config.toml"));
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let (_dir, config_file) = write_config("");
        let config = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(config.engine, EngineOptions::default());
        assert_eq!(config.engine.history_limit, 50);
        assert_eq!(config.engine.sentinel, '\u{FFFC}');
    }

    #[test]
    fn test_partial_engine_table() {
        let (_dir, config_file) = write_config("[engine]\nhistory_limit = 5\n");
        let config = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(config.engine.history_limit, 5);
        assert_eq!(config.engine.sentinel, '\u{FFFC}');
    }

    #[test]
    fn test_options_reach_the_engine() {
        let (_dir, config_file) = write_config("[engine]\nhistory_limit = 1\nsentinel = \"@\"\n");
        let config = Config::load_from_path(&config_file).unwrap().unwrap();

        let mut engine = EditorEngine::with_options(config.engine);
        engine.load_plain_text("Hi");
        engine.insert_image(Default::default()).unwrap();
        assert_eq!(engine.text(), "Hi@");
        assert_eq!(engine.options().history_limit, 1);
    }

    #[test]
    fn test_sentinel_must_not_be_table_separator() {
        let (_dir, config_file) = write_config("[engine]\nsentinel = \"\\t\"\n");
        let err = Config::load_from_path(&config_file).unwrap_err();

        assert!(matches!(err, ConfigError::InvalidSetting { .. }));
    }

    #[test]
    fn test_zero_history_limit_rejected() {
        let (_dir, config_file) = write_config("[engine]\nhistory_limit = 0\n");
        let err = Config::load_from_path(&config_file).unwrap_err();

        assert!(err.to_string().contains("history_limit"));
    }

    #[test]
    fn test_parse_error_names_file() {
        let (_dir, config_file) = write_config("[engine\n");
        let err = Config::load_from_path(&config_file).unwrap_err();

        assert!(matches!(err, ConfigError::ConfigParseError { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let non_existent_config = temp_dir.path().join("nonexistent.toml");

        let result = Config::load_from_path(&non_existent_config).unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("nested").join("config.toml");
        let test_config = Config {
            engine: EngineOptions {
                history_limit: 7,
                sentinel: '#',
            },
        };

        test_config.save_to_path(&config_file).unwrap();
        let loaded_config = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(loaded_config.engine, test_config.engine);
    }
}
