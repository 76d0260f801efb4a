//! Loading and saving `PipelineConfig` as TOML.

use std::fs;
use std::path::{Path, PathBuf};

use skirmish_types::PipelineConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path:?}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Parse error in {path:?}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Serialize error for {path:?}: {source}")]
    SerializeError {
        path: PathBuf,
        source: toml::ser::Error,
    },
    #[error("Invalid config in {path:?}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

/// `<config dir>/skirmish/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("skirmish").join("config.toml"))
}

/// Load and validate a config file. Missing sections and keys keep their
/// defaults.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config: PipelineConfig = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;

    config.validate().map_err(|reason| ConfigError::Invalid {
        path: path.to_path_buf(),
        reason,
    })?;

    tracing::debug!("[CONFIG] loaded {:?}", path);
    Ok(config)
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_or_default(path: &Path) -> Result<PipelineConfig, ConfigError> {
    if !path.exists() {
        tracing::info!("[CONFIG] {:?} not found, using defaults", path);
        return Ok(PipelineConfig::default());
    }
    load_config(path)
}

/// Write `config` as pretty TOML, creating parent directories.
pub fn save_config(path: &Path, config: &PipelineConfig) -> Result<(), ConfigError> {
    let contents = toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError {
        path: path.to_path_buf(),
        source: e,
    })?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| ConfigError::IoError {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    fs::write(path, contents).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use skirmish_types::RateMethod;

    use super::*;

    #[test]
    fn test_save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = PipelineConfig::default();
        config.detector.activity_timeout = 7.5;
        config.engine.method = RateMethod::Rolling;
        save_config(&path, &config).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[engine]\nwindow = 10.0\n").unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.engine.window, 10.0);
        assert_eq!(loaded.detector, PipelineConfig::default().detector);
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[engine\nwindow = ").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[bus]\nmax_size = 0\n").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, PipelineConfig::default());
        assert!(matches!(
            load_config(&dir.path().join("absent.toml")),
            Err(ConfigError::IoError { .. })
        ));
    }
}
