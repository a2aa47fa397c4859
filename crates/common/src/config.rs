//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding the working directory.
pub const WORKDIR_ENV: &str = "EASYCUT_WORKDIR";

/// Environment variable forcing system-PATH encoder binaries.
pub const DEV_MODE_ENV: &str = "EASYCUT_DEV";

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Render working directory (holds `master/` and the master output).
    pub workdir: PathBuf,

    /// Encoder binary settings.
    #[serde(default)]
    pub encoder: EncoderConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Encoder (ffmpeg/ffprobe) settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Where the encoder binaries come from.
    #[serde(default)]
    pub binaries: BinarySource,
}

/// Source of the ffmpeg/ffprobe binaries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BinarySource {
    /// Use `ffmpeg`/`ffprobe` from `PATH` without checking they exist.
    #[default]
    System,
    /// Binaries bundled with the application under `<app_dir>/bin/<platform>/`.
    Bundled { app_dir: PathBuf },
    /// Explicit binary paths.
    Explicit { ffmpeg: PathBuf, ffprobe: PathBuf },
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "easycut=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workdir: default_workdir(),
            encoder: EncoderConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults,
    /// then apply environment overrides.
    pub fn load() -> Self {
        let config_path = config_file_path();
        let mut config = Self::default();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(parsed) => config = parsed,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }

        config.apply_overrides(
            std::env::var(WORKDIR_ENV).ok(),
            std::env::var(DEV_MODE_ENV).ok(),
        );
        config
    }

    /// Apply the workdir and dev-mode overrides.
    pub fn apply_overrides(&mut self, workdir: Option<String>, dev_mode: Option<String>) {
        if let Some(dir) = workdir.filter(|d| !d.trim().is_empty()) {
            self.workdir = PathBuf::from(dir);
        }
        if dev_mode.as_deref().map(is_truthy).unwrap_or(false) {
            tracing::debug!("Development mode: using encoder binaries from PATH");
            self.encoder.binaries = BinarySource::System;
        }
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("easycut").join("config.json")
}

/// Default working directory.
fn default_workdir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("easycut").join("workdir")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_source_defaults_to_system() {
        let config: EncoderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.binaries, BinarySource::System);
    }

    #[test]
    fn test_binary_source_tagged_serialization() {
        let source = BinarySource::Explicit {
            ffmpeg: PathBuf::from("/opt/ff/ffmpeg"),
            ffprobe: PathBuf::from("/opt/ff/ffprobe"),
        };
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["mode"], "explicit");

        let parsed: BinarySource =
            serde_json::from_str(r#"{"mode":"bundled","app_dir":"/app"}"#).unwrap();
        assert_eq!(
            parsed,
            BinarySource::Bundled {
                app_dir: PathBuf::from("/app")
            }
        );
    }

    #[test]
    fn test_overrides_replace_workdir_and_force_system_binaries() {
        let mut config = AppConfig {
            workdir: PathBuf::from("/var/easycut"),
            encoder: EncoderConfig {
                binaries: BinarySource::Bundled {
                    app_dir: PathBuf::from("/app"),
                },
            },
            logging: LoggingConfig::default(),
        };

        config.apply_overrides(Some("/tmp/wd".to_string()), Some("1".to_string()));
        assert_eq!(config.workdir, PathBuf::from("/tmp/wd"));
        assert_eq!(config.encoder.binaries, BinarySource::System);
    }

    #[test]
    fn test_blank_overrides_are_ignored() {
        let mut config = AppConfig::default();
        let before = config.workdir.clone();
        config.apply_overrides(Some("  ".to_string()), Some("0".to_string()));
        assert_eq!(config.workdir, before);
    }

    #[test]
    fn test_app_config_roundtrip_keeps_logging_defaults() {
        let json = r#"{"workdir":"/tmp/easycut"}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }
}
