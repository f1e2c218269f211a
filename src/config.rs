//! Engine configuration: one serde tree covering solver, gesture, queue,
//! and analyser tuning, with generic JSON load/save helpers. Loading
//! falls back to compiled-in defaults when the file is missing or
//! unparsable; a kiosk must come up with a working face either way.

use crate::animation::{FacialSolverConfig, GestureTimings, QueueConfig};
use crate::signal::AnalyserConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to create config directory: {0}")]
    CreateDir(#[source] std::io::Error),
    #[error("failed to write config file: {0}")]
    Write(#[source] std::io::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Full engine tuning tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub solver: FacialSolverConfig,
    pub gestures: GestureTimings,
    pub queue: QueueConfig,
    pub analyser: AnalyserConfig,
}

impl EngineConfig {
    pub fn load(path: &Path) -> Self {
        load_json_config(path, "Engine")
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        save_json_config(path, self, "Engine")
    }
}

/// Generic load for any serde config type with a `Default`. Falls back to
/// `T::default()` if the file is missing or unparsable.
pub fn load_json_config<T: DeserializeOwned + Default>(path: &Path, label: &str) -> T {
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<T>(&content) {
            Ok(config) => {
                info!(path = %path.display(), "[{}] loaded config", label);
                config
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "[{}] failed to parse config, using defaults",
                    label
                );
                T::default()
            }
        },
        Err(_) => {
            info!(path = %path.display(), "[{}] no config file, using defaults", label);
            T::default()
        }
    }
}

/// Generic save for any serde config type.
pub fn save_json_config<T: Serialize>(
    path: &Path,
    config: &T,
    label: &str,
) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(ConfigError::CreateDir)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json).map_err(ConfigError::Write)?;
    info!(path = %path.display(), "[{}] saved config", label);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_the_tuned_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.solver.attack_speed, 16.0);
        assert_eq!(config.solver.max_jaw, 0.38);
        assert_eq!(config.gestures.audio_stop_delay, 0.7);
        assert_eq!(config.analyser.frame_size, 400);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("engine.json");

        let mut config = EngineConfig::default();
        config.solver.max_viseme = 0.4;
        config.gestures.bow_duration = 3.5;
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path);
        assert_eq!(loaded.solver.max_viseme, 0.4);
        assert_eq!(loaded.gestures.bow_duration, 3.5);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = EngineConfig::load(&dir.path().join("nope.json"));
        assert_eq!(loaded.solver.attack_speed, 16.0);
    }

    #[test]
    fn garbage_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, "not json {").unwrap();
        let loaded = EngineConfig::load(&path);
        assert_eq!(loaded.queue.drain_buffer, 0.25);
    }

    #[test]
    fn partial_config_fills_the_rest_from_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"solver": {"max_jaw": 0.3}}"#).unwrap();

        let loaded = EngineConfig::load(&path);
        assert_eq!(loaded.solver.max_jaw, 0.3);
        assert_eq!(loaded.solver.decay_speed, 7.0, "unspecified fields keep defaults");
        assert_eq!(loaded.gestures.talking_start_delay, 0.14);
    }
}
