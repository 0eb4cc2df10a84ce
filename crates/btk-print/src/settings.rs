// SPDX-License-Identifier: AGPL-3.0
// BTK Print - Configuration persistence
//
// The print configuration is stored in a local JSON file.

use crate::backend::BACKEND_NAMES;
use crate::types::{PrintConfig, PrintError};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// In-memory cache of the print configuration, persisted to disk on changes
pub struct ConfigStore {
    config: RwLock<PrintConfig>,
    file_path: PathBuf,
}

impl ConfigStore {
    /// Create a new config store in the user config directory
    pub fn new() -> Result<Self, PrintError> {
        let file_path = Self::get_config_path()?;
        Self::with_path(file_path)
    }

    /// Create a config store backed by an explicit file, loading it if present
    pub fn with_path(file_path: impl Into<PathBuf>) -> Result<Self, PrintError> {
        let file_path = file_path.into();
        tracing::info!("Print config file path: {:?}", file_path);

        let config = if file_path.exists() {
            let content = fs::read_to_string(&file_path)
                .map_err(|e| PrintError::FileIo(format!("Failed to read config: {}", e)))?;

            serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse print config, using defaults: {}", e);
                PrintConfig::default()
            })
        } else {
            tracing::info!("No print config found, using defaults");
            PrintConfig::default()
        };

        let store = Self {
            config: RwLock::new(config),
            file_path,
        };

        if !store.file_path.exists() {
            tracing::info!("Creating initial print config file");
            store.persist()?;
        }

        Ok(store)
    }

    fn get_config_path() -> Result<PathBuf, PrintError> {
        let config_dir = directories::ProjectDirs::from("org", "btk", "print")
            .ok_or_else(|| PrintError::FileIo("Could not determine config directory".to_string()))?
            .config_dir()
            .to_path_buf();

        fs::create_dir_all(&config_dir)
            .map_err(|e| PrintError::FileIo(format!("Failed to create config dir: {}", e)))?;

        Ok(config_dir.join("config.json"))
    }

    fn persist(&self) -> Result<(), PrintError> {
        let config = self.config.read().unwrap();

        let content = serde_json::to_string_pretty(&*config).map_err(|e| {
            PrintError::Serialization(format!("Failed to serialize config: {}", e))
        })?;

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| PrintError::FileIo(format!("Failed to create config dir: {}", e)))?;
        }

        fs::write(&self.file_path, content)
            .map_err(|e| PrintError::FileIo(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Get current configuration
    pub fn get(&self) -> PrintConfig {
        self.config.read().unwrap().clone()
    }

    /// Replace the configuration and persist it
    pub fn update(&self, new_config: PrintConfig) -> Result<(), PrintError> {
        tracing::info!("Updating print config, backends: {:?}", new_config.backends);
        {
            let mut config = self.config.write().unwrap();
            *config = new_config;
        }

        let result = self.persist();
        if let Err(e) = &result {
            tracing::error!("Failed to persist print config: {}", e);
        }
        result
    }

    /// Turn a backend on or off for the next `load_backends`. Enabled
    /// backends keep the order of `BACKEND_NAMES`.
    pub fn set_backend_enabled(&self, name: &str, enabled: bool) -> Result<(), PrintError> {
        if !BACKEND_NAMES.contains(&name) {
            return Err(PrintError::UnknownBackend(name.to_string()));
        }

        {
            let mut config = self.config.write().unwrap();
            let was_enabled = config.backends.iter().any(|b| b == name);
            if was_enabled == enabled {
                return Ok(());
            }
            if enabled {
                config.backends.push(name.to_string());
                config.backends.sort_by_key(|b| {
                    BACKEND_NAMES
                        .iter()
                        .position(|known| *known == b.as_str())
                        .unwrap_or(BACKEND_NAMES.len())
                });
            } else {
                config.backends.retain(|b| b != name);
            }
        }

        tracing::info!(
            "Print backend {} {}",
            name,
            if enabled { "enabled" } else { "disabled" }
        );
        self.persist()
    }
}
