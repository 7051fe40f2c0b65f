//! Cribwork Configuration
//!
//! YAML settings for model locations, rotor search parallelism and the
//! annealing schedules. The file lives at `~/.config/cribwork/config.yaml`
//! unless `CRIBWORK_CONFIG` or an explicit path says otherwise.

use cribwork_engine::{Cryptanalyst, FitnessModel, SearchParams};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "CRIBWORK_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Engine(#[from] cribwork_engine::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Fitness model files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelPaths {
    /// Quadgram model over a-z
    pub quadgrams: Option<PathBuf>,
    /// Quadgram model over the Playfair alphabet (no J)
    pub playfair_quadgrams: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotorSettings {
    /// Cores left idle when the worker count is derived from the CPU count
    pub reserved_cores: usize,
    /// Fixed worker count; rounded down to a divisor of 60
    pub workers: Option<usize>,
}

impl Default for RotorSettings {
    fn default() -> Self {
        Self {
            reserved_cores: cribwork_engine::rotor::DEFAULT_RESERVED_CORES,
            workers: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CribworkConfig {
    pub models: ModelPaths,
    pub rotor: RotorSettings,
    pub playfair: SearchParams,
    pub substitution: SearchParams,
    /// Seed for the annealing searches
    pub seed: Option<u64>,
}

impl Default for CribworkConfig {
    fn default() -> Self {
        Self {
            models: ModelPaths::default(),
            rotor: RotorSettings::default(),
            playfair: SearchParams::PLAYFAIR,
            substitution: SearchParams::SUBSTITUTION,
            seed: None,
        }
    }
}

impl CribworkConfig {
    /// `~/.config/cribwork/config.yaml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cribwork")
            .join("config.yaml")
    }

    /// Load from `explicit`, else `$CRIBWORK_CONFIG`, else the default
    /// path. Only a missing default file falls back to built-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let (path, required) = locate(explicit, std::env::var_os(CONFIG_ENV));
        if !required && !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Write as YAML, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let content = self.to_yaml()?;

        let temp_path = path.with_extension("yaml.tmp");
        std::fs::write(&temp_path, content).map_err(io_error)?;
        std::fs::rename(&temp_path, path).map_err(io_error)?;
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.playfair
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("playfair: {}", e)))?;
        self.substitution
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("substitution: {}", e)))?;
        if self.rotor.workers == Some(0) {
            return Err(ConfigError::Invalid("rotor.workers must be at least 1".into()));
        }
        Ok(())
    }

    /// Build a [`Cryptanalyst`], loading every configured model
    pub fn analyst(&self) -> Result<Cryptanalyst> {
        let mut analyst = Cryptanalyst::new()
            .with_playfair_params(self.playfair)?
            .with_substitution_params(self.substitution)?
            .with_reserved_cores(self.rotor.reserved_cores);

        if let Some(path) = &self.models.quadgrams {
            analyst = analyst.with_quadgrams(Arc::new(FitnessModel::load(path)?));
        }
        if let Some(path) = &self.models.playfair_quadgrams {
            analyst = analyst.with_playfair_quadgrams(Arc::new(FitnessModel::load(path)?));
        }
        if let Some(workers) = self.rotor.workers {
            analyst = analyst.with_workers(workers);
        }
        if let Some(seed) = self.seed {
            analyst = analyst.with_seed(seed);
        }
        Ok(analyst)
    }
}

/// Config path and whether it must exist
fn locate(explicit: Option<&Path>, env: Option<OsString>) -> (PathBuf, bool) {
    match (explicit, env) {
        (Some(path), _) => (path.to_path_buf(), true),
        (None, Some(path)) if !path.is_empty() => (PathBuf::from(path), true),
        _ => (CribworkConfig::default_path(), false),
    }
}
