//! Configuration types for the backing-store host.

use crate::errors::HostError;
use crate::memory_tier::{cache_capacity_for_memory, MemoryTierOracle};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete host configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Backing-store cache settings.
    #[serde(default)]
    pub backing_store: BackingStoreConfig,
    /// Thumbnail settings.
    #[serde(default)]
    pub thumbnail: ThumbnailConfig,
}

/// Backing-store cache configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackingStoreConfig {
    /// Explicit cache capacity. Unset derives it from physical memory;
    /// zero or negative disables caching altogether.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_capacity: Option<i32>,
    /// Override for detected physical memory, in megabytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_memory_mb: Option<u64>,
}

/// Thumbnail configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailConfig {
    /// How long a just-shown surface keeps its thumbnail, in milliseconds.
    /// Zero disables the protection.
    #[serde(default = "default_debounce_window_ms")]
    pub debounce_window_ms: u64,
    /// Maximum thumbnail width in pixels.
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    /// Maximum thumbnail height in pixels.
    #[serde(default = "default_max_height")]
    pub max_height: u32,
}

fn default_debounce_window_ms() -> u64 {
    3_000
}

fn default_max_width() -> u32 {
    294
}

fn default_max_height() -> u32 {
    204
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            debounce_window_ms: default_debounce_window_ms(),
            max_width: default_max_width(),
            max_height: default_max_height(),
        }
    }
}

impl ThumbnailConfig {
    /// The debounce window as a duration.
    #[must_use]
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }
}

impl BackingStoreConfig {
    /// Number of backing stores to keep, or 0 when caching is disabled.
    ///
    /// `oracle` is only consulted when neither the capacity nor the memory
    /// amount is configured.
    #[must_use]
    pub fn effective_capacity(&self, oracle: &dyn MemoryTierOracle) -> usize {
        match self.cache_capacity {
            Some(capacity) if capacity <= 0 => 0,
            Some(capacity) => capacity as usize,
            None => {
                let memory_mb = self
                    .physical_memory_mb
                    .or_else(|| oracle.physical_memory_mb());
                cache_capacity_for_memory(memory_mb)
            }
        }
    }
}

impl Config {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Parses a TOML document. Missing sections and fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or fails validation.
    pub fn from_toml_str(text: &str) -> Result<Self, HostError> {
        let config: Config =
            toml::from_str(text).map_err(|e| HostError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HostError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Serializes the configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, HostError> {
        toml::to_string_pretty(self).map_err(|e| HostError::Config(e.to_string()))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), HostError> {
        if self.thumbnail.max_width == 0 || self.thumbnail.max_height == 0 {
            return Err(HostError::Config(
                "Thumbnail bounds must be non-zero".to_string(),
            ));
        }

        if self.backing_store.physical_memory_mb == Some(0) {
            return Err(HostError::Config(
                "Physical memory override cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for creating a `Config`.
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Sets an explicit cache capacity (zero or negative disables caching).
    #[must_use]
    pub fn cache_capacity(mut self, capacity: i32) -> Self {
        self.config.backing_store.cache_capacity = Some(capacity);
        self
    }

    /// Overrides the detected physical memory.
    #[must_use]
    pub fn physical_memory_mb(mut self, memory_mb: u64) -> Self {
        self.config.backing_store.physical_memory_mb = Some(memory_mb);
        self
    }

    /// Sets the thumbnail debounce window.
    #[must_use]
    pub fn debounce_window(mut self, window: Duration) -> Self {
        self.config.thumbnail.debounce_window_ms = window.as_millis() as u64;
        self
    }

    /// Sets the thumbnail bounds.
    #[must_use]
    pub fn thumbnail_bounds(mut self, max_width: u32, max_height: u32) -> Self {
        self.config.thumbnail.max_width = max_width;
        self.config.thumbnail.max_height = max_height;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> Result<Config, HostError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
