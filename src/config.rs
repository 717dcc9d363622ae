//! Settings file for the command-line checker.
//!
//! ```toml
//! timeout_ms = 5000
//! registries = ["npm", "cargo"]
//!
//! [cache]
//! enabled = true
//! file = "/tmp/taken-cache.json"
//!
//! [endpoints]
//! npm = "https://registry.npmmirror.com"
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::{FileStore, ResultCache};
use crate::check::{CheckOptions, Client, DEFAULT_TIMEOUT};
use crate::registry::{Registry, RegistryId};

/// Errors loading a settings file.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config {path}: {source}")]
    Read {
        /// The settings file.
        path: PathBuf,
        /// The underlying failure.
        source: io::Error,
    },
    /// The file is not valid TOML or has unexpected fields.
    #[error("invalid config {path}: {source}")]
    Parse {
        /// The settings file.
        path: PathBuf,
        /// The underlying failure.
        source: toml::de::Error,
    },
}

/// Where results are cached.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Whether to consult and fill the cache at all.
    pub enabled: bool,
    /// JSON file that keeps results across runs; in memory when unset.
    pub file: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file: None,
        }
    }
}

/// Replacement API base URLs, e.g. for registry mirrors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Endpoints {
    /// npm registry base URL.
    pub npm: Option<String>,
    /// PyPI base URL.
    pub pypi: Option<String>,
    /// crates.io base URL.
    pub cargo: Option<String>,
}

impl Endpoints {
    fn get(&self, id: RegistryId) -> Option<&str> {
        match id {
            RegistryId::Npm => self.npm.as_deref(),
            RegistryId::Pypi => self.pypi.as_deref(),
            RegistryId::Cargo => self.cargo.as_deref(),
        }
    }
}

/// All settings, with defaults for anything the file leaves out.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,
    /// Registries to check, in order.
    pub registries: Vec<RegistryId>,
    /// Result caching.
    pub cache: CacheConfig,
    /// API base overrides.
    pub endpoints: Endpoints,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            registries: RegistryId::ALL.to_vec(),
            cache: CacheConfig::default(),
            endpoints: Endpoints::default(),
        }
    }
}

impl Config {
    /// Load settings from `path`, or the defaults when there is no file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML error if the text is malformed or has unknown fields.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// The per-probe timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The configured registries, with endpoint overrides applied.
    ///
    /// Duplicates are dropped, keeping the first occurrence.
    #[must_use]
    pub fn registries(&self) -> Vec<Registry> {
        let mut seen = Vec::new();
        self.registries
            .iter()
            .filter(|id| {
                let fresh = !seen.contains(*id);
                seen.push(**id);
                fresh
            })
            .map(|&id| match self.endpoints.get(id) {
                Some(base) => Registry::new(id).with_api_base(base),
                None => Registry::new(id),
            })
            .collect()
    }

    /// A client for the configured registries.
    #[must_use]
    pub fn client(&self) -> Client {
        Client::with_registries(self.registries())
    }

    /// Check options matching these settings.
    ///
    /// The registry selection is explicit so that cached results from
    /// registries outside it are not reported.
    #[must_use]
    pub fn check_options(&self) -> CheckOptions {
        CheckOptions {
            timeout: self.timeout(),
            registries: Some(self.registries.clone()),
        }
    }

    /// The result cache these settings describe, or `None` when disabled.
    #[must_use]
    pub fn result_cache(&self) -> Option<ResultCache> {
        if !self.cache.enabled {
            return None;
        }
        Some(match &self.cache.file {
            Some(path) => ResultCache::new(FileStore::new(path)),
            None => ResultCache::in_memory(),
        })
    }
}
