//! Configuration loading and validation.
//!
//! Everything has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! [anchors]
//! pool = ["/etc/peer-trust/sks-keyservers.netCA.pem"]
//! default = []
//! system = ["/etc/ssl/certs/ca-certificates.crt"]
//!
//! [revocation]
//! crls = []
//! allow_unknown = true
//!
//! [cache]
//! capacity = 1000
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::error::{Result, TrustError};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrustConfig {
    /// Anchor files per anchor class.
    #[serde(default)]
    pub anchors: AnchorsConfig,

    /// Revocation list settings.
    #[serde(default)]
    pub revocation: RevocationConfig,

    /// Intermediate certificate cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// PEM files holding the anchors of each class.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnchorsConfig {
    /// Anchors trusted for the keyserver pool hostname.
    #[serde(default = "default_pool_anchors")]
    pub pool: Vec<PathBuf>,

    /// Anchors trusted when the caller asks for the default pool.
    #[serde(default)]
    pub default: Vec<PathBuf>,

    /// Anchors trusted when the caller asks for the system store.
    #[serde(default = "default_system_anchors")]
    pub system: Vec<PathBuf>,
}

impl Default for AnchorsConfig {
    fn default() -> Self {
        Self {
            pool: default_pool_anchors(),
            default: Vec::new(),
            system: default_system_anchors(),
        }
    }
}

/// Revocation list settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RevocationConfig {
    /// PEM files of certificate revocation lists.
    #[serde(default)]
    pub crls: Vec<PathBuf>,

    /// Accept certificates whose revocation status no loaded CRL covers.
    #[serde(default = "default_allow_unknown")]
    pub allow_unknown: bool,
}

impl Default for RevocationConfig {
    fn default() -> Self {
        Self {
            crls: Vec::new(),
            allow_unknown: default_allow_unknown(),
        }
    }
}

/// Intermediate certificate cache settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Maximum number of cached certificates.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}

fn default_pool_anchors() -> Vec<PathBuf> {
    vec![PathBuf::from("/etc/peer-trust/sks-keyservers.netCA.pem")]
}

fn default_system_anchors() -> Vec<PathBuf> {
    vec![PathBuf::from("/etc/ssl/certs/ca-certificates.crt")]
}

fn default_allow_unknown() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

impl TrustConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| TrustError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<()> {
        if self.cache.capacity == 0 {
            return Err(TrustError::Config(
                "cache.capacity must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> Result<TrustConfig> {
    let contents = std::fs::read_to_string(path).map_err(|source| TrustError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: TrustConfig = toml::from_str(&contents)
        .map_err(|e| TrustError::Config(format!("failed to parse {}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}
