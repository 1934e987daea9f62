//! Store configuration.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::cache::CachedStore;
use crate::store::ObjectStore;

/// Default number of descriptors retained by the handle cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 128;

/// Everything needed to open a pool: where it lives and how many
/// descriptors to keep warm.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Directory under which all objects live.
    pub prefix: PathBuf,
    /// Handle cache capacity; zero disables retention.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

impl StoreConfig {
    /// Configuration for `prefix` with the default cache capacity.
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self { prefix: prefix.into(), cache_capacity: DEFAULT_CACHE_CAPACITY }
    }

    /// Loads a TOML configuration file.
    pub fn from_toml_file(path: &Path) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    /// Builds the cached store this configuration describes.
    pub fn open(&self) -> CachedStore {
        CachedStore::new(ObjectStore::new(self.prefix.clone()), self.cache_capacity)
    }
}
