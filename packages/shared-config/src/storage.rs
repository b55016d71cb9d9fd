//! Local filesystem locations for cached assets and generated files

use std::path::PathBuf;

use crate::get_env_or_default;

/// Filesystem layout used by job executors
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Content-hash keyed cache of downloaded audio, stems and engine results
    pub cache_dir: PathBuf,

    /// Directory receiving generated .lrc files
    pub lrc_output_dir: PathBuf,
}

impl StorageConfig {
    /// Load storage locations from environment variables
    pub fn from_env() -> Self {
        Self {
            cache_dir: PathBuf::from(get_env_or_default("CACHE_DIR", "data/cache")),
            lrc_output_dir: PathBuf::from(get_env_or_default("LRC_OUTPUT_DIR", "data/lrc")),
        }
    }

    /// Root both directories under one base path (useful for testing)
    pub fn under(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            cache_dir: base.join("cache"),
            lrc_output_dir: base.join("lrc"),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::under("data")
    }
}
