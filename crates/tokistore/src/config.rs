//! # Configuration
//!
//! Toki configuration is managed by [`confique`], layering environment variables
//! over a TOML file over compiled defaults.
//!
//! ## Resolution Order
//!
//! 1. **Environment variables**: `TOKI_DATA_DIR`, `TOKI_PRETTY_JSON`, `TOKI_COMPRESSION`.
//! 2. **Config file**: `toki.toml` in the OS config directory (via `directories`),
//!    or an explicit path.
//! 3. **Compiled defaults**: `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `data_dir` | OS data directory | Where collections and `media/` live |
//! | `pretty_json` | `true` | Pretty-print collection files |
//! | `compression` | `6` | Gzip level (0-9) for exported archives |

use crate::error::{Result, TokiError};
use crate::store::fs_backend::FsBackend;
use crate::store::TripStore;
use confique::Config;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "toki.toml";

#[derive(Config, Debug, Clone, PartialEq, Eq)]
pub struct TokiConfig {
    /// Directory holding trips.json, places.json, cards.json, media.json and media/.
    #[config(env = "TOKI_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Pretty-print collection files (larger, but diffable by hand).
    #[config(env = "TOKI_PRETTY_JSON", default = true)]
    pub pretty_json: bool,

    /// Gzip level for exported archives, 0 (none) to 9 (best).
    #[config(env = "TOKI_COMPRESSION", default = 6)]
    pub compression: u32,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "toki")
}

impl TokiConfig {
    /// Load from the environment and `config_file` (or the default location).
    /// A missing file is not an error.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let file = match config_file {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_config_file(),
        };

        let mut builder = TokiConfig::builder().env();
        if let Some(file) = file {
            builder = builder.file(file);
        }
        Ok(builder.load()?)
    }

    pub fn default_config_file() -> Option<PathBuf> {
        project_dirs().map(|d| d.config_dir().join(CONFIG_FILENAME))
    }

    /// The configured data directory, or the OS default.
    pub fn resolved_data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        project_dirs()
            .map(|d| d.data_dir().to_path_buf())
            .ok_or_else(|| TokiError::Store("Could not determine a data directory".to_string()))
    }

    /// Clamp the compression level to what gzip accepts.
    pub fn compression_level(&self) -> u32 {
        self.compression.min(9)
    }

    /// Open the file-backed store described by this configuration.
    pub fn open_store(&self) -> Result<TripStore<FsBackend>> {
        let backend = FsBackend::new(self.resolved_data_dir()?).with_pretty_json(self.pretty_json);
        Ok(TripStore::open(backend))
    }
}
