//! Durable storage for the two energy accumulators.
//!
//! Each index is a plain decimal-text file, so totals survive restarts and
//! power loss and can be inspected (or reset) with nothing but a text
//! editor. Writes are plain overwrites; a crash mid-write can corrupt a
//! file, which is accepted at one write per hour.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

pub const CHARGED_INDEX: &str = "index_charged";
pub const DISCHARGED_INDEX: &str = "index_discharged";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("index io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt index file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: std::num::ParseFloatError,
    },
}

pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    /// Picks the storage directory once, at startup: the removable mount
    /// point when it is present, else the process working directory. A
    /// mount appearing or disappearing later has no effect until restart.
    pub fn resolve(removable_dir: &Path) -> Result<Self, StoreError> {
        let dir = if removable_dir.is_dir() {
            removable_dir.to_path_buf()
        } else {
            std::env::current_dir()?
        };
        Ok(Self { dir })
    }

    pub fn at(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// Reads one index. A missing file is not an error (the accumulator
    /// starts from its default); unparseable content is, since a corrupt
    /// starting total cannot be safely guessed.
    pub fn load(&self, key: &str) -> Result<Option<f64>, StoreError> {
        let path = self.dir.join(key);
        if !path.is_file() {
            return Ok(None);
        }

        let text = fs::read_to_string(&path)?;
        let value = text
            .trim()
            .parse::<f64>()
            .map_err(|source| StoreError::Parse { path, source })?;
        Ok(Some(value))
    }

    pub fn save(&self, key: &str, value: f64) -> Result<(), StoreError> {
        let path = self.dir.join(key);
        fs::write(&path, value.to_string())?;
        debug!(key, value, "index written");
        Ok(())
    }
}
