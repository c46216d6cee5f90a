//! Artifact persistence
//!
//! The analyzers never write files themselves; callers hand their outputs to
//! an [`ArtifactStore`].

use crate::error::{EvalError, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Storage backend for evaluation artifacts
pub trait ArtifactStore {
    /// Serialize `value` under `name`, returning where it landed
    fn store_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf>;
}

/// Writes each artifact as pretty-printed JSON in a local directory
#[derive(Debug, Clone)]
pub struct JsonArtifactStore {
    base_dir: PathBuf,
}

impl JsonArtifactStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn artifact_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(EvalError::InvalidInput(format!(
                "Invalid artifact name: '{}'",
                name
            )));
        }
        Ok(self.base_dir.join(format!("{}.json", name)))
    }
}

impl ArtifactStore for JsonArtifactStore {
    fn store_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let path = self.artifact_path(name)?;
        fs::create_dir_all(&self.base_dir)?;

        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;

        debug!(path = %path.display(), "Artifact written");
        Ok(path)
    }
}
