//! Resume index persisted between runs

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Single integer file holding the index of the last item that started playing
#[derive(Clone, Debug)]
pub struct ResumeStore {
    path: PathBuf,
}

impl ResumeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `None` when the file does not exist yet.
    pub fn load(&self) -> Result<Option<usize>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read resume index {}", self.path.display())
                });
            }
        };

        let index = content.trim().parse::<usize>().with_context(|| {
            format!("Resume index {} is corrupt: {:?}", self.path.display(), content)
        })?;
        Ok(Some(index))
    }

    /// Overwrites the file in place.
    pub fn save(&self, index: usize) -> Result<()> {
        fs::write(&self.path, index.to_string())
            .with_context(|| format!("Failed to write resume index {}", self.path.display()))
    }
}
