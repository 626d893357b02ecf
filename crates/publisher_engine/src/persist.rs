use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    Ok(())
}

/// Replace `path` with `content` via a temp file in the same directory.
pub fn write_atomically(path: &Path, content: &[u8]) -> Result<(), PersistError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    ensure_output_dir(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;

    tmp.persist(path).map_err(|e| PersistError::Io(e.error))?;
    Ok(())
}

/// Single-line file remembering the service's project id between runs.
#[derive(Debug, Clone)]
pub struct CorrelationFile {
    path: PathBuf,
}

impl CorrelationFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored id, or an empty string when nothing usable is stored.
    pub fn load(&self) -> String {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| content.lines().next().map(|line| line.trim().to_string()))
            .unwrap_or_default()
    }

    /// Store `project_id`; blank ids leave the file alone.
    pub fn save(&self, project_id: &str) -> Result<(), PersistError> {
        let project_id = project_id.trim();
        if project_id.is_empty() {
            return Ok(());
        }
        write_atomically(&self.path, project_id.as_bytes())
    }
}
