use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use engine_logging::engine_debug;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("storage directory missing or not writable: {0}")]
    StorageDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("corrupt store document {path:?}: {message}")]
    Corrupt { path: PathBuf, message: String },
    #[error("serialization error: {0}")]
    Serialize(String),
}

/// Creates `dir` (and parents) unless it already exists as a directory.
pub fn ensure_dir(dir: &Path) -> Result<(), PersistError> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(PersistError::StorageDir(format!(
            "{} is not a directory",
            dir.display()
        ))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            engine_debug!("Creating storage directory {:?}", dir);
            fs::create_dir_all(dir).map_err(|e| PersistError::StorageDir(e.to_string()))
        }
        Err(err) => Err(PersistError::StorageDir(err.to_string())),
    }
}

/// Replaces files inside one directory atomically: content goes to a sibling
/// temp file which is synced and then renamed over the target. Readers see
/// the old file or the new one, never a mix.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        ensure_dir(&self.dir)?;

        let mut staged = NamedTempFile::new_in(&self.dir)?;
        staged.write_all(content)?;
        staged.as_file_mut().sync_all()?;

        let target = self.dir.join(filename);
        staged
            .persist(&target)
            .map_err(|err| PersistError::Io(err.error))?;
        Ok(target)
    }
}
