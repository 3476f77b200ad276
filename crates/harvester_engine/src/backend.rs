use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use engine_logging::{engine_debug, engine_trace};
use harvester_core::Item;
use serde::{Deserialize, Serialize};

use crate::persist::{ensure_dir, AtomicFileWriter, PersistError};
use crate::selection::Selection;
use crate::types::StoreError;

/// Everything the store persists: the collection in insertion order and the
/// current random selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDocument {
    pub items: Vec<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<Selection>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl StoreDocument {
    pub fn with_items(items: Vec<Item>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }
}

/// Backing medium of the bounded store.
///
/// `load` never observes a half-written `store`.
pub trait StoreBackend: Send + Sync {
    fn load(&self) -> Result<StoreDocument, PersistError>;
    fn store(&self, document: &StoreDocument) -> Result<(), PersistError>;

    /// Runs `critical` while every other writer of the same medium is held
    /// off, including writers in other processes and other store values. A
    /// `load` then `store` inside it cannot lose a concurrent update.
    ///
    /// Implementations must call `critical` exactly once.
    fn exclusive(
        &self,
        critical: &mut dyn FnMut() -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        critical()
    }
}

impl<T: StoreBackend + ?Sized> StoreBackend for Arc<T> {
    fn load(&self) -> Result<StoreDocument, PersistError> {
        (**self).load()
    }

    fn store(&self, document: &StoreDocument) -> Result<(), PersistError> {
        (**self).store(document)
    }

    fn exclusive(
        &self,
        critical: &mut dyn FnMut() -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        (**self).exclusive(critical)
    }
}

/// Process-local backend, useful for single runs and tests.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    document: Mutex<StoreDocument>,
    writer: Mutex<()>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<Item>) -> Self {
        Self {
            document: Mutex::new(StoreDocument::with_items(items)),
            writer: Mutex::new(()),
        }
    }
}

impl StoreBackend for MemoryBackend {
    fn load(&self) -> Result<StoreDocument, PersistError> {
        Ok(self
            .document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn store(&self, document: &StoreDocument) -> Result<(), PersistError> {
        *self.document.lock().unwrap_or_else(PoisonError::into_inner) = document.clone();
        Ok(())
    }

    fn exclusive(
        &self,
        critical: &mut dyn FnMut() -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        critical()
    }
}

/// JSON document on disk, replaced atomically on every store.
///
/// Writers coordinate through an advisory lock on a sibling `<name>.lock`
/// file, so separate processes sharing one document serialize their merges.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
    lock_path: PathBuf,
    writer: AtomicFileWriter,
    filename: String,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "items.json".to_string());
        Self {
            lock_path: dir.join(format!("{filename}.lock")),
            writer: AtomicFileWriter::new(dir),
            filename,
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl StoreBackend for JsonFileBackend {
    fn load(&self) -> Result<StoreDocument, PersistError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                engine_debug!("No store document at {:?}; starting empty", self.path);
                return Ok(StoreDocument::default());
            }
            Err(err) => return Err(err.into()),
        };
        serde_json::from_str(&content).map_err(|err| PersistError::Corrupt {
            path: self.path.clone(),
            message: err.to_string(),
        })
    }

    fn store(&self, document: &StoreDocument) -> Result<(), PersistError> {
        let bytes = serde_json::to_vec_pretty(document)
            .map_err(|err| PersistError::Serialize(err.to_string()))?;
        self.writer.write(&self.filename, &bytes)?;
        Ok(())
    }

    fn exclusive(
        &self,
        critical: &mut dyn FnMut() -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        ensure_dir(self.writer.dir())?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(PersistError::from)?;
        let mut lock = fd_lock::RwLock::new(file);
        let _held = lock.write().map_err(PersistError::from)?;
        engine_trace!("Holding store lock {:?}", self.lock_path);
        critical()
    }
}
