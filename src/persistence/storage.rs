// Storage backends for the single auto-save document.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::PersistenceError;

pub trait Storage: Send + Sync {
    /// Stored document, or None when nothing has been written.
    fn load(&self) -> Result<Option<String>, PersistenceError>;
    fn save(&self, contents: &str) -> Result<(), PersistenceError>;
    /// Remove the document. Removing an absent document is not an error.
    fn remove(&self) -> Result<(), PersistenceError>;
}

/// JSON document on the local filesystem. Writes go through a temp file and a rename.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl Storage for FileStorage {
    fn load(&self) -> Result<Option<String>, PersistenceError> {
        match std::fs::read_to_string(&self.path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_err(e)),
        }
    }

    fn save(&self, contents: &str) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).map_err(|e| self.io_err(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))
    }

    fn remove(&self) -> Result<(), PersistenceError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_err(e)),
        }
    }
}

/// In-memory backend used by tests and the headless demo mode.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    doc: Mutex<Option<String>>,
    saves: AtomicUsize,
    fail_writes: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            doc: Mutex::new(Some(contents.into())),
            ..Self::default()
        }
    }

    /// Storage that rejects every write (quota exceeded, read-only media).
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.doc.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Option<String>, PersistenceError> {
        Ok(self.contents())
    }

    fn save(&self, contents: &str) -> Result<(), PersistenceError> {
        if self.fail_writes {
            return Err(PersistenceError::Unavailable(
                "storage rejected the write".to_string(),
            ));
        }
        *self.doc.lock().unwrap_or_else(|e| e.into_inner()) = Some(contents.to_string());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self) -> Result<(), PersistenceError> {
        *self.doc.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_storage_round_trip_and_idempotent_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(tmp.path().join("nested").join("autosave.json"));

        assert_eq!(storage.load().unwrap(), None);
        storage.save("{\"a\":1}").unwrap();
        assert_eq!(storage.load().unwrap().as_deref(), Some("{\"a\":1}"));
        assert!(!storage.path().with_extension("json.tmp").exists());

        storage.remove().unwrap();
        storage.remove().unwrap();
        assert_eq!(storage.load().unwrap(), None);
    }

    #[test]
    fn memory_storage_counts_saves() {
        let storage = MemoryStorage::new();
        storage.save("x").unwrap();
        storage.save("y").unwrap();
        assert_eq!(storage.save_count(), 2);
        assert_eq!(storage.contents().as_deref(), Some("y"));
        assert!(MemoryStorage::failing().save("z").is_err());
    }
}
