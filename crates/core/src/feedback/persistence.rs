use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use tracing::{debug, warn};

use super::{FeedbackError, FeedbackState};

/// Backing storage for [`super::FeedbackStore`].
pub trait FeedbackPersistence: Send + Sync {
    fn load(&self) -> Result<FeedbackState, FeedbackError>;
    fn save(&self, state: &FeedbackState) -> Result<(), FeedbackError>;
    /// Exclusive access to the storage until the returned guard drops, shared with every
    /// other handle (in any process) on the same storage.
    fn lock(&self) -> Result<StorageLock, FeedbackError>;
    fn describe(&self) -> String;
}

/// Held storage lock; released on drop.
#[derive(Debug)]
pub struct StorageLock {
    file: Option<File>,
}

impl StorageLock {
    /// A guard that locks nothing, for storage private to one store.
    pub fn unshared() -> Self {
        Self { file: None }
    }

    fn exclusive(file: File) -> std::io::Result<Self> {
        FileExt::lock_exclusive(&file)?;
        Ok(Self { file: Some(file) })
    }
}

impl Drop for StorageLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(error) = FileExt::unlock(&file) {
                warn!(
                    event_name = "feedback.unlock.failed",
                    error = %error,
                    "feedback lock not released explicitly; closing the file releases it"
                );
            }
        }
    }
}

/// Pretty-printed JSON document on disk, replaced atomically on every save.
///
/// Writers coordinate through an advisory lock on a sibling `<file>.lock`. The document
/// itself cannot carry the lock because every save swaps it out by rename.
#[derive(Clone, Debug)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    fn staging_path(&self) -> PathBuf {
        self.sibling_path(".tmp")
    }

    fn lock_path(&self) -> PathBuf {
        self.sibling_path(".lock")
    }

    fn sibling_path(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn ensure_parent(&self) -> Result<(), FeedbackError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| FeedbackError::Write { path: self.describe(), source })?;
        }
        Ok(())
    }
}

impl FeedbackPersistence for JsonFilePersistence {
    fn load(&self) -> Result<FeedbackState, FeedbackError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!(
                    event_name = "feedback.load.missing",
                    path = %self.path.display(),
                    "no feedback file yet; starting empty"
                );
                return Ok(FeedbackState::default());
            }
            Err(source) => return Err(FeedbackError::Read { path: self.describe(), source }),
        };

        serde_json::from_str(&raw)
            .map_err(|source| FeedbackError::Corrupt { path: self.describe(), source })
    }

    fn save(&self, state: &FeedbackState) -> Result<(), FeedbackError> {
        let encoded = serde_json::to_string_pretty(state).map_err(FeedbackError::Encode)?;
        self.ensure_parent()?;

        let staging = self.staging_path();
        fs::write(&staging, encoded)
            .map_err(|source| FeedbackError::Write { path: self.describe(), source })?;
        fs::rename(&staging, &self.path)
            .map_err(|source| FeedbackError::Write { path: self.describe(), source })
    }

    fn lock(&self) -> Result<StorageLock, FeedbackError> {
        self.ensure_parent()?;
        let lock_path = self.lock_path();
        let lock_error =
            |source| FeedbackError::Lock { path: lock_path.display().to_string(), source };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(lock_error)?;
        StorageLock::exclusive(file).map_err(lock_error)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Keeps the state in process memory; it lives only as long as the store.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    state: Mutex<FeedbackState>,
}

impl FeedbackPersistence for InMemoryPersistence {
    fn load(&self) -> Result<FeedbackState, FeedbackError> {
        Ok(self.state.lock()?.clone())
    }

    fn save(&self, state: &FeedbackState) -> Result<(), FeedbackError> {
        *self.state.lock()? = state.clone();
        Ok(())
    }

    fn lock(&self) -> Result<StorageLock, FeedbackError> {
        Ok(StorageLock::unshared())
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}
