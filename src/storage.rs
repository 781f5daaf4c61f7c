// Persists the checklist state blob.
//
// The blob is opaque here: `ChecklistStore::serialize` produces it and
// `ChecklistStore::restore` reads it back. Storage only moves bytes.
use crate::context::AppContext;
use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Load/save of the single state blob under the plugin-private key.
pub trait StateStorage: Send + Sync + std::fmt::Debug {
    /// `Ok(None)` when nothing was saved yet.
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, blob: &str) -> Result<()>;
}

/// File-backed storage in the context's data directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    path: PathBuf,
}

impl LocalStorage {
    pub fn new(ctx: &dyn AppContext) -> Result<Self> {
        Ok(Self {
            path: ctx.get_state_path()?,
        })
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn get_lock_path(file_path: &Path) -> PathBuf {
        let mut lock_path = file_path.to_path_buf();
        if let Some(ext) = lock_path.extension() {
            let mut new_ext = ext.to_os_string();
            new_ext.push(".lock");
            lock_path.set_extension(new_ext);
        } else {
            lock_path.set_extension("lock");
        }
        lock_path
    }

    /// Runs `f` while holding an exclusive lock file next to `file_path`.
    pub fn with_lock<F, T>(file_path: &Path, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let lock_path = Self::get_lock_path(file_path);
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file {:?}", lock_path))?;

        file.lock_exclusive()?;
        let result = f();
        file.unlock()?;
        result
    }

    /// Atomic write: Write to .tmp file then rename
    pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, contents)?;
        fs::rename(tmp_path, path)?;
        Ok(())
    }
}

impl StateStorage for LocalStorage {
    fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        Self::with_lock(&self.path, || {
            let blob = fs::read_to_string(&self.path)
                .with_context(|| format!("Failed to read state file {:?}", self.path))?;
            Ok(Some(blob))
        })
    }

    fn save(&self, blob: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::with_lock(&self.path, || Self::atomic_write(&self.path, blob))?;
        log::debug!("Saved checklist state to {:?}", self.path);
        Ok(())
    }
}

/// In-memory storage, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blob: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            blob: Mutex::new(Some(blob.into())),
        }
    }
}

impl StateStorage for MemoryStorage {
    fn load(&self) -> Result<Option<String>> {
        let guard = self
            .blob
            .lock()
            .map_err(|_| anyhow::anyhow!("state lock poisoned"))?;
        Ok(guard.clone())
    }

    fn save(&self, blob: &str) -> Result<()> {
        let mut guard = self
            .blob
            .lock()
            .map_err(|_| anyhow::anyhow!("state lock poisoned"))?;
        *guard = Some(blob.to_string());
        Ok(())
    }
}
