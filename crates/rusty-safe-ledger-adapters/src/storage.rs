use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::NamedTempFile;

use rusty_safe_ledger_core::{PortError, StoragePort};

/// Process-local storage. Clones share the same blobs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorageAdapter {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    blobs: BTreeMap<String, String>,
    fail_writes: bool,
}

impl MemoryStorageAdapter {
    /// Makes every subsequent `store`/`delete` fail until reset.
    pub fn fail_writes(&self, fail: bool) -> Result<(), PortError> {
        self.lock()?.fail_writes = fail;
        Ok(())
    }

    pub fn keys(&self) -> Result<Vec<String>, PortError> {
        Ok(self.lock()?.blobs.keys().cloned().collect())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, PortError> {
        self.state
            .lock()
            .map_err(|e| PortError::Transport(format!("memory storage lock poisoned: {e}")))
    }
}

impl StoragePort for MemoryStorageAdapter {
    fn load(&self, key: &str) -> Result<Option<String>, PortError> {
        Ok(self.lock()?.blobs.get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<(), PortError> {
        let mut g = self.lock()?;
        if g.fail_writes {
            return Err(PortError::Transport("memory storage writes disabled".to_owned()));
        }
        g.blobs.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), PortError> {
        let mut g = self.lock()?;
        if g.fail_writes {
            return Err(PortError::Transport("memory storage writes disabled".to_owned()));
        }
        g.blobs.remove(key);
        Ok(())
    }
}

/// One JSON file per key under a directory. Writes go to a temp file in the
/// same directory and are renamed over the target.
#[derive(Debug, Clone)]
pub struct FileStorageAdapter {
    dir: PathBuf,
}

impl FileStorageAdapter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `safe-txs:1:0xabc` becomes `safe-txs_1_0xabc.json`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl StoragePort for FileStorageAdapter {
    fn load(&self, key: &str) -> Result<Option<String>, PortError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PortError::Transport(format!(
                "read {} failed: {e}",
                path.display()
            ))),
        }
    }

    fn store(&self, key: &str, value: &str) -> Result<(), PortError> {
        let path = self.path_for(key);
        fs::create_dir_all(&self.dir).map_err(|e| {
            PortError::Transport(format!("create {} failed: {e}", self.dir.display()))
        })?;

        let mut tmp = NamedTempFile::new_in(&self.dir)
            .map_err(|e| PortError::Transport(format!("temp file failed: {e}")))?;
        tmp.write_all(value.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| PortError::Transport(format!("write {} failed: {e}", path.display())))?;
        tmp.persist(&path).map_err(|e| {
            PortError::Transport(format!("rename onto {} failed: {}", path.display(), e.error))
        })?;

        tracing::debug!(path = %path.display(), bytes = value.len(), "ledger file written");
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), PortError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Transport(format!(
                "remove {} failed: {e}",
                path.display()
            ))),
        }
    }
}
