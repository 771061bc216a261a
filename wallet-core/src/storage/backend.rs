use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use crate::errors::{WalletError, WalletResult};

/// Minimal persistence capability the vault needs.
///
/// Values are opaque strings. Implementations only have to be atomic per key.
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> WalletResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> WalletResult<()>;
    /// Removing an absent key succeeds.
    fn remove(&self, key: &str) -> WalletResult<()>;
    fn clear(&self) -> WalletResult<()>;
}

/// Process-local store, lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> WalletResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> WalletResult<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> WalletResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn clear(&self) -> WalletResult<()> {
        self.entries.write().clear();
        Ok(())
    }
}

/// Single JSON object file holding every record.
///
/// Each mutation rewrites the file through a temporary sibling and a rename,
/// so readers see either the old or the new map.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_guard: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> WalletResult<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let bytes = fs::read(&self.path)?;
        if bytes.is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_slice(&bytes).map_err(|e| {
            WalletError::StorageError(format!(
                "Record store {} is unreadable: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> WalletResult<()> {
        let serialized = serde_json::to_vec_pretty(map)?;
        let mut file = create_atomic_file(&self.path)?;
        file.write_all(&serialized)?;
        file.sync_all()?;
        finalize_atomic_file(file, &self.path)
    }

    fn mutate<F>(&self, op: F) -> WalletResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let _guard = self.write_guard.lock();
        let mut map = self.read_map()?;
        if op(&mut map) {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> WalletResult<Option<String>> {
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> WalletResult<()> {
        self.mutate(|map| {
            map.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove(&self, key: &str) -> WalletResult<()> {
        self.mutate(|map| map.remove(key).is_some())
    }

    fn clear(&self) -> WalletResult<()> {
        self.mutate(|map| {
            let changed = !map.is_empty();
            map.clear();
            changed
        })
    }
}

fn create_atomic_file(path: &Path) -> WalletResult<File> {
    let dir = path
        .parent()
        .ok_or_else(|| WalletError::StorageError("Invalid record store path".to_string()))?;
    fs::create_dir_all(dir)?;
    let tmp_path = path.with_extension("new");
    Ok(File::create(&tmp_path)?)
}

fn finalize_atomic_file(mut file: File, final_path: &Path) -> WalletResult<()> {
    file.flush()?;
    drop(file);
    let tmp_path = final_path.with_extension("new");
    fs::rename(tmp_path, final_path)?;
    Ok(())
}
