//! Device settings layer: a string-keyed, string-valued durable store.
//!
//! [`FileSettings`] keeps every key in one JSON object file, the way a
//! platform defaults database keeps an app's settings together.
//! [`MemorySettings`] is the non-durable variant used by tests and the
//! CLI's `--ephemeral` mode.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use crate::error::{Context, Result};

/// Simple key-value settings storage.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Settings persisted to a single JSON file.
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file.
    write_lock: Mutex<()>,
}

impl FileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    fn read_raw(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_ctx(|| format!("read {}", self.path.display())),
        }
    }

    fn parse(&self, raw: &str) -> Result<BTreeMap<String, String>> {
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(raw).with_ctx(|| format!("parse {}", self.path.display()))
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>> {
        match self.read_raw()? {
            Some(raw) => self.parse(&raw),
            None => Ok(BTreeMap::new()),
        }
    }

    /// Like `read_map`, but a corrupt file is discarded instead of failing the write.
    fn read_map_for_update(&self) -> Result<BTreeMap<String, String>> {
        let Some(raw) = self.read_raw()? else {
            return Ok(BTreeMap::new());
        };
        match self.parse(&raw) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "discarding unreadable settings file");
                Ok(BTreeMap::new())
            }
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_ctx(|| format!("create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(map).with_ctx(|| "encode settings".to_string())?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json).with_ctx(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_ctx(|| format!("rename {} -> {}", tmp.display(), self.path.display()))
    }
}

impl SettingsStore for FileSettings {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = lock(&self.write_lock);
        let mut map = self.read_map_for_update()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = lock(&self.write_lock);
        if self.read_raw()?.is_none() {
            return Ok(());
        }
        let mut map = self.read_map_for_update()?;
        map.remove(key);
        self.write_map(&map)
    }
}

/// In-memory settings; contents vanish with the value.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.values).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.values).remove(key);
        Ok(())
    }
}
