//! Namespaced persistent key/value storage
//!
//! A [`ConfigStore`] is opened per operation, either read-only for load paths or
//! read-write for save paths. Writes are buffered in the [`Preferences`] handle
//! and only reach the backend on [`Preferences::end`]; dropping a handle without
//! ending it discards pending writes.

use crate::error::{StationError, StationResult};
use anyhow::{Context, Result, anyhow};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    fs::{self, File},
    io::{ErrorKind, Write},
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Bool(bool),
    Text(String),
}

pub type Entries = BTreeMap<String, StoredValue>;

/// Raw storage of whole namespaces.
pub trait StoreBackend: Send + Sync {
    /// Read every entry of `namespace`. A namespace never written reads as empty.
    fn read(&self, namespace: &str) -> Result<Entries>;
    fn write(&self, namespace: &str, entries: &Entries) -> Result<()>;
}

/// Handle to one namespace of a backend.
#[derive(Clone)]
pub struct ConfigStore {
    backend: Arc<dyn StoreBackend>,
    namespace: String,
}

impl ConfigStore {
    pub fn new(backend: Arc<dyn StoreBackend>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
        }
    }

    pub fn in_memory(namespace: impl Into<String>) -> Self {
        Self::new(Arc::new(MemoryBackend::default()), namespace)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Replace the namespace with an empty one without reading it first, so
    /// a corrupt namespace can still be reset.
    pub fn erase(&self) -> StationResult<()> {
        debug!("erase store namespace {}", self.namespace);

        self.backend
            .write(&self.namespace, &Entries::new())
            .context(format!("failed to erase namespace {}", self.namespace))
            .map_err(StationError::StoreUnavailable)
    }

    pub fn open(&self, mode: OpenMode) -> StationResult<Preferences<'_>> {
        debug!("open store namespace {} ({mode:?})", self.namespace);

        let entries = self
            .backend
            .read(&self.namespace)
            .context(format!("failed to open namespace {}", self.namespace))
            .map_err(StationError::StoreUnavailable)?;

        Ok(Preferences {
            store: self,
            entries,
            mode,
            dirty: false,
        })
    }
}

/// An opened namespace with typed accessors.
pub struct Preferences<'a> {
    store: &'a ConfigStore,
    entries: Entries,
    mode: OpenMode,
    dirty: bool,
}

impl Preferences<'_> {
    pub fn get_text(&self, key: &str, default: &str) -> String {
        match self.entries.get(key) {
            Some(StoredValue::Text(value)) => value.clone(),
            _ => default.to_string(),
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.entries.get(key) {
            Some(StoredValue::Bool(value)) => *value,
            _ => default,
        }
    }

    pub fn put_text(&mut self, key: &str, value: &str) -> StationResult<()> {
        self.put(key, StoredValue::Text(value.to_string()))
    }

    pub fn put_bool(&mut self, key: &str, value: bool) -> StationResult<()> {
        self.put(key, StoredValue::Bool(value))
    }

    /// Remove every key of the namespace.
    pub fn clear(&mut self) -> StationResult<()> {
        self.ensure_writable()?;
        self.entries.clear();
        self.dirty = true;
        Ok(())
    }

    /// Release the handle, flushing pending writes.
    pub fn end(mut self) -> StationResult<()> {
        if !self.dirty {
            return Ok(());
        }

        self.store
            .backend
            .write(&self.store.namespace, &self.entries)
            .context(format!("failed to write namespace {}", self.store.namespace))
            .map_err(StationError::StoreUnavailable)?;

        self.dirty = false;
        Ok(())
    }

    fn put(&mut self, key: &str, value: StoredValue) -> StationResult<()> {
        self.ensure_writable()?;
        self.entries.insert(key.to_string(), value);
        self.dirty = true;
        Ok(())
    }

    fn ensure_writable(&self) -> StationResult<()> {
        if self.mode == OpenMode::ReadOnly {
            return Err(StationError::StoreUnavailable(anyhow!(
                "namespace {} opened read-only",
                self.store.namespace
            )));
        }
        Ok(())
    }
}

impl Drop for Preferences<'_> {
    fn drop(&mut self) {
        if self.dirty {
            warn!(
                "discarding uncommitted writes to namespace {}",
                self.store.namespace
            );
        }
    }
}

/// One JSON document per namespace inside a data directory.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).context(format!("failed to create store directory {dir:?}"))?;
        Ok(Self { dir })
    }

    fn path(&self, namespace: &str) -> PathBuf {
        self.dir.join(format!("{namespace}.json"))
    }
}

impl StoreBackend for FileBackend {
    fn read(&self, namespace: &str) -> Result<Entries> {
        let path = self.path(namespace);

        match File::open(&path) {
            Ok(file) => serde_json::from_reader(file)
                .context(format!("failed to deserialize store file {path:?}")),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(e).context(format!("failed to open store file {path:?}")),
        }
    }

    fn write(&self, namespace: &str, entries: &Entries) -> Result<()> {
        let path = self.path(namespace);
        let temp_path = path.with_extension("tmp");

        let mut file = File::create(&temp_path).context("failed to create temp store file")?;
        let json = serde_json::to_vec_pretty(entries).context("failed to serialize store")?;
        file.write_all(&json)
            .context("failed to write temp store file")?;
        file.sync_all().context("failed to sync temp store file")?;

        fs::rename(&temp_path, &path).context(format!("failed to replace store file {path:?}"))
    }
}

/// Volatile backend for tests and the simulated platform.
#[derive(Default)]
pub struct MemoryBackend {
    namespaces: Mutex<HashMap<String, Entries>>,
    unavailable: AtomicBool,
}

impl MemoryBackend {
    /// Make every subsequent read and write fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<()> {
        anyhow::ensure!(
            !self.unavailable.load(Ordering::SeqCst),
            "memory backend unavailable"
        );
        Ok(())
    }
}

impl StoreBackend for MemoryBackend {
    fn read(&self, namespace: &str) -> Result<Entries> {
        self.ensure_available()?;
        let namespaces = self
            .namespaces
            .lock()
            .map_err(|_| anyhow!("memory backend poisoned"))?;
        Ok(namespaces.get(namespace).cloned().unwrap_or_default())
    }

    fn write(&self, namespace: &str, entries: &Entries) -> Result<()> {
        self.ensure_available()?;
        self.namespaces
            .lock()
            .map_err(|_| anyhow!("memory backend poisoned"))?
            .insert(namespace.to_string(), entries.clone());
        Ok(())
    }
}
