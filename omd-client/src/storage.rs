use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Small persistent key/value store for client-side state (device id, view
/// throttles, prompt dismissal, funded days).
pub trait LocalStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value
    fn remove(&self, key: &str) -> Result<()>;
}

/// JSON-file-backed store under `~/.omd/`.
#[derive(Debug)]
pub struct FileLocalStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileLocalStore {
    /// Open the default store at `~/.omd/local_storage.json`
    pub fn new() -> Result<Self> {
        let home_dir = dirs::home_dir().context("Could not determine home directory")?;
        Self::open(home_dir.join(".omd").join("local_storage.json"))
    }

    /// Open (or lazily create) a store at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let content = fs::read_to_string(&path).context("Failed to read local storage file")?;
            match serde_json::from_str(&content) {
                Ok(values) => values,
                Err(e) => {
                    tracing::warn!("Local storage file is corrupted ({}), starting empty", e);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create local storage directory")?;
        }

        // Write to a temporary file, then rename
        let temp_path = self.path.with_extension("tmp");
        let json = serde_json::to_string_pretty(values).context("Failed to serialize local storage")?;
        let mut file = fs::File::create(&temp_path).context("Failed to create temporary storage file")?;
        file.write_all(json.as_bytes())
            .context("Failed to write local storage")?;
        file.sync_all().context("Failed to sync local storage to disk")?;
        drop(file);

        fs::rename(&temp_path, &self.path).context("Failed to rename temporary storage file")?;
        Ok(())
    }
}

impl LocalStore for FileLocalStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().map_err(|_| anyhow!("local storage lock poisoned"))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| anyhow!("local storage lock poisoned"))?;
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| anyhow!("local storage lock poisoned"))?;
        if values.remove(key).is_some() {
            self.persist(&values)?;
        }
        Ok(())
    }
}

/// Process-lifetime store, used in tests and for guests who opt out of
/// persistence.
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryLocalStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().map_err(|_| anyhow!("local storage lock poisoned"))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| anyhow!("local storage lock poisoned"))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| anyhow!("local storage lock poisoned"))?;
        values.remove(key);
        Ok(())
    }
}

/// Read a millisecond timestamp; missing or unparsable values read as 0.
pub fn get_millis(store: &dyn LocalStore, key: &str) -> i64 {
    store
        .get(key)
        .ok()
        .flatten()
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .map(|n| n as i64)
        .unwrap_or(0)
}
