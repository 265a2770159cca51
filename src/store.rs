use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::StoreError;

pub const ATTENDANCE_DATA_KEY: &str = "attendanceData";
pub const DARK_MODE_KEY: &str = "darkMode";

/// String blobs addressed by key, each holding one JSON document.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// One `<key>.json` file per record inside a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };
        std::fs::create_dir_all(&self.dir).map_err(io_err)?;
        std::fs::write(self.path_for(key), value).map_err(io_err)?;
        debug!(key, dir = %self.dir.display(), "record written");
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    records: HashMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.records.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.records.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

pub fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    let Some(text) = store.get(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|source| StoreError::Corrupt {
            key: key.to_string(),
            source,
        })
}

pub fn save_json<T: Serialize>(
    store: &mut dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let text = serde_json::to_string(value).map_err(|source| StoreError::Corrupt {
        key: key.to_string(),
        source,
    })?;
    store.set(key, &text)
}
