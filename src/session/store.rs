use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access session file: {0}")]
    Io(#[from] std::io::Error),
    #[error("session file is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("session store lock poisoned")]
    Lock,
}

/// String key-value storage that outlives the process, like browser local storage.
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

impl<S: SessionStore + ?Sized> SessionStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

/// Stores all keys as one flat JSON object in a file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>, StoreError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => return Err(err.into()),
        };
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_all(&self, entries: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.read_all()?;
        Ok(entries
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), Value::String(value.to_string()));
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_store(label: &str) -> Result<FileStore, Box<dyn std::error::Error>> {
        let unique = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        let path = std::env::temp_dir()
            .join(format!("appspark-store-{label}-{unique}"))
            .join("session.json");
        Ok(FileStore::new(path))
    }

    #[test]
    fn missing_file_reads_as_empty() -> Result<(), Box<dyn std::error::Error>> {
        let store = temp_store("missing")?;
        assert_eq!(store.get(TOKEN_KEY)?, None);
        Ok(())
    }

    #[test]
    fn set_get_remove_persist_across_instances() -> Result<(), Box<dyn std::error::Error>> {
        let store = temp_store("persist")?;
        store.set(TOKEN_KEY, "abc.def")?;
        store.set(USER_KEY, r#"{"id":1}"#)?;

        let reopened = FileStore::new(store.path());
        assert_eq!(reopened.get(TOKEN_KEY)?.as_deref(), Some("abc.def"));
        assert_eq!(reopened.get(USER_KEY)?.as_deref(), Some(r#"{"id":1}"#));

        reopened.remove(TOKEN_KEY)?;
        assert_eq!(store.get(TOKEN_KEY)?, None);
        assert!(store.get(USER_KEY)?.is_some());

        if let Some(dir) = store.path().parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
        Ok(())
    }

    #[test]
    fn corrupt_file_returns_json_error() -> Result<(), Box<dyn std::error::Error>> {
        let store = temp_store("corrupt")?;
        store.set(TOKEN_KEY, "x")?;
        std::fs::write(store.path(), "{not json")?;

        assert!(matches!(store.get(TOKEN_KEY), Err(StoreError::Json(_))));

        if let Some(dir) = store.path().parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
        Ok(())
    }
}
