use super::{Clock, FileStore, KeyValueStore};
use crate::error::Error;
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{Map, Value};
use std::{
    collections::{HashMap, HashSet},
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<Map<String, Value>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }

    fn delete(&self, key: &str) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

#[derive(Debug, Default)]
struct Files {
    contents: HashMap<PathBuf, Vec<String>>,
    directories: HashSet<PathBuf>,
    read_only: HashSet<PathBuf>,
}

/// In-memory filesystem. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryFiles {
    inner: Arc<Mutex<Files>>,
}

impl MemoryFiles {
    fn files(&self) -> std::sync::MutexGuard<'_, Files> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, path: impl Into<PathBuf>, lines: &[&str]) {
        self.files().contents.insert(
            path.into(),
            lines.iter().map(ToString::to_string).collect(),
        );
    }

    pub fn mkdir(&self, path: impl Into<PathBuf>) {
        self.files().directories.insert(path.into());
    }

    pub fn set_read_only(&self, path: impl Into<PathBuf>, read_only: bool) {
        let path = path.into();
        let mut files = self.files();
        if read_only {
            files.read_only.insert(path);
        } else {
            files.read_only.remove(&path);
        }
    }

    #[must_use]
    pub fn lines(&self, path: &Path) -> Option<Vec<String>> {
        self.files().contents.get(path).cloned()
    }
}

impl FileStore for MemoryFiles {
    fn exists(&self, path: &Path) -> bool {
        let files = self.files();
        files.contents.contains_key(path) || files.directories.contains(path)
    }

    fn is_writable(&self, path: &Path) -> bool {
        !self.files().read_only.contains(path)
    }

    fn read_lines(&self, path: &Path) -> Vec<String> {
        self.lines(path).unwrap_or_default()
    }

    fn write_lines(&self, path: &Path, lines: &[String]) -> Result<(), Error> {
        let mut files = self.files();
        if files.read_only.contains(path) {
            return Err(Error::FileUnwritable {
                path: path.to_path_buf(),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            });
        }
        files.contents.insert(path.to_path_buf(), lines.to_vec());
        Ok(())
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn store_set_get_delete() {
        let store = MemoryStore::default();
        assert_eq!(store.get("hits"), None);
        store.set("hits", json!(3));
        assert_eq!(store.get("hits"), Some(json!(3)));
        store.delete("hits");
        assert_eq!(store.get("hits"), None);
    }

    #[test]
    fn read_only_files_refuse_writes() {
        let files = MemoryFiles::default();
        let path = Path::new("/srv/www/.htaccess");
        files.insert(path, &["keep"]);
        files.set_read_only(path, true);

        assert!(!files.is_writable(path));
        assert!(matches!(
            files.write_lines(path, &["x".to_string()]),
            Err(Error::FileUnwritable { .. })
        ));
        assert_eq!(files.read_lines(path), vec!["keep".to_string()]);
    }

    #[test]
    fn clones_share_contents() {
        let files = MemoryFiles::default();
        let other = files.clone();
        other.mkdir("/srv/www/wp-admin");
        assert!(files.exists(Path::new("/srv/www/wp-admin")));
    }

    #[test]
    fn manual_clock_advances() {
        let start = DateTime::<Utc>::UNIX_EPOCH;
        let clock = ManualClock::new(start);
        clock.advance(TimeDelta::seconds(90));
        assert_eq!(clock.now() - start, TimeDelta::seconds(90));
    }
}
