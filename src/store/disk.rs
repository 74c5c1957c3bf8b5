use super::{FileStore, KeyValueStore};
use crate::error::Error;
use serde_json::{Map, Value};
use std::{
    fs::{self, OpenOptions},
    io::{self, ErrorKind, Write},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, error};

/// Options persisted as one JSON object, written through on every change.
///
/// Every access re-reads the file first, so a daemon and one-shot commands
/// sharing the same state file see each other's changes.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Load `path`, starting empty when it does not exist yet.
    ///
    /// # Errors
    /// Returns an error if the file exists but can't be read or isn't a JSON object.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let values = load(path)?;

        debug!("loaded {} options from {}", values.len(), path.display());

        Ok(Self {
            path: path.to_path_buf(),
            values: Mutex::new(values),
        })
    }

    // Pick up changes made by other processes. A file that can't be read or
    // parsed keeps the last good values.
    fn refresh(&self) -> MutexGuard<'_, Map<String, Value>> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        match load(&self.path) {
            Ok(fresh) => *values = fresh,
            Err(err) => error!("Failed to reload options: {err}"),
        }
        values
    }

    fn persist(&self, values: &Map<String, Value>) {
        let result = serde_json::to_vec_pretty(values)
            .map_err(io::Error::from)
            .and_then(|raw| replace_file(&self.path, &raw));

        if let Err(err) = result {
            error!("Failed to persist options to {}: {err}", self.path.display());
        }
    }

    fn update(&self, change: impl FnOnce(&mut Map<String, Value>)) {
        let mut values = self.refresh();
        change(&mut values);
        self.persist(&values);
    }
}

fn load(path: &Path) -> Result<Map<String, Value>, Error> {
    match fs::read_to_string(path) {
        Ok(raw) if raw.trim().is_empty() => Ok(Map::new()),
        Ok(raw) => Ok(serde_json::from_str(&raw)?),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(Map::new()),
        Err(source) => Err(Error::State {
            path: path.to_path_buf(),
            source,
        }),
    }
}

// Write a sibling temp file then rename so readers never see a partial file.
// The replaced file's permissions carry over.
fn replace_file(path: &Path, raw: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(raw)?;
        if let Ok(meta) = fs::metadata(path) {
            file.set_permissions(meta.permissions())?;
        }
        file.sync_all()?;
    }
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.refresh().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.update(|values| {
            values.insert(key.to_string(), value);
        });
    }

    fn delete(&self, key: &str) {
        self.update(|values| {
            values.remove(key);
        });
    }
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskFiles;

// Opening for append checks real access (owner, group, ACLs) without touching
// the contents.
fn file_writable(path: &Path) -> bool {
    OpenOptions::new().append(true).open(path).is_ok()
}

fn dir_writable(dir: &Path) -> bool {
    let check = dir.join(format!(".forcefield-{}.tmp", std::process::id()));
    match OpenOptions::new().write(true).create_new(true).open(&check) {
        Ok(_) => {
            let _ = fs::remove_file(&check);
            true
        }
        Err(_) => false,
    }
}

impl FileStore for DiskFiles {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_writable(&self, path: &Path) -> bool {
        if path.exists() {
            return file_writable(path);
        }

        match path.parent() {
            Some(dir) if dir.as_os_str().is_empty() => dir_writable(Path::new(".")),
            Some(dir) => dir_writable(dir),
            None => false,
        }
    }

    fn read_lines(&self, path: &Path) -> Vec<String> {
        match fs::read_to_string(path) {
            Ok(raw) => raw.lines().map(|line| line.trim_end().to_string()).collect(),
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    error!("Failed to read {}: {err}", path.display());
                }
                Vec::new()
            }
        }
    }

    fn write_lines(&self, path: &Path, lines: &[String]) -> Result<(), Error> {
        let unwritable = |source| Error::FileUnwritable {
            path: path.to_path_buf(),
            source,
        };

        // A writable directory would let the rename replace a file we can't write.
        if path.exists() {
            OpenOptions::new()
                .append(true)
                .open(path)
                .map_err(unwritable)?;
        }

        replace_file(path, lines.join("\n").as_bytes()).map_err(unwritable)
    }
}
