//! Typed access to the persisted options.

use crate::store::KeyValueStore;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

pub const VERSION_OPTION: &str = "forcefield_version";
pub const HITS_TAKEN_OPTION: &str = "forcefield_hits_taken";
pub const CHECK_ATTACK_START_OPTION: &str = "forcefield_check_hits_start_time";
pub const REVERSE_POLARITY_OPTION: &str = "forcefield_reverse_polarity";
pub const OPTIONAL_BLOCKS_OPTION: &str = "forcefield_optional_blocks";

/// Stored in place of a reversed path while polarity is normal.
pub const INACTIVE: &str = "inactive";

#[derive(Clone)]
pub struct Options {
    store: Arc<dyn KeyValueStore>,
}

impl Options {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn version(&self) -> Option<String> {
        self.store
            .get(VERSION_OPTION)
            .and_then(|value| value.as_str().map(str::to_string))
    }

    pub fn set_version(&self, version: &str) {
        self.store.set(VERSION_OPTION, json!(version));
    }

    #[must_use]
    pub fn hits(&self) -> u64 {
        self.store
            .get(HITS_TAKEN_OPTION)
            .and_then(|value| value.as_u64())
            .unwrap_or(0)
    }

    pub fn set_hits(&self, hits: u64) {
        self.store.set(HITS_TAKEN_OPTION, json!(hits));
    }

    #[must_use]
    pub fn window_start(&self) -> Option<DateTime<Utc>> {
        self.store
            .get(CHECK_ATTACK_START_OPTION)
            .and_then(|value| value.as_str().map(str::to_string))
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|start| start.with_timezone(&Utc))
    }

    pub fn set_window_start(&self, start: Option<DateTime<Utc>>) {
        match start {
            Some(start) => self
                .store
                .set(CHECK_ATTACK_START_OPTION, json!(start.to_rfc3339())),
            None => self.store.delete(CHECK_ATTACK_START_OPTION),
        }
    }

    /// The rotated secret path, `None` while polarity is normal.
    #[must_use]
    pub fn reversed_login(&self) -> Option<String> {
        match self.store.get(REVERSE_POLARITY_OPTION) {
            Some(Value::String(login)) if login != INACTIVE && !login.is_empty() => Some(login),
            _ => None,
        }
    }

    pub fn set_reversed_login(&self, login: Option<&str>) {
        self.store
            .set(REVERSE_POLARITY_OPTION, json!(login.unwrap_or(INACTIVE)));
    }

    #[must_use]
    pub fn blocked_paths(&self) -> Vec<String> {
        match self.store.get(OPTIONAL_BLOCKS_OPTION) {
            None | Some(Value::Null) => Vec::new(),
            Some(value @ Value::Array(_)) => serde_json::from_value(value).unwrap_or_else(|err| {
                warn!("ignoring malformed {OPTIONAL_BLOCKS_OPTION}: {err}");
                Vec::new()
            }),
            Some(other) => {
                warn!("ignoring malformed {OPTIONAL_BLOCKS_OPTION}: {other}");
                Vec::new()
            }
        }
    }

    pub fn set_blocked_paths(&self, paths: &[String]) {
        self.store.set(OPTIONAL_BLOCKS_OPTION, json!(paths));
    }

    /// Remove every option this crate owns.
    pub fn clear(&self) {
        for key in [
            VERSION_OPTION,
            HITS_TAKEN_OPTION,
            CHECK_ATTACK_START_OPTION,
            REVERSE_POLARITY_OPTION,
            OPTIONAL_BLOCKS_OPTION,
        ] {
            self.store.delete(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn options() -> Options {
        Options::new(Arc::new(MemoryStore::default()))
    }

    #[test]
    fn reversed_login_sentinel() {
        let options = options();
        assert_eq!(options.reversed_login(), None);

        options.set_reversed_login(Some("04242"));
        assert_eq!(options.reversed_login(), Some("04242".to_string()));

        options.set_reversed_login(None);
        assert_eq!(options.reversed_login(), None);
    }

    #[test]
    fn blocked_paths_keep_order() {
        let options = options();
        assert!(options.blocked_paths().is_empty());

        let paths = vec!["00002".to_string(), "00001".to_string()];
        options.set_blocked_paths(&paths);
        assert_eq!(options.blocked_paths(), paths);
    }

    #[test]
    fn malformed_values_fall_back() {
        let store = Arc::new(MemoryStore::default());
        store.set(OPTIONAL_BLOCKS_OPTION, json!(0));
        store.set(HITS_TAKEN_OPTION, json!("many"));

        let options = Options::new(store);
        assert!(options.blocked_paths().is_empty());
        assert_eq!(options.hits(), 0);
    }

    #[test]
    fn window_start_round_trip() {
        let options = options();
        let start = DateTime::<Utc>::UNIX_EPOCH;

        options.set_window_start(Some(start));
        assert_eq!(options.window_start(), Some(start));

        options.set_window_start(None);
        assert_eq!(options.window_start(), None);
    }
}
