use super::{Clock, KeyValueStore, Scheduler, Task};
use crate::config;
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

pub const SCHEDULE_OPTION: &str = "forcefield_schedule";

/// Scheduler whose due times live in the option store, so a task scheduled by
/// one process can be delivered by another (`run-due` from cron, or the daemon).
pub struct StoreScheduler {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl StoreScheduler {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn entries(&self) -> Map<String, Value> {
        match self.store.get(SCHEDULE_OPTION) {
            Some(Value::Object(entries)) => entries,
            _ => Map::new(),
        }
    }

    fn save(&self, entries: Map<String, Value>) {
        if entries.is_empty() {
            self.store.delete(SCHEDULE_OPTION);
        } else {
            self.store.set(SCHEDULE_OPTION, Value::Object(entries));
        }
    }
}

impl Scheduler for StoreScheduler {
    fn schedule_once(&self, delay: TimeDelta, task: Task) {
        let now = self.clock.now();
        let due = now
            .checked_add_signed(delay.min(config::delay(config::MAX_DELAY_SECONDS)))
            .unwrap_or(now);
        let mut entries = self.entries();
        entries.insert(task.id().to_string(), Value::String(due.to_rfc3339()));
        self.save(entries);

        debug!("scheduled {} at {due}", task.id());
    }

    fn cancel(&self, task: Task) {
        let mut entries = self.entries();
        if entries.remove(task.id()).is_some() {
            self.save(entries);
            debug!("unscheduled {}", task.id());
        }
    }

    fn next_run(&self, task: Task) -> Option<DateTime<Utc>> {
        self.entries()
            .get(task.id())
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|due| due.with_timezone(&Utc))
    }
}
