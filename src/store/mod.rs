//! Host collaborators: persisted options, scheduled tasks, files and time.
//!
//! Every collaborator is a `Send + Sync` trait object with `&self` methods so a
//! single instance can be shared between the monitor, the polarity controller
//! and the HTTP daemon.

pub mod disk;
pub mod memory;
pub mod scheduler;

pub use disk::{DiskFiles, JsonFileStore};
pub use memory::{ManualClock, MemoryFiles, MemoryStore};
pub use scheduler::StoreScheduler;

use crate::{config::Settings, error::Error};
use chrono::{DateTime, TimeDelta, Utc};
use rand::{rngs::StdRng, RngCore, SeedableRng};
use serde_json::Value;
use std::{path::Path, sync::Arc};

/// Typed key/value options shared across invocations.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value);
    fn delete(&self, key: &str);
}

/// Deferred single-shot tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    CheckHits,
    StabilizePolarity,
}

impl Task {
    pub const ALL: [Self; 2] = [Self::CheckHits, Self::StabilizePolarity];

    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::CheckHits => "forcefield_check_hits",
            Self::StabilizePolarity => "forcefield_stabilize_polarity",
        }
    }
}

/// Delivery is at-least-once: callbacks must tolerate running twice.
pub trait Scheduler: Send + Sync {
    fn schedule_once(&self, delay: TimeDelta, task: Task);
    fn cancel(&self, task: Task);
    fn next_run(&self, task: Task) -> Option<DateTime<Utc>>;

    fn is_scheduled(&self, task: Task) -> bool {
        self.next_run(task).is_some()
    }
}

pub trait FileStore: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    /// True when the file is writable, or it doesn't exist and its directory is.
    fn is_writable(&self, path: &Path) -> bool;
    /// Lines without line endings; a missing or unreadable file reads as empty.
    fn read_lines(&self, path: &Path) -> Vec<String>;
    /// # Errors
    /// Returns `Error::FileUnwritable` if the file cannot be written.
    fn write_lines(&self, path: &Path, lines: &[String]) -> Result<(), Error>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Everything the core needs from its host.
pub struct Host {
    pub store: Arc<dyn KeyValueStore>,
    pub scheduler: Arc<dyn Scheduler>,
    pub files: Arc<dyn FileStore>,
    pub clock: Arc<dyn Clock>,
    pub rng: Box<dyn RngCore + Send>,
}

impl Host {
    /// Real filesystem, wall clock, and options persisted in `settings.state_file`.
    ///
    /// # Errors
    /// Returns an error if an existing state file can't be read or parsed.
    pub fn persistent(settings: &Settings) -> Result<Self, Error> {
        let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(&settings.state_file)?);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        Ok(Self {
            scheduler: Arc::new(StoreScheduler::new(store.clone(), clock.clone())),
            store,
            files: Arc::new(DiskFiles),
            clock,
            rng: Box::new(StdRng::from_entropy()),
        })
    }

    /// In-memory host used by tests and dry runs.
    #[must_use]
    pub fn in_memory(files: MemoryFiles, clock: Arc<ManualClock>, seed: u64) -> Self {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::default());
        let clock: Arc<dyn Clock> = clock;

        Self {
            scheduler: Arc::new(StoreScheduler::new(store.clone(), clock.clone())),
            store,
            files: Arc::new(files),
            clock,
            rng: Box::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host").finish_non_exhaustive()
    }
}
