//! Secret path rotation ("reversing polarity") and the cooldown back to normal.
//!
//! In normal polarity the login lives at the configured default path. Each
//! detected attack moves it to a fresh five digit path; while already
//! reversed, the path being replaced is added to the blocked list so every
//! path handed out during the attack stays forbidden. One stabilisation task
//! is scheduled by the first rotation and is never pushed back by later ones.

use crate::{
    config::{self, DEFAULT_LOGIN},
    error::{Error, InvalidLogin},
    monitor::AttackResponder,
    rewrite::{Outcome, RewriteManager},
    rules::PolicyInput,
    state::Options,
    store::{FileStore, Scheduler, Task},
};
use chrono::{DateTime, Utc};
use rand::{Rng, RngCore};
use serde::Serialize;
use std::{
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Normal,
    Reversed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PolarityState {
    pub mode: Mode,
    pub active_secret_path: String,
    pub blocked_paths: Vec<String>,
    pub reversion_due: Option<DateTime<Utc>>,
}

pub struct PolarityController {
    options: Options,
    scheduler: Arc<dyn Scheduler>,
    files: Arc<dyn FileStore>,
    rewrite: RewriteManager,
    rng: Mutex<Box<dyn RngCore + Send>>,
    document_root: PathBuf,
    configured_login: String,
    permalinks_enabled: bool,
    cooldown_seconds: u64,
}

impl PolarityController {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        options: Options,
        scheduler: Arc<dyn Scheduler>,
        files: Arc<dyn FileStore>,
        rewrite: RewriteManager,
        rng: Box<dyn RngCore + Send>,
        document_root: PathBuf,
        configured_login: String,
        permalinks_enabled: bool,
        cooldown_seconds: u64,
    ) -> Self {
        Self {
            options,
            scheduler,
            files,
            rewrite,
            rng: Mutex::new(rng),
            document_root,
            configured_login,
            permalinks_enabled,
            cooldown_seconds,
        }
    }

    #[must_use]
    pub fn rewrite(&self) -> &RewriteManager {
        &self.rewrite
    }

    #[must_use]
    pub fn configured_login(&self) -> &str {
        &self.configured_login
    }

    /// Check a configured login slug against the site.
    ///
    /// # Errors
    /// Returns `Error::ConfigurationInvalid` if the slug is empty, contains a
    /// path separator or whitespace, or names something that exists under the
    /// document root.
    pub fn validate_login(&self, login: &str) -> Result<(), Error> {
        let reason = if login.is_empty() {
            Some(InvalidLogin::Empty)
        } else if login.contains(&['/', '\\'][..]) {
            Some(InvalidLogin::Separator)
        } else if login.chars().any(|c| c.is_whitespace() || c.is_control()) {
            Some(InvalidLogin::Whitespace)
        } else if self.files.exists(&self.document_root.join(login)) {
            Some(InvalidLogin::Exists)
        } else {
            None
        };

        reason.map_or(Ok(()), |reason| {
            Err(Error::ConfigurationInvalid {
                login: login.to_string(),
                reason,
            })
        })
    }

    /// `configured` when it is safe to route, the built-in default otherwise.
    #[must_use]
    pub fn resolve_default_path(&self, configured: &str) -> String {
        match self.validate_login(configured) {
            Ok(()) => configured.to_string(),
            Err(err) => {
                debug!("{err}, using {DEFAULT_LOGIN}");
                DEFAULT_LOGIN.to_string()
            }
        }
    }

    #[must_use]
    pub fn state(&self) -> PolarityState {
        match self.options.reversed_login() {
            Some(active) => PolarityState {
                mode: Mode::Reversed,
                active_secret_path: active,
                blocked_paths: self.options.blocked_paths(),
                reversion_due: self.scheduler.next_run(Task::StabilizePolarity),
            },
            None => PolarityState {
                mode: Mode::Normal,
                active_secret_path: self.resolve_default_path(&self.configured_login),
                blocked_paths: Vec::new(),
                reversion_due: None,
            },
        }
    }

    #[must_use]
    pub fn current_policy(&self) -> PolicyInput {
        let state = self.state();
        let mut blocked_paths = state.blocked_paths;
        blocked_paths.retain(|path| *path != state.active_secret_path);

        PolicyInput {
            secret_path: state.active_secret_path,
            permalinks_enabled: self.permalinks_enabled,
            blocked_paths,
        }
    }

    // Five digits, never one already routed or blocked.
    fn next_secret_path(&self, taken: &[String]) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            let candidate = format!("{:05}", rng.gen_range(0..=99_999u32));
            if !taken.contains(&candidate) {
                return candidate;
            }
        }
    }

    /// Move the login to a new random path.
    ///
    /// # Errors
    /// Returns `Error::FileUnwritable` if the rules can't be rewritten. The new
    /// path is kept regardless and picked up by the next reconcile.
    #[instrument(skip(self))]
    pub fn rotate(&self) -> Result<String, Error> {
        let state = self.state();
        let mut blocked_paths = state.blocked_paths;

        let mut taken = blocked_paths.clone();
        taken.push(state.active_secret_path.clone());
        taken.push(self.resolve_default_path(&self.configured_login));
        let secret_path = self.next_secret_path(&taken);

        if state.mode == Mode::Reversed {
            blocked_paths.push(state.active_secret_path);
            self.options.set_blocked_paths(&blocked_paths);
        }

        self.options.set_reversed_login(Some(&secret_path));

        if !self.scheduler.is_scheduled(Task::StabilizePolarity) {
            self.scheduler.schedule_once(
                config::delay(self.cooldown_seconds),
                Task::StabilizePolarity,
            );
        }

        info!(
            "polarity reversed, login moved to {secret_path} ({} blocked)",
            blocked_paths.len()
        );

        self.rewrite.reconcile(&self.current_policy())?;

        Ok(secret_path)
    }

    /// Return to the configured login path and forget every blocked path.
    ///
    /// # Errors
    /// Returns `Error::FileUnwritable` if the rules can't be rewritten.
    #[instrument(skip(self))]
    pub fn stabilize(&self) -> Result<Outcome, Error> {
        self.options.set_reversed_login(None);
        self.options.set_blocked_paths(&[]);
        self.scheduler.cancel(Task::StabilizePolarity);

        info!("polarity stabilized");

        self.rewrite.reconcile(&self.current_policy())
    }

    /// Reconcile the installed rules with the current policy.
    ///
    /// # Errors
    /// Returns `Error::FileUnwritable` if the rules can't be rewritten.
    pub fn check(&self) -> Result<Outcome, Error> {
        self.rewrite.reconcile(&self.current_policy())
    }
}

impl AttackResponder for PolarityController {
    fn rotate(&self) -> Result<String, Error> {
        PolarityController::rotate(self)
    }
}
