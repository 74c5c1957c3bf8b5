//! Rolling-window failed login counter.
//!
//! The first failed login after an idle period opens a window and schedules a
//! single `CheckHits` task at the end of it. Later hits only bump the counter,
//! so the window length is fixed by its first hit. When the task fires the
//! rate is compared against the threshold, the responder rotates the secret
//! path if needed, and the counter goes back to zero whatever the verdict.

use crate::{
    config,
    error::Error,
    state::Options,
    store::{Clock, Scheduler, Task},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

/// Reacts to a detected attack.
pub trait AttackResponder {
    /// # Errors
    /// Returns an error if the new policy can't be applied.
    fn rotate(&self) -> Result<String, Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WindowState {
    Idle,
    WindowOpen,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WindowVerdict {
    pub hits: u64,
    /// Failed logins per minute over the window.
    pub rate: f64,
    pub rotated_to: Option<String>,
}

pub struct AttackMonitor {
    options: Options,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    window_seconds: u64,
    threshold: u32,
}

impl AttackMonitor {
    #[must_use]
    pub fn new(
        options: Options,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
        window_seconds: u64,
        threshold: u32,
    ) -> Self {
        Self {
            options,
            scheduler,
            clock,
            window_seconds: window_seconds.max(1),
            threshold,
        }
    }

    #[must_use]
    pub fn state(&self) -> WindowState {
        if self.scheduler.is_scheduled(Task::CheckHits) {
            WindowState::WindowOpen
        } else {
            WindowState::Idle
        }
    }

    #[must_use]
    pub fn hits(&self) -> u64 {
        self.options.hits()
    }

    /// Count one failed login.
    #[instrument(skip(self))]
    pub fn on_failed_login(&self) {
        if self.state() == WindowState::Idle {
            let start = self.clock.now();
            self.scheduler
                .schedule_once(config::delay(self.window_seconds), Task::CheckHits);
            self.options.set_window_start(Some(start));

            debug!("opened attack window at {start}");
        }

        let hits = self.options.hits() + 1;
        self.options.set_hits(hits);

        debug!("failed login {hits} in current window");
    }

    /// Close the window. Running it again for the same window finds no hits.
    ///
    /// # Errors
    /// Returns the responder's error if rotating fails; the counter is reset
    /// regardless.
    #[instrument(skip(self, responder))]
    pub fn evaluate_window(&self, responder: &dyn AttackResponder) -> Result<WindowVerdict, Error> {
        let hits = self.options.hits();

        #[allow(clippy::cast_precision_loss)]
        let rate = hits as f64 / (self.window_seconds as f64 / 60.0);

        let rotated = if rate > f64::from(self.threshold) {
            warn!(
                "attack detected: {rate:.1} failed logins/minute over threshold {}",
                self.threshold
            );
            Some(responder.rotate())
        } else {
            None
        };

        self.options.set_window_start(None);
        self.options.set_hits(0);

        info!("evaluated attack window: {hits} hits, {rate:.1}/minute");

        Ok(WindowVerdict {
            hits,
            rate,
            rotated_to: rotated.transpose()?,
        })
    }
}
