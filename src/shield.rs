//! The host-facing side: what to call on activation, on every request, on a
//! failed login, and when the scheduler fires.

use crate::{
    config::{Settings, DEFAULT_LOGIN},
    error::{Error, InvalidLogin},
    monitor::{AttackMonitor, WindowState, WindowVerdict},
    polarity::{PolarityController, PolarityState},
    rewrite::{Installation, Outcome, RewriteManager},
    rules::LOGIN_HANDLER,
    state::{self, Options},
    store::{Clock, Host, KeyValueStore, Scheduler, Task},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{path::PathBuf, sync::Arc};
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

/// Recorded after a successful upgrade.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Login error codes that count as a brute force hit.
pub const COUNTED_LOGIN_ERRORS: [&str; 2] = ["invalid_username", "incorrect_password"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    LoginExists,
    LoginHasSeparator,
    LoginHasWhitespace,
    LoginEmpty,
    RulesUnwritable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// Rules to paste into the file by hand, when it can't be written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Status {
    pub version: Option<String>,
    pub polarity: PolarityState,
    pub window: WindowState,
    pub hits: u64,
    pub window_start: Option<DateTime<Utc>>,
    #[schema(value_type = String)]
    pub rules_file: PathBuf,
    pub installation: Installation,
    pub consistent: bool,
    pub writable: bool,
}

pub struct ForceField {
    settings: Settings,
    options: Options,
    store: Arc<dyn KeyValueStore>,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    monitor: AttackMonitor,
    polarity: PolarityController,
}

impl ForceField {
    #[must_use]
    pub fn new(settings: Settings, host: Host) -> Self {
        let options = Options::new(host.store.clone());

        let rewrite = RewriteManager::new(
            host.files.clone(),
            settings.rules_file.clone(),
            settings.marker.clone(),
        );

        let polarity = PolarityController::new(
            options.clone(),
            host.scheduler.clone(),
            host.files,
            rewrite,
            host.rng,
            settings.document_root.clone(),
            settings.login.clone(),
            settings.permalinks_enabled,
            settings.cooldown_seconds,
        );

        let monitor = AttackMonitor::new(
            options.clone(),
            host.scheduler.clone(),
            host.clock.clone(),
            settings.attack_window_seconds,
            settings.attack_threshold,
        );

        Self {
            settings,
            options,
            store: host.store,
            scheduler: host.scheduler,
            clock: host.clock,
            monitor,
            polarity,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn polarity(&self) -> &PolarityController {
        &self.polarity
    }

    #[must_use]
    pub fn monitor(&self) -> &AttackMonitor {
        &self.monitor
    }

    fn rewrite(&self) -> &RewriteManager {
        self.polarity.rewrite()
    }

    /// Seed the options and install the rules.
    ///
    /// # Errors
    /// Returns `Error::FileUnwritable` if the rules can't be written.
    #[instrument(skip(self))]
    pub fn activate(&self) -> Result<Outcome, Error> {
        self.options.set_hits(0);

        if self.store.get(state::REVERSE_POLARITY_OPTION).is_none() {
            self.options.set_reversed_login(None);
        }
        if self.store.get(state::OPTIONAL_BLOCKS_OPTION).is_none() {
            self.options.set_blocked_paths(&[]);
        }

        info!("activated on {}", self.settings.rules_file.display());

        self.on_request()
    }

    /// Remove the rules, every option and both pending tasks.
    ///
    /// # Errors
    /// Returns `Error::FileUnwritable` if the rules can't be removed; options and
    /// tasks are cleared anyway.
    #[instrument(skip(self))]
    pub fn deactivate(&self) -> Result<Outcome, Error> {
        let removed = self.rewrite().uninstall();

        self.options.clear();
        for task in Task::ALL {
            self.scheduler.cancel(task);
        }

        info!("deactivated");

        removed
    }

    /// Normalise installations made before the version marker existed.
    ///
    /// # Errors
    /// Returns `Error::FileUnwritable` if the rules can't be rewritten.
    pub fn upgrade(&self) -> Result<Outcome, Error> {
        let installed = self.options.version();
        if installed.as_deref() == Some(VERSION) {
            return Ok(Outcome::Unchanged);
        }

        let outcome = if installed.is_none() {
            debug!("no version recorded, reinstalling rules");
            self.rewrite().reinstall(&self.polarity.current_policy())?
        } else {
            Outcome::Unchanged
        };

        self.options.set_version(VERSION);
        info!(
            "upgraded from {} to {VERSION}",
            installed.as_deref().unwrap_or("legacy")
        );

        Ok(outcome)
    }

    /// Called on every request: upgrade if needed, then keep the rules current.
    ///
    /// # Errors
    /// Returns `Error::FileUnwritable` if the rules can't be rewritten.
    pub fn on_request(&self) -> Result<Outcome, Error> {
        let upgraded = self.upgrade()?;
        let checked = self.polarity.check()?;

        if upgraded == Outcome::Written || checked == Outcome::Written {
            Ok(Outcome::Written)
        } else {
            Ok(Outcome::Unchanged)
        }
    }

    /// Count a failed login. Returns whether `code` was counted.
    pub fn on_login_error(&self, code: &str) -> bool {
        if !COUNTED_LOGIN_ERRORS.contains(&code) {
            debug!("ignoring login error {code}");
            return false;
        }

        self.monitor.on_failed_login();
        true
    }

    /// # Errors
    /// Returns `Error::FileUnwritable` if a rotation can't rewrite the rules.
    pub fn evaluate_window(&self) -> Result<WindowVerdict, Error> {
        self.monitor.evaluate_window(&self.polarity)
    }

    /// # Errors
    /// Returns `Error::FileUnwritable` if the rules can't be rewritten.
    pub fn rotate(&self) -> Result<String, Error> {
        self.polarity.rotate()
    }

    /// # Errors
    /// Returns `Error::FileUnwritable` if the rules can't be rewritten.
    pub fn stabilize(&self) -> Result<Outcome, Error> {
        self.polarity.stabilize()
    }

    /// Deliver every task whose time has come. Each task is taken off the
    /// schedule before it runs, so a failure is not retried by the next call.
    ///
    /// # Errors
    /// Returns the first task error.
    #[instrument(skip(self))]
    pub fn run_due(&self) -> Result<Vec<Task>, Error> {
        let now = self.clock.now();
        let mut delivered = Vec::new();

        for task in Task::ALL {
            let Some(due) = self.scheduler.next_run(task) else {
                continue;
            };
            if due > now {
                continue;
            }

            self.scheduler.cancel(task);
            debug!("delivering {} due at {due}", task.id());

            let result = match task {
                Task::CheckHits => self.evaluate_window().map(|_| ()),
                Task::StabilizePolarity => self.stabilize().map(|_| ()),
            };

            if let Err(err) = result {
                error!("{} failed: {err}", task.id());
                return Err(err);
            }

            delivered.push(task);
        }

        Ok(delivered)
    }

    /// Point any reference to the real login handler at the active secret path.
    #[must_use]
    pub fn login_url(&self, url: &str) -> String {
        if !url.contains(LOGIN_HANDLER) {
            return url.to_string();
        }

        url.replace(LOGIN_HANDLER, &self.polarity.state().active_secret_path)
    }

    /// Problems an administrator should be told about.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let login = self.polarity.configured_login();

        if let Err(Error::ConfigurationInvalid { reason, .. }) = self.polarity.validate_login(login) {
            let kind = match reason {
                InvalidLogin::Empty => DiagnosticKind::LoginEmpty,
                InvalidLogin::Exists => DiagnosticKind::LoginExists,
                InvalidLogin::Separator => DiagnosticKind::LoginHasSeparator,
                InvalidLogin::Whitespace => DiagnosticKind::LoginHasWhitespace,
            };
            diagnostics.push(Diagnostic {
                kind,
                message: format!(
                    "Invalid login {login:?}: {reason}. Currently using the default {}.",
                    DEFAULT_LOGIN
                ),
                section: None,
            });
        }

        let rewrite = self.rewrite();
        if !rewrite.is_writable() {
            let mut section = rewrite.section(&self.polarity.current_policy());
            if section.first().is_some_and(String::is_empty) {
                section.remove(0);
            }
            diagnostics.push(Diagnostic {
                kind: DiagnosticKind::RulesUnwritable,
                message: format!(
                    "Can't modify {}. Add the following to the top of the file by hand; automated brute force protection needs write access.",
                    rewrite.path().display()
                ),
                section: Some(section),
            });
        }

        diagnostics
    }

    #[must_use]
    pub fn status(&self) -> Status {
        let policy = self.polarity.current_policy();
        let rewrite = self.rewrite();

        Status {
            version: self.options.version(),
            polarity: self.polarity.state(),
            window: self.monitor.state(),
            hits: self.monitor.hits(),
            window_start: self.options.window_start(),
            rules_file: rewrite.path().to_path_buf(),
            installation: rewrite.installation(),
            consistent: rewrite.is_consistent(&policy),
            writable: rewrite.is_writable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config,
        polarity::Mode,
        rules,
        store::{ManualClock, MemoryFiles},
    };
    use chrono::TimeDelta;
    use std::path::Path;

    const HTACCESS: &str = "/srv/www/.htaccess";

    struct Fixture {
        files: MemoryFiles,
        clock: Arc<ManualClock>,
        shield: ForceField,
    }

    fn fixture() -> Fixture {
        let files = MemoryFiles::default();
        files.insert(
            HTACCESS,
            &["# BEGIN WordPress", "RewriteEngine On", "# END WordPress"],
        );
        let clock = Arc::new(ManualClock::new(DateTime::<Utc>::UNIX_EPOCH));
        let host = Host::in_memory(files.clone(), clock.clone(), 42);
        let mut settings = Settings::new("/srv/www");
        settings.marker = "FF".to_string();

        Fixture {
            files,
            clock,
            shield: ForceField::new(settings, host),
        }
    }

    fn contents(files: &MemoryFiles) -> Vec<String> {
        files.lines(Path::new(HTACCESS)).unwrap_or_default()
    }

    #[test]
    fn activate_installs_rules_and_records_version() {
        let fx = fixture();
        assert_eq!(fx.shield.activate().unwrap(), Outcome::Written);

        let status = fx.shield.status();
        assert_eq!(status.version.as_deref(), Some(VERSION));
        assert_eq!(status.installation, Installation::Installed);
        assert!(status.consistent);
        assert_eq!(status.polarity.mode, Mode::Normal);
        assert_eq!(status.hits, 0);

        let lines = contents(&fx.files);
        assert_eq!(lines.iter().filter(|line| *line == "# BEGIN FF").count(), 1);
    }

    #[test]
    fn on_request_is_idempotent() {
        let fx = fixture();
        fx.shield.activate().unwrap();
        let installed = contents(&fx.files);

        assert_eq!(fx.shield.on_request().unwrap(), Outcome::Unchanged);
        assert_eq!(fx.shield.on_request().unwrap(), Outcome::Unchanged);
        assert_eq!(contents(&fx.files), installed);
    }

    #[test]
    fn legacy_install_is_reinstalled_once() {
        let fx = fixture();
        fx.files.insert(
            HTACCESS,
            &["# BEGIN FF", "RewriteRule ^old$ wp-login.php [NC,L]", "# END FF", "rest"],
        );

        assert_eq!(fx.shield.upgrade().unwrap(), Outcome::Written);
        assert_eq!(fx.shield.upgrade().unwrap(), Outcome::Unchanged);

        let policy = fx.shield.polarity().current_policy();
        assert_eq!(fx.shield.polarity().rewrite().installed_lines(), rules::generate(&policy));
        assert_eq!(contents(&fx.files).last().map(String::as_str), Some("rest"));
    }

    #[test]
    fn only_credential_errors_count() {
        let fx = fixture();
        assert!(fx.shield.on_login_error("invalid_username"));
        assert!(fx.shield.on_login_error("incorrect_password"));
        assert!(!fx.shield.on_login_error("empty_password"));
        assert_eq!(fx.shield.monitor().hits(), 2);
    }

    #[test]
    fn attack_rotates_then_stabilizes() {
        let fx = fixture();
        fx.shield.activate().unwrap();

        for _ in 0..31 {
            fx.shield.on_login_error("incorrect_password");
        }

        // nothing is due before the window closes
        assert!(fx.shield.run_due().unwrap().is_empty());

        fx.clock.advance(TimeDelta::seconds(60));
        assert_eq!(fx.shield.run_due().unwrap(), vec![Task::CheckHits]);

        let status = fx.shield.status();
        assert_eq!(status.polarity.mode, Mode::Reversed);
        assert_eq!(status.window, WindowState::Idle);
        assert_eq!(status.hits, 0);
        assert!(status.consistent);
        let secret = status.polarity.active_secret_path;
        assert_eq!(
            fx.shield.login_url("https://example.com/wp-login.php?action=lostpassword"),
            format!("https://example.com/{secret}?action=lostpassword")
        );

        fx.clock.advance(TimeDelta::seconds(18_000));
        assert_eq!(fx.shield.run_due().unwrap(), vec![Task::StabilizePolarity]);

        let status = fx.shield.status();
        assert_eq!(status.polarity.mode, Mode::Normal);
        assert_eq!(status.polarity.active_secret_path, "safe-entrance.php");
        assert!(status.consistent);
        assert!(fx.shield.run_due().unwrap().is_empty());
    }

    #[test]
    fn deactivate_cleans_everything() {
        let fx = fixture();
        fx.shield.activate().unwrap();
        fx.shield.on_login_error("invalid_username");
        fx.shield.rotate().unwrap();

        assert_eq!(fx.shield.deactivate().unwrap(), Outcome::Written);

        let status = fx.shield.status();
        assert_eq!(status.installation, Installation::Absent);
        assert_eq!(status.version, None);
        assert_eq!(status.window, WindowState::Idle);
        assert_eq!(status.polarity.mode, Mode::Normal);
        assert_eq!(status.polarity.reversion_due, None);
        assert_eq!(
            contents(&fx.files),
            vec!["", "# BEGIN WordPress", "RewriteEngine On", "# END WordPress"]
        );
    }

    #[test]
    fn login_url_leaves_other_urls_alone() {
        let fx = fixture();
        assert_eq!(fx.shield.login_url("/wp-admin/"), "/wp-admin/");
        assert_eq!(fx.shield.login_url("/wp-login.php"), "/safe-entrance.php");
    }

    #[test]
    fn diagnostics_report_unwritable_rules() {
        let fx = fixture();
        assert!(fx.shield.diagnostics().is_empty());

        fx.files.set_read_only(HTACCESS, true);
        let diagnostics = fx.shield.diagnostics();

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::RulesUnwritable);
        let section = diagnostics[0].section.clone().unwrap_or_default();
        assert_eq!(section.first().map(String::as_str), Some("# BEGIN FF"));
    }

    #[test]
    fn diagnostics_report_invalid_login() {
        let files = MemoryFiles::default();
        files.mkdir("/srv/www/wp-admin");
        let clock = Arc::new(ManualClock::new(DateTime::<Utc>::UNIX_EPOCH));
        let mut settings = Settings::new("/srv/www");
        settings.login = "wp-admin".to_string();
        let shield = ForceField::new(settings, Host::in_memory(files, clock, 1));

        let diagnostics = shield.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::LoginExists);
        assert_eq!(
            shield.polarity().current_policy().secret_path,
            "safe-entrance.php"
        );
    }

    #[test]
    fn diagnostics_report_login_with_whitespace() {
        let files = MemoryFiles::default();
        let clock = Arc::new(ManualClock::new(DateTime::<Utc>::UNIX_EPOCH));
        let mut settings = Settings::new("/srv/www");
        settings.login = "my door".to_string();
        let shield = ForceField::new(settings, Host::in_memory(files, clock, 1));

        let diagnostics = shield.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::LoginHasWhitespace);

        shield.activate().unwrap();
        let installed = shield.polarity().rewrite().installed_lines();
        assert!(installed.contains(&rules::route_rule("safe-entrance.php")));
        assert!(!installed.iter().any(|line| line.contains("my door")));
    }

    #[test]
    fn oversized_delays_are_capped() {
        let files = MemoryFiles::default();
        let clock = Arc::new(ManualClock::new(DateTime::<Utc>::UNIX_EPOCH));
        let mut settings = Settings::new("/srv/www");
        settings.cooldown_seconds = 10_000_000_000_000;
        settings.attack_window_seconds = u64::MAX;
        let shield = ForceField::new(settings, Host::in_memory(files, clock, 3));

        assert!(shield.on_login_error("incorrect_password"));
        shield.rotate().unwrap();

        let longest = DateTime::<Utc>::UNIX_EPOCH + config::delay(config::MAX_DELAY_SECONDS);
        assert_eq!(shield.status().polarity.reversion_due, Some(longest));
        assert!(shield.run_due().unwrap().is_empty());
    }
}
