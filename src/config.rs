use chrono::TimeDelta;
use std::path::PathBuf;

/// Login slug used when none is configured or the configured one is invalid.
pub const DEFAULT_LOGIN: &str = "safe-entrance.php";
pub const DEFAULT_MARKER: &str = "FORCEFIELD";
pub const DEFAULT_RULES_FILE: &str = ".htaccess";
pub const DEFAULT_STATE_FILE: &str = ".forcefield.json";
pub const ATTACK_WINDOW_SECONDS: u64 = 60;
/// Failed logins per minute that count as an attack.
pub const ATTACK_THRESHOLD: u32 = 30;
pub const COOLDOWN_SECONDS: u64 = 18_000;
/// Longest window or cooldown accepted, one hundred years.
pub const MAX_DELAY_SECONDS: u64 = 100 * 365 * 86_400;

/// `seconds` as a scheduler delay, capped at `MAX_DELAY_SECONDS`.
#[must_use]
pub fn delay(seconds: u64) -> TimeDelta {
    i64::try_from(seconds.min(MAX_DELAY_SECONDS))
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Site root, where a configured login must not exist.
    pub document_root: PathBuf,
    pub rules_file: PathBuf,
    pub login: String,
    pub permalinks_enabled: bool,
    pub marker: String,
    pub state_file: PathBuf,
    pub attack_window_seconds: u64,
    pub attack_threshold: u32,
    pub cooldown_seconds: u64,
}

impl Settings {
    /// Defaults for a site rooted at `document_root`.
    #[must_use]
    pub fn new(document_root: impl Into<PathBuf>) -> Self {
        let document_root = document_root.into();

        Self {
            rules_file: document_root.join(DEFAULT_RULES_FILE),
            state_file: document_root.join(DEFAULT_STATE_FILE),
            document_root,
            login: DEFAULT_LOGIN.to_string(),
            permalinks_enabled: true,
            marker: DEFAULT_MARKER.to_string(),
            attack_window_seconds: ATTACK_WINDOW_SECONDS,
            attack_threshold: ATTACK_THRESHOLD,
            cooldown_seconds: COOLDOWN_SECONDS,
        }
    }
}
