use crate::{api, config::Settings, store::Host, ForceField};
use anyhow::{Context, Result};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub settings: Settings,
    pub port: u16,
    pub tick: Duration,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the state file can't be opened or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let host = Host::persistent(&args.settings).with_context(|| {
        format!(
            "could not open state file {}",
            args.settings.state_file.display()
        )
    })?;
    let shield = Arc::new(Mutex::new(ForceField::new(args.settings, host)));

    api::new(args.port, shield, args.tick).await
}

fn log_startup_args(args: &Args) {
    let settings = &args.settings;
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("tick", format!("{}s", args.tick.as_secs())),
        ("document_root", settings.document_root.display().to_string()),
        ("rules_file", settings.rules_file.display().to_string()),
        ("state_file", settings.state_file.display().to_string()),
        ("login", settings.login.clone()),
        ("marker", settings.marker.clone()),
        ("permalinks", settings.permalinks_enabled.to_string()),
        ("attack_window", format!("{}s", settings.attack_window_seconds)),
        ("attack_threshold", format!("{}/min", settings.attack_threshold)),
        ("cooldown", format!("{}s", settings.cooldown_seconds)),
    ];
    log_entries("Startup configuration", &entries);
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!("{}\n\n{title}:", banner());
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn banner() -> String {
    BANNER.replace(
        "{VERSION}",
        &format!(" - {} - {}", crate::APP_USER_AGENT, short_commit(crate::GIT_COMMIT_HASH)),
    )
}

fn short_commit(hash: &str) -> String {
    hash.trim().chars().take(7).collect()
}

const BANNER: &str = r"
   .-----.
  /  .-.  \
 |  /   \  |  F O R C E F I E L D {VERSION}
  \  '-'  /
   '-----'";
