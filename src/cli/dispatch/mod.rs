use crate::cli::{
    actions::{
        server,
        shield::{self, Operation},
        Action,
    },
    commands::{self, detection, site},
};
use anyhow::{Context, Result};
use std::time::Duration;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let mut settings = site::Options::parse(matches)?.settings();
    detection::Options::parse(matches).apply(&mut settings);

    let (name, sub) = matches.subcommand().context("missing subcommand")?;

    let operation = match name {
        "serve" => {
            let port = sub.get_one::<u16>(commands::ARG_PORT).copied().unwrap_or(8080);
            let tick = sub.get_one::<u64>(commands::ARG_TICK).copied().unwrap_or(5);

            return Ok(Action::Server(server::Args {
                settings,
                port,
                tick: Duration::from_secs(tick),
            }));
        }
        "activate" => Operation::Activate,
        "deactivate" => Operation::Deactivate,
        "check" => Operation::Check,
        "hit" => Operation::Hit(
            sub.get_one::<String>(commands::ARG_CODE)
                .cloned()
                .context("missing login error code")?,
        ),
        "run-due" => Operation::RunDue,
        "rotate" => Operation::Rotate,
        "stabilize" => Operation::Stabilize,
        "status" => Operation::Status,
        "section" => Operation::Section,
        "login-url" => Operation::LoginUrl(
            sub.get_one::<String>(commands::ARG_URL)
                .cloned()
                .context("missing required argument: <url>")?,
        ),
        "diagnose" => Operation::Diagnose,
        other => anyhow::bail!("unknown subcommand: {other}"),
    };

    Ok(Action::Shield(shield::Args {
        settings,
        operation,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn dispatch(args: &[&str]) -> Result<Action> {
        let matches = commands::new().try_get_matches_from(args.iter().copied())?;
        handler(&matches)
    }

    #[test]
    fn test_shield_operation() -> Result<()> {
        let action = dispatch(&[
            "forcefield",
            "--document-root",
            "/srv/www",
            "--attack-threshold",
            "12",
            "hit",
            "invalid_username",
        ])?;

        let Action::Shield(args) = action else {
            panic!("expected a shield action");
        };
        assert_eq!(args.operation, Operation::Hit("invalid_username".to_string()));
        assert_eq!(args.settings.rules_file, PathBuf::from("/srv/www/.htaccess"));
        assert_eq!(args.settings.attack_threshold, 12);
        Ok(())
    }

    #[test]
    fn test_rules_file_override() -> Result<()> {
        let action = dispatch(&[
            "forcefield",
            "--document-root",
            "/srv/www",
            "--rules-file",
            "/etc/apache2/site.conf",
            "section",
        ])?;

        let Action::Shield(args) = action else {
            panic!("expected a shield action");
        };
        assert_eq!(args.operation, Operation::Section);
        assert_eq!(args.settings.rules_file, PathBuf::from("/etc/apache2/site.conf"));
        assert_eq!(args.settings.state_file, PathBuf::from("/srv/www/.forcefield.json"));
        Ok(())
    }

    #[test]
    fn test_server_action() -> Result<()> {
        let action = dispatch(&["forcefield", "serve", "--tick", "2"])?;

        let Action::Server(args) = action else {
            panic!("expected a server action");
        };
        assert_eq!(args.tick, Duration::from_secs(2));
        Ok(())
    }

    #[test]
    fn test_blank_marker_rejected() {
        assert!(dispatch(&["forcefield", "--marker", " ", "status"]).is_err());
    }
}
