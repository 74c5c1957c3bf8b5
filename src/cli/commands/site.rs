use crate::config::{self, Settings};
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

pub const ARG_DOCUMENT_ROOT: &str = "document-root";
pub const ARG_RULES_FILE: &str = "rules-file";
pub const ARG_STATE_FILE: &str = "state-file";
pub const ARG_LOGIN: &str = "login";
pub const ARG_PERMALINKS: &str = "permalinks";
pub const ARG_MARKER: &str = "marker";

#[derive(Debug, Clone)]
pub struct Options {
    pub document_root: PathBuf,
    pub rules_file: Option<PathBuf>,
    pub state_file: Option<PathBuf>,
    pub login: String,
    pub permalinks_enabled: bool,
    pub marker: String,
}

impl Options {
    /// Parse site arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the document root is missing or the marker is blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let document_root = matches
            .get_one::<PathBuf>(ARG_DOCUMENT_ROOT)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_DOCUMENT_ROOT}"))?;

        let marker = matches
            .get_one::<String>(ARG_MARKER)
            .map(|marker| marker.trim().to_string())
            .filter(|marker| !marker.is_empty())
            .ok_or_else(|| anyhow::anyhow!("--{ARG_MARKER} must not be empty"))?;

        Ok(Self {
            document_root,
            rules_file: matches.get_one::<PathBuf>(ARG_RULES_FILE).cloned(),
            state_file: matches.get_one::<PathBuf>(ARG_STATE_FILE).cloned(),
            login: matches
                .get_one::<String>(ARG_LOGIN)
                .cloned()
                .unwrap_or_else(|| config::DEFAULT_LOGIN.to_string()),
            permalinks_enabled: matches
                .get_one::<bool>(ARG_PERMALINKS)
                .copied()
                .unwrap_or(true),
            marker,
        })
    }

    /// Settings for this site with default detection tuning.
    #[must_use]
    pub fn settings(self) -> Settings {
        let mut settings = Settings::new(self.document_root);

        if let Some(rules_file) = self.rules_file {
            settings.rules_file = rules_file;
        }
        if let Some(state_file) = self.state_file {
            settings.state_file = state_file;
        }
        settings.login = self.login;
        settings.permalinks_enabled = self.permalinks_enabled;
        settings.marker = self.marker;

        settings
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_DOCUMENT_ROOT)
                .short('r')
                .long(ARG_DOCUMENT_ROOT)
                .help("Site document root")
                .env("FORCEFIELD_DOCUMENT_ROOT")
                .default_value(".")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(ARG_RULES_FILE)
                .long(ARG_RULES_FILE)
                .help("Rewrite configuration to manage (default: <document-root>/.htaccess)")
                .env("FORCEFIELD_RULES_FILE")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(ARG_STATE_FILE)
                .long(ARG_STATE_FILE)
                .help("Where options and scheduled tasks are kept (default: <document-root>/.forcefield.json)")
                .env("FORCEFIELD_STATE_FILE")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(ARG_LOGIN)
                .short('l')
                .long(ARG_LOGIN)
                .help("Login path used while polarity is normal")
                .env("FORCEFIELD_LOGIN")
                .default_value(config::DEFAULT_LOGIN)
                .global(true),
        )
        .arg(
            Arg::new(ARG_PERMALINKS)
                .long(ARG_PERMALINKS)
                .help("Whether pretty permalinks are enabled, adds the author enumeration block")
                .env("FORCEFIELD_PERMALINKS")
                .default_value("true")
                .global(true)
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_MARKER)
                .long(ARG_MARKER)
                .help("Name used in the BEGIN/END marker lines")
                .env("FORCEFIELD_MARKER")
                .default_value(config::DEFAULT_MARKER)
                .global(true),
        )
}
