use crate::config::{self, Settings};
use clap::{Arg, ArgMatches, Command};

pub const ARG_ATTACK_WINDOW: &str = "attack-window";
pub const ARG_ATTACK_THRESHOLD: &str = "attack-threshold";
pub const ARG_COOLDOWN: &str = "cooldown";

#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub window_seconds: u64,
    pub threshold: u32,
    pub cooldown_seconds: u64,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            window_seconds: matches
                .get_one::<u64>(ARG_ATTACK_WINDOW)
                .copied()
                .unwrap_or(config::ATTACK_WINDOW_SECONDS),
            threshold: matches
                .get_one::<u32>(ARG_ATTACK_THRESHOLD)
                .copied()
                .unwrap_or(config::ATTACK_THRESHOLD),
            cooldown_seconds: matches
                .get_one::<u64>(ARG_COOLDOWN)
                .copied()
                .unwrap_or(config::COOLDOWN_SECONDS),
        }
    }

    pub fn apply(self, settings: &mut Settings) {
        settings.attack_window_seconds = self.window_seconds;
        settings.attack_threshold = self.threshold;
        settings.cooldown_seconds = self.cooldown_seconds;
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ATTACK_WINDOW)
                .long(ARG_ATTACK_WINDOW)
                .help("Seconds failed logins are counted before the rate is checked")
                .env("FORCEFIELD_ATTACK_WINDOW")
                .default_value("60")
                .global(true)
                .value_parser(clap::value_parser!(u64).range(1..=config::MAX_DELAY_SECONDS)),
        )
        .arg(
            Arg::new(ARG_ATTACK_THRESHOLD)
                .long(ARG_ATTACK_THRESHOLD)
                .help("Failed logins per minute above which the login path rotates")
                .env("FORCEFIELD_ATTACK_THRESHOLD")
                .default_value("30")
                .global(true)
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_COOLDOWN)
                .long(ARG_COOLDOWN)
                .help("Seconds after the first rotation before polarity returns to normal")
                .env("FORCEFIELD_COOLDOWN")
                .default_value("18000")
                .global(true)
                .value_parser(clap::value_parser!(u64).range(..=config::MAX_DELAY_SECONDS)),
        )
}
