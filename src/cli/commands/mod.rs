pub mod detection;
pub mod logging;
pub mod site;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_PORT: &str = "port";
pub const ARG_TICK: &str = "tick";
pub const ARG_CODE: &str = "code";
pub const ARG_URL: &str = "url";

fn serve() -> Command {
    Command::new("serve")
        .about("Run the HTTP daemon and deliver scheduled tasks")
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("FORCEFIELD_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_TICK)
                .long(ARG_TICK)
                .help("Seconds between scheduler ticks")
                .default_value("5")
                .env("FORCEFIELD_TICK")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("forcefield")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(Command::new("activate").about("Seed options and install the rewrite rules"))
        .subcommand(
            Command::new("deactivate").about("Remove the rewrite rules, options and pending tasks"),
        )
        .subcommand(Command::new("check").about("Upgrade if needed and reconcile the rules"))
        .subcommand(
            Command::new("hit").about("Record a failed login").arg(
                Arg::new(ARG_CODE)
                    .help("Login error code, only invalid_username and incorrect_password count")
                    .default_value("incorrect_password"),
            ),
        )
        .subcommand(Command::new("run-due").about("Deliver scheduled tasks whose time has come"))
        .subcommand(Command::new("rotate").about("Move the login to a new secret path now"))
        .subcommand(Command::new("stabilize").about("Return to normal polarity now"))
        .subcommand(Command::new("status").about("Print the current state as JSON"))
        .subcommand(Command::new("section").about("Print the rule section for the current policy"))
        .subcommand(
            Command::new("login-url")
                .about("Rewrite a URL that points at the login handler")
                .arg(Arg::new(ARG_URL).required(true)),
        )
        .subcommand(Command::new("diagnose").about("Report configuration problems"))
        .subcommand(serve());

    let command = site::with_args(command);
    let command = detection::with_args(command);
    logging::with_args(command)
}
