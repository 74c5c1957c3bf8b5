use crate::{
    config::Settings,
    shield::{Diagnostic, ForceField},
    store::{Host, Task},
};
use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Activate,
    Deactivate,
    Check,
    Hit(String),
    RunDue,
    Rotate,
    Stabilize,
    Status,
    Section,
    LoginUrl(String),
    Diagnose,
}

#[derive(Debug)]
pub struct Args {
    pub settings: Settings,
    pub operation: Operation,
}

/// Run one operation against the persisted site state and print the result as
/// JSON on stdout.
///
/// # Errors
/// Returns an error if the state file can't be opened or the operation fails.
pub fn execute(args: Args) -> Result<()> {
    debug!("settings: {:?}", args.settings);

    let host = Host::persistent(&args.settings).with_context(|| {
        format!(
            "could not open state file {}",
            args.settings.state_file.display()
        )
    })?;
    let shield = ForceField::new(args.settings, host);

    let output = run(&shield, &args.operation)?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

/// # Errors
/// Returns an error if the operation fails.
pub fn run(shield: &ForceField, operation: &Operation) -> Result<Value> {
    let output = match operation {
        Operation::Activate => json!({ "outcome": shield.activate()? }),
        Operation::Deactivate => json!({ "outcome": shield.deactivate()? }),
        Operation::Check => json!({ "outcome": shield.on_request()? }),
        Operation::Hit(code) => json!({
            "counted": shield.on_login_error(code),
            "hits": shield.monitor().hits(),
            "window": shield.monitor().state(),
        }),
        Operation::RunDue => {
            let delivered: Vec<&str> = shield.run_due()?.into_iter().map(Task::id).collect();
            json!({ "delivered": delivered })
        }
        Operation::Rotate => json!({ "secret_path": shield.rotate()? }),
        Operation::Stabilize => json!({ "outcome": shield.stabilize()? }),
        Operation::Status => serde_json::to_value(shield.status())?,
        Operation::Section => {
            let rewrite = shield.polarity().rewrite();
            json!({
                "path": rewrite.path(),
                "section": rewrite.section(&shield.polarity().current_policy()),
            })
        }
        Operation::LoginUrl(url) => json!({ "url": shield.login_url(url) }),
        Operation::Diagnose => {
            let diagnostics = shield.diagnostics();
            log_diagnostics(&diagnostics);
            serde_json::to_value(diagnostics)?
        }
    };

    Ok(output)
}

fn log_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        warn!("{}", diagnostic.message);
    }
}
