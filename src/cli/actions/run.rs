use crate::cli::actions::{server, shield, Action};
use anyhow::Result;

/// Execute the provided action.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Shield(args) => shield::execute(args),
        Action::Server(args) => server::execute(args).await,
    }
}
