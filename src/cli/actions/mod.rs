pub mod server;
pub mod shield;

// Single dispatch point, kept apart so this file stays small.
mod run;

#[derive(Debug)]
pub enum Action {
    Shield(shield::Args),
    Server(server::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
