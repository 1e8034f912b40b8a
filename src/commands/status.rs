use clap::Args;

use super::OutputFormat;
use crate::store::RotationStore;

#[derive(Args)]
pub struct StatusCommand {
    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl StatusCommand {
    pub fn run(&self, store: &dyn RotationStore) -> Result<(), Box<dyn std::error::Error>> {
        let state = store.snapshot();
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&state)?),
            OutputFormat::Text => print!("{}", state),
        }
        Ok(())
    }
}

/// Finishes setup once the household has enough members.
pub struct SetupCommand;

impl SetupCommand {
    pub async fn run(
        &self,
        store: &mut dyn RotationStore,
    ) -> Result<(), Box<dyn std::error::Error>> {
        store.complete_setup().await?;

        if store.snapshot().rotation.is_setup_complete {
            println!("Setup complete.");
            Ok(())
        } else {
            Err("Add at least two family members before finishing setup".into())
        }
    }
}
