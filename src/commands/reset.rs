use clap::Args;

use super::confirm;
use crate::store::RotationStore;

#[derive(Args)]
pub struct ResetCommand {
    /// Skip confirmation prompt
    #[arg(long, short)]
    pub force: bool,
}

impl ResetCommand {
    pub async fn run(
        &self,
        store: &mut dyn RotationStore,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if !self.force && !confirm("Delete all members, purchases and turns?")? {
            println!("Reset cancelled.");
            return Ok(());
        }

        store.reset_app().await?;
        println!("All data reset.");
        Ok(())
    }
}
