use clap::Args;

use super::{find_member, OutputFormat};
use crate::models::FoodType;
use crate::store::RotationStore;

#[derive(Args)]
pub struct BuyCommand {
    /// Food type bought (wet or dry)
    pub food_type: FoodType,

    /// Amount spent
    #[arg(long)]
    pub amount: Option<f64>,
}

impl BuyCommand {
    pub async fn run(
        &self,
        store: &mut dyn RotationStore,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let buyer = store
            .snapshot()
            .current_member(self.food_type)
            .map(|m| m.name.clone());

        store.record_purchase(self.food_type, self.amount).await?;

        let state = store.snapshot();
        if let Some(name) = buyer {
            println!("Recorded {} food bought by {}", self.food_type, name);
        }
        if let Some(next) = state.current_member(self.food_type) {
            println!("Next {} food turn: {}", self.food_type, next.name);
        }
        Ok(())
    }
}

#[derive(Args)]
pub struct HistoryCommand {
    /// Only show purchases by this member (ID or name)
    #[arg(long)]
    pub member: Option<String>,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl HistoryCommand {
    pub fn run(&self, store: &dyn RotationStore) -> Result<(), Box<dyn std::error::Error>> {
        let state = store.snapshot();
        let member_id = match &self.member {
            Some(identifier) => Some(find_member(&state, identifier)?.id),
            None => None,
        };
        let purchases = state.history(member_id.as_deref());

        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&purchases)?);
            }
            OutputFormat::Text => {
                if purchases.is_empty() {
                    println!("No purchases recorded.");
                }
                for purchase in purchases {
                    println!("{}", purchase);
                }
            }
        }
        Ok(())
    }
}
