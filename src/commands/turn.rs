use clap::{Args, Subcommand};

use super::find_member;
use crate::models::FoodType;
use crate::store::{InitialTurns, RotationStore};

#[derive(Args)]
pub struct TurnCommand {
    #[command(subcommand)]
    pub command: TurnSubcommand,
}

#[derive(Subcommand)]
pub enum TurnSubcommand {
    /// Set whose turn it is by position in the member list
    Set {
        /// Food type (wet or dry)
        food_type: FoodType,

        /// Zero-based member position
        index: usize,
    },

    /// Lock turns against manual changes until the next full reset
    Lock,

    /// Put both turns back on the first member
    Reset,

    /// Set who bought last and whose turn it is (member ID or name)
    Init {
        #[arg(long)]
        wet_last: String,

        #[arg(long)]
        dry_last: String,

        #[arg(long)]
        wet_current: String,

        #[arg(long)]
        dry_current: String,
    },
}

impl TurnCommand {
    pub async fn run(
        &self,
        store: &mut dyn RotationStore,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            TurnSubcommand::Set { food_type, index } => {
                store.update_turn(*food_type, *index).await?;
                if let Some(member) = store.snapshot().current_member(*food_type) {
                    println!("{} food turn: {}", food_type, member.name);
                }
            }
            TurnSubcommand::Lock => {
                store.lock_turns().await?;
                println!("Turns locked.");
            }
            TurnSubcommand::Reset => {
                store.reset_turns().await?;
                println!("Turns reset to the first member.");
            }
            TurnSubcommand::Init {
                wet_last,
                dry_last,
                wet_current,
                dry_current,
            } => {
                let state = store.snapshot();
                let turns = InitialTurns {
                    wet_last_bought_by: find_member(&state, wet_last)?.id,
                    dry_last_bought_by: find_member(&state, dry_last)?.id,
                    wet_current_turn: find_member(&state, wet_current)?.id,
                    dry_current_turn: find_member(&state, dry_current)?.id,
                };

                store.set_initial_state(&turns).await?;
                println!("Initial turns set.");
            }
        }
        Ok(())
    }
}
