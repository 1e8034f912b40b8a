use clap::{Args, Subcommand};

use super::{confirm, find_member, OutputFormat};
use crate::models::MAX_MEMBERS;
use crate::store::RotationStore;

#[derive(Args)]
pub struct MemberCommand {
    #[command(subcommand)]
    pub command: MemberSubcommand,
}

#[derive(Subcommand)]
pub enum MemberSubcommand {
    /// Add a family member to the end of the rotation
    Add {
        /// Member name (up to 20 characters)
        name: String,

        /// Display color (defaults to the next palette color)
        #[arg(long)]
        color: Option<String>,
    },

    /// Remove a family member
    Remove {
        /// Member ID or name
        identifier: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// List family members in rotation order
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl MemberCommand {
    pub async fn run(
        &self,
        store: &mut dyn RotationStore,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            MemberSubcommand::Add { name, color } => {
                let before = store.snapshot().family_members.len();
                store
                    .add_member(name, color.as_deref().unwrap_or(""))
                    .await?;

                // The local store ignores invalid adds, so compare counts
                let state = store.snapshot();
                if state.family_members.len() == before {
                    if before >= MAX_MEMBERS {
                        return Err(format!("Household already has {} members", MAX_MEMBERS).into());
                    }
                    return Err(format!("Invalid member name: '{}'", name).into());
                }

                if let Some(member) = state.family_members.last() {
                    println!("Added member: {} [{}]", member, member.id);
                }
                Ok(())
            }

            MemberSubcommand::Remove { identifier, force } => {
                let member = find_member(&store.snapshot(), identifier)?;

                if !force && !confirm(&format!("Remove member '{}'?", member.name))? {
                    println!("Removal cancelled.");
                    return Ok(());
                }

                store.remove_member(&member.id).await?;
                println!("Removed member: {}", member.name);
                Ok(())
            }

            MemberSubcommand::List { format } => {
                let state = store.snapshot();
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&state.family_members)?);
                    }
                    OutputFormat::Text => {
                        if state.family_members.is_empty() {
                            println!("No family members yet.");
                        }
                        for (i, member) in state.family_members.iter().enumerate() {
                            println!("{}. {}  {}", i, member, member.id);
                        }
                    }
                }
                Ok(())
            }
        }
    }
}
