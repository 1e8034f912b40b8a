mod config_cmd;
mod member;
mod purchase;
mod reset;
mod status;
mod turn;

pub use config_cmd::ConfigCommand;
pub use member::MemberCommand;
pub use purchase::{BuyCommand, HistoryCommand};
pub use reset::ResetCommand;
pub use status::{SetupCommand, StatusCommand};
pub use turn::TurnCommand;

use clap::ValueEnum;
use std::io::{self, Write};

use crate::models::{AppState, FamilyMember};

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Looks a member up by id or name.
fn find_member(
    state: &AppState,
    identifier: &str,
) -> Result<FamilyMember, Box<dyn std::error::Error>> {
    state
        .find_member(identifier)
        .cloned()
        .ok_or_else(|| format!("Member not found: {}", identifier).into())
}

/// Asks a yes/no question on stdin. Anything but "y" is a no.
fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
