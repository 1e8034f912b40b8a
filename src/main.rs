use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use foodrota::commands::{
    BuyCommand, ConfigCommand, HistoryCommand, MemberCommand, ResetCommand, SetupCommand,
    StatusCommand, TurnCommand,
};
use foodrota::config::Config;
use foodrota::store;

#[derive(Parser)]
#[command(name = "foodrota")]
#[command(version)]
#[command(about = "Keep track of whose turn it is to buy the dog food", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage family members
    Member(MemberCommand),

    /// Finish setup and start the rotation
    Setup,

    /// Record a purchase by whoever's turn it is
    Buy(BuyCommand),

    /// Show turns and when food is due
    Status(StatusCommand),

    /// Show purchase history
    History(HistoryCommand),

    /// Adjust, lock or reset turns
    Turn(TurnCommand),

    /// Delete all data
    Reset(ResetCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "foodrota=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Member(cmd)) => {
            let mut store = store::open(&config).await?;
            cmd.run(&mut *store).await?;
        }
        Some(Commands::Setup) => {
            let mut store = store::open(&config).await?;
            SetupCommand.run(&mut *store).await?;
        }
        Some(Commands::Buy(cmd)) => {
            let mut store = store::open(&config).await?;
            cmd.run(&mut *store).await?;
        }
        Some(Commands::Status(cmd)) => {
            let store = store::open(&config).await?;
            cmd.run(&*store)?;
        }
        Some(Commands::History(cmd)) => {
            let store = store::open(&config).await?;
            cmd.run(&*store)?;
        }
        Some(Commands::Turn(cmd)) => {
            let mut store = store::open(&config).await?;
            cmd.run(&mut *store).await?;
        }
        Some(Commands::Reset(cmd)) => {
            let mut store = store::open(&config).await?;
            cmd.run(&mut *store).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
