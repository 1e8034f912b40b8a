//! Errors surfaced by rotation stores.

use std::path::PathBuf;
use thiserror::Error;

use crate::models::FoodType;

/// Everything a store mutation can fail with. A failed mutation leaves the
/// store's observable state as it was.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Remote backend is not configured. Set database_path in config or FOODROTA_DATABASE_PATH.")]
    NotConfigured,

    #[error("No rotation state found")]
    RotationStateMissing,

    #[error("No current member found for {0} food")]
    NoCurrentMember(FoodType),

    #[error("Setup is not complete; add at least two members and finish setup first")]
    SetupIncomplete,

    #[error("Turns are locked")]
    TurnsLocked,

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Failed to save state to '{}': {source}", .path.display())]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}
