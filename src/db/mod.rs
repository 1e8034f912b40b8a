mod backend;
mod member_repo;
mod purchase_repo;
mod rotation_repo;

pub use backend::SqlBackend;
pub use member_repo::FamilyMemberRepository;
pub use purchase_repo::PurchaseRepository;
pub use rotation_repo::RotationStateRepository;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations
pub async fn init_db(path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite:{}?mode=rwc", path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Parses a stored RFC 3339 audit timestamp, falling back to now for bad rows.
fn parse_timestamp(value: &str) -> DateTime<Utc> {
    decode_timestamp(value).unwrap_or_else(|_| Utc::now())
}

/// Parses a stored RFC 3339 timestamp that carries meaning (purchase and
/// last-purchased dates). A bad value is a decode error.
fn decode_timestamp(value: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(format!("Invalid timestamp '{}': {}", value, e).into()))
}
