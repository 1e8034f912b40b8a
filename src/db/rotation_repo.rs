use sqlx::SqlitePool;

use super::{decode_timestamp, parse_timestamp};
use crate::models::RotationRecord;

/// Access to the singleton `rotation_state` row.
pub struct RotationStateRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct RotationRow {
    id: String,
    wet_food_current_index: i64,
    dry_food_current_index: i64,
    wet_food_days_between: i64,
    dry_food_days_between: i64,
    wet_food_last_purchased: Option<String>,
    dry_food_last_purchased: Option<String>,
    wet_food_last_purchased_by: Option<String>,
    dry_food_last_purchased_by: Option<String>,
    is_setup_complete: bool,
    created_at: String,
    updated_at: String,
}

impl TryFrom<RotationRow> for RotationRecord {
    type Error = sqlx::Error;

    fn try_from(row: RotationRow) -> Result<Self, Self::Error> {
        let decode_optional =
            |value: Option<String>| value.as_deref().map(decode_timestamp).transpose();

        Ok(RotationRecord {
            id: row.id,
            wet_food_current_index: row.wet_food_current_index.max(0) as usize,
            dry_food_current_index: row.dry_food_current_index.max(0) as usize,
            wet_food_days_between: row.wet_food_days_between.max(0) as u32,
            dry_food_days_between: row.dry_food_days_between.max(0) as u32,
            wet_food_last_purchased: decode_optional(row.wet_food_last_purchased)?,
            dry_food_last_purchased: decode_optional(row.dry_food_last_purchased)?,
            wet_food_last_purchased_by: row.wet_food_last_purchased_by,
            dry_food_last_purchased_by: row.dry_food_last_purchased_by,
            is_setup_complete: row.is_setup_complete,
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
        })
    }
}

impl RotationStateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self) -> Result<Option<RotationRecord>, sqlx::Error> {
        let row: Option<RotationRow> =
            sqlx::query_as("SELECT * FROM rotation_state ORDER BY created_at LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;

        row.map(RotationRecord::try_from).transpose()
    }

    pub async fn create(&self, record: &RotationRecord) -> Result<RotationRecord, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO rotation_state (
                id, wet_food_current_index, dry_food_current_index,
                wet_food_days_between, dry_food_days_between,
                wet_food_last_purchased, dry_food_last_purchased,
                wet_food_last_purchased_by, dry_food_last_purchased_by,
                is_setup_complete, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(record.wet_food_current_index as i64)
        .bind(record.dry_food_current_index as i64)
        .bind(i64::from(record.wet_food_days_between))
        .bind(i64::from(record.dry_food_days_between))
        .bind(record.wet_food_last_purchased.map(|t| t.to_rfc3339()))
        .bind(record.dry_food_last_purchased.map(|t| t.to_rfc3339()))
        .bind(&record.wet_food_last_purchased_by)
        .bind(&record.dry_food_last_purchased_by)
        .bind(record.is_setup_complete)
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.get().await?.ok_or(sqlx::Error::RowNotFound)
    }

    /// Writes every mutable column of `record` back to its row.
    pub async fn save(&self, record: &RotationRecord) -> Result<RotationRecord, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE rotation_state
            SET wet_food_current_index = ?, dry_food_current_index = ?,
                wet_food_days_between = ?, dry_food_days_between = ?,
                wet_food_last_purchased = ?, dry_food_last_purchased = ?,
                wet_food_last_purchased_by = ?, dry_food_last_purchased_by = ?,
                is_setup_complete = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(record.wet_food_current_index as i64)
        .bind(record.dry_food_current_index as i64)
        .bind(i64::from(record.wet_food_days_between))
        .bind(i64::from(record.dry_food_days_between))
        .bind(record.wet_food_last_purchased.map(|t| t.to_rfc3339()))
        .bind(record.dry_food_last_purchased.map(|t| t.to_rfc3339()))
        .bind(&record.wet_food_last_purchased_by)
        .bind(&record.dry_food_last_purchased_by)
        .bind(record.is_setup_complete)
        .bind(record.updated_at.to_rfc3339())
        .bind(&record.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }
        self.get().await?.ok_or(sqlx::Error::RowNotFound)
    }
}
