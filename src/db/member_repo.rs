use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::FamilyMember;

pub struct FamilyMemberRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct FamilyMemberRow {
    id: String,
    name: String,
    color: String,
}

impl From<FamilyMemberRow> for FamilyMember {
    fn from(row: FamilyMemberRow) -> Self {
        FamilyMember {
            id: row.id,
            name: row.name,
            color: row.color,
        }
    }
}

impl FamilyMemberRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, member: &FamilyMember) -> Result<FamilyMember, sqlx::Error> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO family_members (id, name, color, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&member.id)
        .bind(&member.name)
        .bind(&member.color)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.get_by_id(&member.id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<FamilyMember>, sqlx::Error> {
        let row: Option<FamilyMemberRow> =
            sqlx::query_as("SELECT id, name, color FROM family_members WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(FamilyMember::from))
    }

    /// All members in rotation order (insertion order).
    pub async fn list(&self) -> Result<Vec<FamilyMember>, sqlx::Error> {
        let rows: Vec<FamilyMemberRow> = sqlx::query_as(
            "SELECT id, name, color FROM family_members ORDER BY created_at, rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FamilyMember::from).collect())
    }

    /// Returns true if a row was removed.
    pub async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM family_members WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Removes every member, returning the removed ids.
    pub async fn delete_all(&self) -> Result<Vec<String>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let ids: Vec<(String,)> = sqlx::query_as("SELECT id FROM family_members")
            .fetch_all(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM family_members")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }
}
