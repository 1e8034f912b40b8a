use chrono::Utc;
use sqlx::SqlitePool;
use std::str::FromStr;

use super::decode_timestamp;
use crate::models::{FoodType, Purchase, UNKNOWN_MEMBER};

pub struct PurchaseRepository {
    pool: SqlitePool,
}

// Member name comes from a LEFT JOIN so history survives member removal
#[derive(sqlx::FromRow)]
struct PurchaseRow {
    id: String,
    family_member_id: String,
    family_member_name: Option<String>,
    food_type: String,
    purchase_date: String,
    amount: Option<f64>,
}

const SELECT_PURCHASES: &str = r#"
    SELECT p.id, p.family_member_id, m.name AS family_member_name,
           p.food_type, p.purchase_date, p.amount
    FROM purchases p
    LEFT JOIN family_members m ON m.id = p.family_member_id
"#;

impl PurchaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, purchase: &Purchase) -> Result<Purchase, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO purchases (id, family_member_id, food_type, purchase_date, amount, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&purchase.id)
        .bind(&purchase.family_member_id)
        .bind(purchase.food_type.as_str())
        .bind(purchase.date.to_rfc3339())
        .bind(purchase.amount)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.get_by_id(&purchase.id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Purchase>, sqlx::Error> {
        let query = format!("{} WHERE p.id = ?", SELECT_PURCHASES);
        let row: Option<PurchaseRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(hydrate_purchase).transpose()
    }

    /// All purchases, newest first.
    pub async fn list(&self) -> Result<Vec<Purchase>, sqlx::Error> {
        let query = format!("{} ORDER BY p.purchase_date DESC", SELECT_PURCHASES);
        let rows: Vec<PurchaseRow> = sqlx::query_as(&query).fetch_all(&self.pool).await?;

        rows.into_iter().map(hydrate_purchase).collect()
    }

    /// Removes the whole history, returning the removed ids.
    pub async fn delete_all(&self) -> Result<Vec<String>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let ids: Vec<(String,)> = sqlx::query_as("SELECT id FROM purchases")
            .fetch_all(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM purchases")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }
}

fn hydrate_purchase(row: PurchaseRow) -> Result<Purchase, sqlx::Error> {
    let food_type = FoodType::from_str(&row.food_type).map_err(|e| sqlx::Error::Decode(e.into()))?;

    Ok(Purchase {
        id: row.id,
        family_member_id: row.family_member_id,
        family_member_name: row
            .family_member_name
            .unwrap_or_else(|| UNKNOWN_MEMBER.to_string()),
        food_type,
        date: decode_timestamp(&row.purchase_date)?,
        amount: row.amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_db, FamilyMemberRepository};
    use crate::models::FamilyMember;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    struct TestContext {
        members: FamilyMemberRepository,
        repo: PurchaseRepository,
        _temp_dir: TempDir,
    }

    async fn setup_repo() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(&temp_dir.path().join("test.db")).await.unwrap();
        TestContext {
            members: FamilyMemberRepository::new(pool.clone()),
            repo: PurchaseRepository::new(pool),
            _temp_dir: temp_dir,
        }
    }

    #[tokio::test]
    async fn test_create_purchase_joins_member_name() {
        let ctx = setup_repo().await;
        let alice = ctx
            .members
            .create(&FamilyMember::new("Alice", "blue"))
            .await
            .unwrap();

        let purchase = Purchase::new(&alice, FoodType::Wet, Utc::now()).with_amount(Some(4.5));
        let created = ctx.repo.create(&purchase).await.unwrap();

        assert_eq!(created.family_member_name, "Alice");
        assert_eq!(created.food_type, FoodType::Wet);
        assert_eq!(created.amount, Some(4.5));
    }

    #[tokio::test]
    async fn test_history_survives_member_removal() {
        let ctx = setup_repo().await;
        let alice = ctx
            .members
            .create(&FamilyMember::new("Alice", "blue"))
            .await
            .unwrap();
        ctx.repo
            .create(&Purchase::new(&alice, FoodType::Dry, Utc::now()))
            .await
            .unwrap();

        ctx.members.delete(&alice.id).await.unwrap();

        let history = ctx.repo.list().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].family_member_name, UNKNOWN_MEMBER);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let ctx = setup_repo().await;
        let alice = ctx
            .members
            .create(&FamilyMember::new("Alice", "blue"))
            .await
            .unwrap();
        let bob = ctx
            .members
            .create(&FamilyMember::new("Bob", "red"))
            .await
            .unwrap();

        let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        ctx.repo
            .create(&Purchase::new(&alice, FoodType::Wet, base))
            .await
            .unwrap();
        ctx.repo
            .create(&Purchase::new(&bob, FoodType::Wet, base + Duration::days(1)))
            .await
            .unwrap();
        ctx.repo
            .create(&Purchase::new(&alice, FoodType::Dry, base + Duration::days(2)))
            .await
            .unwrap();

        let all = ctx.repo.list().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].date, base + Duration::days(2));
        assert_eq!(all[2].date, base);
        assert_eq!(all[1].family_member_name, "Bob");
    }

    #[tokio::test]
    async fn test_corrupt_purchase_date_is_an_error() {
        let ctx = setup_repo().await;
        let alice = ctx
            .members
            .create(&FamilyMember::new("Alice", "blue"))
            .await
            .unwrap();
        let purchase = ctx
            .repo
            .create(&Purchase::new(&alice, FoodType::Wet, Utc::now()))
            .await
            .unwrap();

        sqlx::query("UPDATE purchases SET purchase_date = 'yesterday' WHERE id = ?")
            .bind(&purchase.id)
            .execute(&ctx.repo.pool)
            .await
            .unwrap();

        let result = ctx.repo.list().await;
        assert!(matches!(result, Err(sqlx::Error::Decode(_))));
    }

    #[tokio::test]
    async fn test_delete_all() {
        let ctx = setup_repo().await;
        let alice = ctx
            .members
            .create(&FamilyMember::new("Alice", "blue"))
            .await
            .unwrap();
        ctx.repo
            .create(&Purchase::new(&alice, FoodType::Wet, Utc::now()))
            .await
            .unwrap();

        assert_eq!(ctx.repo.delete_all().await.unwrap().len(), 1);
        assert!(ctx.repo.list().await.unwrap().is_empty());
    }
}
