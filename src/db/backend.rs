use async_trait::async_trait;
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;

use super::{init_db, FamilyMemberRepository, PurchaseRepository, RotationStateRepository};
use crate::error::StoreError;
use crate::models::{FamilyMember, Purchase, RotationRecord, RotationUpdate};
use crate::notify::{Change, ChangeEvent, ChangeHub};
use crate::store::RemoteBackend;

/// SQLite implementation of [`RemoteBackend`].
///
/// Every successful write is published to the [`ChangeHub`] before the
/// call returns.
pub struct SqlBackend {
    members: FamilyMemberRepository,
    purchases: PurchaseRepository,
    rotation: RotationStateRepository,
    hub: Arc<ChangeHub>,
}

impl SqlBackend {
    pub fn new(pool: SqlitePool, hub: Arc<ChangeHub>) -> Self {
        Self {
            members: FamilyMemberRepository::new(pool.clone()),
            purchases: PurchaseRepository::new(pool.clone()),
            rotation: RotationStateRepository::new(pool),
            hub,
        }
    }

    /// Opens (and migrates) the database at `path`.
    pub async fn open(path: &Path, hub: Arc<ChangeHub>) -> Result<Self, StoreError> {
        let pool = init_db(path).await?;
        Ok(Self::new(pool, hub))
    }
}

#[async_trait]
impl RemoteBackend for SqlBackend {
    async fn fetch_members(&self) -> Result<Vec<FamilyMember>, StoreError> {
        Ok(self.members.list().await?)
    }

    async fn fetch_purchases(&self) -> Result<Vec<Purchase>, StoreError> {
        Ok(self.purchases.list().await?)
    }

    async fn fetch_rotation(&self) -> Result<RotationRecord, StoreError> {
        if let Some(record) = self.rotation.get().await? {
            return Ok(record);
        }

        tracing::info!("Creating rotation state row");
        let record = self.rotation.create(&RotationRecord::new()).await?;
        self.hub
            .publish(ChangeEvent::Rotation(Change::Insert(record.clone())))
            .await;
        Ok(record)
    }

    async fn insert_member(&self, member: FamilyMember) -> Result<FamilyMember, StoreError> {
        let created = self.members.create(&member).await?;
        self.hub
            .publish(ChangeEvent::Member(Change::Insert(created.clone())))
            .await;
        Ok(created)
    }

    async fn delete_member(&self, id: &str) -> Result<bool, StoreError> {
        let deleted = self.members.delete(id).await?;
        if deleted {
            self.hub
                .publish(ChangeEvent::Member(Change::Delete { id: id.to_string() }))
                .await;
        }
        Ok(deleted)
    }

    async fn insert_purchase(&self, purchase: Purchase) -> Result<Purchase, StoreError> {
        let created = self.purchases.create(&purchase).await?;
        self.hub
            .publish(ChangeEvent::Purchase(Change::Insert(created.clone())))
            .await;
        Ok(created)
    }

    async fn update_rotation(
        &self,
        update: RotationUpdate,
    ) -> Result<RotationRecord, StoreError> {
        let mut record = self
            .rotation
            .get()
            .await?
            .ok_or(StoreError::RotationStateMissing)?;
        record.apply(&update);

        let saved = self.rotation.save(&record).await?;
        self.hub
            .publish(ChangeEvent::Rotation(Change::Update(saved.clone())))
            .await;
        Ok(saved)
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        // Purchases first so no history row outlives its member's delete event
        for id in self.purchases.delete_all().await? {
            self.hub
                .publish(ChangeEvent::Purchase(Change::Delete { id }))
                .await;
        }
        for id in self.members.delete_all().await? {
            self.hub
                .publish(ChangeEvent::Member(Change::Delete { id }))
                .await;
        }

        match self.rotation.get().await? {
            Some(_) => {
                self.update_rotation(RotationUpdate::cleared()).await?;
            }
            None => {
                self.fetch_rotation().await?;
            }
        }
        Ok(())
    }
}
