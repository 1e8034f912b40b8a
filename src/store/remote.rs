use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};

use super::{
    check_turn_index, ensure_unlocked, resolve_initial_turns, validate_new_member, InitialTurns,
    RotationStore,
};
use crate::error::StoreError;
use crate::models::{
    default_color, AppState, FamilyMember, FoodType, Purchase, RotationRecord, RotationUpdate,
};
use crate::notify::{Change, ChangeEvent, ChangeNotifier, RecordKind};
use crate::rotation::{clamp_index, next_index};

/// Storage the remote store talks to.
///
/// Every write is expected to be announced through the [`ChangeNotifier`]
/// the store subscribed to.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Members in rotation order.
    async fn fetch_members(&self) -> Result<Vec<FamilyMember>, StoreError>;

    /// Purchases, newest first.
    async fn fetch_purchases(&self) -> Result<Vec<Purchase>, StoreError>;

    /// The rotation row, created with defaults if there is none yet.
    async fn fetch_rotation(&self) -> Result<RotationRecord, StoreError>;

    async fn insert_member(&self, member: FamilyMember) -> Result<FamilyMember, StoreError>;

    /// Returns false if no such member existed.
    async fn delete_member(&self, id: &str) -> Result<bool, StoreError>;

    async fn insert_purchase(&self, purchase: Purchase) -> Result<Purchase, StoreError>;

    /// Fails with [`StoreError::RotationStateMissing`] if the row is gone.
    async fn update_rotation(&self, update: RotationUpdate)
        -> Result<RotationRecord, StoreError>;

    /// Deletes every member and purchase and resets the rotation row.
    async fn clear_all(&self) -> Result<(), StoreError>;
}

/// Store backed by a [`RemoteBackend`].
///
/// Operations write to the backend and never touch the mirror directly;
/// the mirror only changes when the backend's change events are merged.
pub struct RemoteStore {
    backend: Arc<dyn RemoteBackend>,
    receivers: Vec<broadcast::Receiver<ChangeEvent>>,
    members: Vec<FamilyMember>,
    /// Oldest first.
    purchases: Vec<Purchase>,
    rotation: RotationRecord,
    turns_locked: bool,
    /// File whose presence keeps an explicit lock across sessions.
    lock_marker: Option<PathBuf>,
}

impl RemoteStore {
    /// Subscribes to all record kinds, then loads the current records.
    pub async fn connect(
        backend: Arc<dyn RemoteBackend>,
        notifier: &dyn ChangeNotifier,
    ) -> Result<Self, StoreError> {
        let mut receivers = Vec::with_capacity(RecordKind::ALL.len());
        for kind in RecordKind::ALL {
            receivers.push(notifier.subscribe(kind).await);
        }

        let mut store = Self {
            backend,
            receivers,
            members: Vec::new(),
            purchases: Vec::new(),
            rotation: RotationRecord::new(),
            turns_locked: false,
            lock_marker: None,
        };
        store.reload().await?;
        store.sync_pending().await?;
        Ok(store)
    }

    /// Remembers `lock_turns` in a marker file at `path`. An existing marker
    /// locks the store straight away.
    pub fn with_lock_marker(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.exists() {
            tracing::debug!("Turns locked by {}", path.display());
            self.turns_locked = true;
        }
        self.lock_marker = Some(path);
        self
    }

    fn write_lock_marker(&self) -> Result<(), StoreError> {
        let Some(path) = &self.lock_marker else {
            return Ok(());
        };

        let persist_err = |source| StoreError::Persist {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(persist_err)?;
        }
        std::fs::write(path, b"locked\n").map_err(persist_err)
    }

    fn clear_lock_marker(&self) -> Result<(), StoreError> {
        let Some(path) = &self.lock_marker else {
            return Ok(());
        };

        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Persist {
                path: path.clone(),
                source,
            }),
        }
    }

    async fn reload(&mut self) -> Result<(), StoreError> {
        let members = self.backend.fetch_members().await?;
        let mut purchases = self.backend.fetch_purchases().await?;
        let rotation = self.backend.fetch_rotation().await?;
        purchases.reverse();

        tracing::debug!(
            "Loaded {} member(s) and {} purchase(s)",
            members.len(),
            purchases.len()
        );
        self.turns_locked |= !purchases.is_empty();
        self.members = members;
        self.purchases = purchases;
        self.rotation = rotation;
        Ok(())
    }

    /// Merges every change event received so far. If a subscription fell
    /// behind, the mirror is rebuilt from the backend instead.
    async fn sync_pending(&mut self) -> Result<(), StoreError> {
        let mut events = Vec::new();
        let mut lagged = false;

        for receiver in &mut self.receivers {
            loop {
                match receiver.try_recv() {
                    Ok(event) => events.push(event),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Lagged(skipped)) => {
                        tracing::warn!("Missed {} change event(s), reloading", skipped);
                        lagged = true;
                    }
                    Err(TryRecvError::Closed) => {
                        tracing::debug!("Change subscription closed");
                        break;
                    }
                }
            }
        }

        if lagged {
            return self.reload().await;
        }
        for event in events {
            self.apply(event);
        }
        Ok(())
    }

    fn apply(&mut self, event: ChangeEvent) {
        tracing::trace!("Applying {:?}", event);

        match event {
            ChangeEvent::Member(Change::Insert(member) | Change::Update(member)) => {
                upsert(&mut self.members, member, |m| &m.id);
            }
            ChangeEvent::Member(Change::Delete { id }) => {
                self.members.retain(|m| m.id != id);
            }
            ChangeEvent::Purchase(Change::Insert(purchase)) => {
                upsert(&mut self.purchases, purchase, |p| &p.id);
                self.turns_locked = true;
            }
            ChangeEvent::Purchase(Change::Update(purchase)) => {
                upsert(&mut self.purchases, purchase, |p| &p.id);
            }
            ChangeEvent::Purchase(Change::Delete { id }) => {
                self.purchases.retain(|p| p.id != id);
            }
            ChangeEvent::Rotation(Change::Insert(record) | Change::Update(record)) => {
                self.rotation = record;
            }
            ChangeEvent::Rotation(Change::Delete { id }) => {
                tracing::debug!("Ignoring delete of rotation row {}", id);
            }
        }
    }

    fn current_member(&self, food_type: FoodType) -> Option<&FamilyMember> {
        self.members.get(self.rotation.index(food_type))
    }

    async fn add_member(&mut self, name: &str, color: &str) -> Result<(), StoreError> {
        self.sync_pending().await?;

        let name = validate_new_member(name, self.members.len()).map_err(StoreError::Validation)?;
        let color = if color.is_empty() {
            default_color(self.members.len())
        } else {
            color
        };

        let member = self
            .backend
            .insert_member(FamilyMember::new(name, color))
            .await?;
        tracing::info!("Added member {} ({})", member.name, member.id);

        self.sync_pending().await
    }

    async fn remove_member(&mut self, id: &str) -> Result<(), StoreError> {
        self.sync_pending().await?;

        if !self.backend.delete_member(id).await? {
            tracing::debug!("Ignoring removal of unknown member {}", id);
            return self.sync_pending().await;
        }
        tracing::info!("Removed member {}", id);

        let remaining = self.backend.fetch_members().await?.len();
        let rotation = self.backend.fetch_rotation().await?;
        let mut update = RotationUpdate::new();
        for food_type in FoodType::ALL {
            let current = rotation.index(food_type);
            let clamped = clamp_index(current, remaining);
            if clamped != current {
                update = update.index(food_type, clamped);
            }
        }
        if !update.is_empty() {
            self.backend.update_rotation(update).await?;
        }

        self.sync_pending().await
    }

    async fn complete_setup(&mut self) -> Result<(), StoreError> {
        self.sync_pending().await?;

        if self.members.len() < 2 {
            tracing::debug!("Setup needs at least two members");
            return Ok(());
        }
        self.backend
            .update_rotation(RotationUpdate::new().setup_complete(true))
            .await?;

        self.sync_pending().await
    }

    async fn record_purchase(
        &mut self,
        food_type: FoodType,
        amount: Option<f64>,
    ) -> Result<(), StoreError> {
        self.sync_pending().await?;

        if !self.rotation.is_setup_complete {
            return Err(StoreError::SetupIncomplete);
        }
        let member = self
            .current_member(food_type)
            .cloned()
            .ok_or(StoreError::NoCurrentMember(food_type))?;

        // The shared counter may have moved since the mirror last synced
        let rotation = self.backend.fetch_rotation().await?;
        let member_count = self.backend.fetch_members().await?.len();
        if member_count == 0 {
            return Err(StoreError::NoCurrentMember(food_type));
        }

        let now = Utc::now();
        self.backend
            .insert_purchase(Purchase::new(&member, food_type, now).with_amount(amount))
            .await?;
        self.backend
            .update_rotation(
                RotationUpdate::new()
                    .index(food_type, next_index(rotation.index(food_type), member_count))
                    .purchased(food_type, now, member.id.clone()),
            )
            .await?;
        tracing::info!("{} bought {} food", member.name, food_type);

        self.sync_pending().await
    }

    async fn set_initial_state(&mut self, turns: &InitialTurns) -> Result<(), StoreError> {
        self.sync_pending().await?;
        ensure_unlocked(self.turns_locked)?;

        let members = self.backend.fetch_members().await?;
        let resolved = resolve_initial_turns(&members, turns)?;
        let now = Utc::now();

        self.backend
            .update_rotation(
                RotationUpdate::new()
                    .index(FoodType::Wet, resolved.wet_current)
                    .index(FoodType::Dry, resolved.dry_current)
                    .purchased(FoodType::Wet, now, members[resolved.wet_last].id.clone())
                    .purchased(FoodType::Dry, now, members[resolved.dry_last].id.clone()),
            )
            .await?;

        self.sync_pending().await
    }

    async fn update_turn(&mut self, food_type: FoodType, index: usize) -> Result<(), StoreError> {
        self.sync_pending().await?;
        ensure_unlocked(self.turns_locked)?;
        check_turn_index(index, self.members.len())?;

        self.backend
            .update_rotation(RotationUpdate::new().index(food_type, index))
            .await?;

        self.sync_pending().await
    }

    async fn lock_turns(&mut self) -> Result<(), StoreError> {
        self.sync_pending().await?;
        self.write_lock_marker()?;
        self.turns_locked = true;
        Ok(())
    }

    async fn reset_turns(&mut self) -> Result<(), StoreError> {
        self.sync_pending().await?;
        ensure_unlocked(self.turns_locked)?;

        self.backend
            .update_rotation(
                RotationUpdate::new()
                    .index(FoodType::Wet, 0)
                    .index(FoodType::Dry, 0),
            )
            .await?;

        self.sync_pending().await
    }

    async fn reset_app(&mut self) -> Result<(), StoreError> {
        self.sync_pending().await?;

        self.backend.clear_all().await?;
        self.sync_pending().await?;
        self.clear_lock_marker()?;
        self.turns_locked = false;

        tracing::info!("Reset all data");
        Ok(())
    }
}

fn upsert<T, F>(records: &mut Vec<T>, record: T, id: F)
where
    F: Fn(&T) -> &String,
{
    match records.iter().position(|r| id(r) == id(&record)) {
        Some(position) => records[position] = record,
        None => records.push(record),
    }
}

#[async_trait]
impl RotationStore for RemoteStore {
    fn snapshot_at(&self, now: DateTime<Utc>) -> AppState {
        AppState::from_remote(
            self.members.clone(),
            self.purchases.clone(),
            &self.rotation,
            self.turns_locked,
            now,
        )
    }

    async fn add_member(&mut self, name: &str, color: &str) -> Result<(), StoreError> {
        RemoteStore::add_member(self, name, color).await
    }

    async fn remove_member(&mut self, id: &str) -> Result<(), StoreError> {
        RemoteStore::remove_member(self, id).await
    }

    async fn complete_setup(&mut self) -> Result<(), StoreError> {
        RemoteStore::complete_setup(self).await
    }

    async fn record_purchase(
        &mut self,
        food_type: FoodType,
        amount: Option<f64>,
    ) -> Result<(), StoreError> {
        RemoteStore::record_purchase(self, food_type, amount).await
    }

    async fn set_initial_state(&mut self, turns: &InitialTurns) -> Result<(), StoreError> {
        RemoteStore::set_initial_state(self, turns).await
    }

    async fn update_turn(&mut self, food_type: FoodType, index: usize) -> Result<(), StoreError> {
        RemoteStore::update_turn(self, food_type, index).await
    }

    async fn lock_turns(&mut self) -> Result<(), StoreError> {
        RemoteStore::lock_turns(self).await
    }

    async fn reset_turns(&mut self) -> Result<(), StoreError> {
        RemoteStore::reset_turns(self).await
    }

    async fn reset_app(&mut self) -> Result<(), StoreError> {
        RemoteStore::reset_app(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqlBackend;
    use crate::notify::ChangeHub;
    use tempfile::TempDir;

    struct TestContext {
        store: RemoteStore,
        backend: Arc<SqlBackend>,
        hub: Arc<ChangeHub>,
        _temp_dir: TempDir,
    }

    async fn setup_store() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let hub = Arc::new(ChangeHub::new());
        let backend = Arc::new(
            SqlBackend::open(&temp_dir.path().join("test.db"), hub.clone())
                .await
                .unwrap(),
        );
        let store = RemoteStore::connect(backend.clone(), &*hub)
            .await
            .unwrap();

        TestContext {
            store,
            backend,
            hub,
            _temp_dir: temp_dir,
        }
    }

    async fn ready_store(names: &[&str]) -> TestContext {
        let mut ctx = setup_store().await;
        for name in names {
            ctx.store.add_member(name, "").await.unwrap();
        }
        ctx.store.complete_setup().await.unwrap();
        ctx
    }

    fn ids(store: &RemoteStore) -> Vec<String> {
        store.members.iter().map(|m| m.id.clone()).collect()
    }

    #[tokio::test]
    async fn test_connect_creates_rotation_row() {
        let ctx = setup_store().await;
        let state = ctx.store.snapshot();

        assert!(state.family_members.is_empty());
        assert!(!state.rotation.is_setup_complete);
        assert!(ctx.backend.fetch_rotation().await.is_ok());
    }

    #[tokio::test]
    async fn test_add_member_reaches_mirror_through_events() {
        let mut ctx = setup_store().await;
        ctx.store.add_member("Alice", "").await.unwrap();
        ctx.store.add_member("Bob", "red").await.unwrap();

        let state = ctx.store.snapshot();
        assert_eq!(state.family_members.len(), 2);
        assert_eq!(state.family_members[0].color, "blue");
        assert_eq!(state.family_members[1].color, "red");
    }

    #[tokio::test]
    async fn test_add_member_surfaces_validation() {
        let mut ctx = setup_store().await;

        let err = ctx.store.add_member("  ", "").await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(ctx.store.snapshot().family_members.is_empty());
    }

    #[tokio::test]
    async fn test_complete_setup_keeps_indices() {
        let mut ctx = setup_store().await;
        ctx.store.add_member("A", "").await.unwrap();
        ctx.store.complete_setup().await.unwrap();
        assert!(!ctx.store.snapshot().rotation.is_setup_complete);

        ctx.store.add_member("B", "").await.unwrap();
        ctx.store.update_turn(FoodType::Wet, 1).await.unwrap();
        ctx.store.complete_setup().await.unwrap();

        let state = ctx.store.snapshot();
        assert!(state.rotation.is_setup_complete);
        assert_eq!(state.rotation.wet_food_current_index, 1);
    }

    #[tokio::test]
    async fn test_purchases_rotate_independently_and_lock() {
        let mut ctx = ready_store(&["A", "B", "C"]).await;

        for _ in 0..3 {
            ctx.store.record_purchase(FoodType::Dry, None).await.unwrap();
        }

        let state = ctx.store.snapshot();
        assert_eq!(state.rotation.dry_food_current_index, 0);
        assert_eq!(state.rotation.wet_food_current_index, 0);
        assert!(state.rotation.turns_locked);
        assert_eq!(state.purchases.len(), 3);
        assert_eq!(state.purchases[0].family_member_name, "A");
        assert_eq!(state.dry_food_status.last_purchased_by.as_deref(), Some("C"));
        assert!(state.wet_food_status.last_purchased.is_none());

        let err = ctx.store.update_turn(FoodType::Wet, 1).await.unwrap_err();
        assert!(matches!(err, StoreError::TurnsLocked));
    }

    #[tokio::test]
    async fn test_record_purchase_requires_setup() {
        let mut ctx = setup_store().await;
        ctx.store.add_member("A", "").await.unwrap();

        let err = ctx
            .store
            .record_purchase(FoodType::Wet, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SetupIncomplete));
    }

    #[tokio::test]
    async fn test_remove_member_clamps_shared_row() {
        let mut ctx = ready_store(&["A", "B", "C"]).await;
        ctx.store.update_turn(FoodType::Wet, 2).await.unwrap();

        let last = ids(&ctx.store)[2].clone();
        ctx.store.remove_member(&last).await.unwrap();

        let state = ctx.store.snapshot();
        assert_eq!(state.family_members.len(), 2);
        assert_eq!(state.rotation.wet_food_current_index, 1);
        assert_eq!(ctx.backend.fetch_rotation().await.unwrap().wet_food_current_index, 1);

        ctx.store.remove_member("missing").await.unwrap();
        assert_eq!(ctx.store.snapshot().family_members.len(), 2);
    }

    #[tokio::test]
    async fn test_set_initial_state_stores_member_ids() {
        let mut ctx = ready_store(&["A", "B"]).await;
        let ids = ids(&ctx.store);

        ctx.store
            .set_initial_state(&InitialTurns {
                wet_last_bought_by: ids[0].clone(),
                dry_last_bought_by: ids[0].clone(),
                wet_current_turn: ids[1].clone(),
                dry_current_turn: ids[1].clone(),
            })
            .await
            .unwrap();

        let row = ctx.backend.fetch_rotation().await.unwrap();
        assert_eq!(row.wet_food_last_purchased_by.as_deref(), Some(ids[0].as_str()));

        let state = ctx.store.snapshot();
        assert_eq!(state.rotation.wet_food_current_index, 1);
        assert_eq!(state.wet_food_status.last_purchased_by.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_reset_turns_and_lock() {
        let mut ctx = ready_store(&["A", "B"]).await;
        ctx.store.update_turn(FoodType::Dry, 1).await.unwrap();
        ctx.store.reset_turns().await.unwrap();
        assert_eq!(ctx.store.snapshot().rotation.dry_food_current_index, 0);

        ctx.store.lock_turns().await.unwrap();
        let err = ctx.store.reset_turns().await.unwrap_err();
        assert!(matches!(err, StoreError::TurnsLocked));

        // Purchases keep advancing, and locking again is harmless
        ctx.store.record_purchase(FoodType::Wet, None).await.unwrap();
        assert_eq!(ctx.store.snapshot().rotation.wet_food_current_index, 1);
        ctx.store.lock_turns().await.unwrap();
        assert!(ctx.store.snapshot().rotation.turns_locked);
        ctx.store.record_purchase(FoodType::Wet, None).await.unwrap();
        assert_eq!(ctx.store.snapshot().rotation.wet_food_current_index, 0);
    }

    #[tokio::test]
    async fn test_lock_marker_survives_reconnect_until_reset() {
        let mut ctx = ready_store(&["A", "B"]).await;
        let marker = ctx._temp_dir.path().join("turns.lock");
        let mut store = RemoteStore::connect(ctx.backend.clone(), &*ctx.hub)
            .await
            .unwrap()
            .with_lock_marker(&marker);
        assert!(!store.snapshot().rotation.turns_locked);

        store.lock_turns().await.unwrap();
        assert!(marker.exists());

        let mut reopened = RemoteStore::connect(ctx.backend.clone(), &*ctx.hub)
            .await
            .unwrap()
            .with_lock_marker(&marker);
        let err = reopened.update_turn(FoodType::Wet, 1).await.unwrap_err();
        assert!(matches!(err, StoreError::TurnsLocked));

        reopened.reset_app().await.unwrap();
        assert!(!marker.exists());
        ctx.store.sync_pending().await.unwrap();
        assert!(ctx.store.snapshot().family_members.is_empty());
    }

    #[tokio::test]
    async fn test_reset_app_clears_everything() {
        let mut ctx = ready_store(&["A", "B"]).await;
        ctx.store.record_purchase(FoodType::Wet, None).await.unwrap();

        ctx.store.reset_app().await.unwrap();

        let state = ctx.store.snapshot();
        assert!(state.family_members.is_empty());
        assert!(state.purchases.is_empty());
        assert_eq!(state.rotation.wet_food_current_index, 0);
        assert!(!state.rotation.is_setup_complete);
        assert!(!state.rotation.turns_locked);
        assert!(state.wet_food_status.last_purchased.is_none());

        ctx.store.reset_app().await.unwrap();
        assert!(ctx.store.snapshot().family_members.is_empty());
    }

    #[tokio::test]
    async fn test_second_client_sees_changes() {
        let mut ctx = ready_store(&["A", "B"]).await;
        let mut other = RemoteStore::connect(ctx.backend.clone(), &*ctx.hub)
            .await
            .unwrap();
        assert!(other.snapshot().rotation.is_setup_complete);

        ctx.store.record_purchase(FoodType::Wet, None).await.unwrap();
        other.sync_pending().await.unwrap();

        let state = other.snapshot();
        assert_eq!(state.purchases.len(), 1);
        assert_eq!(state.rotation.wet_food_current_index, 1);
        assert!(state.rotation.turns_locked);
    }

    #[tokio::test]
    async fn test_reconnect_derives_lock_from_history() {
        let mut ctx = ready_store(&["A", "B"]).await;
        ctx.store.record_purchase(FoodType::Dry, None).await.unwrap();

        let reopened = RemoteStore::connect(ctx.backend.clone(), &*ctx.hub)
            .await
            .unwrap();
        assert!(reopened.snapshot().rotation.turns_locked);
    }

    #[test]
    fn test_upsert_replaces_by_id() {
        let a = FamilyMember::new("A", "blue");
        let mut renamed = a.clone();
        renamed.name = "Alice".to_string();

        let mut members = vec![a];
        upsert(&mut members, renamed, |m| &m.id);
        upsert(&mut members, FamilyMember::new("B", "red"), |m| &m.id);

        assert_eq!(members.len(), 2);
        assert_eq!(members[0].name, "Alice");
    }
}
