//! Rotation stores.
//!
//! [`RotationStore`] is the one contract the rest of the crate talks to.
//! [`LocalStore`] keeps state in memory and persists it to a JSON file;
//! [`RemoteStore`] mirrors a [`RemoteBackend`] and only changes its mirror
//! when the backend's change notifications arrive. Which one is used is
//! decided by configuration at startup, see [`open`].

mod local;
mod remote;

pub use local::{LocalStore, STATE_KEY};
pub use remote::{RemoteBackend, RemoteStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{BackendKind, Config};
use crate::db::SqlBackend;
use crate::error::StoreError;
use crate::models::{AppState, FamilyMember, FoodType, MAX_MEMBERS};
use crate::notify::ChangeHub;

/// Operations shared by the local and remote stores.
///
/// A failed operation leaves the store's state unchanged.
#[async_trait]
pub trait RotationStore: Send {
    /// Current state with due dates evaluated at `now`.
    fn snapshot_at(&self, now: DateTime<Utc>) -> AppState;

    fn snapshot(&self) -> AppState {
        self.snapshot_at(Utc::now())
    }

    /// Appends a member. An empty `color` picks the next palette color.
    async fn add_member(&mut self, name: &str, color: &str) -> Result<(), StoreError>;

    /// Removes a member and clamps both turn indices. Unknown ids are a no-op.
    async fn remove_member(&mut self, id: &str) -> Result<(), StoreError>;

    /// Marks setup complete once there are at least two members.
    async fn complete_setup(&mut self) -> Result<(), StoreError>;

    /// Records a purchase by the member whose turn it is and advances that
    /// food type's turn. The other food type's turn is untouched.
    async fn record_purchase(
        &mut self,
        food_type: FoodType,
        amount: Option<f64>,
    ) -> Result<(), StoreError>;

    /// Seeds who bought last and whose turn it is, by member id.
    async fn set_initial_state(&mut self, turns: &InitialTurns) -> Result<(), StoreError>;

    /// Manually sets a food type's turn.
    async fn update_turn(&mut self, food_type: FoodType, index: usize) -> Result<(), StoreError>;

    /// Locks manual turn edits. Only a full reset unlocks.
    async fn lock_turns(&mut self) -> Result<(), StoreError>;

    /// Puts both turns back on the first member.
    async fn reset_turns(&mut self) -> Result<(), StoreError>;

    /// Clears members, purchases and rotation state.
    async fn reset_app(&mut self) -> Result<(), StoreError>;
}

/// Starting point for both rotations, given as member ids.
#[derive(Debug, Clone)]
pub struct InitialTurns {
    pub wet_last_bought_by: String,
    pub dry_last_bought_by: String,
    pub wet_current_turn: String,
    pub dry_current_turn: String,
}

/// [`InitialTurns`] resolved to positions in the member list.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ResolvedTurns {
    wet_last: usize,
    dry_last: usize,
    wet_current: usize,
    dry_current: usize,
}

fn resolve_initial_turns(
    members: &[FamilyMember],
    turns: &InitialTurns,
) -> Result<ResolvedTurns, StoreError> {
    let position = |id: &str| members.iter().position(|m| m.id == id);

    match (
        position(&turns.wet_last_bought_by),
        position(&turns.dry_last_bought_by),
        position(&turns.wet_current_turn),
        position(&turns.dry_current_turn),
    ) {
        (Some(wet_last), Some(dry_last), Some(wet_current), Some(dry_current)) => {
            Ok(ResolvedTurns {
                wet_last,
                dry_last,
                wet_current,
                dry_current,
            })
        }
        _ => Err(StoreError::Validation(
            "Invalid family member IDs".to_string(),
        )),
    }
}

fn ensure_unlocked(turns_locked: bool) -> Result<(), StoreError> {
    if turns_locked {
        Err(StoreError::TurnsLocked)
    } else {
        Ok(())
    }
}

fn check_turn_index(index: usize, member_count: usize) -> Result<(), StoreError> {
    if index < member_count {
        Ok(())
    } else {
        Err(StoreError::Validation(format!(
            "Turn index {} is out of range for {} member(s)",
            index, member_count
        )))
    }
}

/// Returns the trimmed name if a member may be added, or the reason not.
fn validate_new_member(name: &str, member_count: usize) -> Result<String, String> {
    let name = name.trim();
    FamilyMember::validate_name(name)?;
    if member_count >= MAX_MEMBERS {
        return Err(format!(
            "A household can have at most {} members",
            MAX_MEMBERS
        ));
    }
    Ok(name.to_string())
}

/// Opens the store selected by `config.backend`.
pub async fn open(config: &Config) -> Result<Box<dyn RotationStore>, StoreError> {
    match config.backend.value {
        BackendKind::Local => {
            tracing::debug!(
                "Using local store at {}",
                config.state_path.value.display()
            );
            Ok(Box::new(LocalStore::open(config.state_path.value.clone())))
        }
        BackendKind::Remote => {
            let path = config
                .database_path
                .as_ref()
                .ok_or(StoreError::NotConfigured)?;
            tracing::debug!("Using remote store at {}", path.value.display());

            let hub = Arc::new(ChangeHub::new());
            let backend = SqlBackend::open(&path.value, hub.clone()).await?;
            let store = RemoteStore::connect(Arc::new(backend), &*hub)
                .await?
                .with_lock_marker(remote_lock_path(config));
            Ok(Box::new(store))
        }
    }
}

/// Marker kept next to the local state file that remembers an explicit
/// remote lock between runs.
fn remote_lock_path(config: &Config) -> PathBuf {
    config.state_path.value.with_extension("remote-lock")
}
