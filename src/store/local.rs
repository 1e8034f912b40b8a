use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{
    check_turn_index, ensure_unlocked, resolve_initial_turns, validate_new_member, InitialTurns,
    RotationStore,
};
use crate::error::StoreError;
use crate::models::{default_color, AppState, FamilyMember, FoodType, Purchase};
use crate::rotation::{next_index, DEFAULT_DAYS_BETWEEN};

/// Fixed key the whole state blob is saved under.
pub const STATE_KEY: &str = "dog-food-tracker-state";

/// Single-process store holding the whole [`AppState`] in memory.
///
/// When opened with a path, every successful mutation rewrites the state
/// file. Timestamps are stored as ISO 8601 strings.
pub struct LocalStore {
    state: AppState,
    path: Option<PathBuf>,
}

impl LocalStore {
    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            state: AppState::default(),
            path: None,
        }
    }

    /// Loads saved state from `path`. A missing or unreadable file starts
    /// from the default state.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match load_state(&path) {
            Ok(Some(state)) => state,
            Ok(None) => AppState::default(),
            Err(e) => {
                tracing::warn!("Failed to load saved state from {}: {}", path.display(), e);
                AppState::default()
            }
        };

        Self {
            state,
            path: Some(path),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn add_member(&mut self, name: &str, color: &str) -> Result<(), StoreError> {
        self.mutate(|state| {
            let name = match validate_new_member(name, state.family_members.len()) {
                Ok(name) => name,
                Err(reason) => {
                    tracing::debug!("Ignoring add member: {}", reason);
                    return Ok(false);
                }
            };
            let color = if color.is_empty() {
                default_color(state.family_members.len())
            } else {
                color
            };

            let member = FamilyMember::new(name, color);
            tracing::info!("Added member {} ({})", member.name, member.id);
            state.family_members.push(member);
            Ok(true)
        })
    }

    pub fn remove_member(&mut self, id: &str) -> Result<(), StoreError> {
        self.mutate(|state| {
            let Some(position) = state.member_index(id) else {
                tracing::debug!("Ignoring removal of unknown member {}", id);
                return Ok(false);
            };

            let removed = state.family_members.remove(position);
            state.rotation.clamp_to(state.family_members.len());
            tracing::info!("Removed member {} ({})", removed.name, removed.id);
            Ok(true)
        })
    }

    pub fn complete_setup(&mut self) -> Result<(), StoreError> {
        self.mutate(|state| {
            if state.family_members.len() < 2 {
                tracing::debug!("Setup needs at least two members");
                return Ok(false);
            }

            state.rotation.is_setup_complete = true;
            state.rotation.wet_food_current_index = 0;
            state.rotation.dry_food_current_index = 0;
            Ok(true)
        })
    }

    pub fn record_purchase(
        &mut self,
        food_type: FoodType,
        amount: Option<f64>,
    ) -> Result<(), StoreError> {
        self.mutate(|state| {
            if !state.rotation.is_setup_complete {
                return Err(StoreError::SetupIncomplete);
            }
            let member = state
                .current_member(food_type)
                .cloned()
                .ok_or(StoreError::NoCurrentMember(food_type))?;

            let now = Utc::now();
            state
                .purchases
                .push(Purchase::new(&member, food_type, now).with_amount(amount));

            let next = next_index(
                state.rotation.index(food_type),
                state.family_members.len(),
            );
            state.rotation.set_index(food_type, next);

            let status = state.status_mut(food_type);
            status.last_purchased = Some(now);
            status.last_purchased_by = Some(member.name.clone());
            state.refresh_statuses(DEFAULT_DAYS_BETWEEN, now);

            tracing::info!("{} bought {} food", member.name, food_type);
            Ok(true)
        })
    }

    pub fn set_initial_state(&mut self, turns: &InitialTurns) -> Result<(), StoreError> {
        self.mutate(|state| {
            ensure_unlocked(state.rotation.turns_locked)?;
            let resolved = resolve_initial_turns(&state.family_members, turns)?;
            let now = Utc::now();

            state.rotation.wet_food_current_index = resolved.wet_current;
            state.rotation.dry_food_current_index = resolved.dry_current;

            let wet_by = state.family_members[resolved.wet_last].name.clone();
            let dry_by = state.family_members[resolved.dry_last].name.clone();
            state.wet_food_status.last_purchased = Some(now);
            state.wet_food_status.last_purchased_by = Some(wet_by);
            state.dry_food_status.last_purchased = Some(now);
            state.dry_food_status.last_purchased_by = Some(dry_by);
            state.refresh_statuses(DEFAULT_DAYS_BETWEEN, now);
            Ok(true)
        })
    }

    pub fn update_turn(&mut self, food_type: FoodType, index: usize) -> Result<(), StoreError> {
        self.mutate(|state| {
            ensure_unlocked(state.rotation.turns_locked)?;
            check_turn_index(index, state.family_members.len())?;

            state.rotation.set_index(food_type, index);
            Ok(true)
        })
    }

    pub fn lock_turns(&mut self) -> Result<(), StoreError> {
        self.mutate(|state| {
            if state.rotation.turns_locked {
                return Ok(false);
            }
            state.rotation.turns_locked = true;
            Ok(true)
        })
    }

    pub fn reset_turns(&mut self) -> Result<(), StoreError> {
        self.mutate(|state| {
            ensure_unlocked(state.rotation.turns_locked)?;

            state.rotation.wet_food_current_index = 0;
            state.rotation.dry_food_current_index = 0;
            Ok(true)
        })
    }

    pub fn reset_app(&mut self) -> Result<(), StoreError> {
        self.state = AppState::default();

        if let Some(path) = &self.path {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    // Leave a default blob behind instead of the old state
                    tracing::warn!("Failed to remove {}: {}", path.display(), e);
                    self.persist()?;
                }
            }
        }
        tracing::info!("Reset all data");
        Ok(())
    }

    /// Runs `op` against the state. `op` returns whether it changed
    /// anything; changes are persisted, and any error rolls the state back.
    fn mutate<F>(&mut self, op: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut AppState) -> Result<bool, StoreError>,
    {
        let previous = self.state.clone();

        let result = op(&mut self.state).and_then(|changed| {
            if changed {
                self.persist()?;
            }
            Ok(())
        });

        if result.is_err() {
            self.state = previous;
        }
        result
    }

    fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let contents = serde_json::to_string_pretty(&self.state)?;
        write_atomically(path, &contents).map_err(|source| StoreError::Persist {
            path: path.clone(),
            source,
        })
    }
}

fn load_state(path: &Path) -> Result<Option<AppState>, Box<dyn std::error::Error>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&contents)?))
}

fn write_atomically(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)
}

#[async_trait]
impl RotationStore for LocalStore {
    fn snapshot_at(&self, now: DateTime<Utc>) -> AppState {
        let mut state = self.state.clone();
        state.refresh_statuses(DEFAULT_DAYS_BETWEEN, now);
        state
    }

    async fn add_member(&mut self, name: &str, color: &str) -> Result<(), StoreError> {
        LocalStore::add_member(self, name, color)
    }

    async fn remove_member(&mut self, id: &str) -> Result<(), StoreError> {
        LocalStore::remove_member(self, id)
    }

    async fn complete_setup(&mut self) -> Result<(), StoreError> {
        LocalStore::complete_setup(self)
    }

    async fn record_purchase(
        &mut self,
        food_type: FoodType,
        amount: Option<f64>,
    ) -> Result<(), StoreError> {
        LocalStore::record_purchase(self, food_type, amount)
    }

    async fn set_initial_state(&mut self, turns: &InitialTurns) -> Result<(), StoreError> {
        LocalStore::set_initial_state(self, turns)
    }

    async fn update_turn(&mut self, food_type: FoodType, index: usize) -> Result<(), StoreError> {
        LocalStore::update_turn(self, food_type, index)
    }

    async fn lock_turns(&mut self) -> Result<(), StoreError> {
        LocalStore::lock_turns(self)
    }

    async fn reset_turns(&mut self) -> Result<(), StoreError> {
        LocalStore::reset_turns(self)
    }

    async fn reset_app(&mut self) -> Result<(), StoreError> {
        LocalStore::reset_app(self)
    }
}
