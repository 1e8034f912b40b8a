use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::food_type::FoodType;
use crate::rotation::{clamp_index, DEFAULT_DAYS_BETWEEN};

/// Whose turn it is, per food type, plus the setup and lock flags.
///
/// The two indices are independent counters over the same member list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RotationState {
    pub wet_food_current_index: usize,
    pub dry_food_current_index: usize,
    pub is_setup_complete: bool,
    pub turns_locked: bool,
}

impl RotationState {
    pub fn index(&self, food_type: FoodType) -> usize {
        match food_type {
            FoodType::Wet => self.wet_food_current_index,
            FoodType::Dry => self.dry_food_current_index,
        }
    }

    pub fn set_index(&mut self, food_type: FoodType, index: usize) {
        match food_type {
            FoodType::Wet => self.wet_food_current_index = index,
            FoodType::Dry => self.dry_food_current_index = index,
        }
    }

    /// Pulls both indices back inside `[0, member_count)`.
    pub fn clamp_to(&mut self, member_count: usize) {
        self.wet_food_current_index = clamp_index(self.wet_food_current_index, member_count);
        self.dry_food_current_index = clamp_index(self.dry_food_current_index, member_count);
    }
}

/// The singleton `rotation_state` row kept by the remote backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationRecord {
    pub id: String,
    pub wet_food_current_index: usize,
    pub dry_food_current_index: usize,
    pub wet_food_days_between: u32,
    pub dry_food_days_between: u32,
    pub wet_food_last_purchased: Option<DateTime<Utc>>,
    pub dry_food_last_purchased: Option<DateTime<Utc>>,
    /// Member id, not name.
    pub wet_food_last_purchased_by: Option<String>,
    pub dry_food_last_purchased_by: Option<String>,
    pub is_setup_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RotationRecord {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            wet_food_current_index: 0,
            dry_food_current_index: 0,
            wet_food_days_between: DEFAULT_DAYS_BETWEEN,
            dry_food_days_between: DEFAULT_DAYS_BETWEEN,
            wet_food_last_purchased: None,
            dry_food_last_purchased: None,
            wet_food_last_purchased_by: None,
            dry_food_last_purchased_by: None,
            is_setup_complete: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn index(&self, food_type: FoodType) -> usize {
        match food_type {
            FoodType::Wet => self.wet_food_current_index,
            FoodType::Dry => self.dry_food_current_index,
        }
    }

    pub fn days_between(&self, food_type: FoodType) -> u32 {
        match food_type {
            FoodType::Wet => self.wet_food_days_between,
            FoodType::Dry => self.dry_food_days_between,
        }
    }

    pub fn last_purchased(&self, food_type: FoodType) -> Option<DateTime<Utc>> {
        match food_type {
            FoodType::Wet => self.wet_food_last_purchased,
            FoodType::Dry => self.dry_food_last_purchased,
        }
    }

    pub fn last_purchased_by(&self, food_type: FoodType) -> Option<&str> {
        match food_type {
            FoodType::Wet => self.wet_food_last_purchased_by.as_deref(),
            FoodType::Dry => self.dry_food_last_purchased_by.as_deref(),
        }
    }

    /// Applies a partial update field by field. Unset fields are untouched.
    pub fn apply(&mut self, update: &RotationUpdate) {
        if let Some(index) = update.wet_food_current_index {
            self.wet_food_current_index = index;
        }
        if let Some(index) = update.dry_food_current_index {
            self.dry_food_current_index = index;
        }
        if let Some(at) = update.wet_food_last_purchased {
            self.wet_food_last_purchased = at;
        }
        if let Some(at) = update.dry_food_last_purchased {
            self.dry_food_last_purchased = at;
        }
        if let Some(by) = &update.wet_food_last_purchased_by {
            self.wet_food_last_purchased_by = by.clone();
        }
        if let Some(by) = &update.dry_food_last_purchased_by {
            self.dry_food_last_purchased_by = by.clone();
        }
        if let Some(complete) = update.is_setup_complete {
            self.is_setup_complete = complete;
        }
        self.updated_at = Utc::now();
    }
}

impl Default for RotationRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Partial update of the rotation row.
///
/// `None` leaves a column alone; `Some(None)` on a nullable column clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RotationUpdate {
    pub wet_food_current_index: Option<usize>,
    pub dry_food_current_index: Option<usize>,
    pub wet_food_last_purchased: Option<Option<DateTime<Utc>>>,
    pub dry_food_last_purchased: Option<Option<DateTime<Utc>>>,
    pub wet_food_last_purchased_by: Option<Option<String>>,
    pub dry_food_last_purchased_by: Option<Option<String>>,
    pub is_setup_complete: Option<bool>,
}

impl RotationUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(mut self, food_type: FoodType, index: usize) -> Self {
        match food_type {
            FoodType::Wet => self.wet_food_current_index = Some(index),
            FoodType::Dry => self.dry_food_current_index = Some(index),
        }
        self
    }

    pub fn purchased(
        mut self,
        food_type: FoodType,
        at: DateTime<Utc>,
        member_id: impl Into<String>,
    ) -> Self {
        let member_id = Some(member_id.into());
        match food_type {
            FoodType::Wet => {
                self.wet_food_last_purchased = Some(Some(at));
                self.wet_food_last_purchased_by = Some(member_id);
            }
            FoodType::Dry => {
                self.dry_food_last_purchased = Some(Some(at));
                self.dry_food_last_purchased_by = Some(member_id);
            }
        }
        self
    }

    pub fn setup_complete(mut self, complete: bool) -> Self {
        self.is_setup_complete = Some(complete);
        self
    }

    /// Everything a full app reset puts back to its default.
    pub fn cleared() -> Self {
        Self {
            wet_food_current_index: Some(0),
            dry_food_current_index: Some(0),
            wet_food_last_purchased: Some(None),
            dry_food_last_purchased: Some(None),
            wet_food_last_purchased_by: Some(None),
            dry_food_last_purchased_by: Some(None),
            is_setup_complete: Some(false),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_state_indices_are_independent() {
        let mut state = RotationState::default();
        state.set_index(FoodType::Wet, 2);

        assert_eq!(state.index(FoodType::Wet), 2);
        assert_eq!(state.index(FoodType::Dry), 0);
    }

    #[test]
    fn test_rotation_state_clamp_to() {
        let mut state = RotationState {
            wet_food_current_index: 2,
            dry_food_current_index: 1,
            ..Default::default()
        };

        state.clamp_to(2);
        assert_eq!(state.wet_food_current_index, 1);
        assert_eq!(state.dry_food_current_index, 1);

        state.clamp_to(0);
        assert_eq!(state.wet_food_current_index, 0);
        assert_eq!(state.dry_food_current_index, 0);
    }

    #[test]
    fn test_record_defaults() {
        let record = RotationRecord::new();
        assert_eq!(record.days_between(FoodType::Wet), 7);
        assert_eq!(record.days_between(FoodType::Dry), 7);
        assert!(!record.is_setup_complete);
        assert!(record.last_purchased(FoodType::Wet).is_none());
    }

    #[test]
    fn test_apply_only_touches_set_fields() {
        let mut record = RotationRecord::new();
        let at = Utc::now();

        record.apply(
            &RotationUpdate::new()
                .index(FoodType::Dry, 3)
                .purchased(FoodType::Dry, at, "member-1"),
        );

        assert_eq!(record.index(FoodType::Dry), 3);
        assert_eq!(record.index(FoodType::Wet), 0);
        assert_eq!(record.last_purchased(FoodType::Dry), Some(at));
        assert_eq!(record.last_purchased_by(FoodType::Dry), Some("member-1"));
        assert!(record.last_purchased(FoodType::Wet).is_none());
    }

    #[test]
    fn test_cleared_resets_everything() {
        let mut record = RotationRecord::new();
        record.apply(
            &RotationUpdate::new()
                .index(FoodType::Wet, 1)
                .purchased(FoodType::Wet, Utc::now(), "m")
                .setup_complete(true),
        );

        record.apply(&RotationUpdate::cleared());
        assert_eq!(record.index(FoodType::Wet), 0);
        assert!(record.last_purchased(FoodType::Wet).is_none());
        assert!(record.last_purchased_by(FoodType::Wet).is_none());
        assert!(!record.is_setup_complete);
    }

    #[test]
    fn test_update_is_empty() {
        assert!(RotationUpdate::new().is_empty());
        assert!(!RotationUpdate::new().setup_complete(true).is_empty());
    }
}
