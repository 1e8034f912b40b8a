use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::family_member::FamilyMember;
use super::food_status::FoodStatus;
use super::food_type::FoodType;
use super::purchase::Purchase;
use super::rotation_state::{RotationRecord, RotationState};
use crate::rotation::compute_food_status;

/// Full application state: the unit the local store persists and the unit
/// every store hands out as a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    pub family_members: Vec<FamilyMember>,
    pub purchases: Vec<Purchase>,
    pub rotation: RotationState,
    pub wet_food_status: FoodStatus,
    pub dry_food_status: FoodStatus,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            family_members: Vec::new(),
            purchases: Vec::new(),
            rotation: RotationState::default(),
            wet_food_status: FoodStatus::empty(FoodType::Wet),
            dry_food_status: FoodStatus::empty(FoodType::Dry),
        }
    }
}

impl AppState {
    /// Assembles a snapshot from the remote backend's three record kinds.
    pub fn from_remote(
        family_members: Vec<FamilyMember>,
        purchases: Vec<Purchase>,
        record: &RotationRecord,
        turns_locked: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let status = |food_type: FoodType| {
            // The row stores a member id; show the name while the member exists
            let by = record.last_purchased_by(food_type).and_then(|id| {
                family_members
                    .iter()
                    .find(|m| m.id == id)
                    .map(|m| m.name.clone())
            });
            compute_food_status(
                food_type,
                record.last_purchased(food_type),
                by,
                record.days_between(food_type),
                now,
            )
        };
        let wet_food_status = status(FoodType::Wet);
        let dry_food_status = status(FoodType::Dry);

        Self {
            rotation: RotationState {
                wet_food_current_index: record.wet_food_current_index,
                dry_food_current_index: record.dry_food_current_index,
                is_setup_complete: record.is_setup_complete,
                turns_locked,
            },
            family_members,
            purchases,
            wet_food_status,
            dry_food_status,
        }
    }

    /// The member whose turn it is for `food_type`, if the index resolves.
    pub fn current_member(&self, food_type: FoodType) -> Option<&FamilyMember> {
        self.family_members.get(self.rotation.index(food_type))
    }

    pub fn member_index(&self, id: &str) -> Option<usize> {
        self.family_members.iter().position(|m| m.id == id)
    }

    /// Finds a member by exact id, then by case-insensitive name.
    pub fn find_member(&self, identifier: &str) -> Option<&FamilyMember> {
        self.family_members
            .iter()
            .find(|m| m.id == identifier)
            .or_else(|| {
                self.family_members
                    .iter()
                    .find(|m| m.name.eq_ignore_ascii_case(identifier))
            })
    }

    pub fn status(&self, food_type: FoodType) -> &FoodStatus {
        match food_type {
            FoodType::Wet => &self.wet_food_status,
            FoodType::Dry => &self.dry_food_status,
        }
    }

    pub fn status_mut(&mut self, food_type: FoodType) -> &mut FoodStatus {
        match food_type {
            FoodType::Wet => &mut self.wet_food_status,
            FoodType::Dry => &mut self.dry_food_status,
        }
    }

    /// Recomputes due dates and overdue flags from the last-purchase fields.
    pub fn refresh_statuses(&mut self, days_between: u32, now: DateTime<Utc>) {
        for food_type in FoodType::ALL {
            let status = self.status_mut(food_type);
            *status = compute_food_status(
                food_type,
                status.last_purchased,
                status.last_purchased_by.take(),
                days_between,
                now,
            );
        }
    }

    /// Purchase history, newest first, optionally for a single member.
    pub fn history(&self, member_id: Option<&str>) -> Vec<&Purchase> {
        let mut purchases: Vec<&Purchase> = self
            .purchases
            .iter()
            .filter(|p| member_id.map_or(true, |id| p.family_member_id == id))
            .collect();
        purchases.sort_by(|a, b| b.date.cmp(&a.date));
        purchases
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.family_members.is_empty() {
            return writeln!(f, "No family members yet");
        }

        writeln!(f, "Family ({} member(s))", self.family_members.len())?;
        for (i, member) in self.family_members.iter().enumerate() {
            writeln!(f, "  {}. {}", i, member)?;
        }

        if !self.rotation.is_setup_complete {
            writeln!(f, "\nSetup is not complete")?;
        }

        writeln!(f)?;
        for food_type in FoodType::ALL {
            let turn = self
                .current_member(food_type)
                .map(|m| m.name.as_str())
                .unwrap_or("-");
            writeln!(f, "{} food: {}'s turn", food_type, turn)?;
            writeln!(f, "  {}", self.status(food_type))?;
        }

        if self.rotation.turns_locked {
            writeln!(f, "\nTurns are locked")?;
        }
        Ok(())
    }
}
