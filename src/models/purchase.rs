use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::family_member::FamilyMember;
use super::food_type::FoodType;

/// Name shown for purchases whose member has since been removed.
pub const UNKNOWN_MEMBER: &str = "Unknown";

/// A recorded food purchase. Purchases are never edited once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: String,
    pub family_member_id: String,
    pub family_member_name: String,
    pub food_type: FoodType,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

impl Purchase {
    pub fn new(member: &FamilyMember, food_type: FoodType, date: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            family_member_id: member.id.clone(),
            family_member_name: member.name.clone(),
            food_type,
            date,
            amount: None,
        }
    }

    pub fn with_amount(mut self, amount: Option<f64>) -> Self {
        self.amount = amount;
        self
    }
}

impl fmt::Display for Purchase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  {:<4}  {}",
            self.date.format("%Y-%m-%d %H:%M"),
            self.food_type,
            self.family_member_name
        )?;
        if let Some(amount) = self.amount {
            write!(f, "  ({:.2})", amount)?;
        }
        Ok(())
    }
}
