use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::food_type::FoodType;

/// Derived purchase status for one food type.
///
/// Only `last_purchased` and `last_purchased_by` carry information; the due
/// date and overdue flag are recomputed from them whenever state is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodStatus {
    pub food_type: FoodType,
    pub last_purchased: Option<DateTime<Utc>>,
    pub last_purchased_by: Option<String>,
    pub next_due: Option<DateTime<Utc>>,
    pub is_overdue: bool,
}

impl FoodStatus {
    /// Status of a food type that has never been bought.
    pub fn empty(food_type: FoodType) -> Self {
        Self {
            food_type,
            last_purchased: None,
            last_purchased_by: None,
            next_due: None,
            is_overdue: false,
        }
    }
}

impl fmt::Display for FoodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.last_purchased, &self.last_purchased_by) {
            (Some(at), Some(by)) => write!(f, "last bought {} by {}", at.format("%Y-%m-%d"), by)?,
            (Some(at), None) => write!(f, "last bought {}", at.format("%Y-%m-%d"))?,
            _ => write!(f, "never bought")?,
        }
        if let Some(due) = self.next_due {
            write!(f, ", next due {}", due.format("%Y-%m-%d"))?;
        }
        if self.is_overdue {
            write!(f, " (OVERDUE)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_empty_status() {
        let status = FoodStatus::empty(FoodType::Wet);
        assert_eq!(status.food_type, FoodType::Wet);
        assert!(status.last_purchased.is_none());
        assert!(status.next_due.is_none());
        assert!(!status.is_overdue);
        assert_eq!(format!("{}", status), "never bought");
    }

    #[test]
    fn test_status_display_overdue() {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let status = FoodStatus {
            food_type: FoodType::Dry,
            last_purchased: Some(at),
            last_purchased_by: Some("Alice".to_string()),
            next_due: Some(Utc.with_ymd_and_hms(2025, 1, 8, 0, 0, 0).unwrap()),
            is_overdue: true,
        };

        let output = format!("{}", status);
        assert!(output.contains("by Alice"));
        assert!(output.contains("2025-01-08"));
        assert!(output.contains("OVERDUE"));
    }
}
