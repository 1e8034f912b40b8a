//! Turn rotation arithmetic.
//!
//! Pure functions shared by every store; no store computes turns or due
//! dates on its own.

use chrono::{DateTime, Duration, Utc};

use crate::models::{FoodStatus, FoodType};

/// Days between purchases of the same food type.
pub const DEFAULT_DAYS_BETWEEN: u32 = 7;

/// Index of the member after `current`, wrapping to the front.
///
/// `member_count` must be non-zero; callers check for an empty household
/// before advancing.
pub fn next_index(current: usize, member_count: usize) -> usize {
    debug_assert!(member_count > 0, "next_index called with no members");
    (current + 1) % member_count
}

/// Keeps a stale index inside `[0, member_count)` after the list shrinks.
///
/// A removed member's slot is absorbed positionally; the turn is not
/// tracked by member identity.
pub fn clamp_index(index: usize, member_count: usize) -> usize {
    index.min(member_count.saturating_sub(1))
}

/// Derives the due date and overdue flag from the last purchase.
pub fn compute_food_status(
    food_type: FoodType,
    last_purchased: Option<DateTime<Utc>>,
    last_purchased_by: Option<String>,
    days_between: u32,
    now: DateTime<Utc>,
) -> FoodStatus {
    let next_due = last_purchased.map(|at| at + Duration::days(i64::from(days_between)));
    let is_overdue = next_due.map_or(false, |due| due < now);

    FoodStatus {
        food_type,
        last_purchased,
        last_purchased_by,
        next_due,
        is_overdue,
    }
}
