use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Upper bound on household size.
pub const MAX_MEMBERS: usize = 8;

/// Longest accepted member name, in characters.
pub const MAX_NAME_LEN: usize = 20;

/// Display tags handed out to new members in order.
pub const MEMBER_COLORS: [&str; 8] = [
    "blue", "purple", "pink", "green", "yellow", "red", "indigo", "teal",
];

/// Color for the member that would be added at `position`.
pub fn default_color(position: usize) -> &'static str {
    MEMBER_COLORS[position % MEMBER_COLORS.len()]
}

/// A household member taking part in the purchase rotation.
///
/// Member order is insertion order and defines the rotation sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyMember {
    pub id: String,
    pub name: String,
    pub color: String,
}

impl FamilyMember {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            color: color.into(),
        }
    }

    /// Checks a (trimmed) name against the naming rules.
    pub fn validate_name(name: &str) -> Result<(), String> {
        if name.is_empty() {
            return Err("Member name cannot be empty".to_string());
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(format!(
                "Member name cannot be longer than {} characters",
                MAX_NAME_LEN
            ));
        }
        Ok(())
    }
}

impl fmt::Display for FamilyMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.color)
    }
}
