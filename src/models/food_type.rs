use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoodType {
    Wet,
    Dry,
}

impl FoodType {
    pub const ALL: [FoodType; 2] = [FoodType::Wet, FoodType::Dry];

    pub fn as_str(&self) -> &'static str {
        match self {
            FoodType::Wet => "wet",
            FoodType::Dry => "dry",
        }
    }
}

impl fmt::Display for FoodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FoodType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wet" => Ok(FoodType::Wet),
            "dry" => Ok(FoodType::Dry),
            _ => Err(format!(
                "Invalid food type '{}'. Valid options: wet, dry",
                s
            )),
        }
    }
}
