mod app_state;
mod family_member;
mod food_status;
mod food_type;
mod purchase;
mod rotation_state;

pub use app_state::AppState;
pub use family_member::{default_color, FamilyMember, MAX_MEMBERS, MAX_NAME_LEN, MEMBER_COLORS};
pub use food_status::FoodStatus;
pub use food_type::FoodType;
pub use purchase::{Purchase, UNKNOWN_MEMBER};
pub use rotation_state::{RotationRecord, RotationState, RotationUpdate};
