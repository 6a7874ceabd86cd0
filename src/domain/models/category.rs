//! Domain model for an expense category.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An expense category. Either a shared default (read-only, `user_id` empty)
/// or owned by a single user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub is_default: bool,
    pub user_id: Option<String>,
}

impl Category {
    /// Create a user-owned category.
    pub fn new_user(user_id: &str, name: &str, icon: Option<String>, color: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            icon,
            color,
            is_default: false,
            user_id: Some(user_id.to_string()),
        }
    }

    /// Create a shared default category with a stable id so seeding stays
    /// idempotent across store openings.
    pub fn default_entry(id: &str, name: &str, icon: &str, color: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            icon: Some(icon.to_string()),
            color: Some(color.to_string()),
            is_default: true,
            user_id: None,
        }
    }
}
