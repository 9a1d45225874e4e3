//! The acting user behind every mutating call.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of the acting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Therapist,
    Admin,
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorRole::Therapist => write!(f, "therapist"),
            ActorRole::Admin => write!(f, "admin"),
        }
    }
}

/// Identity attributed to acknowledgments, resolutions and adjudications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub display_name: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn therapist(user_id: Uuid, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            role: ActorRole::Therapist,
        }
    }

    pub fn admin(user_id: Uuid, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            role: ActorRole::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }
}
