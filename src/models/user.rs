use serde::{Deserialize, Serialize};

/// Represents a user in the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// The numeric identifier carried in the `user-id` claim.
    pub user_id: i64,
    /// The stable string key carried in the `key` claim.
    pub key: String,
    /// The user's display name.
    pub username: String,
    /// Whether the user has elevated privileges.
    pub superuser: bool,
}
