//! The signed-in user as seen by the planner

use crate::error::{Error, Result};
use partyplan_auth::User;
use uuid::Uuid;

pub const UNKNOWN_USER: &str = "Unknown user";

/// Name to show for an auth user: metadata full name, then email, then
/// [`UNKNOWN_USER`].
pub fn display_name(user: &User) -> String {
    metadata_full_name(user)
        .or_else(|| {
            user.email
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| UNKNOWN_USER.to_string())
}

fn metadata_full_name(user: &User) -> Option<String> {
    user.metadata_str("full_name")
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

/// Fallback label for a user without a profile name
pub fn short_id(id: &Uuid) -> String {
    id.to_string().chars().take(6).collect()
}

/// Identity of the caller, taken from the current session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: Option<String>,
    /// Full name from the auth metadata, if any
    pub full_name: Option<String>,
    pub display_name: String,
}

impl CurrentUser {
    pub fn from_user(user: &User) -> Result<Self> {
        let id = Uuid::parse_str(&user.id)
            .map_err(|e| Error::validation(format!("user id {} is not a uuid: {}", user.id, e)))?;

        Ok(Self {
            id,
            email: user.email.as_ref().map(|e| e.trim().to_lowercase()),
            full_name: metadata_full_name(user),
            display_name: display_name(user),
        })
    }
}
