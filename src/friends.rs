//! Address book used for bulk invites

use crate::error::{Error, Result};
use crate::events::blank_to_none;
use crate::invites::normalize_email;
use crate::Planner;
use log::info;
use partyplan_postgrest::SortOrder;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TABLE: &str = "friends";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friend {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub friend_email: Option<String>,
    pub friend_name: Option<String>,
}

impl Friend {
    pub fn label(&self) -> &str {
        self.friend_name
            .as_deref()
            .or(self.friend_email.as_deref())
            .unwrap_or("Unnamed friend")
    }
}

#[derive(Serialize)]
struct NewFriend {
    owner_id: Uuid,
    friend_email: String,
    friend_name: Option<String>,
}

pub struct Friends<'a> {
    planner: &'a Planner,
}

impl<'a> Friends<'a> {
    pub(crate) fn new(planner: &'a Planner) -> Self {
        Self { planner }
    }

    pub async fn list(&self) -> Result<Vec<Friend>> {
        let user = self.planner.current_user()?;
        Ok(self
            .planner
            .from(TABLE)?
            .select("*")
            .eq("owner_id", user.id)
            .order("friend_name", SortOrder::Ascending)
            .execute()
            .await?)
    }

    /// Friends of the caller among `ids`
    pub async fn by_ids(&self, ids: &[Uuid]) -> Result<Vec<Friend>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let user = self.planner.current_user()?;
        Ok(self
            .planner
            .from(TABLE)?
            .select("*")
            .eq("owner_id", user.id)
            .in_list("id", ids)
            .execute()
            .await?)
    }

    pub async fn add(&self, name: &str, email: &str) -> Result<Friend> {
        let user = self.planner.current_user()?;
        let row = NewFriend {
            owner_id: user.id,
            friend_email: normalize_email(email)?,
            friend_name: blank_to_none(Some(name)),
        };

        let rows: Vec<Friend> = self.planner.from(TABLE)?.insert(&row).await?;
        let friend = rows
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("created friend was not returned"))?;
        info!("added friend {} for {}", friend.id, user.id);
        Ok(friend)
    }

    pub async fn remove(&self, id: Uuid) -> Result<()> {
        let user = self.planner.current_user()?;
        let rows: Vec<Friend> = self
            .planner
            .from(TABLE)?
            .eq("id", id)
            .eq("owner_id", user.id)
            .delete()
            .await?;
        if rows.is_empty() {
            return Err(Error::not_found(format!("friend {}", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label() {
        let mut friend = Friend {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            friend_email: Some("ana@x.com".to_string()),
            friend_name: Some("Ana".to_string()),
        };
        assert_eq!(friend.label(), "Ana");
        friend.friend_name = None;
        assert_eq!(friend.label(), "ana@x.com");
        friend.friend_email = None;
        assert_eq!(friend.label(), "Unnamed friend");
    }
}
