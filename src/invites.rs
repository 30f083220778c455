//! Invitations by email

use crate::error::{Error, Result};
use crate::Planner;
use chrono::{DateTime, Utc};
use log::{info, warn};
use partyplan_postgrest::SortOrder;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

const TABLE: &str = "event_invites";

/// Trim and lowercase; must look like an address
pub fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(Error::validation(format!("not an email address: {}", raw.trim()))),
    }
}

/// Invites only ever move from pending to accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteStatus {
    Pending,
    Accepted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteOutcome {
    Invited,
    /// The `(event, email)` pair already had an invite
    AlreadyInvited,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitedEvent {
    pub id: Uuid,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invite {
    pub id: Uuid,
    pub event_id: Uuid,
    pub email: String,
    #[serde(default)]
    pub accepted: bool,
    pub invited_by: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
    /// Embedded by [`Invites::list_mine`]
    #[serde(default, rename = "events")]
    pub event: Option<InvitedEvent>,
}

impl Invite {
    pub fn status(&self) -> InviteStatus {
        if self.accepted {
            InviteStatus::Accepted
        } else {
            InviteStatus::Pending
        }
    }
}

#[derive(Serialize)]
struct NewInvite<'a> {
    event_id: Uuid,
    email: &'a str,
    invited_by: Uuid,
}

pub struct Invites<'a> {
    planner: &'a Planner,
}

impl<'a> Invites<'a> {
    pub(crate) fn new(planner: &'a Planner) -> Self {
        Self { planner }
    }

    /// Invite `email` to an event. Re-inviting is not an error.
    pub async fn invite(&self, event_id: Uuid, email: &str) -> Result<InviteOutcome> {
        let user = self.planner.current_user()?;
        let email = normalize_email(email)?;

        let inserted = self
            .planner
            .from(TABLE)?
            .insert::<_, serde_json::Value>(&NewInvite {
                event_id,
                email: &email,
                invited_by: user.id,
            })
            .await
            .map_err(Error::from);

        match inserted {
            Ok(_) => {
                info!("invited {} to event {}", email, event_id);
                Ok(InviteOutcome::Invited)
            }
            Err(Error::Conflict(_)) => {
                warn!("{} was already invited to event {}", email, event_id);
                Ok(InviteOutcome::AlreadyInvited)
            }
            Err(e) => Err(e),
        }
    }

    /// Invite address-book entries; entries without an email are skipped.
    pub async fn invite_friends(
        &self,
        event_id: Uuid,
        friend_ids: &[Uuid],
    ) -> Result<Vec<(String, InviteOutcome)>> {
        let friends = self.planner.friends().by_ids(friend_ids).await?;

        let mut outcomes = Vec::with_capacity(friends.len());
        for friend in friends {
            let email = match friend.friend_email.as_deref() {
                Some(email) => normalize_email(email)?,
                None => {
                    warn!("friend {} has no email, not invited", friend.id);
                    continue;
                }
            };
            let outcome = self.invite(event_id, &email).await?;
            outcomes.push((email, outcome));
        }
        Ok(outcomes)
    }

    /// Invites sent for an event, newest first
    pub async fn list_for_event(&self, event_id: Uuid) -> Result<Vec<Invite>> {
        Ok(self
            .planner
            .from(TABLE)?
            .select("id,event_id,email,accepted,invited_by,created_at")
            .eq("event_id", event_id)
            .order("created_at", SortOrder::Descending)
            .execute()
            .await?)
    }

    /// Invites addressed to the caller, with the event title, newest first
    pub async fn list_mine(&self) -> Result<Vec<Invite>> {
        let user = self.planner.current_user()?;
        let mut query = self
            .planner
            .from(TABLE)?
            .select("id,event_id,email,accepted,invited_by,created_at,events:events(id,title)")
            .order("created_at", SortOrder::Descending);
        if let Some(email) = &user.email {
            query = query.eq("email", email);
        }
        Ok(query.execute().await?)
    }

    /// The caller's pending invite for an event, if one was sent
    pub async fn pending_for(&self, event_id: Uuid) -> Result<Option<Invite>> {
        let user = self.planner.current_user()?;
        let email = match &user.email {
            Some(email) => normalize_email(email)?,
            None => return Ok(None),
        };
        let invites: Vec<Invite> = self
            .planner
            .from(TABLE)?
            .select("id,event_id,email,accepted,invited_by,created_at")
            .eq("event_id", event_id)
            .eq("email", &email)
            .eq("accepted", false)
            .limit(1)
            .execute()
            .await?;
        Ok(invites.into_iter().next())
    }

    /// Accept an invite: joins the event and marks the invite accepted
    pub async fn accept(&self, invite_id: Uuid) -> Result<()> {
        let user = self.planner.current_user()?;
        self.planner
            .rpc("accept_event_invite", json!({ "invite_id": invite_id }))?
            .call_rpc::<serde_json::Value>()
            .await?;
        info!("user {} accepted invite {}", user.id, invite_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  B@X.com ").unwrap(), "b@x.com");
        assert!(matches!(normalize_email("bx.com"), Err(Error::Validation(_))));
        assert!(normalize_email("@x.com").is_err());
        assert!(normalize_email("b@").is_err());
        assert!(normalize_email("   ").is_err());
    }

    #[test]
    fn test_invite_with_embedded_event() {
        let invite: Invite = serde_json::from_value(json!({
            "id": "6f1c2d3e-0000-4000-8000-00000000000a",
            "event_id": "6f1c2d3e-0000-4000-8000-000000000001",
            "email": "b@x.com",
            "accepted": false,
            "created_at": "2026-05-01T10:00:00+00:00",
            "events": { "id": "6f1c2d3e-0000-4000-8000-000000000001", "title": "Ana's birthday" }
        }))
        .unwrap();

        assert_eq!(invite.status(), InviteStatus::Pending);
        assert_eq!(invite.invited_by, None);
        assert_eq!(
            invite.event.map(|e| e.title),
            Some("Ana's birthday".to_string())
        );
    }
}
