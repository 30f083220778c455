//! Event membership: join, leave, who is coming

use crate::error::{Error, Result};
use crate::events::Event;
use crate::session::short_id;
use crate::Planner;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

const TABLE: &str = "event_members";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Creator,
    Member,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rsvp {
    Accepted,
    Pending,
    Declined,
    Maybe,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub role: Option<MemberRole>,
    pub rsvp: Option<Rsvp>,
}

/// A member with a name to show
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attendee {
    pub user_id: Uuid,
    pub name: String,
    pub role: Option<MemberRole>,
    pub rsvp: Option<Rsvp>,
}

impl Attendee {
    /// Counted under "people coming"
    pub fn is_coming(&self) -> bool {
        self.rsvp == Some(Rsvp::Accepted) || self.role == Some(MemberRole::Creator)
    }
}

pub struct Members<'a> {
    planner: &'a Planner,
}

impl<'a> Members<'a> {
    pub(crate) fn new(planner: &'a Planner) -> Self {
        Self { planner }
    }

    /// Join through a `/join/{id}` link, accepting the caller's pending
    /// invite for the event if there is one. Joining twice changes nothing.
    pub async fn join(&self, event_id: Uuid) -> Result<Event> {
        let user = self.planner.current_user()?;

        self.planner
            .from(TABLE)?
            .on_conflict("event_id,user_id")
            .upsert::<_, serde_json::Value>(
                &json!({ "event_id": event_id, "user_id": user.id }),
                true,
            )
            .await?;

        let invites = self.planner.invites();
        if let Some(invite) = invites.pending_for(event_id).await? {
            invites.accept(invite.id).await?;
        }

        info!("user {} joined event {}", user.id, event_id);
        self.planner.events().get(event_id).await
    }

    /// Leave an event. The server drops the membership and the caller's
    /// claims for that event in one call.
    pub async fn leave(&self, event_id: Uuid) -> Result<()> {
        let user = self.planner.current_user()?;
        let event = self.planner.events().get(event_id).await?;
        if event.is_creator(user.id) {
            return Err(Error::forbidden("the creator cannot leave their own event"));
        }

        self.planner
            .rpc("leave_event", json!({ "eid": event_id }))?
            .call_rpc::<serde_json::Value>()
            .await?;

        info!("user {} left event {}", user.id, event_id);
        Ok(())
    }

    pub async fn list(&self, event_id: Uuid) -> Result<Vec<Attendee>> {
        let members: Vec<Member> = self
            .planner
            .from(TABLE)?
            .select("event_id,user_id,role,rsvp")
            .eq("event_id", event_id)
            .execute()
            .await?;

        let ids: Vec<Uuid> = members.iter().map(|m| m.user_id).collect();
        let names = self.planner.profiles().names_for(&ids).await?;

        Ok(members
            .into_iter()
            .map(|m| Attendee {
                name: names
                    .get(&m.user_id)
                    .cloned()
                    .unwrap_or_else(|| short_id(&m.user_id)),
                user_id: m.user_id,
                role: m.role,
                rsvp: m.rsvp,
            })
            .collect())
    }
}
