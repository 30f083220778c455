//! Events: create, read, edit, delete

use crate::error::{Error, Result};
use crate::members::{MemberRole, Rsvp};
use crate::Planner;
use chrono::{DateTime, Utc};
use log::{info, warn};
use partyplan_postgrest::SortOrder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const TABLE: &str = "events";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Grill,
    Birthday,
    Other,
}

impl EventType {
    /// Birthdays are surprises: the creator does not see who brings what
    pub fn surprise_mode(self) -> bool {
        self == EventType::Birthday
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Grill => "grill",
            EventType::Birthday => "birthday",
            EventType::Other => "other",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "grill" => Ok(EventType::Grill),
            "birthday" => Ok(EventType::Birthday),
            "other" => Ok(EventType::Other),
            other => Err(Error::validation(format!("unknown event type: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub surprise_mode: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl Event {
    pub fn is_creator(&self, user_id: Uuid) -> bool {
        self.creator_id == user_id
    }

    /// Claims are hidden from the creator of a surprise event
    pub fn hides_claims_from(&self, viewer: Uuid) -> bool {
        self.surprise_mode && self.is_creator(viewer)
    }
}

/// Form input for creating or editing an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub title: String,
    pub event_type: EventType,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub description: Option<String>,
}

impl EventDraft {
    pub fn new(title: &str, event_type: EventType) -> Self {
        Self {
            title: title.to_string(),
            event_type,
            starts_at: None,
            ends_at: None,
            location: None,
            description: None,
        }
    }

    pub fn with_times(
        mut self,
        starts_at: Option<DateTime<Utc>>,
        ends_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.starts_at = starts_at;
        self.ends_at = ends_at;
        self
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Validated column values; `surprise_mode` follows the type.
    pub(crate) fn fields(&self) -> Result<EventFields> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(Error::validation("title is required"));
        }
        if let (Some(starts), Some(ends)) = (self.starts_at, self.ends_at) {
            if ends < starts {
                return Err(Error::validation("the event cannot end before it starts"));
            }
        }

        Ok(EventFields {
            title: title.to_string(),
            event_type: self.event_type,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            location: blank_to_none(self.location.as_deref()),
            description: blank_to_none(self.description.as_deref()),
            surprise_mode: self.event_type.surprise_mode(),
        })
    }
}

pub(crate) fn blank_to_none(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct EventFields {
    title: String,
    #[serde(rename = "type")]
    event_type: EventType,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    location: Option<String>,
    description: Option<String>,
    surprise_mode: bool,
}

#[derive(Serialize)]
struct NewEvent {
    creator_id: Uuid,
    #[serde(flatten)]
    fields: EventFields,
}

#[derive(Serialize)]
struct CreatorMembership {
    event_id: Uuid,
    user_id: Uuid,
    role: MemberRole,
    rsvp: Rsvp,
}

#[derive(Deserialize)]
struct MembershipRef {
    event_id: Uuid,
}

pub struct Events<'a> {
    planner: &'a Planner,
}

impl<'a> Events<'a> {
    pub(crate) fn new(planner: &'a Planner) -> Self {
        Self { planner }
    }

    /// Create an event with the caller as accepted creator-member.
    ///
    /// If the membership cannot be written the event row is removed again.
    pub async fn create(&self, draft: &EventDraft) -> Result<Event> {
        let user = self.planner.current_user()?;
        let fields = draft.fields()?;

        let rows: Vec<Event> = self
            .planner
            .from(TABLE)?
            .insert(&NewEvent {
                creator_id: user.id,
                fields,
            })
            .await?;
        let event = rows
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("created event was not returned"))?;

        let membership = CreatorMembership {
            event_id: event.id,
            user_id: user.id,
            role: MemberRole::Creator,
            rsvp: Rsvp::Accepted,
        };
        let joined = self
            .planner
            .from("event_members")?
            .insert::<_, serde_json::Value>(&membership)
            .await;

        if let Err(e) = joined {
            warn!(
                "creator membership for event {} failed, removing the event: {}",
                event.id, e
            );
            let rollback = self
                .planner
                .from(TABLE)?
                .eq("id", event.id)
                .delete::<serde_json::Value>()
                .await;
            if let Err(rollback_err) = rollback {
                warn!("could not remove event {}: {}", event.id, rollback_err);
            }
            return Err(e.into());
        }

        info!("created event {} ({})", event.id, event.event_type);
        Ok(event)
    }

    pub async fn get(&self, id: Uuid) -> Result<Event> {
        self.planner
            .from(TABLE)?
            .select("*")
            .eq("id", id)
            .maybe_single()
            .await?
            .ok_or_else(|| Error::not_found(format!("event {}", id)))
    }

    /// Events the caller belongs to, soonest first
    pub async fn list_mine(&self) -> Result<Vec<Event>> {
        let user = self.planner.current_user()?;

        let memberships: Vec<MembershipRef> = self
            .planner
            .from("event_members")?
            .select("event_id")
            .eq("user_id", user.id)
            .execute()
            .await?;
        if memberships.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = memberships.into_iter().map(|m| m.event_id).collect();
        Ok(self
            .planner
            .from(TABLE)?
            .select("*")
            .in_list("id", &ids)
            .order("starts_at", SortOrder::Ascending)
            .execute()
            .await?)
    }

    /// Replace every editable field. Creator only.
    pub async fn update(&self, id: Uuid, draft: &EventDraft) -> Result<Event> {
        let user = self.planner.current_user()?;
        let event = self.get(id).await?;
        if !event.is_creator(user.id) {
            return Err(Error::forbidden("only the creator can edit this event"));
        }
        let fields = draft.fields()?;

        let rows: Vec<Event> = self
            .planner
            .from(TABLE)?
            .eq("id", id)
            .update(&fields)
            .await?;

        info!("updated event {}", id);
        rows.into_iter()
            .next()
            .ok_or_else(|| Error::forbidden("event was not updated"))
    }

    /// Delete an event after the creator re-enters their password
    pub async fn delete(&self, id: Uuid, password: &str) -> Result<()> {
        let user = self.planner.current_user()?;
        let event = self.get(id).await?;
        if !event.is_creator(user.id) {
            return Err(Error::forbidden("only the creator can delete this event"));
        }
        if password.is_empty() {
            return Err(Error::InvalidCredentials);
        }

        self.planner.auth().reauthenticate(password).await?;

        let rows: Vec<serde_json::Value> = self
            .planner
            .from(TABLE)?
            .eq("id", id)
            .delete()
            .await?;
        if rows.is_empty() {
            return Err(Error::forbidden("event was not deleted"));
        }

        info!("deleted event {}", id);
        Ok(())
    }
}
