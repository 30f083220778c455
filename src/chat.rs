//! Event chat with surprise-safe secret messages

use crate::error::{Error, Result};
use crate::events::{Event, EventType};
use crate::session::short_id;
use crate::Planner;
use chrono::{DateTime, Utc};
use log::info;
use partyplan_postgrest::SortOrder;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TABLE: &str = "event_messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    General,
    /// Kept from the creator of a surprise event
    Secret,
}

impl Visibility {
    /// Visibilities offered for an event of this type
    pub fn allowed_for(event_type: EventType) -> &'static [Visibility] {
        match event_type {
            EventType::Birthday => &[Visibility::General, Visibility::Secret],
            _ => &[Visibility::General],
        }
    }

    pub fn is_allowed_for(self, event_type: EventType) -> bool {
        Self::allowed_for(event_type).contains(&self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub event_id: Uuid,
    pub sender_id: Uuid,
    #[serde(default)]
    pub visibility: Visibility,
    pub body: String,
    pub created_at: Option<DateTime<Utc>>,
    /// Filled from `profiles` by [`Chat::list`]
    #[serde(default, skip_serializing)]
    pub sender_name: Option<String>,
}

#[derive(Serialize)]
struct NewMessage<'a> {
    event_id: Uuid,
    sender_id: Uuid,
    visibility: Visibility,
    body: &'a str,
}

/// Drop secret messages when the viewer is the creator of a surprise event
pub fn visible_messages(messages: Vec<Message>, event: &Event, viewer: Uuid) -> Vec<Message> {
    if !(event.surprise_mode && event.is_creator(viewer)) {
        return messages;
    }
    messages
        .into_iter()
        .filter(|m| m.visibility != Visibility::Secret)
        .collect()
}

pub struct Chat<'a> {
    planner: &'a Planner,
}

impl<'a> Chat<'a> {
    pub(crate) fn new(planner: &'a Planner) -> Self {
        Self { planner }
    }

    pub async fn send(&self, event: &Event, visibility: Visibility, body: &str) -> Result<Message> {
        let user = self.planner.current_user()?;
        let body = body.trim();
        if body.is_empty() {
            return Err(Error::validation("message is empty"));
        }
        if !visibility.is_allowed_for(event.event_type) {
            return Err(Error::validation(format!(
                "secret messages are only available for birthdays, not {} events",
                event.event_type
            )));
        }

        let rows: Vec<Message> = self
            .planner
            .from(TABLE)?
            .insert(&NewMessage {
                event_id: event.id,
                sender_id: user.id,
                visibility,
                body,
            })
            .await?;
        let mut message = rows
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("sent message was not returned"))?;
        message.sender_name = Some(user.display_name);

        info!("message {} posted to event {}", message.id, event.id);
        Ok(message)
    }

    /// Messages of an event, oldest first, with sender names
    pub async fn list(&self, event_id: Uuid) -> Result<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .planner
            .from(TABLE)?
            .select("id,event_id,sender_id,visibility,body,created_at")
            .eq("event_id", event_id)
            .order("created_at", SortOrder::Ascending)
            .execute()
            .await?;

        let ids: Vec<Uuid> = messages.iter().map(|m| m.sender_id).collect();
        let names = self.planner.profiles().names_for(&ids).await?;
        for message in &mut messages {
            message.sender_name = Some(
                names
                    .get(&message.sender_id)
                    .cloned()
                    .unwrap_or_else(|| short_id(&message.sender_id)),
            );
        }
        Ok(messages)
    }
}
