//! Everything the event page shows, loaded in one go

use crate::chat::{visible_messages, Message};
use crate::error::Result;
use crate::events::Event;
use crate::invites::Invite;
use crate::items::{claimed_by, Claim, ClaimStatus, Item};
use crate::members::Attendee;
use crate::polls::PollCard;
use crate::Planner;
use log::debug;
use uuid::Uuid;

/// An item with its claim line for the viewer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemView {
    pub item: Item,
    pub status: ClaimStatus,
    pub i_claimed: bool,
}

#[derive(Debug, Clone)]
pub struct EventPage {
    pub event: Event,
    pub viewer: Uuid,
    pub is_creator: bool,
    pub hide_claims: bool,
    pub items: Vec<ItemView>,
    /// Empty when `hide_claims` is set
    pub claims: Vec<Claim>,
    pub attendees: Vec<Attendee>,
    /// Only loaded for the creator
    pub invites: Vec<Invite>,
    pub polls: Vec<PollCard>,
    pub messages: Vec<Message>,
}

impl EventPage {
    /// Fetch the whole page. Call again after every mutation.
    pub async fn load(planner: &Planner, event_id: Uuid) -> Result<Self> {
        let user = planner.current_user()?;
        let event = planner.events().get(event_id).await?;
        let is_creator = event.is_creator(user.id);
        let hide_claims = event.hides_claims_from(user.id);
        debug!("loading event page {} for {}", event_id, user.id);

        let items = planner.items();
        let members = planner.members();
        let polls = planner.polls();
        let chat = planner.chat();
        let (item_rows, claims, attendees, polls, messages) = tokio::try_join!(
            items.list(event_id),
            items.claims(event_id),
            members.list(event_id),
            polls.board(event_id, user.id),
            chat.list(event_id),
        )?;

        let invites = if is_creator {
            planner.invites().list_for_event(event_id).await?
        } else {
            Vec::new()
        };

        // whatever the backend returned, a surprise creator gets no claim data
        let claims = if hide_claims { Vec::new() } else { claims };
        let items = item_rows
            .into_iter()
            .map(|item| ItemView {
                status: ClaimStatus::for_item(&item, &claims, is_creator, event.surprise_mode),
                i_claimed: claimed_by(&item, &claims, user.id),
                item,
            })
            .collect();
        let messages = visible_messages(messages, &event, user.id);

        Ok(Self {
            event,
            viewer: user.id,
            is_creator,
            hide_claims,
            items,
            claims,
            attendees,
            invites,
            polls,
            messages,
        })
    }

    /// Members who said yes
    pub fn people_coming(&self) -> impl Iterator<Item = &Attendee> {
        self.attendees.iter().filter(|a| a.is_coming())
    }
}
