//! Things to bring and who claimed them

use crate::error::{Error, Result};
use crate::events::blank_to_none;
use crate::session::short_id;
use crate::Planner;
use chrono::{DateTime, Utc};
use log::{info, warn};
use partyplan_postgrest::SortOrder;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const ITEMS: &str = "event_items";
const CLAIMS: &str = "item_claims";
const CLAIM_COLUMNS: &str = "id,event_id,event_item_id,user_id,created_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimMode {
    /// One person brings it
    #[default]
    Single,
    Multi,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub event_id: Uuid,
    pub title: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub claim_mode: ClaimMode,
    pub created_by: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDraft {
    pub title: String,
    pub notes: Option<String>,
    pub claim_mode: ClaimMode,
}

impl ItemDraft {
    pub fn new(title: &str, claim_mode: ClaimMode) -> Self {
        Self {
            title: title.to_string(),
            notes: None,
            claim_mode,
        }
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }

    fn fields(&self) -> Result<ItemFields> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(Error::validation("item title is required"));
        }
        Ok(ItemFields {
            title: title.to_string(),
            notes: blank_to_none(self.notes.as_deref()),
            claim_mode: self.claim_mode,
        })
    }
}

#[derive(Serialize)]
struct ItemFields {
    title: String,
    notes: Option<String>,
    claim_mode: ClaimMode,
}

#[derive(Serialize)]
struct NewItem {
    event_id: Uuid,
    created_by: Uuid,
    #[serde(flatten)]
    fields: ItemFields,
}

#[derive(Serialize)]
struct NewClaim {
    event_id: Uuid,
    event_item_id: Uuid,
    user_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub id: Uuid,
    pub event_id: Option<Uuid>,
    pub event_item_id: Uuid,
    pub user_id: Uuid,
    pub created_at: Option<DateTime<Utc>>,
    /// Filled from `profiles` by [`Items::claims`]
    #[serde(default, skip_serializing)]
    pub full_name: Option<String>,
}

impl Claim {
    pub fn display_name(&self) -> String {
        self.full_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| short_id(&self.user_id))
    }
}

/// What an item's claim line says to a given viewer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimStatus {
    /// Surprise mode and the viewer is the creator
    Hidden,
    Unclaimed,
    ClaimedBy(Vec<String>),
}

impl ClaimStatus {
    pub fn for_item(
        item: &Item,
        claims: &[Claim],
        viewer_is_creator: bool,
        surprise_mode: bool,
    ) -> Self {
        if surprise_mode && viewer_is_creator {
            return ClaimStatus::Hidden;
        }

        let mut holders = claims.iter().filter(|c| c.event_item_id == item.id);
        let names: Vec<String> = match item.claim_mode {
            ClaimMode::Single => holders.next().map(Claim::display_name).into_iter().collect(),
            ClaimMode::Multi => holders.map(Claim::display_name).collect(),
        };

        if names.is_empty() {
            ClaimStatus::Unclaimed
        } else {
            ClaimStatus::ClaimedBy(names)
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimStatus::Hidden => f.write_str("Surprise mode: creator can't see claims"),
            ClaimStatus::Unclaimed => f.write_str("Not claimed yet"),
            ClaimStatus::ClaimedBy(names) => write!(f, "Claimed by {}", names.join(", ")),
        }
    }
}

/// Whether `user_id` holds a claim on `item`
pub fn claimed_by(item: &Item, claims: &[Claim], user_id: Uuid) -> bool {
    claims
        .iter()
        .any(|c| c.event_item_id == item.id && c.user_id == user_id)
}

pub struct Items<'a> {
    planner: &'a Planner,
}

impl<'a> Items<'a> {
    pub(crate) fn new(planner: &'a Planner) -> Self {
        Self { planner }
    }

    pub async fn add(&self, event_id: Uuid, draft: &ItemDraft) -> Result<Item> {
        let user = self.planner.current_user()?;
        let row = NewItem {
            event_id,
            created_by: user.id,
            fields: draft.fields()?,
        };

        let rows: Vec<Item> = self.planner.from(ITEMS)?.insert(&row).await?;
        let item = rows
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("created item was not returned"))?;
        info!("added item {} to event {}", item.id, event_id);
        Ok(item)
    }

    pub async fn update(&self, item_id: Uuid, draft: &ItemDraft) -> Result<Item> {
        self.planner.current_user()?;
        let rows: Vec<Item> = self
            .planner
            .from(ITEMS)?
            .eq("id", item_id)
            .update(&draft.fields()?)
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("item {}", item_id)))
    }

    pub async fn remove(&self, item_id: Uuid) -> Result<()> {
        self.planner.current_user()?;
        let rows: Vec<Item> = self
            .planner
            .from(ITEMS)?
            .eq("id", item_id)
            .delete()
            .await?;
        if rows.is_empty() {
            return Err(Error::not_found(format!("item {}", item_id)));
        }
        info!("removed item {}", item_id);
        Ok(())
    }

    pub async fn list(&self, event_id: Uuid) -> Result<Vec<Item>> {
        Ok(self
            .planner
            .from(ITEMS)?
            .select("*")
            .eq("event_id", event_id)
            .order("created_at", SortOrder::Ascending)
            .execute()
            .await?)
    }

    /// Claims for an event with claimant names
    pub async fn claims(&self, event_id: Uuid) -> Result<Vec<Claim>> {
        let mut claims: Vec<Claim> = self
            .planner
            .from(CLAIMS)?
            .select(CLAIM_COLUMNS)
            .eq("event_id", event_id)
            .order("created_at", SortOrder::Ascending)
            .execute()
            .await?;

        let ids: Vec<Uuid> = claims.iter().map(|c| c.user_id).collect();
        let names = self.planner.profiles().names_for(&ids).await?;
        for claim in &mut claims {
            claim.full_name = names.get(&claim.user_id).cloned();
        }
        Ok(claims)
    }

    /// Claim an item for the caller.
    ///
    /// A single-mode item held by someone else is a conflict. Claiming
    /// something the caller already holds does nothing.
    pub async fn claim(&self, item: &Item) -> Result<()> {
        let user = self.planner.current_user()?;

        let holders: Vec<Claim> = self
            .planner
            .from(CLAIMS)?
            .select(CLAIM_COLUMNS)
            .eq("event_item_id", item.id)
            .execute()
            .await?;
        if holders.iter().any(|c| c.user_id == user.id) {
            return Ok(());
        }
        if item.claim_mode == ClaimMode::Single && !holders.is_empty() {
            return Err(Error::conflict(format!("{} is already claimed", item.title)));
        }

        let inserted = self
            .planner
            .from(CLAIMS)?
            .insert::<_, serde_json::Value>(&NewClaim {
                event_id: item.event_id,
                event_item_id: item.id,
                user_id: user.id,
            })
            .await
            .map_err(Error::from);

        match inserted {
            Ok(_) => {
                info!("user {} claimed item {}", user.id, item.id);
                Ok(())
            }
            Err(Error::Conflict(msg)) => {
                warn!("claim on item {} lost a race: {}", item.id, msg);
                Err(Error::conflict(format!("{} is already claimed", item.title)))
            }
            Err(e) => Err(e),
        }
    }

    /// Release the caller's own claim
    pub async fn unclaim(&self, item: &Item) -> Result<()> {
        let user = self.planner.current_user()?;
        self.planner
            .from(CLAIMS)?
            .eq("event_id", item.event_id)
            .eq("event_item_id", item.id)
            .eq("user_id", user.id)
            .delete::<serde_json::Value>()
            .await?;
        info!("user {} unclaimed item {}", user.id, item.id);
        Ok(())
    }
}
