//! Polls and vote toggling

use crate::error::{Error, Result};
use crate::events::Event;
use crate::session::short_id;
use crate::Planner;
use chrono::{DateTime, Utc};
use log::{info, warn};
use partyplan_postgrest::SortOrder;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

const POLLS: &str = "event_polls";
const OPTIONS: &str = "event_poll_options";
const VOTES: &str = "event_poll_votes";

pub const MIN_OPTIONS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollMode {
    #[default]
    Single,
    Multi,
}

impl PollMode {
    /// Anything mentioning "multi" is multi; everything else, including no
    /// value, is single.
    pub fn from_stored(raw: Option<&str>) -> Self {
        match raw {
            Some(mode) if mode.to_lowercase().contains("multi") => PollMode::Multi,
            _ => PollMode::Single,
        }
    }
}

impl<'de> Deserialize<'de> for PollMode {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(PollMode::from_stored(raw.as_deref()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: Uuid,
    pub event_id: Uuid,
    pub question: String,
    #[serde(default)]
    pub mode: PollMode,
    pub created_by: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub event_id: Option<Uuid>,
    pub poll_id: Uuid,
    pub option_id: Uuid,
    pub user_id: Uuid,
}

/// What a toggle did to the caller's selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteChange {
    Added(Uuid),
    Removed(Uuid),
    /// Single mode: the previous choice was swapped out
    Replaced { previous: Vec<Uuid>, option: Uuid },
}

/// Selection after toggling `option` on top of `current`.
///
/// Picking a selected option removes it. In single mode a new option
/// replaces whatever was selected, so the result never holds more than one
/// option; in multi mode it is added next to the others.
pub fn plan_toggle(
    mode: PollMode,
    current: &BTreeSet<Uuid>,
    option: Uuid,
) -> (BTreeSet<Uuid>, VoteChange) {
    let mut next = current.clone();

    if next.remove(&option) {
        if mode == PollMode::Single {
            next.clear();
        }
        return (next, VoteChange::Removed(option));
    }

    match mode {
        PollMode::Multi => {
            next.insert(option);
            (next, VoteChange::Added(option))
        }
        PollMode::Single if current.is_empty() => {
            (BTreeSet::from([option]), VoteChange::Added(option))
        }
        PollMode::Single => (
            BTreeSet::from([option]),
            VoteChange::Replaced {
                previous: current.iter().copied().collect(),
                option,
            },
        ),
    }
}

/// Option lines from a textarea: trimmed, blanks dropped
pub fn parse_options(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// One option with its tally, as shown on the poll card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionTally {
    pub option: PollOption,
    pub votes: usize,
    pub voters: Vec<String>,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollCard {
    pub poll: Poll,
    pub options: Vec<OptionTally>,
    pub my_selection: BTreeSet<Uuid>,
}

#[derive(Serialize)]
struct NewPoll<'a> {
    event_id: Uuid,
    question: &'a str,
    mode: PollMode,
    created_by: Uuid,
}

#[derive(Serialize)]
struct NewOption<'a> {
    poll_id: Uuid,
    label: &'a str,
}

pub struct Polls<'a> {
    planner: &'a Planner,
}

impl<'a> Polls<'a> {
    pub(crate) fn new(planner: &'a Planner) -> Self {
        Self { planner }
    }

    /// Create a poll with one option per non-blank line of `raw_options`.
    /// Only the event creator may do this.
    pub async fn create(
        &self,
        event: &Event,
        question: &str,
        mode: PollMode,
        raw_options: &str,
    ) -> Result<Poll> {
        let user = self.planner.current_user()?;
        if !event.is_creator(user.id) {
            return Err(Error::forbidden("only the creator can add polls"));
        }
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::validation("question is required"));
        }
        let labels = parse_options(raw_options);
        if labels.len() < MIN_OPTIONS {
            return Err(Error::validation(format!(
                "add at least {} options",
                MIN_OPTIONS
            )));
        }

        let rows: Vec<Poll> = self
            .planner
            .from(POLLS)?
            .insert(&NewPoll {
                event_id: event.id,
                question,
                mode,
                created_by: user.id,
            })
            .await?;
        let poll = rows
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("created poll was not returned"))?;

        let options: Vec<NewOption> = labels
            .iter()
            .map(|label| NewOption {
                poll_id: poll.id,
                label,
            })
            .collect();
        let inserted = self
            .planner
            .from(OPTIONS)?
            .insert::<_, serde_json::Value>(&options)
            .await;

        if let Err(e) = inserted {
            warn!("options for poll {} failed, removing the poll: {}", poll.id, e);
            let rollback = self
                .planner
                .from(POLLS)?
                .eq("id", poll.id)
                .delete::<serde_json::Value>()
                .await;
            if let Err(rollback_err) = rollback {
                warn!("could not remove poll {}: {}", poll.id, rollback_err);
            }
            return Err(e.into());
        }

        info!("created poll {} with {} options", poll.id, labels.len());
        Ok(poll)
    }

    /// The caller's current selection in `poll_id`
    pub async fn my_votes(&self, poll_id: Uuid) -> Result<BTreeSet<Uuid>> {
        let user = self.planner.current_user()?;
        let votes: Vec<Vote> = self
            .planner
            .from(VOTES)?
            .select("event_id,poll_id,option_id,user_id")
            .eq("poll_id", poll_id)
            .eq("user_id", user.id)
            .execute()
            .await?;
        Ok(votes.into_iter().map(|v| v.option_id).collect())
    }

    /// Toggle the caller's vote for `option_id`. The swap itself happens in
    /// one server call; the returned change is what the caller should expect
    /// to see after a reload.
    pub async fn toggle_vote(&self, poll: &Poll, option_id: Uuid) -> Result<VoteChange> {
        let current = self.my_votes(poll.id).await?;
        let (_, change) = plan_toggle(poll.mode, &current, option_id);

        self.planner
            .rpc(
                "toggle_poll_vote",
                json!({ "poll_id": poll.id, "option_id": option_id }),
            )?
            .call_rpc::<serde_json::Value>()
            .await?;

        info!("vote on poll {}: {:?}", poll.id, change);
        Ok(change)
    }

    /// Delete a poll with its votes and options, in that order.
    /// Only the event creator may do this.
    pub async fn delete(&self, event: &Event, poll_id: Uuid) -> Result<()> {
        let user = self.planner.current_user()?;
        if !event.is_creator(user.id) {
            return Err(Error::forbidden("only the creator can delete polls"));
        }

        self.planner
            .from(VOTES)?
            .eq("poll_id", poll_id)
            .delete::<serde_json::Value>()
            .await?;
        self.planner
            .from(OPTIONS)?
            .eq("poll_id", poll_id)
            .delete::<serde_json::Value>()
            .await?;
        let rows: Vec<Poll> = self
            .planner
            .from(POLLS)?
            .eq("id", poll_id)
            .eq("event_id", event.id)
            .delete()
            .await?;
        if rows.is_empty() {
            return Err(Error::not_found(format!("poll {}", poll_id)));
        }

        info!("deleted poll {}", poll_id);
        Ok(())
    }

    /// Every poll of an event with options, tallies and voter names
    pub async fn board(&self, event_id: Uuid, me: Uuid) -> Result<Vec<PollCard>> {
        let polls: Vec<Poll> = self
            .planner
            .from(POLLS)?
            .select("*")
            .eq("event_id", event_id)
            .order("created_at", SortOrder::Ascending)
            .execute()
            .await?;
        if polls.is_empty() {
            return Ok(Vec::new());
        }

        let poll_ids: Vec<Uuid> = polls.iter().map(|p| p.id).collect();
        let options: Vec<PollOption> = self
            .planner
            .from(OPTIONS)?
            .select("id,poll_id,label")
            .in_list("poll_id", &poll_ids)
            .execute()
            .await?;
        let votes: Vec<Vote> = self
            .planner
            .from(VOTES)?
            .select("event_id,poll_id,option_id,user_id")
            .in_list("poll_id", &poll_ids)
            .execute()
            .await?;

        let voter_ids: Vec<Uuid> = votes.iter().map(|v| v.user_id).collect();
        let names = self.planner.profiles().names_for(&voter_ids).await?;

        Ok(assemble_board(polls, options, &votes, &names, me))
    }
}

fn assemble_board(
    polls: Vec<Poll>,
    options: Vec<PollOption>,
    votes: &[Vote],
    names: &HashMap<Uuid, String>,
    me: Uuid,
) -> Vec<PollCard> {
    let mut options_by_poll: HashMap<Uuid, Vec<PollOption>> = HashMap::new();
    for option in options {
        options_by_poll.entry(option.poll_id).or_default().push(option);
    }

    polls
        .into_iter()
        .map(|poll| {
            let my_selection: BTreeSet<Uuid> = votes
                .iter()
                .filter(|v| v.poll_id == poll.id && v.user_id == me)
                .map(|v| v.option_id)
                .collect();

            let options = options_by_poll
                .remove(&poll.id)
                .unwrap_or_default()
                .into_iter()
                .map(|option| {
                    let voters: Vec<String> = votes
                        .iter()
                        .filter(|v| v.poll_id == poll.id && v.option_id == option.id)
                        .map(|v| {
                            names
                                .get(&v.user_id)
                                .cloned()
                                .unwrap_or_else(|| short_id(&v.user_id))
                        })
                        .collect();
                    OptionTally {
                        selected: my_selection.contains(&option.id),
                        votes: voters.len(),
                        voters,
                        option,
                    }
                })
                .collect();

            PollCard {
                poll,
                options,
                my_selection,
            }
        })
        .collect()
}
