//! Profile rows and the sign-in bootstrap

use crate::error::{Error, Result};
use crate::session::CurrentUser;
use crate::Planner;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

const TABLE: &str = "profiles";
const NAME_COLUMNS: &str = "id,full_name,first_name,last_name";

/// One row of `profiles`, keyed by the auth user id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

impl Profile {
    /// Full name, or first and last name joined, if either is set
    pub fn name(&self) -> Option<String> {
        if let Some(full) = self.full_name.as_deref().map(str::trim) {
            if !full.is_empty() {
                return Some(full.to_string());
            }
        }
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

#[derive(Serialize)]
struct NewProfile<'a> {
    id: Uuid,
    full_name: &'a str,
    email: Option<&'a str>,
}

#[derive(Serialize)]
struct NameUpdate<'a> {
    id: Uuid,
    first_name: &'a str,
    last_name: &'a str,
    full_name: String,
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
}

pub struct Profiles<'a> {
    planner: &'a Planner,
}

impl<'a> Profiles<'a> {
    pub(crate) fn new(planner: &'a Planner) -> Self {
        Self { planner }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Profile>> {
        Ok(self
            .planner
            .from(TABLE)?
            .select("*")
            .eq("id", id)
            .maybe_single()
            .await?)
    }

    /// Make sure `user` has exactly one profile row.
    ///
    /// A missing row is created with the display name and email. An empty
    /// name on an existing row is filled in; a non-empty one is kept.
    pub async fn ensure(&self, user: &CurrentUser) -> Result<Profile> {
        match self.get(user.id).await? {
            Some(profile) => {
                if profile.name().is_some() {
                    return Ok(profile);
                }
                debug!("filling empty profile name for {}", user.id);
                let rows: Vec<Profile> = self
                    .planner
                    .from(TABLE)?
                    .eq("id", user.id)
                    .update(&serde_json::json!({ "full_name": user.display_name }))
                    .await?;
                Ok(rows.into_iter().next().unwrap_or(profile))
            }
            None => {
                let row = NewProfile {
                    id: user.id,
                    full_name: &user.display_name,
                    email: user.email.as_deref(),
                };
                // a concurrent first load may have won; its row is kept
                let rows: Vec<Profile> = self
                    .planner
                    .from(TABLE)?
                    .on_conflict("id")
                    .upsert(&row, true)
                    .await?;
                if let Some(profile) = rows.into_iter().next() {
                    info!("created profile for {}", user.id);
                    return Ok(profile);
                }
                self.get(user.id)
                    .await?
                    .ok_or_else(|| Error::not_found(format!("profile {}", user.id)))
            }
        }
    }

    /// Display names for `ids`; users without a named profile are absent
    pub async fn names_for(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>> {
        let mut unique: Vec<Uuid> = ids.to_vec();
        unique.sort();
        unique.dedup();
        if unique.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<Profile> = self
            .planner
            .from(TABLE)?
            .select(NAME_COLUMNS)
            .in_list("id", &unique)
            .execute()
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|p| p.name().map(|name| (p.id, name)))
            .collect())
    }

    /// Save the caller's first and last name
    pub async fn save_name(&self, first_name: &str, last_name: &str) -> Result<Profile> {
        let user = self.planner.current_user()?;
        self.save(&user, first_name, last_name, None).await
    }

    pub(crate) async fn save(
        &self,
        user: &CurrentUser,
        first_name: &str,
        last_name: &str,
        phone: Option<&str>,
    ) -> Result<Profile> {
        let first_name = first_name.trim();
        let last_name = last_name.trim();
        if first_name.is_empty() || last_name.is_empty() {
            return Err(Error::validation("first and last name are required"));
        }

        let row = NameUpdate {
            id: user.id,
            first_name,
            last_name,
            full_name: format!("{} {}", first_name, last_name),
            email: user.email.as_deref(),
            phone,
        };
        let rows: Vec<Profile> = self
            .planner
            .from(TABLE)?
            .on_conflict("id")
            .upsert(&row, false)
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("profile {}", user.id)))
    }
}
