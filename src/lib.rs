//! partyplan
//!
//! Typed data access for the partyplan event planner. Everything lives in a
//! hosted Supabase project; this crate wraps its auth and PostgREST APIs in
//! one repository per entity (profiles, events, members, invites, friends,
//! items, polls, chat) and computes the few client-side rules (claim
//! visibility, vote toggling, surprise mode, return paths).
//!
//! ```no_run
//! use partyplan::{Planner, PlannerConfig};
//!
//! # async fn run() -> partyplan::Result<()> {
//! let planner = Planner::new(PlannerConfig::from_env()?)?;
//! planner.sign_in("ana@example.com", "secret").await?;
//! let mine = planner.events().list_mine().await?;
//! # Ok(())
//! # }
//! ```

pub mod chat;
pub mod config;
pub mod error;
pub mod events;
pub mod friends;
pub mod invites;
pub mod items;
pub mod members;
pub mod page;
pub mod polls;
pub mod profiles;
pub mod routes;
pub mod session;

use log::{debug, info};
use partyplan_auth::{Auth, AuthOptions, OAuthProvider, OAuthSignInOptions, SignUpOptions};
use partyplan_postgrest::PostgrestClient;
use reqwest::Client;
use serde_json::{json, Value};

pub use crate::config::{ClientOptions, PlannerConfig};
pub use crate::error::{Error, Result};
pub use crate::session::CurrentUser;

use crate::chat::Chat;
use crate::events::Events;
use crate::friends::Friends;
use crate::invites::{normalize_email, Invites};
use crate::items::Items;
use crate::members::Members;
use crate::polls::Polls;
use crate::profiles::Profiles;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Sign-up form
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
}

/// Outcome of [`Planner::register`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    SignedIn(CurrentUser),
    /// The project requires the email to be confirmed before sign-in
    ConfirmationRequired { email: String },
}

/// Backend handle for one user session.
///
/// Create one per signed-in user and pass it to whatever needs data; the
/// repositories borrow it.
pub struct Planner {
    config: PlannerConfig,
    http_client: Client,
    auth: Auth,
}

impl Planner {
    pub fn new(config: PlannerConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        let auth = Auth::new(
            config.base_url(),
            &config.anon_key,
            http_client.clone(),
            AuthOptions {
                persist_session: config.options.persist_session,
            },
        );

        Ok(Self {
            config,
            http_client,
            auth,
        })
    }

    /// Convenience function to create a planner directly from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(PlannerConfig::from_env()?)
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    /// The signed-in user, from the stored session
    pub fn current_user(&self) -> Result<CurrentUser> {
        let session = self.auth.get_session().ok_or(Error::NotAuthenticated)?;
        CurrentUser::from_user(&session.user)
    }

    /// Query builder for `table`, running as the signed-in user when there is one
    pub(crate) fn from(&self, table: &str) -> Result<PostgrestClient> {
        let client = PostgrestClient::new(
            self.config.base_url(),
            &self.config.anon_key,
            table,
            self.http_client.clone(),
        );
        self.scoped(client)
    }

    pub(crate) fn rpc(&self, function_name: &str, params: Value) -> Result<PostgrestClient> {
        debug!("rpc {}", function_name);
        let client = PostgrestClient::rpc(
            self.config.base_url(),
            &self.config.anon_key,
            function_name,
            params,
            self.http_client.clone(),
        );
        self.scoped(client)
    }

    fn scoped(&self, client: PostgrestClient) -> Result<PostgrestClient> {
        let client = client.schema(&self.config.options.db_schema)?;
        match self.auth.access_token() {
            Some(token) => Ok(client.with_auth(&token)?),
            None => Ok(client),
        }
    }

    pub fn profiles(&self) -> Profiles<'_> {
        Profiles::new(self)
    }

    pub fn events(&self) -> Events<'_> {
        Events::new(self)
    }

    pub fn members(&self) -> Members<'_> {
        Members::new(self)
    }

    pub fn invites(&self) -> Invites<'_> {
        Invites::new(self)
    }

    pub fn friends(&self) -> Friends<'_> {
        Friends::new(self)
    }

    pub fn items(&self) -> Items<'_> {
        Items::new(self)
    }

    pub fn polls(&self) -> Polls<'_> {
        Polls::new(self)
    }

    pub fn chat(&self) -> Chat<'_> {
        Chat::new(self)
    }

    /// Create an account and, when the backend signs the user in right away,
    /// their profile row.
    pub async fn register(&self, form: RegistrationForm) -> Result<Registration> {
        let first_name = form.first_name.trim();
        let last_name = form.last_name.trim();
        if first_name.is_empty() || last_name.is_empty() {
            return Err(Error::validation("first and last name are required"));
        }
        let email = normalize_email(&form.email)?;
        check_password(&form.password)?;
        let phone = form
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());
        let full_name = format!("{} {}", first_name, last_name);

        let redirect = match &self.config.options.site_url {
            Some(site) => Some(routes::oauth_redirect(site, None)?.to_string()),
            None => None,
        };
        let options = SignUpOptions {
            data: Some(json!({
                "first_name": first_name,
                "last_name": last_name,
                "full_name": full_name,
                "phone": phone,
            })),
            email_redirect_to: redirect,
        };

        let response = self.auth.sign_up(&email, &form.password, options).await?;
        let session = match response.session {
            Some(session) => session,
            None => {
                info!("registered {}, waiting for email confirmation", email);
                return Ok(Registration::ConfirmationRequired { email });
            }
        };

        let user = CurrentUser::from_user(&session.user)?;
        self.profiles()
            .save(&user, first_name, last_name, phone)
            .await?;

        info!("registered user {}", user.id);
        Ok(Registration::SignedIn(user))
    }

    /// Email/password sign-in followed by the profile bootstrap
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<CurrentUser> {
        let email = normalize_email(email)?;
        if password.is_empty() {
            return Err(Error::validation("password is required"));
        }

        let session = self.auth.sign_in_with_password(&email, password).await?;

        let user = CurrentUser::from_user(&session.user)?;
        self.profiles().ensure(&user).await?;
        Ok(user)
    }

    /// Browser URL that starts Google sign-in and returns to `next` afterwards
    pub fn google_sign_in_url(&self, next: Option<&str>, code_challenge: &str) -> Result<String> {
        let redirect = routes::oauth_redirect(self.config.site_url()?, next)?;
        Ok(self.auth.get_oauth_sign_in_url(
            OAuthProvider::Google,
            Some(OAuthSignInOptions {
                redirect_to: Some(redirect.to_string()),
                scopes: None,
                code_challenge: Some(code_challenge.to_string()),
            }),
        ))
    }

    /// Handle `/auth/callback`: exchange the code, bootstrap the profile and
    /// return the user with the sanitized return path.
    pub async fn complete_oauth(
        &self,
        code: &str,
        code_verifier: &str,
        next: Option<&str>,
    ) -> Result<(CurrentUser, String)> {
        if code.trim().is_empty() {
            return Err(Error::NotAuthenticated);
        }
        let session = self
            .auth
            .exchange_code_for_session(code, code_verifier)
            .await?;

        let user = CurrentUser::from_user(&session.user)?;
        self.profiles().ensure(&user).await?;
        Ok((user, routes::sanitize_next(next)))
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.auth.sign_out().await?;
        Ok(())
    }
}

fn check_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}
