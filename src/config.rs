//! Configuration for the planner

use crate::error::{Error, Result};
use std::time::Duration;
use url::Url;

/// Options applied to every backend call
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Keep the session after sign-in so later calls run as the user
    pub persist_session: bool,

    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// The database schema
    pub db_schema: String,

    /// Public origin of the web app, used for OAuth and email redirects
    pub site_url: Option<Url>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            persist_session: true,
            request_timeout: Some(Duration::from_secs(30)),
            db_schema: "public".to_string(),
            site_url: None,
        }
    }
}

impl ClientOptions {
    /// Set whether to persist the session
    pub fn with_persist_session(mut self, value: bool) -> Self {
        self.persist_session = value;
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the database schema
    pub fn with_db_schema(mut self, value: &str) -> Self {
        self.db_schema = value.to_string();
        self
    }

    /// Set the public site URL
    pub fn with_site_url(mut self, value: Url) -> Self {
        self.site_url = Some(value);
        self
    }
}

/// Supabase project settings
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub url: Url,
    pub anon_key: String,
    pub options: ClientOptions,
}

impl PlannerConfig {
    /// Creates a new configuration, validating the URL and key.
    pub fn new(url_str: &str, anon_key: &str) -> Result<Self> {
        let url = Url::parse(url_str)?;
        if anon_key.trim().is_empty() {
            return Err(Error::config("anon_key cannot be empty"));
        }
        Ok(Self {
            url,
            anon_key: anon_key.to_string(),
            options: ClientOptions::default(),
        })
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Reads `SUPABASE_URL`, `SUPABASE_ANON_KEY` and the optional
    /// `PARTYPLAN_SITE_URL`, after loading a `.env` file if one exists.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let url_str = std::env::var("SUPABASE_URL")
            .map_err(|_| Error::config("SUPABASE_URL environment variable not found"))?;
        let anon_key = std::env::var("SUPABASE_ANON_KEY")
            .map_err(|_| Error::config("SUPABASE_ANON_KEY environment variable not found"))?;

        let mut config = Self::new(&url_str, &anon_key)?;
        if let Ok(site) = std::env::var("PARTYPLAN_SITE_URL") {
            config.options.site_url = Some(Url::parse(&site)?);
        }
        Ok(config)
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.url.as_str().trim_end_matches('/')
    }

    pub fn site_url(&self) -> Result<&Url> {
        self.options
            .site_url
            .as_ref()
            .ok_or_else(|| Error::config("site_url is required for redirects"))
    }
}
