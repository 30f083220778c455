//! GoTrue auth client for partyplan
//!
//! Covers the flows the planner needs: email/password sign-up and sign-in,
//! Google OAuth (PKCE code exchange), the in-memory session store, user
//! lookup, refresh, sign-out and password re-authentication.

use log::{debug, info};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("API error: {message} (Status: {status})")]
    ApiError {
        status: StatusCode,
        error_code: Option<String>,
        message: String,
    },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("Missing session")]
    MissingSession,

    #[error("Re-authentication failed: {0}")]
    Reauthentication(String),
}

impl AuthError {
    /// Machine readable GoTrue error code (`invalid_credentials`, `invalid_grant`, ...)
    pub fn error_code(&self) -> Option<&str> {
        match self {
            AuthError::ApiError { error_code, .. } => error_code.as_deref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            AuthError::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Wrong email or password
    pub fn is_invalid_credentials(&self) -> bool {
        matches!(
            self.error_code(),
            Some("invalid_credentials") | Some("invalid_grant")
        ) || matches!(self, AuthError::Reauthentication(_))
    }

    /// The session is missing, expired or rejected
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AuthError::MissingSession)
            || self.status() == Some(StatusCode::UNAUTHORIZED)
            || matches!(
                self.error_code(),
                Some("bad_jwt") | Some("session_not_found") | Some("refresh_token_not_found")
            )
    }
}

// GoTrue has used both shapes over time.
#[derive(Deserialize, Default)]
struct ApiErrorBody {
    error_code: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Authenticated user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub app_metadata: Value,
    #[serde(default)]
    pub user_metadata: Value,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl User {
    /// A string entry of `user_metadata`
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata.get(key).and_then(Value::as_str)
    }
}

/// Session returned by the token endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub expires_at: Option<i64>,
    pub token_type: String,
    pub user: User,
}

/// Result of a sign-up.
///
/// `session` is `None` when the project requires email confirmation; `user`
/// may then still be present (unconfirmed).
#[derive(Debug, Clone, PartialEq)]
pub struct SignUpResponse {
    pub session: Option<Session>,
    pub user: Option<User>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SignUpOptions {
    /// Stored as the user's `user_metadata`
    pub data: Option<Value>,
    pub email_redirect_to: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthOptions {
    pub persist_session: bool,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            persist_session: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OAuthProvider {
    Google,
    Github,
    Apple,
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Google => "google",
            Self::Github => "github",
            Self::Apple => "apple",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct OAuthSignInOptions {
    pub redirect_to: Option<String>,
    pub scopes: Option<String>,
    /// S256 challenge derived from the verifier later passed to
    /// [`Auth::exchange_code_for_session`]
    pub code_challenge: Option<String>,
}

/// Auth client
pub struct Auth {
    url: String,
    key: String,
    http_client: Client,
    options: AuthOptions,
    current_session: Arc<RwLock<Option<Session>>>,
}

impl Auth {
    pub fn new(url: &str, key: &str, http_client: Client, options: AuthOptions) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            http_client,
            options,
            current_session: Arc::new(RwLock::new(None)),
        }
    }

    /// Register with email and password
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        options: SignUpOptions,
    ) -> Result<SignUpResponse, AuthError> {
        let mut url = url::Url::parse(&format!("{}/auth/v1/signup", self.url))?;
        if let Some(redirect_to) = &options.email_redirect_to {
            url.query_pairs_mut().append_pair("redirect_to", redirect_to);
        }

        let payload = serde_json::json!({
            "email": email,
            "password": password,
            "data": options.data.unwrap_or_else(|| serde_json::json!({})),
        });

        debug!("auth sign up {}", email);
        let response = self
            .http_client
            .post(url.as_str())
            .header("apikey", &self.key)
            .json(&payload)
            .send()
            .await?;

        let body: Value = Self::check(response).await?.json().await?;

        // autoconfirm projects answer with a session, others with the bare user
        if body.get("access_token").is_some() {
            let session: Session = serde_json::from_value(body)?;
            self.store_session(&session);
            let user = session.user.clone();
            return Ok(SignUpResponse {
                session: Some(session),
                user: Some(user),
            });
        }

        let user = match body.get("id") {
            Some(_) => Some(serde_json::from_value::<User>(body)?),
            None => None,
        };
        Ok(SignUpResponse {
            session: None,
            user,
        })
    }

    /// Sign in with email and password
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let session = self
            .token(
                "password",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await?;
        self.store_session(&session);
        info!("signed in user {}", session.user.id);
        Ok(session)
    }

    /// URL that starts the provider sign-in in a browser
    pub fn get_oauth_sign_in_url(
        &self,
        provider: OAuthProvider,
        options: Option<OAuthSignInOptions>,
    ) -> String {
        let options = options.unwrap_or_default();

        let mut url = format!("{}/auth/v1/authorize?provider={}", self.url, provider);

        if let Some(redirect_to) = options.redirect_to {
            url.push_str(&format!(
                "&redirect_to={}",
                urlencoding::encode(&redirect_to)
            ));
        }

        if let Some(scopes) = options.scopes {
            url.push_str(&format!("&scopes={}", urlencoding::encode(&scopes)));
        }

        if let Some(challenge) = options.code_challenge {
            url.push_str(&format!(
                "&code_challenge={}&code_challenge_method=s256",
                urlencoding::encode(&challenge)
            ));
        }

        url
    }

    /// Exchange the `code` from the OAuth callback for a session
    pub async fn exchange_code_for_session(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<Session, AuthError> {
        let session = self
            .token(
                "pkce",
                serde_json::json!({ "auth_code": code, "code_verifier": code_verifier }),
            )
            .await?;
        self.store_session(&session);
        info!("exchanged oauth code for user {}", session.user.id);
        Ok(session)
    }

    /// Current session, if any
    pub fn get_session(&self) -> Option<Session> {
        self.current_session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Adopt a session obtained elsewhere (e.g. restored from a cookie)
    pub fn set_session(&self, session: Session) {
        *self
            .current_session
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    pub fn access_token(&self) -> Option<String> {
        self.get_session().map(|s| s.access_token)
    }

    /// Fetch the user behind the current access token
    pub async fn get_user(&self) -> Result<User, AuthError> {
        let session = self.get_session().ok_or(AuthError::MissingSession)?;

        let url = format!("{}/auth/v1/user", self.url);
        debug!("auth get user");

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", session.access_token))
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    /// Trade the refresh token for a new session
    pub async fn refresh_session(&self) -> Result<Session, AuthError> {
        let session = self.get_session().ok_or(AuthError::MissingSession)?;

        let new_session = self
            .token(
                "refresh_token",
                serde_json::json!({ "refresh_token": session.refresh_token }),
            )
            .await?;
        self.store_session(&new_session);
        Ok(new_session)
    }

    /// Revoke the session. The local session is dropped even if the server
    /// call fails.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let session = self.get_session().ok_or(AuthError::MissingSession)?;
        *self
            .current_session
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;

        let url = format!("{}/auth/v1/logout", self.url);

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", session.access_token))
            .send()
            .await?;

        Self::check(response).await?;
        info!("signed out user {}", session.user.id);
        Ok(())
    }

    /// Confirm that `password` belongs to the signed-in user.
    ///
    /// The stored session is left as it was.
    pub async fn reauthenticate(&self, password: &str) -> Result<(), AuthError> {
        let session = self.get_session().ok_or(AuthError::MissingSession)?;
        let email = session.user.email.clone().ok_or_else(|| {
            AuthError::Reauthentication("signed-in user has no email".to_string())
        })?;

        let confirmed = self
            .token(
                "password",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await?;

        if confirmed.user.id != session.user.id {
            return Err(AuthError::Reauthentication(
                "password belongs to a different user".to_string(),
            ));
        }
        Ok(())
    }

    async fn token(&self, grant_type: &str, payload: Value) -> Result<Session, AuthError> {
        let url = format!("{}/auth/v1/token?grant_type={}", self.url, grant_type);
        debug!("auth token grant {}", grant_type);

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.key)
            .json(&payload)
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    fn store_session(&self, session: &Session) {
        if self.options.persist_session {
            *self
                .current_session
                .write()
                .unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        }
    }

    async fn check(response: Response) -> Result<Response, AuthError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let body: ApiErrorBody = serde_json::from_str(&text).unwrap_or_default();
        let message = body
            .msg
            .or(body.message)
            .or(body.error_description)
            .or_else(|| body.error.clone())
            .unwrap_or(text);

        Err(AuthError::ApiError {
            status,
            error_code: body.error_code.or(body.error),
            message,
        })
    }
}
