//! PostgREST client for partyplan
//!
//! A small builder over the Supabase REST endpoint.
//!
//! # Features
//!
//! - Query API (`select`, `insert`, `upsert`, `update`, `delete`)
//! - Filtering (`eq`, `neq`, `in_list`, `is_null`)
//! - Ordering and limits
//! - Single-object reads
//! - RPC function calls
//!
//! API failures keep the PostgreSQL / PostgREST error code, so callers branch
//! on [`PostgrestError::is_unique_violation`] and friends instead of matching
//! on message text.

use log::debug;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use url::Url;

/// Error codes returned in the `code` field of PostgREST error bodies.
pub mod codes {
    /// `unique_violation`
    pub const UNIQUE_VIOLATION: &str = "23505";
    /// `foreign_key_violation`
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    /// `not_null_violation`
    pub const NOT_NULL_VIOLATION: &str = "23502";
    /// `insufficient_privilege`, also raised by row-level policies on writes
    pub const INSUFFICIENT_PRIVILEGE: &str = "42501";
    /// `raise_exception` from a PL/pgSQL function
    pub const RAISE_EXCEPTION: &str = "P0001";
    /// Single object requested but zero (or several) rows matched
    pub const NO_ROWS: &str = "PGRST116";
    /// JWT expired or rejected
    pub const JWT_REJECTED: &str = "PGRST301";
}

/// Details of a PostgREST API error
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PostgrestApiErrorDetails {
    pub code: Option<String>,
    pub message: Option<String>,
    pub details: Option<String>,
    pub hint: Option<String>,
}

impl fmt::Display for PostgrestApiErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(code) = &self.code {
            parts.push(format!("Code: {}", code));
        }
        if let Some(message) = &self.message {
            parts.push(format!("Message: {}", message));
        }
        if let Some(details) = &self.details {
            parts.push(format!("Details: {}", details));
        }
        if let Some(hint) = &self.hint {
            parts.push(format!("Hint: {}", hint));
        }
        write!(f, "{}", parts.join(", "))
    }
}

#[derive(Error, Debug)]
pub enum PostgrestError {
    #[error("API error: {details} (Status: {status})")]
    ApiError {
        details: PostgrestApiErrorDetails,
        status: StatusCode,
    },

    #[error("API error (unparsed): {message} (Status: {status})")]
    UnparsedApiError { message: String, status: StatusCode },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

impl PostgrestError {
    /// The PostgreSQL / PostgREST error code, when the body carried one
    pub fn code(&self) -> Option<&str> {
        match self {
            PostgrestError::ApiError { details, .. } => details.code.as_deref(),
            _ => None,
        }
    }

    /// HTTP status of an API error
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            PostgrestError::ApiError { status, .. }
            | PostgrestError::UnparsedApiError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human readable message reported by the backend
    pub fn api_message(&self) -> Option<&str> {
        match self {
            PostgrestError::ApiError { details, .. } => details.message.as_deref(),
            PostgrestError::UnparsedApiError { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        match self.code() {
            Some(code) => code == codes::UNIQUE_VIOLATION,
            None => self.status() == Some(StatusCode::CONFLICT),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self.code() {
            Some(code) => code == codes::NO_ROWS,
            None => self.status() == Some(StatusCode::NOT_ACCEPTABLE),
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        self.code() == Some(codes::INSUFFICIENT_PRIVILEGE)
            || self.status() == Some(StatusCode::FORBIDDEN)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.code() == Some(codes::JWT_REJECTED) || self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

// Query parameters that shape the response rather than select rows.
const NON_FILTER_PARAMS: [&str; 4] = ["select", "order", "limit", "on_conflict"];

/// PostgREST client for one table (or one RPC function)
#[derive(Debug, Clone)]
pub struct PostgrestClient {
    base_url: String,
    table: String,
    http_client: Client,
    headers: HeaderMap,
    query_params: Vec<(String, String)>,
    is_rpc: bool,
    rpc_params: Option<Value>,
}

impl PostgrestClient {
    /// Create a client for `table`
    pub fn new(base_url: &str, api_key: &str, table: &str, http_client: Client) -> Self {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(api_key) {
            headers.insert("apikey", value);
        }
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", api_key)) {
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            table: table.to_string(),
            http_client,
            headers,
            query_params: Vec::new(),
            is_rpc: false,
            rpc_params: None,
        }
    }

    /// Create a client that calls the RPC function `function_name` with `params`
    pub fn rpc(
        base_url: &str,
        api_key: &str,
        function_name: &str,
        params: Value,
        http_client: Client,
    ) -> Self {
        let mut client = Self::new(base_url, api_key, function_name, http_client);
        client.is_rpc = true;
        client.rpc_params = Some(params);
        client
    }

    /// Add a header
    pub fn with_header(mut self, key: &str, value: &str) -> Result<Self, PostgrestError> {
        let header_value = HeaderValue::from_str(value).map_err(|_| {
            PostgrestError::InvalidParameters(format!("Invalid header value: {}", value))
        })?;

        let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
            PostgrestError::InvalidParameters(format!("Invalid header name: {}", key))
        })?;

        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    /// Use a user access token instead of the anon key
    pub fn with_auth(self, token: &str) -> Result<Self, PostgrestError> {
        self.with_header("Authorization", &format!("Bearer {}", token))
    }

    /// Target a schema other than `public`
    pub fn schema(self, schema_name: &str) -> Result<Self, PostgrestError> {
        if schema_name == "public" {
            return Ok(self);
        }
        self.with_header("Accept-Profile", schema_name)?
            .with_header("Content-Profile", schema_name)
    }

    /// Columns to return
    pub fn select(mut self, columns: &str) -> Self {
        self.set_param("select", columns.to_string());
        self
    }

    /// Equality filter
    pub fn eq<T: ToString>(mut self, column: &str, value: T) -> Self {
        self.query_params.push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    /// Inequality filter
    pub fn neq<T: ToString>(mut self, column: &str, value: T) -> Self {
        self.query_params.push((column.to_string(), format!("neq.{}", value.to_string())));
        self
    }

    /// IN filter
    pub fn in_list<T: ToString>(mut self, column: &str, values: &[T]) -> Self {
        let value_list: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        self.query_params
            .push((column.to_string(), format!("in.({})", value_list.join(","))));
        self
    }

    /// IS NULL filter
    pub fn is_null(mut self, column: &str) -> Self {
        self.query_params
            .push((column.to_string(), "is.null".to_string()));
        self
    }

    /// Sort order
    pub fn order(mut self, column: &str, order: SortOrder) -> Self {
        self.set_param("order", format!("{}.{}", column, order.as_str()));
        self
    }

    /// Row limit
    pub fn limit(mut self, count: usize) -> Self {
        self.set_param("limit", count.to_string());
        self
    }

    /// Conflict target for `upsert`, e.g. `"event_id,user_id"`
    pub fn on_conflict(mut self, columns: &str) -> Self {
        self.set_param("on_conflict", columns.to_string());
        self
    }

    /// Fetch rows
    pub async fn execute<T: DeserializeOwned>(&self) -> Result<Vec<T>, PostgrestError> {
        let body = self.send(Method::GET, None, None, None).await?;
        parse_rows(&body)
    }

    /// Fetch exactly one row.
    ///
    /// Zero matching rows is an API error with code [`codes::NO_ROWS`].
    pub async fn single<T: DeserializeOwned>(&self) -> Result<T, PostgrestError> {
        let body = self
            .send(
                Method::GET,
                None,
                None,
                Some("application/vnd.pgrst.object+json"),
            )
            .await?;
        serde_json::from_str(&body).map_err(|e| PostgrestError::DeserializationError(e.to_string()))
    }

    /// Fetch one row if it exists
    pub async fn maybe_single<T: DeserializeOwned>(&self) -> Result<Option<T>, PostgrestError> {
        match self.single::<T>().await {
            Ok(row) => Ok(Some(row)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Insert rows and return the stored representation
    pub async fn insert<T, R>(&self, values: &T) -> Result<Vec<R>, PostgrestError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = serde_json::to_value(values)?;
        let text = self
            .send(Method::POST, Some(body), Some("return=representation"), None)
            .await?;
        parse_rows(&text)
    }

    /// Insert rows, resolving conflicts on the `on_conflict` target.
    ///
    /// With `ignore_duplicates` existing rows are left untouched and are not
    /// returned; otherwise they are merged with the new values.
    pub async fn upsert<T, R>(
        &self,
        values: &T,
        ignore_duplicates: bool,
    ) -> Result<Vec<R>, PostgrestError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let prefer = if ignore_duplicates {
            "resolution=ignore-duplicates,return=representation"
        } else {
            "resolution=merge-duplicates,return=representation"
        };
        let body = serde_json::to_value(values)?;
        let text = self.send(Method::POST, Some(body), Some(prefer), None).await?;
        parse_rows(&text)
    }

    /// Update the filtered rows
    pub async fn update<T, R>(&self, values: &T) -> Result<Vec<R>, PostgrestError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.require_filter("update")?;
        let body = serde_json::to_value(values)?;
        let text = self
            .send(Method::PATCH, Some(body), Some("return=representation"), None)
            .await?;
        parse_rows(&text)
    }

    /// Delete the filtered rows and return them
    pub async fn delete<R: DeserializeOwned>(&self) -> Result<Vec<R>, PostgrestError> {
        self.require_filter("delete")?;
        let text = self
            .send(Method::DELETE, None, Some("return=representation"), None)
            .await?;
        parse_rows(&text)
    }

    /// Call the RPC function (POST). A void function yields `null`.
    pub async fn call_rpc<T: DeserializeOwned>(&self) -> Result<T, PostgrestError> {
        if !self.is_rpc {
            return Err(PostgrestError::InvalidParameters(
                "Client was not created for RPC. Use PostgrestClient::rpc().".to_string(),
            ));
        }
        let params = self.rpc_params.clone().ok_or_else(|| {
            PostgrestError::InvalidParameters("RPC parameters are missing.".to_string())
        })?;

        let text = self.send(Method::POST, Some(params), None, None).await?;
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };

        serde_json::from_str(text).map_err(|e| {
            PostgrestError::DeserializationError(format!(
                "Failed to deserialize RPC response: {}",
                e
            ))
        })
    }

    // Shaping parameters appear once; filters may repeat a column.
    fn set_param(&mut self, key: &str, value: String) {
        self.query_params.retain(|(k, _)| k != key);
        self.query_params.push((key.to_string(), value));
    }

    fn require_filter(&self, operation: &str) -> Result<(), PostgrestError> {
        let has_filter = self
            .query_params
            .iter()
            .any(|(key, _)| !NON_FILTER_PARAMS.contains(&key.as_str()));
        if has_filter {
            Ok(())
        } else {
            Err(PostgrestError::InvalidParameters(format!(
                "refusing to {} every row of {}",
                operation, self.table
            )))
        }
    }

    async fn send(
        &self,
        method: Method,
        body: Option<Value>,
        prefer: Option<&'static str>,
        accept: Option<&'static str>,
    ) -> Result<String, PostgrestError> {
        let url = self.build_url()?;

        let mut headers = self.headers.clone();
        if let Some(prefer) = prefer {
            headers.insert(
                HeaderName::from_static("prefer"),
                HeaderValue::from_static(prefer),
            );
        }
        if let Some(accept) = accept {
            headers.insert(ACCEPT, HeaderValue::from_static(accept));
        }

        debug!("postgrest {} {}", method, url);

        let mut request = self.http_client.request(method, &url).headers(headers);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read response body".to_string());

        if !status.is_success() {
            return Err(api_error(status, text));
        }

        Ok(text)
    }

    fn build_url(&self) -> Result<String, PostgrestError> {
        let endpoint = if self.is_rpc {
            format!("{}/rest/v1/rpc/{}", self.base_url, self.table)
        } else {
            format!("{}/rest/v1/{}", self.base_url, self.table)
        };
        let mut url = Url::parse(&endpoint)?;

        if !self.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query_params {
                pairs.append_pair(key, value);
            }
        }

        Ok(url.to_string())
    }
}

fn api_error(status: StatusCode, error_text: String) -> PostgrestError {
    match serde_json::from_str::<PostgrestApiErrorDetails>(&error_text) {
        Ok(details) => PostgrestError::ApiError { details, status },
        Err(_) => PostgrestError::UnparsedApiError {
            message: error_text,
            status,
        },
    }
}

fn parse_rows<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, PostgrestError> {
    // 204 No Content and ignored duplicates come back empty
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<Vec<T>>(body)
        .map_err(|e| PostgrestError::DeserializationError(e.to_string()))
}
