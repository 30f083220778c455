//! Page routes and return-path handling

use crate::error::Result;
use std::fmt;
use url::Url;
use uuid::Uuid;

/// Where sign-in sends the user when no usable `next` was given
pub const DEFAULT_NEXT: &str = "/events";

/// Pages of the web app
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login { next: Option<String> },
    Register,
    AuthCallback { next: Option<String> },
    Events,
    NewEvent,
    Event(Uuid),
    EditEvent(Uuid),
    Invites,
    Join(Uuid),
    Profile,
}

impl Route {
    /// The login page, returning here afterwards
    pub fn login_then(&self) -> Route {
        Route::Login {
            next: Some(self.to_string()),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Login { next } => write_with_next(f, "/login", next.as_deref()),
            Route::Register => f.write_str("/register"),
            Route::AuthCallback { next } => write_with_next(f, "/auth/callback", next.as_deref()),
            Route::Events => f.write_str("/events"),
            Route::NewEvent => f.write_str("/events/new"),
            Route::Event(id) => write!(f, "/events/{}", id),
            Route::EditEvent(id) => write!(f, "/events/{}/edit", id),
            Route::Invites => f.write_str("/invites"),
            Route::Join(id) => write!(f, "/join/{}", id),
            Route::Profile => f.write_str("/profile"),
        }
    }
}

fn write_with_next(f: &mut fmt::Formatter<'_>, path: &str, next: Option<&str>) -> fmt::Result {
    match next {
        Some(next) => write!(f, "{}?next={}", path, urlencoding::encode(next)),
        None => f.write_str(path),
    }
}

/// Accept only same-site absolute paths as a return target.
///
/// Anything else (absent, relative, protocol-relative `//host`, or a full
/// URL) falls back to [`DEFAULT_NEXT`].
pub fn sanitize_next(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => DEFAULT_NEXT.to_string(),
    }
}

/// The OAuth `redirect_to` target: `{site}/auth/callback?next=...`
pub fn oauth_redirect(site_url: &Url, next: Option<&str>) -> Result<Url> {
    let mut url = site_url.join("/auth/callback")?;
    url.query_pairs_mut()
        .append_pair("next", &sanitize_next(next));
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let id = Uuid::parse_str("6f1c2d3e-0000-4000-8000-000000000001").unwrap();

        assert_eq!(Route::Events.to_string(), "/events");
        assert_eq!(Route::NewEvent.to_string(), "/events/new");
        assert_eq!(
            Route::Event(id).to_string(),
            "/events/6f1c2d3e-0000-4000-8000-000000000001"
        );
        assert_eq!(
            Route::EditEvent(id).to_string(),
            "/events/6f1c2d3e-0000-4000-8000-000000000001/edit"
        );
        assert_eq!(Route::Invites.to_string(), "/invites");
        assert_eq!(Route::Profile.to_string(), "/profile");
        assert_eq!(Route::Register.to_string(), "/register");
        assert_eq!(Route::Login { next: None }.to_string(), "/login");
    }

    #[test]
    fn test_join_deep_link_goes_through_login() {
        let id = Uuid::parse_str("6f1c2d3e-0000-4000-8000-000000000001").unwrap();
        assert_eq!(
            Route::Join(id).login_then().to_string(),
            "/login?next=%2Fjoin%2F6f1c2d3e-0000-4000-8000-000000000001"
        );
    }

    #[test]
    fn test_sanitize_next() {
        assert_eq!(sanitize_next(Some("/join/abc")), "/join/abc");
        assert_eq!(sanitize_next(Some("/events?tab=mine")), "/events?tab=mine");
        assert_eq!(sanitize_next(None), DEFAULT_NEXT);
        assert_eq!(sanitize_next(Some("")), DEFAULT_NEXT);
        assert_eq!(sanitize_next(Some("events")), DEFAULT_NEXT);
        assert_eq!(sanitize_next(Some("//evil.example")), DEFAULT_NEXT);
        assert_eq!(sanitize_next(Some("/\\evil.example")), DEFAULT_NEXT);
        assert_eq!(sanitize_next(Some("https://evil.example/")), DEFAULT_NEXT);
    }

    #[test]
    fn test_oauth_redirect() {
        let site = Url::parse("https://party.example/").unwrap();

        let url = oauth_redirect(&site, Some("/join/abc")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://party.example/auth/callback?next=%2Fjoin%2Fabc"
        );

        let fallback = oauth_redirect(&site, Some("//evil.example")).unwrap();
        assert_eq!(
            fallback.as_str(),
            "https://party.example/auth/callback?next=%2Fevents"
        );
    }
}
