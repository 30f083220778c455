#![allow(dead_code)]

use partyplan::{Planner, PlannerConfig};
use partyplan_auth::Session;
use serde_json::{json, Value};
use wiremock::MockServer;

pub const ANA: &str = "0b6f3c52-8f6e-4d37-9a55-7d9a3f0b1c11";
pub const MARKO: &str = "9d2e5a10-4c1b-4f0e-8a77-2b1c3d4e5f60";
pub const EVENT: &str = "6f1c2d3e-0000-4000-8000-000000000001";
pub const CAKE: &str = "6f1c2d3e-0000-4000-8000-0000000000b1";
pub const POLL: &str = "6f1c2d3e-0000-4000-8000-0000000000a1";

/// A planner pointed at `server`, signed in as `user_id`
pub fn planner_as(server: &MockServer, user_id: &str, email: &str) -> Planner {
    let config = PlannerConfig::new(&server.uri(), "anon-key").unwrap();
    let planner = Planner::new(config).unwrap();

    let session: Session = serde_json::from_value(json!({
        "access_token": format!("token-{}", email),
        "refresh_token": "refresh",
        "expires_in": 3600,
        "token_type": "bearer",
        "user": {
            "id": user_id,
            "email": email,
            "user_metadata": {}
        }
    }))
    .unwrap();
    planner.auth().set_session(session);
    planner
}

pub fn event_json(creator_id: &str, event_type: &str) -> Value {
    json!({
        "id": EVENT,
        "creator_id": creator_id,
        "title": "Ana's party",
        "type": event_type,
        "starts_at": "2026-06-01T18:00:00+00:00",
        "ends_at": null,
        "location": null,
        "description": null,
        "surprise_mode": event_type == "birthday"
    })
}

pub fn cake_json(mode: &str) -> Value {
    json!({
        "id": CAKE,
        "event_id": EVENT,
        "title": "Cake",
        "notes": null,
        "claim_mode": mode,
        "created_by": ANA
    })
}
