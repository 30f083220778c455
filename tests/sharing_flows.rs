mod common;

use common::{cake_json, event_json, planner_as, ANA, CAKE, EVENT, MARKO, POLL};
use partyplan::invites::InviteOutcome;
use partyplan::items::{ClaimStatus, Item};
use partyplan::page::EventPage;
use partyplan::polls::{Poll, PollMode, VoteChange};
use partyplan::Error;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn event_id() -> Uuid {
    Uuid::parse_str(EVENT).unwrap()
}

fn cake(mode: &str) -> Item {
    serde_json::from_value(cake_json(mode)).unwrap()
}

#[tokio::test]
async fn test_reinviting_reports_success_without_a_duplicate() {
    let mock_server = MockServer::start().await;

    let invite = json!({ "event_id": EVENT, "email": "b@x.com", "invited_by": ANA });

    Mock::given(method("POST"))
        .and(path("/rest/v1/event_invites"))
        .and(body_json(&invite))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([invite])))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/event_invites"))
        .and(body_json(&invite))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"event_invites_event_id_email_key\""
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let planner = planner_as(&mock_server, ANA, "ana@example.com");
    let invites = planner.invites();

    assert_eq!(
        invites.invite(event_id(), " B@X.com ").await.unwrap(),
        InviteOutcome::Invited
    );
    assert_eq!(
        invites.invite(event_id(), "b@x.com").await.unwrap(),
        InviteOutcome::AlreadyInvited
    );
}

#[tokio::test]
async fn test_friend_invites_report_the_stored_email() {
    let mock_server = MockServer::start().await;
    let marko = Uuid::parse_str("6f1c2d3e-0000-4000-8000-0000000000f1").unwrap();
    let no_email = Uuid::parse_str("6f1c2d3e-0000-4000-8000-0000000000f2").unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/friends"))
        .and(query_param("owner_id", format!("eq.{}", ANA)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": marko, "owner_id": ANA, "friend_email": " Marko@X.com ", "friend_name": "Marko" },
            { "id": no_email, "owner_id": ANA, "friend_email": null, "friend_name": "Ivana" }
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/event_invites"))
        .and(body_json(json!({ "event_id": EVENT, "email": "marko@x.com", "invited_by": ANA })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let planner = planner_as(&mock_server, ANA, "ana@example.com");
    let outcomes = planner
        .invites()
        .invite_friends(event_id(), &[marko, no_email])
        .await
        .unwrap();

    assert_eq!(
        outcomes,
        vec![("marko@x.com".to_string(), InviteOutcome::Invited)]
    );
}

#[tokio::test]
async fn test_invalid_email_is_not_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/event_invites"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let planner = planner_as(&mock_server, ANA, "ana@example.com");
    let result = planner.invites().invite(event_id(), "marko").await;

    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn test_accept_invite_uses_rpc() {
    let mock_server = MockServer::start().await;
    let invite_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/accept_event_invite"))
        .and(body_json(json!({ "invite_id": invite_id })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(EVENT)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let planner = planner_as(&mock_server, MARKO, "b@x.com");
    planner.invites().accept(invite_id).await.unwrap();
}

#[tokio::test]
async fn test_my_invites_embed_the_event() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/event_invites"))
        .and(query_param("email", "eq.b@x.com"))
        .and(query_param("order", "created_at.desc"))
        .and(query_param(
            "select",
            "id,event_id,email,accepted,invited_by,created_at,events:events(id,title)",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "6f1c2d3e-0000-4000-8000-0000000000d1",
            "event_id": EVENT,
            "email": "b@x.com",
            "accepted": false,
            "invited_by": ANA,
            "created_at": "2026-05-01T10:00:00+00:00",
            "events": { "id": EVENT, "title": "Ana's party" }
        }])))
        .mount(&mock_server)
        .await;

    let planner = planner_as(&mock_server, MARKO, "B@x.com");
    let invites = planner.invites().list_mine().await.unwrap();

    assert_eq!(invites.len(), 1);
    assert_eq!(
        invites[0].event.as_ref().map(|e| e.title.as_str()),
        Some("Ana's party")
    );
}

#[tokio::test]
async fn test_single_item_held_by_someone_else_is_a_conflict() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/item_claims"))
        .and(query_param("event_item_id", format!("eq.{}", CAKE)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "6f1c2d3e-0000-4000-8000-0000000000e1",
            "event_id": EVENT,
            "event_item_id": CAKE,
            "user_id": ANA
        }])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/item_claims"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let planner = planner_as(&mock_server, MARKO, "marko@example.com");
    let result = planner.items().claim(&cake("single")).await;

    assert!(matches!(result, Err(Error::Conflict(_))));
}

#[tokio::test]
async fn test_claim_race_lost_to_unique_constraint_is_a_conflict() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/item_claims"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/item_claims"))
        .and(body_json(json!({ "event_id": EVENT, "event_item_id": CAKE, "user_id": MARKO })))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"item_claims_single_key\""
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let planner = planner_as(&mock_server, MARKO, "marko@example.com");
    let result = planner.items().claim(&cake("single")).await;

    assert!(matches!(result, Err(Error::Conflict(_))));
}

#[tokio::test]
async fn test_claiming_twice_is_a_no_op() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/item_claims"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "6f1c2d3e-0000-4000-8000-0000000000e1",
            "event_id": EVENT,
            "event_item_id": CAKE,
            "user_id": MARKO
        }])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/item_claims"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let planner = planner_as(&mock_server, MARKO, "marko@example.com");
    planner.items().claim(&cake("multi")).await.unwrap();
}

#[tokio::test]
async fn test_unclaim_deletes_only_own_row() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/item_claims"))
        .and(query_param("event_id", format!("eq.{}", EVENT)))
        .and(query_param("event_item_id", format!("eq.{}", CAKE)))
        .and(query_param("user_id", format!("eq.{}", MARKO)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let planner = planner_as(&mock_server, MARKO, "marko@example.com");
    planner.items().unclaim(&cake("single")).await.unwrap();
}

#[tokio::test]
async fn test_single_mode_vote_replaces_previous_choice() {
    let mock_server = MockServer::start().await;
    let park = Uuid::new_v4();
    let beach = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/event_poll_votes"))
        .and(query_param("poll_id", format!("eq.{}", POLL)))
        .and(query_param("user_id", format!("eq.{}", MARKO)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "event_id": EVENT,
            "poll_id": POLL,
            "option_id": park,
            "user_id": MARKO
        }])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/toggle_poll_vote"))
        .and(body_json(json!({ "poll_id": POLL, "option_id": beach })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let poll: Poll = serde_json::from_value(json!({
        "id": POLL,
        "event_id": EVENT,
        "question": "Where?",
        "mode": "single"
    }))
    .unwrap();
    assert_eq!(poll.mode, PollMode::Single);

    let planner = planner_as(&mock_server, MARKO, "marko@example.com");
    let change = planner.polls().toggle_vote(&poll, beach).await.unwrap();

    assert_eq!(
        change,
        VoteChange::Replaced {
            previous: vec![park],
            option: beach
        }
    );
}

#[tokio::test]
async fn test_poll_needs_two_options() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/event_polls"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let planner = planner_as(&mock_server, ANA, "ana@example.com");
    let event = serde_json::from_value(event_json(ANA, "grill")).unwrap();
    let result = planner
        .polls()
        .create(&event, "Where?", PollMode::Single, "Park\n   \n")
        .await;

    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn test_failed_options_remove_the_poll() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/event_polls"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": POLL,
            "event_id": EVENT,
            "question": "Where?",
            "mode": "multi",
            "created_by": ANA
        }])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/event_poll_options"))
        .and(body_json(json!([
            { "poll_id": POLL, "label": "Park" },
            { "poll_id": POLL, "label": "Beach" }
        ])))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/event_polls"))
        .and(query_param("id", format!("eq.{}", POLL)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let planner = planner_as(&mock_server, ANA, "ana@example.com");
    let event = serde_json::from_value(event_json(ANA, "grill")).unwrap();
    let result = planner
        .polls()
        .create(&event, "Where?", PollMode::Multi, " Park \n\nBeach")
        .await;

    assert!(matches!(result, Err(Error::Database(_))));
}

#[tokio::test]
async fn test_only_the_creator_can_delete_a_poll() {
    let mock_server = MockServer::start().await;

    for table in ["event_poll_votes", "event_poll_options", "event_polls"] {
        Mock::given(method("DELETE"))
            .and(path(format!("/rest/v1/{}", table)))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&mock_server)
            .await;
    }

    let planner = planner_as(&mock_server, MARKO, "marko@example.com");
    let event = serde_json::from_value(event_json(ANA, "grill")).unwrap();
    let result = planner
        .polls()
        .delete(&event, Uuid::parse_str(POLL).unwrap())
        .await;

    assert!(matches!(result, Err(Error::Forbidden(_))));
}

#[tokio::test]
async fn test_creator_deletes_poll_with_votes_and_options() {
    let mock_server = MockServer::start().await;

    for table in ["event_poll_votes", "event_poll_options"] {
        Mock::given(method("DELETE"))
            .and(path(format!("/rest/v1/{}", table)))
            .and(query_param("poll_id", format!("eq.{}", POLL)))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/event_polls"))
        .and(query_param("id", format!("eq.{}", POLL)))
        .and(query_param("event_id", format!("eq.{}", EVENT)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": POLL,
            "event_id": EVENT,
            "question": "Where?",
            "mode": "single"
        }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let planner = planner_as(&mock_server, ANA, "ana@example.com");
    let event = serde_json::from_value(event_json(ANA, "grill")).unwrap();
    planner
        .polls()
        .delete(&event, Uuid::parse_str(POLL).unwrap())
        .await
        .unwrap();
}

async fn mount_event_page(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(event_json(ANA, "birthday")))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/event_items"))
        .and(query_param("order", "created_at.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([cake_json("single")])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/item_claims"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "6f1c2d3e-0000-4000-8000-0000000000e1",
            "event_id": EVENT,
            "event_item_id": CAKE,
            "user_id": MARKO
        }])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/event_members"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "event_id": EVENT, "user_id": ANA, "role": "creator", "rsvp": "accepted" },
            { "event_id": EVENT, "user_id": MARKO, "role": "member", "rsvp": null }
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": ANA, "full_name": "Ana" },
            { "id": MARKO, "full_name": "Marko" }
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/event_polls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/event_messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4(), "event_id": EVENT, "sender_id": MARKO,
              "visibility": "general", "body": "Who brings music?" },
            { "id": Uuid::new_v4(), "event_id": EVENT, "sender_id": MARKO,
              "visibility": "secret", "body": "Cake is chocolate" }
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/event_invites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_surprise_creator_sees_claims_hidden() {
    let mock_server = MockServer::start().await;
    mount_event_page(&mock_server).await;

    let planner = planner_as(&mock_server, ANA, "ana@example.com");
    let page = EventPage::load(&planner, event_id()).await.unwrap();

    assert!(page.is_creator);
    assert!(page.hide_claims);
    assert_eq!(page.items[0].status, ClaimStatus::Hidden);
    assert!(!page.items[0].i_claimed);
    assert!(page.claims.is_empty());
    assert_eq!(page.messages.len(), 1);
    assert_eq!(page.people_coming().count(), 1);
}

#[tokio::test]
async fn test_guest_sees_who_claimed() {
    let mock_server = MockServer::start().await;
    mount_event_page(&mock_server).await;

    let planner = planner_as(&mock_server, MARKO, "marko@example.com");
    let page = EventPage::load(&planner, event_id()).await.unwrap();

    assert!(!page.is_creator);
    assert!(!page.hide_claims);
    assert_eq!(page.items[0].status.to_string(), "Claimed by Marko");
    assert!(page.items[0].i_claimed);
    assert_eq!(page.messages.len(), 2);
    assert!(page.invites.is_empty());
}
