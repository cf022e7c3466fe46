use rocket::http::{ContentType, Header, Status};
use rocket::figment::Figment;
use rocket::local::blocking::Client;
use serde_json::{json, Value};
use shared::{Clock, ManualClock, MemoryJournal, PollPolicy, PollStore};
use std::sync::Arc;
use time::Duration;

use crate::routes::AppState;

fn base_figment() -> Figment {
    Figment::from(rocket::Config::debug_default()).merge(("log_level", "off"))
}

fn client_with_clock() -> (Client, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
    let store = PollStore::new(
        Arc::clone(&clock) as Arc<dyn Clock>,
        Arc::new(MemoryJournal::new()),
        PollPolicy::default(),
    );
    let figment = base_figment();
    let client = Client::tracked(crate::rocket_with_state(figment, AppState::new(Arc::new(store))))
        .expect("valid rocket instance");
    (client, clock)
}

fn create(client: &Client, body: Value) -> (Status, Value) {
    let response = client.post("/api/polls")
        .header(ContentType::JSON)
        .body(body.to_string())
        .dispatch();
    let status = response.status();
    (status, response.into_json().unwrap_or(Value::Null))
}

fn vote(client: &Client, poll: u64, option: usize, identity: Option<&str>) -> (Status, Value) {
    let mut request = client.post(format!("/api/polls/{}/votes", poll))
        .header(ContentType::JSON)
        .body(json!({ "optionIndex": option }).to_string());
    if let Some(identity) = identity {
        request = request.header(Header::new("X-Identity", identity.to_string()));
    }
    let response = request.dispatch();
    let status = response.status();
    (status, response.into_json().unwrap_or(Value::Null))
}

fn color_poll() -> Value {
    json!({ "question": "Color?", "options": ["Red", "Blue"], "durationSeconds": 3600 })
}

#[test]
fn test_create_and_read_poll() {
    let (client, _) = client_with_clock();
    let (status, body) = create(&client, color_poll());
    assert_eq!(status, Status::Created);
    assert_eq!(body, json!({ "id": 1 }));

    let poll: Value = client.get("/api/polls/1").dispatch().into_json().unwrap();
    assert_eq!(poll, json!({
        "id": 1,
        "question": "Color?",
        "options": ["Red", "Blue"],
        "endTime": 1_700_003_600
    }));

    let results: Value = client.get("/api/polls/1/results").dispatch().into_json().unwrap();
    assert_eq!(results["counts"], json!([0, 0]));
}

#[test]
fn test_vote_flow() {
    let (client, _) = client_with_clock();
    create(&client, color_poll());

    assert_eq!(vote(&client, 1, 1, Some("alice")).0, Status::NoContent);
    let results: Value = client.get("/api/polls/1/results").dispatch().into_json().unwrap();
    assert_eq!(results, json!({ "pollId": 1, "counts": [0, 1], "totalVotes": 1 }));

    let (status, body) = vote(&client, 1, 0, Some("alice"));
    assert_eq!(status, Status::Conflict);
    assert_eq!(body["code"], "alreadyVoted");

    let (status, body) = vote(&client, 1, 5, Some("bob"));
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["code"], "invalidOption");

    let (status, body) = vote(&client, 9, 0, Some("bob"));
    assert_eq!(status, Status::NotFound);
    assert_eq!(body["code"], "pollNotFound");
}

#[test]
fn test_vote_requires_identity() {
    let (client, _) = client_with_clock();
    create(&client, color_poll());

    let (status, body) = vote(&client, 1, 0, None);
    assert_eq!(status, Status::Unauthorized);
    assert_eq!(body["status"], 401);
    assert_eq!(vote(&client, 1, 0, Some("   ")).0, Status::Unauthorized);

    let results: Value = client.get("/api/polls/1/results").dispatch().into_json().unwrap();
    assert_eq!(results["totalVotes"], 0);
}

#[test]
fn test_closed_poll() {
    let (client, clock) = client_with_clock();
    create(&client, color_poll());

    clock.advance(Duration::seconds(3599));
    assert_eq!(vote(&client, 1, 0, Some("alice")).0, Status::NoContent);

    clock.advance(Duration::seconds(1));
    let (status, body) = vote(&client, 1, 0, Some("bob"));
    assert_eq!(status, Status::Forbidden);
    assert_eq!(body["code"], "pollClosed");

    let poll = client.get("/api/polls/1").dispatch();
    assert_eq!(poll.status(), Status::Ok);
}

#[test]
fn test_invalid_creation() {
    let (client, _) = client_with_clock();

    let (status, body) = create(&client, json!({ "question": "X?", "options": ["only-one"], "durationSeconds": 10 }));
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["code"], "invalidOptions");

    let (status, _) = create(&client, json!({ "question": "X?" }));
    assert!(status == Status::UnprocessableEntity || status == Status::BadRequest);

    assert_eq!(client.get("/api/polls/1").dispatch().status(), Status::NotFound);
}

#[test]
fn test_event_stream() {
    let (client, _) = client_with_clock();
    create(&client, color_poll());
    vote(&client, 1, 1, Some("alice"));

    let events: Value = client.get("/api/events").dispatch().into_json().unwrap();
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["event"]["type"], "PollCreated");
    assert_eq!(events[1]["event"], json!({ "type": "Voted", "pollId": 1, "identity": "alice", "optionIndex": 1 }));

    let tail: Value = client.get("/api/events?since=1").dispatch().into_json().unwrap();
    assert_eq!(tail.as_array().unwrap().len(), 1);
    assert_eq!(tail[0]["sequence"], 2);
}

#[test]
fn test_event_stream_pages() {
    let (client, _) = client_with_clock();
    create(&client, color_poll());
    for voter in ["alice", "bob", "carol", "dave"] {
        vote(&client, 1, 0, Some(voter));
    }

    let page: Value = client.get("/api/events?since=0&limit=2").dispatch().into_json().unwrap();
    let sequences: Vec<_> = page.as_array().unwrap().iter().map(|e| e["sequence"].clone()).collect();
    assert_eq!(sequences, vec![json!(1), json!(2)]);

    let next: Value = client.get("/api/events?since=2&limit=2").dispatch().into_json().unwrap();
    assert_eq!(next[0]["sequence"], 3);
    assert_eq!(next.as_array().unwrap().len(), 2);

    let capped: Value = client.get(format!("/api/events?limit={}", usize::MAX)).dispatch().into_json().unwrap();
    assert_eq!(capped.as_array().unwrap().len(), 5);
}

#[test]
fn test_journal_config_restores_state() {
    let path = std::env::temp_dir().join(format!("pollbook_backend_{}.jsonl", uuid::Uuid::new_v4()));
    let figment = || base_figment()
        .merge(("polls.journal_path", path.to_string_lossy().to_string()))
        .merge(("polls.policy.max_options", 3));

    {
        let client = Client::tracked(crate::rocket(figment())).expect("valid rocket instance");
        create(&client, color_poll());
        assert_eq!(vote(&client, 1, 0, Some("alice")).0, Status::NoContent);

        let (status, body) = create(&client, json!({
            "question": "Too many?", "options": ["a", "b", "c", "d"], "durationSeconds": 10
        }));
        assert_eq!(status, Status::BadRequest);
        assert_eq!(body["code"], "invalidOptions");
    }

    let client = Client::tracked(crate::rocket(figment())).expect("valid rocket instance");
    let results: Value = client.get("/api/polls/1/results").dispatch().into_json().unwrap();
    assert_eq!(results["counts"], json!([1, 0]));
    assert_eq!(vote(&client, 1, 1, Some("alice")).0, Status::Conflict);

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_cors_headers() {
    let (client, _) = client_with_clock();
    let response = client.options("/api/polls")
        .header(Header::new("Origin", "http://localhost:3000"))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.headers().get_one("Access-Control-Allow-Origin"), Some("http://localhost:3000"));
    assert!(response.headers().get_one("Access-Control-Allow-Headers").unwrap().contains("X-Identity"));
}
