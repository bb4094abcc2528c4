//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock Redfish services and test
//! the full search cycle end-to-end against an on-disk database.

use redfish_diver::config::Config;
use redfish_diver::crawler::{
    event_channel, run_search, Coordinator, CrawlEvent, EventReceiver, HttpMethod, Search,
    SearchOutcome,
};
use redfish_diver::credentials::{key_path_for, AesGcmCipher};
use redfish_diver::storage::{open_shared_storage, SqliteStorage, Storage};
use redfish_diver::{extract_origin, normalize_uri, CrawlPhase, DiverError};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration writing to the given database
fn create_test_config(db_path: &Path) -> Config {
    let mut config = Config::default();
    config.client.timeout = 5;
    config.storage.database_path = db_path.to_string_lossy().to_string();
    config
}

fn create_coordinator(dir: &TempDir) -> Coordinator {
    let db_path = dir.path().join("diver.db");
    let storage = open_shared_storage(&db_path).expect("Failed to open storage");
    Coordinator::new(create_test_config(&db_path), storage).expect("Failed to create coordinator")
}

fn resource(body: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

/// A JSON response whose key order is kept as written
fn ordered_resource(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "application/json")
}

fn drain(receiver: &mut EventReceiver) -> Vec<CrawlEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

fn stored_uris(events: &[CrawlEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            CrawlEvent::SnapshotStored(snapshot) => Some(snapshot.uri.clone()),
            _ => None,
        })
        .collect()
}

fn terminal_events(events: &[CrawlEvent]) -> Vec<&CrawlEvent> {
    events.iter().filter(|event| event.is_terminal()).collect()
}

/// Mounts a small service: root -> Systems -> Systems/1, root -> Chassis.
/// Systems and Systems/1 link back up, so every page is reachable twice.
async fn mount_service(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/redfish/v1"))
        .respond_with(ordered_resource(
            r#"{
                "@odata.id": "/redfish/v1",
                "@odata.etag": "W/\"root-1\"",
                "Systems": { "@odata.id": "/redfish/v1/Systems" },
                "Chassis": { "@odata.id": "/redfish/v1/Chassis" }
            }"#,
        ))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/redfish/v1/Systems"))
        .respond_with(ordered_resource(
            r#"{
                "@odata.id": "/redfish/v1/Systems",
                "Members": [ { "@odata.id": "/redfish/v1/Systems/1" } ],
                "Links": { "ServiceRoot": { "@odata.id": "/redfish/v1" } }
            }"#,
        ))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/redfish/v1/Systems/1"))
        .respond_with(resource(json!({
            "@odata.id": "/redfish/v1/Systems/1",
            "PowerState": "On",
            "Status": { "State": "Enabled", "Health": "OK" },
            "Links": { "Collection": { "href": "/redfish/v1/Systems" } }
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/redfish/v1/Chassis"))
        .respond_with(resource(json!({
            "@odata.id": "/redfish/v1/Chassis",
            "Members": []
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_dive_visits_every_resource_once() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_service(&mock_server).await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let (tx, mut rx) = event_channel();
    let mut coordinator = create_coordinator(&temp_dir).with_events(tx);

    let search = Search::new(format!("{}/redfish/v1/", base_url))
        .with_credentials("admin", "secret")
        .with_auto_dive(true);
    let outcome = coordinator.search(search).await.expect("Search failed");

    let report = match outcome {
        SearchOutcome::Crawled(report) => report,
        other => panic!("Expected a crawl, got {:?}", other),
    };
    assert_eq!(report.fetched, 4);
    assert_eq!(report.failed, 0);
    assert_eq!(report.visited, 4);
    assert_eq!(report.skipped, 2);
    assert!(!report.cancelled);

    // Depth-first, links in document order
    let events = drain(&mut rx);
    assert_eq!(
        stored_uris(&events),
        vec![
            format!("{}/redfish/v1", base_url),
            format!("{}/redfish/v1/Systems", base_url),
            format!("{}/redfish/v1/Systems/1", base_url),
            format!("{}/redfish/v1/Chassis", base_url),
        ]
    );
    assert_eq!(terminal_events(&events), vec![&CrawlEvent::Finished]);
    assert!(events.contains(&CrawlEvent::EtagRefreshed("W/\"root-1\"".to_string())));

    assert_eq!(coordinator.results().len(), 4);
    assert_eq!(coordinator.last_etag(), "W/\"root-1\"");
    assert_eq!(coordinator.phase(), CrawlPhase::Idle);

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_snapshots().unwrap(), 4);
    assert_eq!(storage.count_errors().unwrap(), 0);

    let origin = extract_origin(&normalize_uri(&base_url).unwrap()).unwrap();
    let node = storage.get_node(&origin).unwrap().expect("Node not registered");
    assert_eq!(node.username.as_deref(), Some("admin"));
    assert_eq!(node.plugin, "None");
}

#[tokio::test]
async fn test_single_shot_does_not_follow_links() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/redfish/v1"))
        .respond_with(resource(json!({
            "Systems": { "@odata.id": "/redfish/v1/Systems" }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/redfish/v1/Systems"))
        .respond_with(resource(json!({})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let (tx, mut rx) = event_channel();
    let mut coordinator = create_coordinator(&temp_dir).with_events(tx);

    let outcome = coordinator
        .search(Search::new(format!("{}/redfish/v1", base_url)))
        .await
        .expect("Search failed");

    match outcome {
        SearchOutcome::Crawled(report) => {
            assert_eq!(report.fetched, 1);
            assert_eq!(report.visited, 1);
        }
        other => panic!("Expected a crawl, got {:?}", other),
    }
    assert_eq!(terminal_events(&drain(&mut rx)), vec![&CrawlEvent::Finished]);
}

#[tokio::test]
async fn test_auto_dive_ignored_for_post() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("POST"))
        .and(path("/redfish/v1/SessionService/Sessions"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "@odata.id": "/redfish/v1/SessionService/Sessions/7",
            "UserName": "admin"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/redfish/v1/SessionService/Sessions/7"))
        .respond_with(resource(json!({})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut coordinator = create_coordinator(&temp_dir);

    let search = Search::new(format!("{}/redfish/v1/SessionService/Sessions", base_url))
        .with_method(HttpMethod::Post)
        .with_json_body(r#"{"UserName":"admin","Password":"secret"}"#)
        .with_auto_dive(true);
    let outcome = coordinator.search(search).await.expect("Search failed");

    assert!(matches!(outcome, SearchOutcome::Crawled(ref r) if r.fetched == 1));
    let stored = &coordinator.results()[0];
    assert_eq!(stored.method, "POST");
    assert_eq!(stored.status_code, 201);
    assert!(stored.json_body.is_some());
}

#[tokio::test]
async fn test_seed_failure_aborts_search() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/redfish/v1"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let (tx, mut rx) = event_channel();
    let mut coordinator = create_coordinator(&temp_dir).with_events(tx);

    let result = coordinator
        .search(Search::new(format!("{}/redfish/v1", base_url)).with_auto_dive(true))
        .await;

    match result {
        Err(DiverError::SeedFailed(error)) => {
            assert_eq!(error.status_code, 404);
            assert!(error.message.starts_with("404"));
            assert!(error.parent_uri.is_none());
        }
        other => panic!("Expected seed failure, got {:?}", other),
    }

    let events = drain(&mut rx);
    assert_eq!(terminal_events(&events).len(), 1);
    assert!(matches!(events.last(), Some(CrawlEvent::Failed(_))));
    assert!(!events
        .iter()
        .any(|event| matches!(event, CrawlEvent::NodeUpdated(_))));
    assert_eq!(coordinator.phase(), CrawlPhase::Idle);

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_snapshots().unwrap(), 0);
    assert_eq!(storage.count_nodes().unwrap(), 0);
    assert_eq!(storage.count_errors().unwrap(), 1);
}

#[tokio::test]
async fn test_child_failure_is_logged_and_crawl_continues() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/redfish/v1"))
        .respond_with(resource(json!({
            "Managers": { "@odata.id": "/redfish/v1/Managers" },
            "Chassis": { "@odata.id": "/redfish/v1/Chassis" }
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/redfish/v1/Managers"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/redfish/v1/Chassis"))
        .respond_with(resource(json!({ "Members": [] })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let (tx, mut rx) = event_channel();
    let mut coordinator = create_coordinator(&temp_dir).with_events(tx);

    let outcome = coordinator
        .search(Search::new(format!("{}/redfish/v1", base_url)).with_auto_dive(true))
        .await
        .expect("Search failed");

    match outcome {
        SearchOutcome::Crawled(report) => {
            assert_eq!(report.fetched, 2);
            assert_eq!(report.failed, 1);
        }
        other => panic!("Expected a crawl, got {:?}", other),
    }

    let events = drain(&mut rx);
    assert_eq!(terminal_events(&events), vec![&CrawlEvent::Finished]);

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    let errors = storage.list_errors().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].status_code, 500);
    assert_eq!(errors[0].uri, format!("{}/redfish/v1/Managers", base_url));
    assert_eq!(
        errors[0].parent_uri.as_deref(),
        Some(format!("{}/redfish/v1", base_url).as_str())
    );
    assert_eq!(storage.count_snapshots().unwrap(), 2);
}

#[tokio::test]
async fn test_transport_failure_between_siblings() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    // Nothing listens on port 1, so the middle link fails without a response
    Mock::given(method("GET"))
        .and(path("/redfish/v1"))
        .respond_with(ordered_resource(
            r#"{
                "Members": [
                    { "@odata.id": "/redfish/v1/Systems/1" },
                    { "@odata.id": "http://127.0.0.1:1/redfish/v1/Systems/2" },
                    { "@odata.id": "/redfish/v1/Systems/3" }
                ]
            }"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/redfish/v1/Systems/1"))
        .respond_with(resource(json!({ "Id": "1" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/redfish/v1/Systems/3"))
        .respond_with(resource(json!({ "Id": "3" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let (tx, mut rx) = event_channel();
    let mut coordinator = create_coordinator(&temp_dir).with_events(tx);

    coordinator
        .search(Search::new(format!("{}/redfish/v1", base_url)).with_auto_dive(true))
        .await
        .expect("Search failed");

    let events = drain(&mut rx);
    assert_eq!(terminal_events(&events), vec![&CrawlEvent::Finished]);
    let failures: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            CrawlEvent::Error(error) => Some(error),
            _ => None,
        })
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].status_code, 0);
    assert!(!failures[0].has_response());

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    // Seed plus the two reachable siblings
    assert_eq!(storage.count_snapshots().unwrap(), 3);
    assert_eq!(storage.count_errors().unwrap(), 1);
    // The unreachable origin never answered, so it is not registered
    assert_eq!(storage.count_nodes().unwrap(), 1);
}

#[tokio::test]
async fn test_changed_content_rotates_previous_version() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/redfish/v1/Systems/1"))
        .respond_with(resource(json!({ "PowerState": "Off" })))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/redfish/v1/Systems/1"))
        .respond_with(resource(json!({ "PowerState": "On" })))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut coordinator = create_coordinator(&temp_dir);
    let uri = format!("{}/redfish/v1/Systems/1", base_url);

    coordinator.search(Search::new(uri.as_str())).await.unwrap();
    let first = coordinator.results()[0].clone();
    assert!(!first.has_previous());
    assert!(first.content.contains("Off"));

    coordinator.search(Search::new(uri.as_str())).await.unwrap();
    let second = coordinator.results()[0].clone();
    assert!(second.content.contains("On"));
    assert_eq!(second.previous_content.as_deref(), Some(first.content.as_str()));
    assert!(second.previous_updated.is_some());

    // Unchanged content keeps the earlier generation
    coordinator.search(Search::new(uri.as_str())).await.unwrap();
    let third = coordinator.results()[0].clone();
    assert_eq!(third.previous_content.as_deref(), Some(first.content.as_str()));
    assert_eq!(coordinator.results().len(), 1);

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_snapshots().unwrap(), 1);
    assert_eq!(storage.count_changed_snapshots().unwrap(), 1);
}

#[tokio::test]
async fn test_cancellation_stops_before_next_fetch() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/redfish/v1"))
        .respond_with(ordered_resource(
            r#"{
                "Systems": { "@odata.id": "/redfish/v1/Systems" },
                "Chassis": { "@odata.id": "/redfish/v1/Chassis" }
            }"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/redfish/v1/Systems"))
        .respond_with(resource(json!({})).set_delay(Duration::from_millis(500)))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/redfish/v1/Chassis"))
        .respond_with(resource(json!({})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let (tx, mut rx) = event_channel();
    let mut coordinator = create_coordinator(&temp_dir).with_events(tx);
    let control = coordinator.control();

    let (forward_tx, mut forward_rx) = event_channel();
    let listener = tokio::spawn(async move {
        let mut cancelled = false;
        while let Some(event) = rx.recv().await {
            if !cancelled && matches!(event, CrawlEvent::SnapshotStored(_)) {
                control.cancel();
                cancelled = true;
            }
            let terminal = event.is_terminal();
            let _ = forward_tx.send(event);
            if terminal {
                break;
            }
        }
    });

    let outcome = coordinator
        .search(Search::new(format!("{}/redfish/v1", base_url)).with_auto_dive(true))
        .await
        .expect("Search failed");
    listener.await.expect("Listener panicked");

    match outcome {
        SearchOutcome::Crawled(report) => {
            assert!(report.cancelled);
            // The seed and the request already in flight when the cancel landed
            assert_eq!(report.fetched, 2);
        }
        other => panic!("Expected a crawl, got {:?}", other),
    }
    assert_eq!(coordinator.phase(), CrawlPhase::Cancelled);

    let systems = format!("{}/redfish/v1/Systems", base_url);
    let events = drain(&mut forward_rx);
    assert_eq!(
        stored_uris(&events),
        vec![format!("{}/redfish/v1", base_url), systems.clone()]
    );
    assert_eq!(terminal_events(&events), vec![&CrawlEvent::Cancelled]);

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    assert!(storage.get_snapshot(&systems).unwrap().is_some());
    assert_eq!(storage.count_snapshots().unwrap(), 2);
}

#[tokio::test]
async fn test_store_failure_ends_with_aborted_event() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/redfish/v1"))
        .respond_with(ordered_resource(
            r#"{
                "Systems": { "@odata.id": "/redfish/v1/Systems" },
                "Chassis": { "@odata.id": "/redfish/v1/Chassis" }
            }"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/redfish/v1/Systems"))
        .respond_with(resource(json!({ "Members": [] })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/redfish/v1/Chassis"))
        .respond_with(resource(json!({})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let (tx, mut rx) = event_channel();
    let mut coordinator = create_coordinator(&temp_dir).with_events(tx);

    // Make the store reject the first child while the seed still goes through
    let conn = rusqlite::Connection::open(temp_dir.path().join("diver.db"))
        .expect("Failed to open second connection");
    conn.execute_batch(
        "CREATE TRIGGER reject_systems BEFORE INSERT ON snapshots
         WHEN NEW.uri LIKE '%/Systems'
         BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
    )
    .expect("Failed to create trigger");
    drop(conn);

    let result = coordinator
        .search(Search::new(format!("{}/redfish/v1", base_url)).with_auto_dive(true))
        .await;

    assert!(matches!(result, Err(DiverError::StorageError(_))));
    assert_eq!(coordinator.phase(), CrawlPhase::Idle);

    let events = drain(&mut rx);
    assert_eq!(stored_uris(&events), vec![format!("{}/redfish/v1", base_url)]);
    let terminal = terminal_events(&events);
    assert_eq!(terminal.len(), 1);
    match terminal[0] {
        CrawlEvent::Aborted(message) => assert!(message.contains("disk full")),
        other => panic!("Expected an aborted crawl, got {:?}", other),
    }
    assert!(matches!(events.last(), Some(CrawlEvent::Aborted(_))));
}

#[tokio::test]
async fn test_filter_after_crawl() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_service(&mock_server).await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut coordinator = create_coordinator(&temp_dir);

    coordinator
        .search(Search::new(format!("{}/redfish/v1", base_url)).with_auto_dive(true))
        .await
        .expect("Search failed");

    let outcome = coordinator.search(Search::new("enabled")).await.unwrap();
    match outcome {
        SearchOutcome::Filtered(matches) => {
            assert_eq!(matches.len(), 1);
            assert_eq!(matches[0].uri, format!("{}/redfish/v1/Systems/1", base_url));
        }
        other => panic!("Expected filtered results, got {:?}", other),
    }

    // A second filter runs against the full crawl, not the narrowed view
    let outcome = coordinator.search(Search::new("Members")).await.unwrap();
    assert!(matches!(outcome, SearchOutcome::Filtered(ref m) if m.len() == 2));
}

#[tokio::test]
async fn test_remove_node_cascades_to_snapshots() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_service(&mock_server).await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut coordinator = create_coordinator(&temp_dir);

    coordinator
        .search(Search::new(format!("{}/redfish/v1", base_url)).with_auto_dive(true))
        .await
        .expect("Search failed");

    let origin = extract_origin(&normalize_uri(&base_url).unwrap()).unwrap();
    let removed = coordinator.remove_node(&origin).expect("Remove failed");
    assert_eq!(removed, 4);
    assert!(coordinator.results().is_empty());

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_snapshots().unwrap(), 0);
    assert!(storage.get_node(&origin).unwrap().is_none());
}

#[tokio::test]
async fn test_replay_stored_request() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("PATCH"))
        .and(path("/redfish/v1/Systems/1"))
        .respond_with(resource(json!({ "AssetTag": "rack-4" })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut coordinator = create_coordinator(&temp_dir);
    let uri = format!("{}/redfish/v1/Systems/1", base_url);

    let search = Search::new(uri.as_str())
        .with_method(HttpMethod::Patch)
        .with_credentials("admin", "secret")
        .with_if_match("W/\"abc\"")
        .with_json_body(r#"{"AssetTag":"rack-4"}"#);
    coordinator.search(search).await.expect("Search failed");

    let replay = coordinator
        .replay_search(&uri)
        .unwrap()
        .expect("Nothing to replay");
    assert_eq!(replay.method, HttpMethod::Patch);
    assert_eq!(replay.username, "admin");
    assert_eq!(replay.password, "secret");
    assert!(replay.headers.is_empty());
    assert_eq!(replay.json_body, r#"{"AssetTag":"rack-4"}"#);

    coordinator.search(replay).await.expect("Replay failed");
}

#[tokio::test]
async fn test_run_search_persists_to_configured_database() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_service(&mock_server).await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("nested").join("diver.db");
    let config = create_test_config(&db_path);

    let (tx, mut rx) = event_channel();
    let outcome = run_search(
        config,
        Search::new(format!("{}/redfish/v1", base_url)).with_auto_dive(true),
        Some(tx),
    )
    .await
    .expect("Search failed");

    assert!(matches!(outcome, SearchOutcome::Crawled(ref r) if r.fetched == 4));
    assert_eq!(terminal_events(&drain(&mut rx)), vec![&CrawlEvent::Finished]);

    let storage = SqliteStorage::new(&db_path).expect("Failed to reopen database");
    assert_eq!(storage.count_snapshots().unwrap(), 4);
    assert_eq!(storage.count_nodes().unwrap(), 1);
}

#[tokio::test]
async fn test_passwords_encrypted_at_rest() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/redfish/v1/Systems/1"))
        .and(header("authorization", "Basic YWRtaW46c2VjcmV0"))
        .respond_with(resource(json!({ "Id": "1" })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let key_path = key_path_for(&temp_dir.path().join("diver.db"));
    let cipher = AesGcmCipher::load_or_create(&key_path).expect("Failed to create key");
    let mut coordinator = create_coordinator(&temp_dir).with_cipher(Arc::new(cipher));
    let uri = format!("{}/redfish/v1/Systems/1", base_url);

    coordinator
        .search(Search::new(uri.as_str()).with_credentials("admin", "secret"))
        .await
        .expect("Search failed");

    let origin = extract_origin(&normalize_uri(&base_url).unwrap()).unwrap();
    {
        let storage = coordinator.storage();
        let storage = storage.lock().unwrap();
        let node = storage.get_node(&origin).unwrap().expect("Node not registered");
        let stored = node.password.expect("Password not stored");
        assert!(!stored.is_empty());
        assert_ne!(stored, "secret");
    }

    // Replay decrypts the stored password and authenticates again
    let replay = coordinator
        .replay_search(&uri)
        .unwrap()
        .expect("Nothing to replay");
    assert_eq!(replay.password, "secret");
    coordinator.search(replay).await.expect("Replay failed");
}
