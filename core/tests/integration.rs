//! Contact lifecycle tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives `Session` over real
//! HTTP. The server checks every signature with its own implementation, so a
//! passing run means request building, signing and response parsing agree
//! end-to-end.

use onepagecrm_core::{ApiError, ClientConfig, Node, Query, ResourcePath, ResponseType, Session};
use serde_json::{json, Value};

/// Start the mock server on a random port and return its API base URL.
fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}/api/v3")
}

fn contact_path(id: &str) -> ResourcePath {
    ResourcePath::new("contacts").id(id)
}

#[test]
fn login_with_wrong_password_is_a_request_error() {
    let config = ClientConfig::new().base_url(start_server());
    let err = Session::login(&config, mock_server::LOGIN, "wrong")
        .err()
        .expect("login should fail");

    match err {
        ApiError::Request { message, status, .. } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Invalid login or password");
        }
        other => panic!("expected Request error, got {other:?}"),
    }
}

#[test]
fn login_warms_bootstrap_cache() {
    let config = ClientConfig::new().base_url(start_server());
    let session = Session::login(&config, mock_server::LOGIN, mock_server::PASSWORD).unwrap();

    let cache = session.client().bootstrap();
    assert!(cache.statuses.as_ref().is_some_and(Value::is_array));
    assert_eq!(cache.sales, Some(json!({"currency": "EUR"})));
    assert_eq!(cache.contact_counts, Some(json!({"all": 0})));
    assert!(cache.users.is_some());

    // The cached user is the login payload, not bootstrap's user document.
    let user = cache.user.as_ref().unwrap();
    assert_eq!(user["auth_key"], mock_server::API_KEY);
    assert_eq!(user["user"]["email"], mock_server::LOGIN);
}

#[test]
fn contact_lifecycle() {
    let config = ClientConfig::new().base_url(start_server());
    let none = Query::new();

    // Step 1: log in; the cache is already warm.
    let mut session = Session::login(&config, mock_server::LOGIN, mock_server::PASSWORD).unwrap();
    assert!(session.client().is_authenticated());
    assert_eq!(session.client().credentials().user_id(), mock_server::USER_ID);
    assert!(session.client().bootstrap().user.is_some());
    assert!(session
        .client()
        .bootstrap()
        .lead_sources
        .as_ref()
        .is_some_and(Value::is_array));

    // Step 2: an explicit bootstrap returns the document itself.
    let data = session.bootstrap().unwrap().into_raw();
    assert_eq!(data["user"]["id"], mock_server::USER_ID);

    // Step 3: no contacts yet.
    let contacts = session.get_contacts(None, None, &none).unwrap().into_raw();
    assert_eq!(contacts, json!([]));

    // Step 4: create one.
    let created = session
        .post(
            &ResourcePath::new("contacts"),
            &json!({"first_name": "Jane", "last_name": "Doe"}),
            &none,
        )
        .unwrap()
        .into_raw();
    let id = created["contact"]["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());
    assert_eq!(created["contact"]["last_name"], "Doe");

    // Step 5: it shows up in the listing and by id.
    let contacts = session.get_contacts(None, None, &none).unwrap().into_raw();
    assert_eq!(contacts[0]["contact"]["id"], id.as_str());
    let search = Query::new().param("search", "Jane Doe/EU");
    let found = session.get_contacts(None, None, &search).unwrap().into_raw();
    assert!(found.is_array());
    let fetched = session.get(&contact_path(&id), &none).unwrap().into_raw();
    assert_eq!(fetched["contact"]["first_name"], "Jane");

    // Step 6: partial update keeps the other fields.
    let patched = session
        .patch(&contact_path(&id), &json!({"company_name": "Acme Inc."}), &none)
        .unwrap()
        .into_raw();
    assert_eq!(patched["contact"]["first_name"], "Jane");
    assert_eq!(patched["contact"]["company_name"], "Acme Inc.");

    // Step 7: a full update without a name is rejected with field errors.
    let err = session
        .put(&contact_path(&id), &json!({"first_name": "Janet"}), &none)
        .unwrap_err();
    assert_eq!(err.status(), Some(400));
    match &err {
        ApiError::Request { message, data, .. } => {
            assert_eq!(message, "An invalid request was received");
            let data = data.as_raw().unwrap();
            assert!(data["errors"]["last_name"].is_string());
        }
        other => panic!("expected Request error, got {other:?}"),
    }

    // Step 8: delete, then the contact is gone.
    session.delete(&contact_path(&id), &none).unwrap();
    let err = session.get(&contact_path(&id), &none).unwrap_err();
    match err {
        ApiError::Request { message, status, .. } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Resource not found");
        }
        other => panic!("expected Request error, got {other:?}"),
    }
}

#[test]
fn mapped_session_returns_nodes() {
    let config = ClientConfig::new()
        .base_url(start_server())
        .credentials(mock_server::USER_ID, mock_server::API_KEY)
        .response_type(ResponseType::Mapped);
    let none = Query::new();

    // Connecting bootstraps, which also verifies the credentials.
    let mut session = Session::connect(&config).unwrap();
    assert!(!session.client().bootstrap().is_empty());

    let created = session
        .post(
            &ResourcePath::new("contacts"),
            &json!({"last_name": "Doe", "class": "vip", "2fa": true, "job title": "CTO"}),
            &none,
        )
        .unwrap()
        .into_node();

    let contact = &created["contact"];
    assert_eq!(contact["last_name"].as_str(), Some("Doe"));
    assert!(contact.get("id").is_some());
    // Keys that are not identifier-safe are dropped by the mapper.
    assert!(contact.get("class").is_none());
    assert!(contact.get("2fa").is_none());
    assert!(contact.get("job title").is_none());

    // A mapped node can be sent back as a request body.
    let id = contact["id"].as_str().unwrap().to_string();
    let mut update = Node::from_raw(json!({"company_name": "Acme Inc."}));
    if let Some(dict) = update.as_mapping_mut() {
        dict.set("first_name", "Jane");
    }
    let patched = session.patch(&contact_path(&id), &update, &none).unwrap().into_node();
    assert_eq!(patched["contact"]["company_name"].as_str(), Some("Acme Inc."));
    assert_eq!(patched["contact"]["first_name"].as_str(), Some("Jane"));

    let listing = session.get_contacts(None, None, &none).unwrap().into_node();
    assert_eq!(listing.as_sequence().map(|items| items.len()), Some(1));
}

#[test]
fn connect_with_bad_key_is_rejected() {
    let config = ClientConfig::new()
        .base_url(start_server())
        .credentials(mock_server::USER_ID, "d3Jvbmcga2V5");

    match Session::connect(&config).err() {
        Some(ApiError::Request { status, .. }) => assert_eq!(status, 401),
        other => panic!("expected 401, got {other:?}"),
    }
}

#[test]
fn closed_port_is_a_transport_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let config = ClientConfig::new()
        .base_url(format!("http://{addr}/api/v3"))
        .credentials(mock_server::USER_ID, mock_server::API_KEY);

    match Session::connect(&config).err() {
        Some(ApiError::Transport(_)) => {}
        other => panic!("expected transport error, got {other:?}"),
    }
}
