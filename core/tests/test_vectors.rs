//! Verify mapping, signing and status handling against JSON test vectors
//! stored in `test-vectors/`.
//!
//! Signing vectors were produced independently of this crate; comparing
//! parsed JSON for results avoids false negatives from formatting.

use onepagecrm_core::{ApiError, ClientConfig, CrmClient, HttpResponse, Node, Query, ResourcePath};
use serde_json::Value;

fn path_from(case: &Value) -> ResourcePath {
    let segments: Vec<&str> = case["path"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s.as_str().unwrap())
        .collect();
    let mut path = ResourcePath::new(segments[0]);
    if let Some(id) = segments.get(1) {
        path = path.id(*id);
    }
    path
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

#[test]
fn mapping_test_vectors() {
    let raw = include_str!("../../test-vectors/mapping.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let node = Node::from_raw(case["input"].clone());
        assert_eq!(node.to_raw(), case["expected"], "{name}: to_raw");

        // A second pass is a no-op: everything left is identifier-safe.
        let again = Node::from_raw(node.to_raw());
        assert_eq!(again, node, "{name}: idempotent");
    }
}

// ---------------------------------------------------------------------------
// Signing
// ---------------------------------------------------------------------------

fn vector_clock() -> u64 {
    1420070400
}

#[test]
fn signature_test_vectors() {
    let raw = include_str!("../../test-vectors/signature.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();
    assert_eq!(vectors["timestamp"].as_u64(), Some(vector_clock()));

    let config = ClientConfig::new()
        .base_url(vectors["base_url"].as_str().unwrap())
        .credentials(
            vectors["user_id"].as_str().unwrap(),
            vectors["api_key"].as_str().unwrap(),
        );
    let client = CrmClient::new(&config).unwrap().with_clock(vector_clock);
    let none = Query::new();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let path = path_from(case);
        let body = &case["body"];

        let req = match case["operation"].as_str().unwrap() {
            "get" => client.build_get(&path, &none),
            "post" => client.build_post(&path, body, &none),
            "patch" => client.build_patch(&path, body, &none),
            "delete" => client.build_delete(&path, &none),
            other => panic!("{name}: unknown operation {other}"),
        }
        .unwrap();

        assert_eq!(req.url, case["expected_url"].as_str().unwrap(), "{name}: url");
        assert_eq!(
            req.body.as_deref(),
            case["expected_body"].as_str(),
            "{name}: body"
        );
        assert_eq!(
            req.header("X-OnePageCRM-Auth"),
            case["expected_auth"].as_str(),
            "{name}: signature"
        );
        assert_eq!(
            req.header("X-OnePageCRM-UID"),
            vectors["user_id"].as_str(),
            "{name}: uid"
        );
        assert_eq!(req.header("X-OnePageCRM-TS"), Some("1420070400"), "{name}: ts");
    }
}

// ---------------------------------------------------------------------------
// Status handling
// ---------------------------------------------------------------------------

#[test]
fn error_test_vectors() {
    let raw = include_str!("../../test-vectors/errors.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let mut client = CrmClient::anonymous("http://localhost:3000/api/v3");
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let response = HttpResponse::new(
            case["status"].as_u64().unwrap() as u16,
            case["body"].as_str().unwrap(),
        );
        let result = client.parse_response(response);

        if let Some(expected_error) = case.get("expected_error") {
            let err = result.unwrap_err();
            let expected_message = case["expected_message"].as_str().unwrap();
            match (expected_error.as_str().unwrap(), &err) {
                ("Request", ApiError::Request { message, .. })
                | ("Unknown", ApiError::Unknown { message, .. }) => {
                    assert_eq!(message, expected_message, "{name}: message");
                }
                (kind, other) => panic!("{name}: expected {kind}, got {other:?}"),
            }
            assert_eq!(err.status(), case["status"].as_u64().map(|s| s as u16), "{name}: status");
        } else {
            let payload = result.unwrap();
            assert_eq!(payload.into_raw(), case["expected_result"], "{name}: result");
        }
    }
}
