use std::{
    collections::HashMap,
    fmt::Write as _,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{info, warn};
use uuid::Uuid;

pub const USER_ID: &str = "559cd19f2b0b9a2a1ec34bd7";
pub const API_KEY: &str = "c3VwZXIgc2VjcmV0IGFwaSBrZXk=";
pub const LOGIN: &str = "jane@example.com";
pub const PASSWORD: &str = "secret";

pub type Contacts = Arc<RwLock<Map<String, Value>>>;

type Reply = (StatusCode, Json<Value>);

#[derive(Clone)]
pub struct AppState {
    origin: Arc<str>,
    contacts: Contacts,
}

/// Router serving `/api/v3/...`. `origin` (scheme, host and port) is
/// prefixed to the request path when checking signatures.
pub fn app(origin: &str) -> Router {
    let state = AppState {
        origin: Arc::from(origin.trim_end_matches('/')),
        contacts: Arc::new(RwLock::new(Map::new())),
    };
    Router::new()
        .route("/api/v3/login.json", post(login))
        .route("/api/v3/bootstrap.json", get(bootstrap))
        .route("/api/v3/contacts.json", get(list_contacts).post(create_contact))
        .route(
            "/api/v3/contacts/{file}",
            get(get_contact).put(update_contact).delete(delete_contact),
        )
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    let origin = format!("http://{}", listener.local_addr()?);
    axum::serve(listener, app(&origin)).await
}

/// `hex(HMAC-SHA256(base64decode(api_key), message))` over
/// `uid.ts.METHOD.sha1(url)[.sha1(body)]`.
pub fn sign(
    user_id: &str,
    api_key: &str,
    timestamp: &str,
    method: &str,
    url: &str,
    body: &str,
) -> Option<String> {
    let key = STANDARD.decode(api_key).ok()?;
    let mut message = format!(
        "{user_id}.{timestamp}.{}.{}",
        method.to_uppercase(),
        to_hex(&Sha1::digest(url.as_bytes()))
    );
    if !body.is_empty() {
        message.push('.');
        message.push_str(&to_hex(&Sha1::digest(body.as_bytes())));
    }
    let mut mac = Hmac::<Sha256>::new_from_slice(&key).ok()?;
    mac.update(message.as_bytes());
    Some(to_hex(&mac.finalize().into_bytes()))
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn envelope(status: StatusCode, data: Value) -> Reply {
    (
        status,
        Json(json!({"status": 0, "message": "OK", "timestamp": now(), "data": data})),
    )
}

fn fail(status: StatusCode, error_name: &str, error_message: &str) -> Reply {
    (
        status,
        Json(json!({
            "status": status.as_u16(),
            "message": status.canonical_reason().unwrap_or("Error"),
            "error_name": error_name,
            "error_message": error_message,
        })),
    )
}

fn not_found() -> Reply {
    fail(StatusCode::NOT_FOUND, "resource_not_found", "Resource not found")
}

fn authorize(
    state: &AppState,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: &str,
) -> Result<(), Reply> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let unauthorized = || {
        fail(
            StatusCode::UNAUTHORIZED,
            "authorization_data_invalid",
            "Authorization data is invalid",
        )
    };

    let (Some(uid), Some(ts), Some(auth)) = (
        header("x-onepagecrm-uid"),
        header("x-onepagecrm-ts"),
        header("x-onepagecrm-auth"),
    ) else {
        warn!(%uri, "missing auth headers");
        return Err(unauthorized());
    };
    if uid != USER_ID {
        warn!(uid, "unknown user");
        return Err(unauthorized());
    }
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    let url = format!("{}{}", state.origin, path);
    match sign(USER_ID, API_KEY, ts, method.as_str(), &url, body) {
        Some(expected) if expected == auth => Ok(()),
        _ => {
            warn!(%url, "signature mismatch");
            Err(unauthorized())
        }
    }
}

fn contact_id(file: &str) -> Option<&str> {
    file.strip_suffix(".json").filter(|id| !id.is_empty())
}

fn parse_contact(body: &str) -> Result<Map<String, Value>, Reply> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(fields)) => Ok(fields),
        _ => Err(fail(
            StatusCode::BAD_REQUEST,
            "invalid_request_data",
            "Request body must be a JSON object",
        )),
    }
}

fn has_name(contact: &Map<String, Value>) -> bool {
    ["last_name", "company_name"].iter().any(|key| {
        contact
            .get(*key)
            .and_then(Value::as_str)
            .is_some_and(|name| !name.is_empty())
    })
}

fn missing_name() -> Reply {
    let (status, Json(mut body)) = fail(
        StatusCode::BAD_REQUEST,
        "invalid_request_data",
        "An invalid request was received",
    );
    body["errors"] = json!({"last_name": "Last name or company name is required"});
    (status, Json(body))
}

#[derive(Deserialize)]
struct LoginRequest {
    login: String,
    password: String,
}

async fn login(body: String) -> Reply {
    let accepted = match serde_json::from_str::<LoginRequest>(&body) {
        Ok(request) => request.login == LOGIN && request.password == PASSWORD,
        Err(_) => false,
    };
    if !accepted {
        warn!("rejected login");
        return fail(
            StatusCode::BAD_REQUEST,
            "invalid_login",
            "Invalid login or password",
        );
    }
    info!(user_id = USER_ID, "login");
    envelope(
        StatusCode::OK,
        json!({
            "user_id": USER_ID,
            "auth_key": API_KEY,
            "user": {"id": USER_ID, "first_name": "Jane", "last_name": "Doe", "email": LOGIN},
        }),
    )
}

async fn bootstrap(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Reply, Reply> {
    authorize(&state, &method, &uri, &headers, "")?;
    let count = state.contacts.read().await.len();
    Ok(envelope(
        StatusCode::OK,
        json!({
            "user": {"id": USER_ID, "first_name": "Jane", "last_name": "Doe", "email": LOGIN},
            "users": [{"user": {"id": USER_ID, "first_name": "Jane"}}],
            "statuses": [{"id": "lead", "text": "Lead"}, {"id": "customer", "text": "Customer"}],
            "lead_sources": [{"id": "web", "text": "Web"}],
            "sales": {"currency": "EUR"},
            "team_stream": {"enabled": true},
            "contacts_count": {"all": count},
        }),
    ))
}

async fn list_contacts(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Reply, Reply> {
    authorize(&state, &method, &uri, &headers, "")?;
    let contacts = state.contacts.read().await;
    let listing: Vec<Value> = contacts
        .values()
        .map(|contact| json!({"contact": contact}))
        .collect();
    Ok(envelope(
        StatusCode::OK,
        json!({"contacts": listing, "total_count": contacts.len(), "page": 1}),
    ))
}

async fn create_contact(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Result<Reply, Reply> {
    authorize(&state, &method, &uri, &headers, &body)?;
    let fields = parse_contact(&body)?;
    if !has_name(&fields) {
        return Err(missing_name());
    }
    let id = Uuid::new_v4().simple().to_string();
    let mut contact = Map::new();
    contact.insert("id".to_string(), Value::String(id.clone()));
    contact.extend(fields.into_iter().filter(|(key, _)| key != "id"));
    let contact = Value::Object(contact);
    state.contacts.write().await.insert(id.clone(), contact.clone());
    info!(%id, "contact created");
    Ok(envelope(StatusCode::CREATED, json!({"contact": contact})))
}

async fn get_contact(
    State(state): State<AppState>,
    Path(file): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Reply, Reply> {
    authorize(&state, &method, &uri, &headers, "")?;
    let id = contact_id(&file).ok_or_else(not_found)?;
    let contacts = state.contacts.read().await;
    let contact = contacts.get(id).cloned().ok_or_else(not_found)?;
    Ok(envelope(StatusCode::OK, json!({"contact": contact})))
}

async fn update_contact(
    State(state): State<AppState>,
    Path(file): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Result<Reply, Reply> {
    authorize(&state, &method, &uri, &headers, &body)?;
    let id = contact_id(&file).ok_or_else(not_found)?;
    let fields = parse_contact(&body)?;
    let partial = params
        .get("partial")
        .is_some_and(|flag| flag.eq_ignore_ascii_case("true"));

    let mut contacts = state.contacts.write().await;
    let stored = contacts.get_mut(id).ok_or_else(not_found)?;
    let mut updated = match (partial, stored.as_object()) {
        (true, Some(existing)) => existing.clone(),
        _ => Map::new(),
    };
    updated.insert("id".to_string(), Value::String(id.to_string()));
    updated.extend(fields.into_iter().filter(|(key, _)| key != "id"));
    if !has_name(&updated) {
        return Err(missing_name());
    }
    *stored = Value::Object(updated);
    info!(%id, partial, "contact updated");
    Ok(envelope(StatusCode::OK, json!({"contact": stored.clone()})))
}

async fn delete_contact(
    State(state): State<AppState>,
    Path(file): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Reply, Reply> {
    authorize(&state, &method, &uri, &headers, "")?;
    let id = contact_id(&file).ok_or_else(not_found)?;
    let removed = state.contacts.write().await.remove(id);
    removed.ok_or_else(not_found)?;
    info!(%id, "contact deleted");
    Ok(envelope(StatusCode::OK, json!({"contact": {"id": id}})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_matches_reference_vector() {
        let sig = sign(
            USER_ID,
            API_KEY,
            "1420070400",
            "GET",
            "https://app.onepagecrm.com/api/v3/contacts.json",
            "",
        );
        assert_eq!(
            sig.as_deref(),
            Some("893fc9534a676cf5a4c393449fd503c577cb0147675b14f3f9cb856e9bd976cc")
        );
    }

    #[test]
    fn sign_hashes_body_when_present() {
        let sig = sign(
            USER_ID,
            API_KEY,
            "1420070400",
            "post",
            "https://app.onepagecrm.com/api/v3/contacts.json",
            r#"{"first_name":"Jane","last_name":"Doe"}"#,
        );
        assert_eq!(
            sig.as_deref(),
            Some("7c762c24fb06f6f4d5108885ca047fec5605f6aaf2b779e43e94a2dcb6e66559")
        );
    }

    #[test]
    fn sign_rejects_bad_key() {
        assert!(sign(USER_ID, "%%%", "1", "GET", "http://x", "").is_none());
    }

    #[test]
    fn contact_id_strips_extension() {
        assert_eq!(contact_id("abc.json"), Some("abc"));
        assert_eq!(contact_id("abc"), None);
        assert_eq!(contact_id(".json"), None);
    }

    #[test]
    fn has_name_accepts_last_or_company_name() {
        let contact = |value: Value| value.as_object().cloned().unwrap();
        assert!(has_name(&contact(json!({"last_name": "Doe"}))));
        assert!(has_name(&contact(json!({"company_name": "Acme"}))));
        assert!(!has_name(&contact(json!({"first_name": "Jane", "last_name": ""}))));
    }

    #[test]
    fn envelope_wraps_data() {
        let (status, Json(body)) = envelope(StatusCode::OK, json!({"x": 1}));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], 0);
        assert_eq!(body["data"]["x"], 1);
    }
}
