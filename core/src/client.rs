//! Request builder and response parser for the OnePageCRM API.
//!
//! # Design
//! `CrmClient` never performs I/O. Each operation is split into a `build_*`
//! method that produces a signed `HttpRequest` and a `parse_*` method that
//! turns the matching `HttpResponse` into a `Payload` or an `ApiError`. The
//! caller, or `Session`, runs the HTTP round-trip in between.
//!
//! Parsing takes `&mut self` because successful responses refresh the
//! bootstrap cache (`CrmClient::bootstrap`).

use std::fmt;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::auth::{unix_timestamp, Credentials, HEADER_AUTH, HEADER_TS, HEADER_UID};
use crate::bootstrap::Bootstrap;
use crate::config::{ClientConfig, ResponseType};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::resource::{Query, ResourcePath};
use crate::response::Node;
use crate::value::{is_truthy, message_text};

pub const REQUEST_ERROR_FALLBACK: &str = "No error message was returned contact the developers \
     at forum.developer.onepagecrm.com for more help";

pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error has occurred. Please inform our dev \
     team of this issue at forum.developer.onepagecrm.com and provide details of how you \
     triggered this error.";

/// Keys tried, in order, when unwrapping a contacts listing.
const CONTACT_COLLECTIONS: [&str; 4] = ["contacts", "actions", "deals", "notes"];

/// A response body shaped according to `ResponseType`.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Raw(Value),
    Mapped(Node),
}

impl Payload {
    pub fn into_raw(self) -> Value {
        match self {
            Payload::Raw(value) => value,
            Payload::Mapped(node) => node.into_raw(),
        }
    }

    pub fn into_node(self) -> Node {
        match self {
            Payload::Raw(value) => Node::from_raw(value),
            Payload::Mapped(node) => node,
        }
    }

    pub fn as_raw(&self) -> Option<&Value> {
        match self {
            Payload::Raw(value) => Some(value),
            Payload::Mapped(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Payload::Mapped(node) => Some(node),
            Payload::Raw(_) => None,
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Raw(value) => write!(f, "{value}"),
            Payload::Mapped(node) => write!(f, "{node}"),
        }
    }
}

/// Synchronous client for the OnePageCRM API.
#[derive(Debug, Clone)]
pub struct CrmClient {
    base_url: String,
    response_type: ResponseType,
    credentials: Credentials,
    clock: fn() -> u64,
    bootstrap: Bootstrap,
}

impl CrmClient {
    /// Build a client from `config`. Credentials are used only when both the
    /// user id and API key are present; the API key must be valid base64.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let credentials = match (config.user_id.as_deref(), config.api_key.as_deref()) {
            (Some(user_id), Some(api_key)) if config.has_credentials() => {
                Credentials::new(user_id, api_key)?
            }
            _ => Credentials::anonymous(),
        };
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            response_type: config.response_type,
            credentials,
            clock: unix_timestamp,
            bootstrap: Bootstrap::default(),
        })
    }

    /// Unauthenticated client, as used for logging in.
    pub fn anonymous(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            response_type: ResponseType::default(),
            credentials: Credentials::anonymous(),
            clock: unix_timestamp,
            bootstrap: Bootstrap::default(),
        }
    }

    /// Replace the timestamp source used for signing.
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn response_type(&self) -> ResponseType {
        self.response_type
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn is_authenticated(&self) -> bool {
        !self.credentials.is_anonymous()
    }

    pub fn bootstrap(&self) -> &Bootstrap {
        &self.bootstrap
    }

    pub(crate) fn bootstrap_mut(&mut self) -> &mut Bootstrap {
        &mut self.bootstrap
    }

    pub fn url(&self, path: &ResourcePath, query: &Query) -> String {
        let mut url = self.base_url.clone();
        for segment in path.segments() {
            url.push('/');
            url.push_str(segment);
        }
        url.push_str(".json");
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query.encode());
        }
        url
    }

    /// Signed headers for a request to `url`, timestamped with the client's
    /// clock.
    pub fn headers(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&str>,
    ) -> Result<Vec<(String, String)>, ApiError> {
        let timestamp = (self.clock)();
        let signature = self.credentials.signature(timestamp, method, url, body)?;
        Ok(vec![
            (HEADER_UID.to_string(), self.credentials.user_id().to_string()),
            (HEADER_TS.to_string(), timestamp.to_string()),
            (HEADER_AUTH.to_string(), signature),
            ("Content-Type".to_string(), "application/json".to_string()),
            ("accept".to_string(), "application/json".to_string()),
        ])
    }

    fn request(
        &self,
        method: HttpMethod,
        path: &ResourcePath,
        body: Option<String>,
        query: &Query,
    ) -> Result<HttpRequest, ApiError> {
        let url = self.url(path, query);
        let body = if method.has_body() {
            Some(body.unwrap_or_else(|| "{}".to_string()))
        } else {
            None
        };
        let headers = self.headers(method, &url, body.as_deref())?;
        debug!(%method, %url, "built request");
        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }

    pub fn build_get(&self, path: &ResourcePath, query: &Query) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Get, path, None, query)
    }

    /// `resource` may be any serializable value; a `Node` is sent as its
    /// `to_raw` form.
    pub fn build_post<B: Serialize + ?Sized>(
        &self,
        path: &ResourcePath,
        resource: &B,
        query: &Query,
    ) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Post, path, Some(to_body(resource)?), query)
    }

    pub fn build_put<B: Serialize + ?Sized>(
        &self,
        path: &ResourcePath,
        resource: &B,
        query: &Query,
    ) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Put, path, Some(to_body(resource)?), query)
    }

    /// A `PUT` with `partial=true`: only the fields present are changed.
    pub fn build_patch<B: Serialize + ?Sized>(
        &self,
        path: &ResourcePath,
        resource: &B,
        query: &Query,
    ) -> Result<HttpRequest, ApiError> {
        let mut query = query.clone();
        query.set("partial", true);
        self.build_put(path, resource, &query)
    }

    pub fn build_delete(&self, path: &ResourcePath, query: &Query) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Delete, path, None, query)
    }

    pub fn build_bootstrap(&self) -> Result<HttpRequest, ApiError> {
        self.build_get(&ResourcePath::new("bootstrap"), &Query::new())
    }

    pub fn build_login(&self, user_name: &str, password: &str) -> Result<HttpRequest, ApiError> {
        if user_name.is_empty() || password.is_empty() {
            return Err(ApiError::MissingCredentials);
        }
        let body = json!({"login": user_name, "password": password});
        self.build_post(&ResourcePath::new("login"), &body, &Query::new())
    }

    /// Contacts, or one contact's actions, deals or notes. Pair with
    /// `parse_contacts`.
    pub fn build_get_contacts(
        &self,
        contact_id: Option<&str>,
        sub_resource: Option<&str>,
        query: &Query,
    ) -> Result<HttpRequest, ApiError> {
        let mut path = ResourcePath::new("contacts");
        if let Some(contact_id) = contact_id {
            path = path.id(contact_id);
        }
        if let Some(sub_resource) = sub_resource {
            path = path.sub_resource(sub_resource);
        }
        self.build_get(&path, query)
    }

    /// Map the status to an error or return the response's `data` (the whole
    /// body when there is none), shaped per `ResponseType`.
    pub fn parse_response(&mut self, response: HttpResponse) -> Result<Payload, ApiError> {
        let data = self.decode(response)?;
        Ok(self.shape(data))
    }

    /// Like `parse_response`, then unwraps the first of `contacts`,
    /// `actions`, `deals` or `notes` present in the data.
    pub fn parse_contacts(&mut self, response: HttpResponse) -> Result<Payload, ApiError> {
        let data = self.decode(response)?;
        Ok(self.shape(select_collection(data)))
    }

    /// Parse a login response into an authenticated client that shares this
    /// client's base URL, response type and clock.
    pub fn parse_login(&mut self, response: HttpResponse) -> Result<CrmClient, ApiError> {
        let data = self.decode(response)?;
        let user_id = field_text(&data, "user_id")?;
        let auth_key = field_text(&data, "auth_key")?;
        let mut client = CrmClient {
            base_url: self.base_url.clone(),
            response_type: self.response_type,
            credentials: Credentials::new(user_id, &auth_key)?,
            clock: self.clock,
            bootstrap: Bootstrap::default(),
        };
        debug!(user_id = client.credentials.user_id(), "logged in");
        client.bootstrap.user = Some(data);
        Ok(client)
    }

    fn decode(&mut self, response: HttpResponse) -> Result<Value, ApiError> {
        let status = response.status;
        let body: Value =
            serde_json::from_str(&response.body).unwrap_or_else(|_| Value::Object(Map::new()));

        if (400..500).contains(&status) {
            let message = ["error_message", "message"]
                .iter()
                .filter_map(|key| body.get(*key))
                .find(|value| is_truthy(value))
                .map(message_text)
                .unwrap_or_else(|| REQUEST_ERROR_FALLBACK.to_string());
            warn!(status, %message, "request rejected");
            return Err(ApiError::Request {
                message,
                status,
                data: self.shape(body),
            });
        }
        if status >= 500 {
            warn!(status, "server error");
            return Err(ApiError::Unknown {
                message: UNKNOWN_ERROR_MESSAGE.to_string(),
                status,
                data: self.shape(Value::Object(Map::new())),
            });
        }

        self.bootstrap.absorb(&body);
        Ok(unwrap_data(body))
    }

    fn shape(&self, value: Value) -> Payload {
        match self.response_type {
            ResponseType::Raw => Payload::Raw(value),
            ResponseType::Mapped => Payload::Mapped(Node::from_raw(value)),
        }
    }
}

fn to_body<B: Serialize + ?Sized>(resource: &B) -> Result<String, ApiError> {
    serde_json::to_string(resource).map_err(|e| ApiError::SerializationError(e.to_string()))
}

fn unwrap_data(body: Value) -> Value {
    match body {
        Value::Object(mut map) => match map.remove("data") {
            Some(data) => data,
            None => Value::Object(map),
        },
        other => other,
    }
}

fn select_collection(data: Value) -> Value {
    match data {
        Value::Object(mut map) => {
            for key in CONTACT_COLLECTIONS {
                if let Some(collection) = map.remove(key) {
                    return collection;
                }
            }
            Value::Object(map)
        }
        other => other,
    }
}

fn field_text(data: &Value, name: &'static str) -> Result<String, ApiError> {
    match data.get(name) {
        Some(Value::String(text)) if !text.is_empty() => Ok(text.clone()),
        Some(Value::Number(number)) => Ok(number.to_string()),
        _ => Err(ApiError::MissingField(name)),
    }
}
