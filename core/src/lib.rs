//! Synchronous client for the OnePageCRM REST API.
//!
//! # Overview
//! Builds signed `HttpRequest` values and parses `HttpResponse` values
//! (host-does-IO), with an optional blocking `Session` that runs the
//! round-trip over `ureq`. Responses come back as raw JSON or as a `Node`
//! tree with key and field access.
//!
//! # Design
//! - `CrmClient` holds the base URL, credentials and the bootstrap cache; it
//!   never touches the network.
//! - `Node` / `ResponseDict` convert decoded JSON recursively, dropping keys
//!   that are not identifier-safe (see `ident`).
//! - Status mapping: 4xx is `ApiError::Request`, 5xx is
//!   `ApiError::Unknown`; the mapper itself never fails.
//! - Integration tests run against the `mock-server` crate, which verifies
//!   signatures independently of this crate's signing code.

pub mod auth;
pub mod bootstrap;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod ident;
pub mod resource;
pub mod response;
pub mod session;
mod value;

pub use auth::Credentials;
pub use bootstrap::Bootstrap;
pub use client::{CrmClient, Payload};
pub use config::{ClientConfig, ResponseType};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use resource::{Query, ResourcePath};
pub use response::{Node, ResponseDict};
pub use session::Session;
