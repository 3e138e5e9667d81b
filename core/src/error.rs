//! Error types for the CRM client.
//!
//! # Design
//! `Request` (4xx) and `Unknown` (5xx and above) mirror what the API reports
//! and keep the status plus the shaped response body so callers can inspect
//! validation details. Every other variant is raised on the client side
//! before or after the HTTP round-trip. The response mapper never fails and
//! has no variant here.

use thiserror::Error;

use crate::client::Payload;

/// Errors returned by `CrmClient` and `Session`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server rejected the request (status 400-499).
    #[error("Response Code: [{status}]\nMessage: {message}")]
    Request {
        message: String,
        status: u16,
        data: Payload,
    },

    /// The server failed (status 500 and above).
    #[error("Response Code: [{status}]\nMessage: {message}")]
    Unknown {
        message: String,
        status: u16,
        data: Payload,
    },

    #[error("need user name and password to log in")]
    MissingCredentials,

    #[error("api key is not valid base64: {0}")]
    InvalidApiKey(String),

    /// A successful response lacked a field the client needs.
    #[error("response is missing `{0}`")]
    MissingField(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization failed: {0}")]
    SerializationError(String),

    #[error("transport failed: {0}")]
    Transport(String),
}

impl ApiError {
    /// HTTP status for server-reported errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Request { status, .. } | ApiError::Unknown { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Shaped response body for server-reported errors.
    pub fn data(&self) -> Option<&Payload> {
        match self {
            ApiError::Request { data, .. } | ApiError::Unknown { data, .. } => Some(data),
            _ => None,
        }
    }
}
