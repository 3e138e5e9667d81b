//! Client configuration.
//!
//! # Design
//! `ClientConfig` is plain data with builder-style setters. `from_env` reads
//! the same settings from `ONEPAGECRM_*` variables so binaries and tests can
//! point at a mock server without code changes. Credentials are validated
//! when a `CrmClient` is built, not here.

use std::env;
use std::str::FromStr;

use crate::error::ApiError;

pub const DEFAULT_BASE_URL: &str = "https://app.onepagecrm.com/api/v3/";

pub const ENV_BASE_URL: &str = "ONEPAGECRM_BASE_URL";
pub const ENV_USER_ID: &str = "ONEPAGECRM_USER_ID";
pub const ENV_API_KEY: &str = "ONEPAGECRM_API_KEY";
pub const ENV_RESPONSE_TYPE: &str = "ONEPAGECRM_RESPONSE_TYPE";

/// How successful payloads and error bodies are handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    /// `serde_json::Value`, untouched.
    #[default]
    Raw,
    /// `Node` tree built with `Node::from_raw`.
    Mapped,
}

impl FromStr for ResponseType {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dict" | "raw" => Ok(ResponseType::Raw),
            "object" | "mapped" => Ok(ResponseType::Mapped),
            other => Err(ApiError::InvalidConfig(format!("unknown response type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub response_type: ResponseType,
    pub user_id: Option<String>,
    pub api_key: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            response_type: ResponseType::default(),
            user_id: None,
            api_key: None,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn credentials(mut self, user_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self.api_key = Some(api_key.into());
        self
    }

    /// Read settings from the process environment. Unset or empty variables
    /// keep their defaults.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let read = |name: &str| lookup(name).filter(|value| !value.is_empty());
        let mut config = Self::default();
        if let Some(base_url) = read(ENV_BASE_URL) {
            config.base_url = base_url;
        }
        if let Some(response_type) = read(ENV_RESPONSE_TYPE) {
            config.response_type = response_type.parse()?;
        }
        config.user_id = read(ENV_USER_ID);
        config.api_key = read(ENV_API_KEY);
        Ok(config)
    }

    /// Both halves of the credentials are present.
    pub fn has_credentials(&self) -> bool {
        self.user_id.as_deref().is_some_and(|id| !id.is_empty())
            && self.api_key.as_deref().is_some_and(|key| !key.is_empty())
    }
}
