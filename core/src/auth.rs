//! Request signing for the `X-OnePageCRM-*` headers.
//!
//! The signature is `hex(HMAC-SHA256(base64decode(api_key), message))` with
//!
//! ```text
//! message = "{user_id}.{timestamp}.{METHOD}.{sha1_hex(url)}"
//!         + ".{sha1_hex(body)}"        (only when a non-empty body is sent)
//! ```
//!
//! The URL is hashed exactly as sent, query string included.

use std::fmt::{self, Write as _};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::ApiError;
use crate::http::HttpMethod;

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_UID: &str = "X-OnePageCRM-UID";
pub const HEADER_TS: &str = "X-OnePageCRM-TS";
pub const HEADER_AUTH: &str = "X-OnePageCRM-Auth";

/// User id plus the decoded API key. The default value is the anonymous
/// identity used for the login call.
#[derive(Clone, Default)]
pub struct Credentials {
    user_id: String,
    key: Vec<u8>,
}

impl Credentials {
    pub fn new(user_id: impl Into<String>, api_key: &str) -> Result<Self, ApiError> {
        let key = STANDARD
            .decode(api_key.trim())
            .map_err(|err| ApiError::InvalidApiKey(err.to_string()))?;
        Ok(Self {
            user_id: user_id.into(),
            key,
        })
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_empty()
    }

    pub fn signature(
        &self,
        timestamp: u64,
        method: HttpMethod,
        url: &str,
        body: Option<&str>,
    ) -> Result<String, ApiError> {
        let mut message = format!(
            "{}.{}.{}.{}",
            self.user_id,
            timestamp,
            method.as_str(),
            hex(&Sha1::digest(url.as_bytes()))
        );
        if let Some(body) = body.filter(|body| !body.is_empty()) {
            message.push('.');
            message.push_str(&hex(&Sha1::digest(body.as_bytes())));
        }
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|err| ApiError::InvalidApiKey(err.to_string()))?;
        mac.update(message.as_bytes());
        Ok(hex(&mac.finalize().into_bytes()))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Current unix time in whole seconds, rounded to the nearest second.
pub fn unix_timestamp() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    now.as_secs() + u64::from(now.subsec_millis() >= 500)
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
