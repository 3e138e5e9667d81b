//! Account metadata cached from API responses.
//!
//! Any successful response may carry parts of the bootstrap document (the
//! current user, team members, contact statuses, ...). `Bootstrap::absorb`
//! picks them out of the response's `data` object, falling back to the top
//! level when there is none, and keeps the latest truthy value of each.

use serde_json::Value;
use tracing::debug;

use crate::value::is_truthy;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bootstrap {
    pub sales: Option<Value>,
    pub lead_sources: Option<Value>,
    pub statuses: Option<Value>,
    pub team_stream: Option<Value>,
    pub contact_counts: Option<Value>,
    pub users: Option<Value>,
    pub user: Option<Value>,
}

impl Bootstrap {
    /// Update cached fields from a decoded response body. Missing, null or
    /// empty values leave the cache untouched.
    pub fn absorb(&mut self, body: &Value) {
        let source = match body.get("data") {
            Some(data @ Value::Object(_)) => data,
            _ => body,
        };
        let fields: [(&str, &mut Option<Value>); 7] = [
            ("sales", &mut self.sales),
            ("lead_sources", &mut self.lead_sources),
            ("statuses", &mut self.statuses),
            ("team_stream", &mut self.team_stream),
            ("contacts_count", &mut self.contact_counts),
            ("users", &mut self.users),
            ("user", &mut self.user),
        ];
        for (key, slot) in fields {
            if let Some(value) = source.get(key).filter(|value| is_truthy(value)) {
                debug!(field = key, "bootstrap field updated");
                *slot = Some(value.clone());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Bootstrap::default()
    }
}
