//! Resource paths and query strings.
//!
//! API URLs have the shape `{base}/{name}[/{id}][/{sub}][/{sub_id}].json`
//! with an optional query string. Empty fragments are skipped, so
//! `ResourcePath::new("contacts").id("")` is the same URL as
//! `ResourcePath::new("contacts")`.

use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left as-is in query keys and values: unreserved marks and `/`.
const QUERY_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

/// Path fragments of an API resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePath {
    name: String,
    id: Option<String>,
    sub_resource: Option<String>,
    sub_resource_id: Option<String>,
}

impl ResourcePath {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn sub_resource(mut self, sub_resource: impl Into<String>) -> Self {
        self.sub_resource = Some(sub_resource.into());
        self
    }

    pub fn sub_resource_id(mut self, sub_resource_id: impl Into<String>) -> Self {
        self.sub_resource_id = Some(sub_resource_id.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Non-empty fragments in URL order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str())
            .chain(self.id.as_deref())
            .chain(self.sub_resource.as_deref())
            .chain(self.sub_resource_id.as_deref())
            .filter(|segment| !segment.is_empty())
    }
}

impl From<&str> for ResourcePath {
    fn from(name: &str) -> Self {
        ResourcePath::new(name)
    }
}

/// Ordered query parameters. Values are rendered with `Display`, so
/// `param("starred", true)` becomes `starred=true`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    params: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.set(key, value);
        self
    }

    /// Set `key`, replacing an earlier value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl fmt::Display) {
        let key = key.into();
        let value = value.to_string();
        match self.params.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.params.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// `k=v&...` in insertion order. Spaces become `%20` and `/` is kept.
    pub fn encode(&self) -> String {
        self.params
            .iter()
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(key, QUERY_SAFE),
                    utf8_percent_encode(value, QUERY_SAFE)
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<K: Into<String>, V: fmt::Display> FromIterator<(K, V)> for Query {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut query = Query::new();
        for (key, value) in iter {
            query.set(key, value);
        }
        query
    }
}
