//! Attribute-style view over decoded JSON responses.
//!
//! # Design
//! `Node` is the recursive tree built from a `serde_json::Value`: objects
//! become `ResponseDict` mappings, arrays become sequences, everything else
//! passes through as a scalar. Object keys that are not identifier-safe (see
//! `crate::ident`) are dropped during conversion.
//!
//! `ResponseDict` keeps one ordered entry map. Every write goes through
//! `ResponseDict::set`, so the key view (`get`, `keys`, `to_raw`) and the
//! field view (`node["name"]`) can never disagree.
//!
//! Keys that collide with the mapping's own accessor names
//! (`INTRINSIC_NAMES`) behave differently on write: `set("len", v)` stores
//! `v` in a separate intrinsic slot. The slot is visible to `get` and takes
//! priority over a child entry of the same name, but it is not a child entry
//! and never appears in `keys()` or `to_raw()`. Entries that arrive through
//! `from_raw` are always child entries, whatever their name. `delete` clears
//! both the slot and the entry.
//!
//! Lookups never fail: a miss is `None`, or the shared null node when going
//! through `Index`.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::ident::is_identifier;

/// Accessor names of `ResponseDict`. Writes to these keys land in an
/// intrinsic slot instead of becoming child entries.
pub const INTRINSIC_NAMES: &[&str] = &[
    "contains", "delete", "get", "get_mut", "is_empty", "iter", "keys", "len", "set", "to_raw",
    "values",
];

static NULL: Node = Node::Scalar(Value::Null);

fn intrinsic_name(key: &str) -> Option<&'static str> {
    INTRINSIC_NAMES.iter().copied().find(|name| *name == key)
}

/// A value in a mapped response tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Mapping(ResponseDict),
    Sequence(Vec<Node>),
    Scalar(Value),
}

impl Node {
    /// Convert a decoded JSON value into a tree, dropping non-identifier keys
    /// at every level.
    pub fn from_raw(value: Value) -> Node {
        match value {
            Value::Object(map) => Node::Mapping(ResponseDict::from_raw_map(map)),
            Value::Array(items) => Node::Sequence(items.into_iter().map(Node::from_raw).collect()),
            scalar => Node::Scalar(scalar),
        }
    }

    /// Convert the tree back into plain JSON.
    pub fn to_raw(&self) -> Value {
        match self {
            Node::Mapping(dict) => dict.to_raw(),
            Node::Sequence(items) => Value::Array(items.iter().map(Node::to_raw).collect()),
            Node::Scalar(value) => value.clone(),
        }
    }

    pub fn into_raw(self) -> Value {
        match self {
            Node::Mapping(dict) => dict.into_raw(),
            Node::Sequence(items) => Value::Array(items.into_iter().map(Node::into_raw).collect()),
            Node::Scalar(value) => value,
        }
    }

    pub fn null() -> Node {
        Node::Scalar(Value::Null)
    }

    /// Look up `key` on a mapping. Returns `None` for misses and for
    /// non-mapping nodes.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_mapping()?.get(key)
    }

    /// Element `index` of a sequence, if any.
    pub fn at(&self, index: usize) -> Option<&Node> {
        self.as_sequence()?.get(index)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.as_mapping().is_some_and(|dict| dict.contains(key))
    }

    pub fn as_mapping(&self) -> Option<&ResponseDict> {
        match self {
            Node::Mapping(dict) => Some(dict),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut ResponseDict> {
        match self {
            Node::Mapping(dict) => Some(dict),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match self {
            Node::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Node::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Scalar(Value::Null))
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar()?.as_str()
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_scalar()?.as_i64()
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_scalar()?.as_u64()
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_scalar()?.as_f64()
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_scalar()?.as_bool()
    }
}

impl Default for Node {
    fn default() -> Self {
        Node::null()
    }
}

impl Index<&str> for Node {
    type Output = Node;

    fn index(&self, key: &str) -> &Node {
        self.get(key).unwrap_or(&NULL)
    }
}

impl Index<usize> for Node {
    type Output = Node;

    fn index(&self, index: usize) -> &Node {
        self.at(index).unwrap_or(&NULL)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_raw())
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node::from_raw(value)
    }
}

impl From<ResponseDict> for Node {
    fn from(dict: ResponseDict) -> Self {
        Node::Mapping(dict)
    }
}

impl From<Vec<Node>> for Node {
    fn from(items: Vec<Node>) -> Self {
        Node::Sequence(items)
    }
}

macro_rules! scalar_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Node {
                fn from(value: $ty) -> Self {
                    Node::Scalar(Value::from(value))
                }
            }
        )*
    };
}

scalar_from!(bool, i32, i64, u32, u64, f64, &str, String);

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        node.into_raw()
    }
}

impl From<&Node> for Value {
    fn from(node: &Node) -> Self {
        node.to_raw()
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Mapping(dict) => dict.serialize(serializer),
            Node::Sequence(items) => serializer.collect_seq(items),
            Node::Scalar(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Node::from_raw)
    }
}

/// Ordered mapping node with key and field access.
///
/// Writes to one of `INTRINSIC_NAMES` are redirected into an intrinsic slot
/// and stay out of `keys()` and `to_raw()`. See the module docs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseDict {
    entries: IndexMap<String, Node>,
    intrinsics: BTreeMap<&'static str, Node>,
}

impl ResponseDict {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_raw_map(map: Map<String, Value>) -> Self {
        let entries = map
            .into_iter()
            .filter(|(key, _)| is_identifier(key))
            .map(|(key, value)| (key, Node::from_raw(value)))
            .collect();
        Self {
            entries,
            intrinsics: BTreeMap::new(),
        }
    }

    /// Intrinsic slot first, then child entry, else `None`.
    pub fn get(&self, key: &str) -> Option<&Node> {
        if let Some(node) = self.intrinsics.get(key) {
            return Some(node);
        }
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        if let Some(node) = self.intrinsics.get_mut(key) {
            return Some(node);
        }
        self.entries.get_mut(key)
    }

    /// Store `value` under `key`, returning the value it replaced.
    ///
    /// New keys are appended after existing entries. A key from
    /// `INTRINSIC_NAMES` is written to its intrinsic slot instead.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Node>) -> Option<Node> {
        let key = key.into();
        let value = value.into();
        match intrinsic_name(&key) {
            Some(name) => self.intrinsics.insert(name, value),
            None => self.entries.insert(key, value),
        }
    }

    /// Remove `key` from both the intrinsic slot and the child entries,
    /// returning what `get` would have returned. Missing keys are ignored.
    pub fn delete(&mut self, key: &str) -> Option<Node> {
        let slot = self.intrinsics.remove(key);
        let entry = self.entries.shift_remove(key);
        slot.or(entry)
    }

    /// True for child entries and for every intrinsic name, populated or not.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key) || intrinsic_name(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Node> {
        self.entries.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(key, node)| (key.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Plain JSON object of the child entries, in order.
    pub fn to_raw(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(key, node)| (key.clone(), node.to_raw()))
                .collect(),
        )
    }

    pub fn into_raw(self) -> Value {
        Value::Object(
            self.entries
                .into_iter()
                .map(|(key, node)| (key, node.into_raw()))
                .collect(),
        )
    }
}

impl Index<&str> for ResponseDict {
    type Output = Node;

    fn index(&self, key: &str) -> &Node {
        self.get(key).unwrap_or(&NULL)
    }
}

impl<K: Into<String>, V: Into<Node>> FromIterator<(K, V)> for ResponseDict {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut dict = ResponseDict::new();
        for (key, value) in iter {
            dict.set(key, value);
        }
        dict
    }
}

impl fmt::Display for ResponseDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_raw())
    }
}

impl Serialize for ResponseDict {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(&self.entries)
    }
}

impl<'de> Deserialize<'de> for ResponseDict {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Node::from_raw(Value::deserialize(deserializer)?) {
            Node::Mapping(dict) => Ok(dict),
            _ => Err(D::Error::custom("expected a JSON object")),
        }
    }
}
