//! Copy-on-write JSON documents and the kind-gated statement builder
//!
//! A [`Document`] is an `Arc`-shared JSON tree. Every update produces a new
//! document; the tree is cloned only when it is still shared with an older
//! snapshot, so builder chains can fork freely.

use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

pub mod builder;

pub use builder::{BuildOptions, Builder, ContextRelation};

/// Kind of document a [`Builder`] produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// Top level statement
    Statement,
    /// Statement nested as the object of another statement
    SubStatement,
    /// Single agent
    Agent,
    /// Group of agents
    Group,
    /// Activity
    Activity,
    /// Attachment metadata
    Attachment,
}

impl DocumentKind {
    /// Value of `objectType` written for this kind, if any
    pub fn object_type(self) -> Option<&'static str> {
        match self {
            DocumentKind::Statement | DocumentKind::Attachment => None,
            DocumentKind::SubStatement => Some("SubStatement"),
            DocumentKind::Agent => Some("Agent"),
            DocumentKind::Group => Some("Group"),
            DocumentKind::Activity => Some("Activity"),
        }
    }

    /// Whether documents of this kind may be used as an actor
    pub fn is_actor(self) -> bool {
        matches!(self, DocumentKind::Agent | DocumentKind::Group)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Immutable JSON tree with structural sharing
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Arc<Value>,
}

impl Document {
    /// Create an empty object document
    pub fn new() -> Self {
        Self::from_value(Value::Object(Map::new()))
    }

    /// Wrap an existing JSON value
    pub fn from_value(value: Value) -> Self {
        Self { root: Arc::new(value) }
    }

    /// Borrow the value at `path`; numeric segments index into arrays
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(self.root.as_ref(), |current, segment| match current {
            Value::Object(map) => map.get(*segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    /// Check whether a value exists at `path`
    pub fn contains(&self, path: &[&str]) -> bool {
        self.get(path).is_some()
    }

    /// New document with `value` stored at `path`, creating objects along the way
    pub fn set(&self, path: &[&str], value: Value) -> Document {
        self.update(|root| *slot_mut(root, path) = value)
    }

    /// New document with `value` appended to the array at `path`
    ///
    /// A single value already stored there is promoted to an array first.
    pub fn push(&self, path: &[&str], value: Value) -> Document {
        self.update(|root| {
            let slot = slot_mut(root, path);
            match slot {
                Value::Array(items) => items.push(value),
                Value::Null => *slot = Value::Array(vec![value]),
                other => {
                    let existing = other.take();
                    *other = Value::Array(vec![existing, value]);
                }
            }
        })
    }

    /// New document without the value at `path`
    pub fn remove(&self, path: &[&str]) -> Document {
        let Some((last, parent)) = path.split_last() else {
            return Document::new();
        };
        if !self.contains(path) {
            return self.clone();
        }
        self.update(|root| {
            if let Some(Value::Object(map)) = get_mut(root, parent) {
                map.remove(*last);
            }
        })
    }

    /// Borrow the underlying tree
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Fully realized plain value
    pub fn to_value(&self) -> Value {
        self.root.as_ref().clone()
    }

    /// Whether two documents share the same tree
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }

    fn update(&self, f: impl FnOnce(&mut Value)) -> Document {
        let mut root = Arc::clone(&self.root);
        f(Arc::make_mut(&mut root));
        Document { root }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Value> for Document {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

// Walks `path`, creating objects for missing or scalar segments.
fn slot_mut<'a>(target: &'a mut Value, path: &[&str]) -> &'a mut Value {
    let Some((head, rest)) = path.split_first() else {
        return target;
    };

    let index = match &*target {
        Value::Array(items) => head.parse::<usize>().ok().filter(|&i| i < items.len()),
        _ => None,
    };
    if index.is_none() && !target.is_object() {
        *target = Value::Object(Map::new());
    }

    let next = match (target, index) {
        (Value::Array(items), Some(i)) => &mut items[i],
        (Value::Object(map), _) => map.entry(head.to_string()).or_insert(Value::Null),
        // non-objects were replaced above
        (other, _) => other,
    };
    slot_mut(next, rest)
}

fn get_mut<'a>(target: &'a mut Value, path: &[&str]) -> Option<&'a mut Value> {
    path.iter().try_fold(target, |current, segment| match current {
        Value::Object(map) => map.get_mut(*segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(move |i| items.get_mut(i)),
        _ => None,
    })
}
