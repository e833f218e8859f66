//! Concept lookup ("oracle") used to turn human-readable names into IRIs
//!
//! A [`Lookup`] answers one question: which single concept of a given kind
//! does this name or IRI denote? Lookups are composed into a [`Resolver`]
//! in an explicit priority order. [`Resolver::with_defaults`] places the
//! [`IriPassthrough`] lookup last so that raw IRIs always resolve.
//!
//! # Example
//!
//! ```
//! use xapi_profiles::lookup::{Concept, ConceptKind, ProfileLookup, Resolver};
//! use std::sync::Arc;
//!
//! let mut concepts = ProfileLookup::new();
//! concepts.insert(Concept::new("http://adlnet.gov/expapi/verbs/completed", ConceptKind::Verb)
//!     .with_label("en", "completed"));
//!
//! let resolver = Resolver::with_defaults(vec![Arc::new(concepts)]);
//! let verb = resolver.resolve("completed", ConceptKind::Verb).unwrap();
//! assert_eq!(verb.id, "http://adlnet.gov/expapi/verbs/completed");
//!
//! // unknown IRIs pass straight through
//! let other = resolver.resolve("https://example.com/verbs/hopped", ConceptKind::Verb).unwrap();
//! assert!(other.pref_label.is_empty());
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use crate::error::{Result, XapiError};

mod profile;

pub use profile::ProfileLookup;

/// Category of a concept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConceptKind {
    /// Statement verb
    Verb,
    /// Activity type used in `definition.type`
    ActivityType,
    /// Attachment usage type
    AttachmentUsageType,
    /// Fully defined activity
    Activity,
    /// Extension key valid in `context.extensions`
    ContextExtension,
    /// Extension key valid in `result.extensions`
    ResultExtension,
    /// Extension key valid in an activity definition
    ActivityExtension,
    /// State resource description
    StateResource,
    /// Agent profile resource description
    AgentProfileResource,
    /// Activity profile resource description
    ActivityProfileResource,
    /// Statement template
    #[serde(rename = "StatementTemplate")]
    Template,
    /// Pattern
    Pattern,
}

impl ConceptKind {
    /// Whether this kind names an extension key
    pub fn is_extension(self) -> bool {
        matches!(
            self,
            ConceptKind::ContextExtension | ConceptKind::ResultExtension | ConceptKind::ActivityExtension
        )
    }
}

impl fmt::Display for ConceptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A resolved concept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    /// Canonical IRI
    pub id: String,
    /// Concept category
    pub kind: ConceptKind,
    /// Display names keyed by language tag
    #[serde(default)]
    pub pref_label: BTreeMap<String, String>,
    /// Definitions keyed by language tag
    #[serde(default)]
    pub definition: BTreeMap<String, String>,
    /// Profile version the concept was defined in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_scheme: Option<String>,
}

impl Concept {
    /// Create a bare concept with no labels
    pub fn new(id: impl Into<String>, kind: ConceptKind) -> Self {
        Self {
            id: id.into(),
            kind,
            pref_label: BTreeMap::new(),
            definition: BTreeMap::new(),
            in_scheme: None,
        }
    }

    /// Add a display name in the given language
    pub fn with_label(mut self, lang: impl Into<String>, label: impl Into<String>) -> Self {
        self.pref_label.insert(lang.into(), label.into());
        self
    }

    /// Set the profile version the concept belongs to
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.in_scheme = Some(scheme.into());
        self
    }

    /// Check whether the concept is named by `identifier`, either by IRI or by any label
    pub fn is_named(&self, identifier: &str) -> bool {
        self.id == identifier || self.pref_label.values().any(|label| label == identifier)
    }

    /// Language map suitable for a `display` or `name` field, if labels exist
    pub fn display(&self) -> Option<serde_json::Value> {
        if self.pref_label.is_empty() {
            return None;
        }
        let map = self
            .pref_label
            .iter()
            .map(|(lang, label)| (lang.clone(), serde_json::Value::String(label.clone())))
            .collect();
        Some(serde_json::Value::Object(map))
    }
}

/// Check whether an identifier is IRI-like rather than a human-readable name
pub fn is_iri(identifier: &str) -> bool {
    identifier.contains(':')
}

/// Source of concepts
pub trait Lookup: fmt::Debug + Send + Sync {
    /// Return the single concept of `kind` named by `identifier`, or `None`
    /// when there is no match or more than one
    fn lookup(&self, identifier: &str, kind: ConceptKind) -> Option<Concept>;
}

/// Resolves any IRI-like identifier to a bare concept
#[derive(Debug, Clone, Copy, Default)]
pub struct IriPassthrough;

impl Lookup for IriPassthrough {
    fn lookup(&self, identifier: &str, kind: ConceptKind) -> Option<Concept> {
        is_iri(identifier).then(|| Concept::new(identifier, kind))
    }
}

/// Fixed in-memory table, keyed by `(kind, name)`
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    entries: HashMap<(ConceptKind, String), Concept>,
}

impl StaticLookup {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `concept` under an additional alias
    pub fn alias(mut self, name: impl Into<String>, concept: Concept) -> Self {
        self.entries.insert((concept.kind, name.into()), concept);
        self
    }
}

impl Lookup for StaticLookup {
    fn lookup(&self, identifier: &str, kind: ConceptKind) -> Option<Concept> {
        self.entries.get(&(kind, identifier.to_string())).cloned()
    }
}

/// Ordered composition of lookups; the first lookup that answers wins
#[derive(Debug, Clone)]
pub struct Resolver {
    lookups: Vec<Arc<dyn Lookup>>,
}

impl Resolver {
    /// Consult exactly `lookups`, in the given order
    pub fn new(lookups: Vec<Arc<dyn Lookup>>) -> Self {
        Self { lookups }
    }

    /// Consult `lookups` in order, then fall back to [`IriPassthrough`]
    pub fn with_defaults(mut lookups: Vec<Arc<dyn Lookup>>) -> Self {
        lookups.push(Arc::new(IriPassthrough));
        Self { lookups }
    }

    /// Number of lookups consulted
    pub fn len(&self) -> usize {
        self.lookups.len()
    }

    /// Whether no lookups are configured
    pub fn is_empty(&self) -> bool {
        self.lookups.is_empty()
    }

    /// Resolve `identifier` to a concept of `kind`
    ///
    /// An IRI-like identifier always resolves to itself: lookups may only
    /// enrich it with labels, and an answer carrying a different IRI is
    /// ignored.
    pub fn resolve(&self, identifier: &str, kind: ConceptKind) -> Result<Concept> {
        let iri = is_iri(identifier);
        for (position, lookup) in self.lookups.iter().enumerate() {
            let answer = lookup
                .lookup(identifier, kind)
                .filter(|concept| !iri || concept.id == identifier);
            if let Some(concept) = answer {
                trace!(identifier, %kind, position, resolved = %concept.id, "concept resolved");
                return Ok(concept);
            }
        }
        Err(XapiError::LookupFailure {
            identifier: identifier.to_string(),
            kind,
        })
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::with_defaults(Vec::new())
    }
}
