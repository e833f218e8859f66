use std::collections::HashMap;
use std::sync::Arc;

use super::{Concept, ConceptKind, Lookup};

/// Concepts gathered from registered profiles
///
/// Matches on IRI or on any `prefLabel` value. A name shared by two
/// concepts of the same kind is ambiguous and resolves to nothing.
#[derive(Debug, Clone, Default)]
pub struct ProfileLookup {
    concepts: Vec<Arc<Concept>>,
    by_kind: HashMap<ConceptKind, Vec<usize>>,
}

impl ProfileLookup {
    /// Create an empty lookup
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a concept
    pub fn insert(&mut self, concept: Concept) {
        let index = self.concepts.len();
        self.by_kind.entry(concept.kind).or_default().push(index);
        self.concepts.push(Arc::new(concept));
    }

    /// Number of concepts known
    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    /// Whether no concepts are known
    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    /// Check whether a concept with this IRI exists, of any kind
    pub fn contains_id(&self, id: &str) -> bool {
        self.concepts.iter().any(|c| c.id == id)
    }

    /// Iterate over the concepts of one kind
    pub fn of_kind(&self, kind: ConceptKind) -> impl Iterator<Item = &Concept> + '_ {
        self.by_kind
            .get(&kind)
            .into_iter()
            .flatten()
            .map(move |&i| self.concepts[i].as_ref())
    }
}

impl Extend<Concept> for ProfileLookup {
    fn extend<I: IntoIterator<Item = Concept>>(&mut self, iter: I) {
        for concept in iter {
            self.insert(concept);
        }
    }
}

impl Lookup for ProfileLookup {
    fn lookup(&self, identifier: &str, kind: ConceptKind) -> Option<Concept> {
        // an exact IRI always wins over label matches
        if let Some(exact) = self.of_kind(kind).find(|c| c.id == identifier) {
            return Some(exact.clone());
        }

        let mut found: Option<&Concept> = None;
        for concept in self.of_kind(kind).filter(|c| c.is_named(identifier)) {
            match found {
                Some(previous) if previous.id != concept.id => {
                    tracing::debug!(identifier, %kind, "ambiguous concept name");
                    return None;
                }
                _ => found = Some(concept),
            }
        }
        found.cloned()
    }
}
