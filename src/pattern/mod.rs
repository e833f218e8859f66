//! Pattern grammar over statement templates
//!
//! A [`Pattern`] describes which sequences of template ids a pattern
//! occurrence may emit. Matching is a pure recursive descent over the
//! candidate sequence (see [`matcher`]); [`PatternOccurrence`] keeps the
//! sequence recorded so far and only accepts appends the grammar allows.

use std::fmt;
use std::sync::Arc;

pub mod matcher;
pub mod occurrence;

pub use matcher::{can_append, matches, MatchResult, Outcome};
pub use occurrence::{MatchState, PatternOccurrence};

/// Grammar node
///
/// Children are reference counted so compiled sub-patterns can be shared
/// between every pattern that refers to them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// Exactly one statement built from the template with this id
    Leaf(Arc<str>),
    /// Children in order, on consecutive statements
    Sequence(Vec<Arc<Pattern>>),
    /// Exactly one of the children
    Alternates(Vec<Arc<Pattern>>),
    /// The child at least once
    OneOrMore(Arc<Pattern>),
    /// The child any number of times
    ZeroOrMore(Arc<Pattern>),
    /// The child at most once
    Optional(Arc<Pattern>),
}

impl Pattern {
    /// Leaf for template `id`
    pub fn leaf(id: impl AsRef<str>) -> Self {
        Pattern::Leaf(Arc::from(id.as_ref()))
    }

    /// Sequence of `children`
    pub fn sequence(children: impl IntoIterator<Item = Pattern>) -> Self {
        Pattern::Sequence(children.into_iter().map(Arc::new).collect())
    }

    /// Alternates between `children`
    pub fn alternates(children: impl IntoIterator<Item = Pattern>) -> Self {
        Pattern::Alternates(children.into_iter().map(Arc::new).collect())
    }

    /// One or more repetitions of `child`
    pub fn one_or_more(child: Pattern) -> Self {
        Pattern::OneOrMore(Arc::new(child))
    }

    /// Zero or more repetitions of `child`
    pub fn zero_or_more(child: Pattern) -> Self {
        Pattern::ZeroOrMore(Arc::new(child))
    }

    /// `child` or nothing
    pub fn optional(child: Pattern) -> Self {
        Pattern::Optional(Arc::new(child))
    }

    /// Match `sequence` against this grammar
    pub fn matches<'s, S: AsRef<str>>(&self, sequence: &'s [S]) -> MatchResult<'s, S> {
        matcher::matches(sequence, self)
    }

    /// Template ids referenced anywhere in the grammar, in first-seen order
    pub fn template_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        self.collect_ids(&mut ids);
        ids
    }

    fn collect_ids<'a>(&'a self, ids: &mut Vec<&'a str>) {
        match self {
            Pattern::Leaf(id) => {
                let id: &str = id;
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            Pattern::Sequence(children) | Pattern::Alternates(children) => {
                children.iter().for_each(|child| child.collect_ids(ids))
            }
            Pattern::OneOrMore(child) | Pattern::ZeroOrMore(child) | Pattern::Optional(child) => {
                child.collect_ids(ids)
            }
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, name: &str, children: &[Arc<Pattern>]) -> fmt::Result {
            write!(f, "{}(", name)?;
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", child)?;
            }
            f.write_str(")")
        }

        match self {
            Pattern::Leaf(id) => f.write_str(id),
            Pattern::Sequence(children) => list(f, "sequence", children),
            Pattern::Alternates(children) => list(f, "alternates", children),
            Pattern::OneOrMore(child) => write!(f, "oneOrMore({})", child),
            Pattern::ZeroOrMore(child) => write!(f, "zeroOrMore({})", child),
            Pattern::Optional(child) => write!(f, "optional({})", child),
        }
    }
}
