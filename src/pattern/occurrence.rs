//! Running instances of a pattern

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::{matcher, Pattern};
use crate::error::{Result, XapiError};

/// Templates recorded so far for one pattern occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchState {
    /// IRI of the pattern being followed
    pub pattern_id: String,
    /// Current version of the profile defining the pattern
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_version: Option<String>,
    /// Accepted template ids, in order
    #[serde(default)]
    pub templates: Vec<String>,
}

impl MatchState {
    /// Empty state for `pattern_id`
    pub fn new(pattern_id: impl Into<String>, profile_version: Option<String>) -> Self {
        Self {
            pattern_id: pattern_id.into(),
            profile_version,
            templates: Vec::new(),
        }
    }
}

/// One run through a pattern, identified by a registration UUID
///
/// Owns its [`MatchState`]. Appends that the grammar rejects leave the
/// state exactly as it was.
#[derive(Debug, Clone)]
pub struct PatternOccurrence {
    registration: Uuid,
    grammar: Arc<Pattern>,
    state: MatchState,
}

impl PatternOccurrence {
    /// Start a fresh occurrence with a random registration
    pub fn new(grammar: Arc<Pattern>, state: MatchState) -> Self {
        Self::with_registration(Uuid::new_v4(), grammar, state)
    }

    /// Resume an occurrence under a known registration
    pub fn with_registration(registration: Uuid, grammar: Arc<Pattern>, state: MatchState) -> Self {
        Self {
            registration,
            grammar,
            state,
        }
    }

    /// Registration UUID placed in `context.registration`
    pub fn registration(&self) -> Uuid {
        self.registration
    }

    /// Pattern IRI
    pub fn pattern_id(&self) -> &str {
        &self.state.pattern_id
    }

    /// Compiled grammar
    pub fn grammar(&self) -> &Pattern {
        &self.grammar
    }

    /// Recorded state
    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Accepted template ids so far
    pub fn templates(&self) -> &[String] {
        &self.state.templates
    }

    /// Whether `template_id` may be the next statement
    pub fn can_append(&self, template_id: &str) -> bool {
        matcher::can_append(&self.state.templates, template_id, &self.grammar)
    }

    /// Record `template_id` as the next statement
    ///
    /// Fails with [`XapiError::SequenceViolation`] when the grammar does not
    /// allow it; the recorded sequence is then unchanged.
    pub fn append(&mut self, template_id: &str) -> Result<()> {
        if !self.can_append(template_id) {
            tracing::debug!(
                pattern = %self.state.pattern_id,
                template = template_id,
                "append rejected"
            );
            return Err(XapiError::SequenceViolation {
                pattern: self.state.pattern_id.clone(),
                template: template_id.to_string(),
                sequence: self.state.templates.clone(),
            });
        }

        self.state.templates.push(template_id.to_string());
        tracing::trace!(
            pattern = %self.state.pattern_id,
            template = template_id,
            length = self.state.templates.len(),
            "append accepted"
        );
        Ok(())
    }

    /// Whether the recorded sequence fully satisfies the grammar
    pub fn is_complete(&self) -> bool {
        matcher::matches(&self.state.templates, &self.grammar).is_complete()
    }

    /// Give up ownership of the state
    pub fn into_state(self) -> MatchState {
        self.state
    }
}
