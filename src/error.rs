/// Error types for profile loading, pattern matching and statement validation
use thiserror::Error;

use crate::lookup::ConceptKind;
use crate::document::DocumentKind;

/// Main error type for profile and statement operations
#[derive(Error, Debug)]
pub enum XapiError {
    /// A name or IRI did not resolve to exactly one concept of the expected kind
    #[error("Lookup failure: no unique {kind} found for '{identifier}'")]
    LookupFailure {
        /// The name or IRI that was looked up
        identifier: String,
        /// The kind of concept expected
        kind: ConceptKind,
    },

    /// Appending a template would make the pattern occurrence inconsistent
    #[error("Sequence violation: template '{template}' cannot follow [{}] in pattern '{pattern}'", sequence.join(", "))]
    SequenceViolation {
        /// Pattern IRI of the occurrence
        pattern: String,
        /// Template IRI that was rejected
        template: String,
        /// Templates accepted so far
        sequence: Vec<String>,
    },

    /// A statement fails one or more template checks
    #[error("Template violation in '{template}': {}", violations.join("; "))]
    TemplateViolation {
        /// Template IRI the statement was checked against
        template: String,
        /// Human-readable descriptions of each failed check
        violations: Vec<String>,
    },

    /// Malformed profile input
    #[error("Structural error: {0}")]
    StructuralError(String),

    /// A field was set on a document kind that does not allow it
    #[error("Field '{field}' is not allowed on {kind}")]
    DisallowedField {
        /// Document kind being built
        kind: DocumentKind,
        /// Offending field
        field: &'static str,
    },

    /// A document is missing a field it requires
    #[error("{kind} is missing required field '{field}'")]
    MissingField {
        /// Document kind being built
        kind: DocumentKind,
        /// Missing field
        field: &'static str,
    },

    /// A path selector could not be parsed
    #[error("Invalid path selector: {0}")]
    InvalidPath(String),

    /// Configuration is invalid or incomplete
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// JSON parsing failed
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// YAML parsing failed
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl XapiError {
    /// Shorthand for a structural error
    pub fn structural(msg: impl Into<String>) -> Self {
        Self::StructuralError(msg.into())
    }

    /// Check whether this error rejects a sequence extension
    pub fn is_sequence_violation(&self) -> bool {
        matches!(self, Self::SequenceViolation { .. })
    }

    /// Check whether this error is a template violation
    pub fn is_template_violation(&self) -> bool {
        matches!(self, Self::TemplateViolation { .. })
    }
}

/// Result type alias for profile operations
pub type Result<T> = std::result::Result<T, XapiError>;

/// Error chain helper for adding context
pub trait ErrorContext<T> {
    /// Add context to an error
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context with format
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ErrorContext<T> for Result<T> {
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| add_context(e, msg.into()))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| add_context(e, f()))
    }
}

// Typed errors keep their variant; only the free-form ones absorb the context.
fn add_context(err: XapiError, msg: String) -> XapiError {
    match err {
        XapiError::StructuralError(inner) => XapiError::StructuralError(format!("{}: {}", msg, inner)),
        XapiError::Configuration(inner) => XapiError::Configuration(format!("{}: {}", msg, inner)),
        XapiError::InvalidPath(inner) => XapiError::InvalidPath(format!("{}: {}", msg, inner)),
        XapiError::JsonParse(e) => XapiError::StructuralError(format!("{}: {}", msg, e)),
        XapiError::YamlParse(e) => XapiError::StructuralError(format!("{}: {}", msg, e)),
        XapiError::Io(e) => XapiError::Configuration(format!("{}: {}", msg, e)),
        other => other,
    }
}
