//! Build xAPI statements and check them against xAPI profiles
//!
//! Statements are assembled with an immutable, chainable [`Builder`]. When
//! profiles are registered in a [`Registry`], builders can be pre-filled
//! from a statement template, checked against the template when built, and
//! sequenced through the profile's patterns.
//!
//! # Example
//!
//! ```
//! use xapi_profiles::{Builder, ContextRelation};
//!
//! # fn example() -> xapi_profiles::Result<()> {
//! let statement = Builder::statement()
//!     .actor(&Builder::agent().name("Ada")?.mbox("ada@example.com")?)?
//!     .verb("http://adlnet.gov/expapi/verbs/completed")?
//!     .object(&Builder::activity("https://example.com/courses/101")?.name("Course 101")?)?
//!     .context_activity(ContextRelation::Parent, &Builder::activity("https://example.com/programs/1")?)?
//!     .success(true)?
//!     .build()?;
//!
//! assert_eq!(statement["actor"]["mbox"], "mailto:ada@example.com");
//! assert_eq!(statement["object"]["definition"]["name"]["en"], "Course 101");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! # Patterns
//!
//! ```
//! use xapi_profiles::pattern::{can_append, Pattern};
//!
//! let lesson = Pattern::sequence([
//!     Pattern::leaf("launched"),
//!     Pattern::zero_or_more(Pattern::leaf("progressed")),
//!     Pattern::leaf("completed"),
//! ]);
//!
//! assert!(can_append(&["launched"], "progressed", &lesson));
//! assert!(!can_append(&["launched"], "launched", &lesson));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]

pub use config::ProfileConfig;
pub use document::{BuildOptions, Builder, ContextRelation, Document, DocumentKind};
pub use error::{ErrorContext, Result, XapiError};
pub use lookup::{Concept, ConceptKind, Lookup, Resolver};
pub use pattern::{MatchState, Outcome, Pattern, PatternOccurrence};
pub use registry::{Registry, RegistryMetadata};
pub use template::{Template, ValidationMode};

/// Error types
pub mod error;

/// Registry configuration
pub mod config;

/// Profile documents
pub mod profile;

/// Concept lookup
pub mod lookup;

/// Statement documents and builders
pub mod document;

/// Statement templates and validation
pub mod template;

/// Pattern grammar and matching
pub mod pattern;

/// Profile registry
pub mod registry;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber with default settings
///
/// The filter is read from `RUST_LOG`; `default_level` applies when it is unset.
pub fn init_tracing(default_level: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // a subscriber may already be installed by the host application or a test
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
