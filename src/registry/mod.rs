//! Pattern and template registry
//!
//! The [`Registry`] owns every registered profile. It resolves templates and
//! patterns by IRI or label, compiles pattern grammars on first use and hands
//! out statement builders pre-filled from a template.
//!
//! # Example
//!
//! ```
//! use xapi_profiles::{profile::profile_from_json, Registry};
//!
//! # fn example() -> xapi_profiles::Result<()> {
//! let profile = profile_from_json(br#"{
//!     "id": "https://example.com/profiles/lesson",
//!     "versions": [{"id": "https://example.com/profiles/lesson/v1"}],
//!     "concepts": [{"id": "https://example.com/verbs/launched", "type": "Verb", "prefLabel": {"en": "launched"}}],
//!     "templates": [{"id": "https://example.com/templates/launched", "prefLabel": {"en": "launched"},
//!                    "verb": "https://example.com/verbs/launched"}],
//!     "patterns": [{"id": "https://example.com/patterns/lesson", "prefLabel": {"en": "lesson"},
//!                   "primary": true, "oneOrMore": "https://example.com/templates/launched"}]
//! }"#)?;
//!
//! let mut registry = Registry::new();
//! registry.register(profile)?;
//!
//! let mut occurrence = registry.occurrence("lesson")?;
//! let statement = registry
//!     .statement("launched", &mut occurrence)?
//!     .actor(&xapi_profiles::Builder::agent().mbox("learner@example.com")?)?
//!     .object(&xapi_profiles::Builder::activity("https://example.com/lessons/1")?)?
//!     .build()?;
//!
//! assert_eq!(statement["verb"]["display"]["en"], "launched");
//! assert!(occurrence.is_complete());
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::ProfileConfig;
use crate::document::{BuildOptions, Builder, ContextRelation};
use crate::error::{ErrorContext, Result, XapiError};
use crate::lookup::{Concept, ConceptKind, Lookup, ProfileLookup, Resolver};
use crate::pattern::{MatchState, Pattern, PatternOccurrence};
use crate::profile::{profile_from_path, validate_profile, PatternDefinition, Profile};
use crate::template::Template;

mod compile;

use compile::GrammarCompiler;

/// Activity type of the category context activity naming a profile version
pub const PROFILE_ACTIVITY_TYPE: &str = "http://adlnet.gov/expapi/activities/profile";

const PROFILE_EXTENSIONS: [&str; 3] = ["json", "yml", "yaml"];

/// A registered pattern with the profile it came from
#[derive(Debug, Clone)]
pub(crate) struct PatternEntry {
    pub(crate) definition: PatternDefinition,
    pub(crate) profile_id: String,
    pub(crate) profile_version: Option<String>,
}

/// Counts describing what the registry holds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryMetadata {
    /// Registered profiles
    pub profiles: usize,
    /// Concepts across all profiles
    pub concepts: usize,
    /// Statement templates
    pub templates: usize,
    /// Patterns
    pub patterns: usize,
    /// Profile files skipped while loading
    pub failed_files: usize,
}

/// Registered profiles, templates and patterns
#[derive(Debug)]
pub struct Registry {
    profiles: Vec<Arc<Profile>>,
    templates: HashMap<String, Arc<Template>>,
    template_order: Vec<String>,
    patterns: HashMap<String, PatternEntry>,
    pattern_order: Vec<String>,
    concepts: Arc<ProfileLookup>,
    lookups: Vec<Arc<dyn Lookup>>,
    resolver: Arc<Resolver>,
    grammars: RwLock<HashMap<String, Arc<Pattern>>>,
    options: BuildOptions,
    failed_files: usize,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        let mut registry = Self {
            profiles: Vec::new(),
            templates: HashMap::new(),
            template_order: Vec::new(),
            patterns: HashMap::new(),
            pattern_order: Vec::new(),
            concepts: Arc::new(ProfileLookup::new()),
            lookups: Vec::new(),
            resolver: Arc::new(Resolver::default()),
            grammars: RwLock::new(HashMap::new()),
            options: BuildOptions::default(),
            failed_files: 0,
        };
        registry.rebuild_resolver();
        registry
    }

    /// Use `options` for every builder handed out
    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Consult `lookups`, in order, after the registered profiles' concepts
    ///
    /// The IRI passthrough lookup always comes last.
    pub fn with_lookups(mut self, lookups: Vec<Arc<dyn Lookup>>) -> Self {
        self.lookups = lookups;
        self.rebuild_resolver();
        self
    }

    /// Build a registry from every profile found under the configured directories
    pub fn load(config: &ProfileConfig) -> Result<Self> {
        config.validate()?;
        let mut registry = Self::new().with_options(config.build_options());
        for dir in &config.profile_dirs {
            registry.load_directory(dir, config.fail_on_parse_error)?;
        }

        let metadata = registry.metadata();
        info!(
            profiles = metadata.profiles,
            templates = metadata.templates,
            patterns = metadata.patterns,
            failed = metadata.failed_files,
            "loaded profile registry"
        );
        Ok(registry)
    }

    /// Register every profile file under `dir`, recursively
    ///
    /// Files that cannot be read, parsed or registered are skipped with a
    /// warning unless `fail_on_error` is set. Returns the number registered.
    pub fn load_directory(&mut self, dir: impl AsRef<Path>, fail_on_error: bool) -> Result<usize> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(XapiError::Configuration(format!(
                "profile directory not found: {}",
                dir.display()
            )));
        }

        let mut loaded = 0;
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    if fail_on_error {
                        return Err(XapiError::Configuration(e.to_string()));
                    }
                    warn!(dir = %dir.display(), error = %e, "cannot walk profile directory");
                    self.failed_files += 1;
                    continue;
                }
            };

            let path = entry.path();
            let is_profile = entry.file_type().is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map_or(false, |e| PROFILE_EXTENSIONS.contains(&e));
            if !is_profile {
                continue;
            }

            debug!(path = %path.display(), "loading profile");
            let registered = profile_from_path(path).and_then(|profile| {
                self.register(profile)
                    .with_context(|| format!("registering {}", path.display()))
            });
            match registered {
                Ok(()) => loaded += 1,
                Err(e) => {
                    if fail_on_error {
                        return Err(e);
                    }
                    warn!(path = %path.display(), error = %e, "skipping profile");
                    self.failed_files += 1;
                }
            }
        }
        Ok(loaded)
    }

    /// Add a profile
    ///
    /// Checks the profile's structure and that none of its ids is already
    /// registered, then compiles its templates. Determining properties
    /// written as names are resolved to IRIs against this profile's concepts,
    /// the profiles registered before it and the extra lookups. Nothing is
    /// registered when any check fails.
    pub fn register(&mut self, profile: Profile) -> Result<()> {
        validate_profile(&profile)?;

        if self.profiles.iter().any(|p| p.id == profile.id) {
            return Err(XapiError::structural(format!(
                "profile '{}' is already registered",
                profile.id
            )));
        }
        let mut known: HashSet<&str> = self.known_ids().collect();
        for id in profile_ids(&profile) {
            if !known.insert(id) {
                return Err(XapiError::structural(format!(
                    "id '{}' of profile '{}' is already registered",
                    id, profile.id
                )));
            }
        }

        let version = profile.current_version().map(|v| v.id.clone());

        // names in determining properties may refer to this profile's own concepts
        let mut staged = (*self.concepts).clone();
        staged.extend(profile.concepts.iter().map(|c| c.to_concept()));
        staged.extend(profile.templates.iter().map(|t| {
            named(&t.id, ConceptKind::Template, &t.pref_label, version.as_deref())
        }));
        staged.extend(profile.patterns.iter().map(|p| {
            named(&p.id, ConceptKind::Pattern, &p.pref_label, version.as_deref())
        }));
        let staged = Arc::new(staged);
        let resolver = self.resolver_over(&staged);

        let templates = profile
            .templates
            .iter()
            .map(|definition| {
                Template::from_definition(definition, &profile.id, version.as_deref())
                    .and_then(|template| template.resolve_names(&resolver))
                    .map(Arc::new)
            })
            .collect::<Result<Vec<_>>>()?;

        self.concepts = staged;
        for template in templates {
            self.template_order.push(template.id.clone());
            self.templates.insert(template.id.clone(), template);
        }
        for definition in &profile.patterns {
            self.pattern_order.push(definition.id.clone());
            self.patterns.insert(
                definition.id.clone(),
                PatternEntry {
                    definition: definition.clone(),
                    profile_id: profile.id.clone(),
                    profile_version: version.clone(),
                },
            );
        }
        self.rebuild_resolver();

        debug!(
            profile = %profile.id,
            version = version.as_deref().unwrap_or_default(),
            concepts = profile.concepts.len(),
            templates = profile.templates.len(),
            patterns = profile.patterns.len(),
            "registered profile"
        );
        self.profiles.push(Arc::new(profile));
        Ok(())
    }

    /// Start a new occurrence of the pattern named by `pattern`
    ///
    /// The pattern's grammar is compiled on first use; references to unknown
    /// templates or patterns and reference cycles are structural errors.
    pub fn occurrence(&self, pattern: &str) -> Result<PatternOccurrence> {
        let entry = self.pattern_entry(pattern)?;
        let grammar = self.grammar(&entry.definition.id)?;
        Ok(PatternOccurrence::new(
            grammar,
            MatchState::new(entry.definition.id.clone(), entry.profile_version.clone()),
        ))
    }

    /// Compiled grammar of the pattern with IRI `pattern_id`
    pub fn grammar(&self, pattern_id: &str) -> Result<Arc<Pattern>> {
        if let Some(grammar) = self.grammars.read().get(pattern_id) {
            return Ok(Arc::clone(grammar));
        }

        let mut cache = self.grammars.write();
        let mut compiler = GrammarCompiler::new(&self.patterns, &self.templates).with_cache(&cache);
        let grammar = compiler.compile(pattern_id)?;
        *cache = compiler.into_compiled();
        Ok(grammar)
    }

    /// Builder for the next statement of `occurrence`, pre-filled from `template`
    ///
    /// Fails with [`XapiError::SequenceViolation`] when the pattern does not
    /// allow the template next. The occurrence only changes when a builder
    /// is returned.
    pub fn statement(&self, template: &str, occurrence: &mut PatternOccurrence) -> Result<Builder> {
        let template = self.template(template)?;
        let builder = self.prefill(&template, Some(occurrence.registration()))?;
        occurrence.append(&template.id)?;
        Ok(builder)
    }

    /// Builder pre-filled from `template`, outside of any pattern
    pub fn template_statement(&self, template: &str) -> Result<Builder> {
        let template = self.template(template)?;
        self.prefill(&template, None)
    }

    /// Template named by `template` (IRI or label)
    pub fn template(&self, template: &str) -> Result<Arc<Template>> {
        let concept = self.resolver.resolve(template, ConceptKind::Template)?;
        self.templates
            .get(&concept.id)
            .cloned()
            .ok_or_else(|| XapiError::LookupFailure {
                identifier: template.to_string(),
                kind: ConceptKind::Template,
            })
    }

    /// Pattern definition named by `pattern` (IRI or label)
    pub fn pattern(&self, pattern: &str) -> Result<&PatternDefinition> {
        self.pattern_entry(pattern).map(|entry| &entry.definition)
    }

    /// Templates in registration order
    pub fn templates(&self) -> impl Iterator<Item = &Arc<Template>> + '_ {
        self.template_order.iter().filter_map(move |id| self.templates.get(id))
    }

    /// Patterns in registration order
    pub fn patterns(&self) -> impl Iterator<Item = &PatternDefinition> + '_ {
        self.pattern_order
            .iter()
            .filter_map(move |id| self.patterns.get(id))
            .map(|entry| &entry.definition)
    }

    /// Patterns flagged as primary
    pub fn primary_patterns(&self) -> impl Iterator<Item = &PatternDefinition> + '_ {
        self.patterns().filter(|p| p.primary)
    }

    /// Registered profiles in registration order
    pub fn profiles(&self) -> &[Arc<Profile>] {
        &self.profiles
    }

    /// Resolver shared with every builder handed out
    pub fn resolver(&self) -> Arc<Resolver> {
        Arc::clone(&self.resolver)
    }

    /// Options applied to every builder handed out
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Summary counts
    pub fn metadata(&self) -> RegistryMetadata {
        RegistryMetadata {
            profiles: self.profiles.len(),
            concepts: self.profiles.iter().map(|p| p.concepts.len()).sum(),
            templates: self.templates.len(),
            patterns: self.patterns.len(),
            failed_files: self.failed_files,
        }
    }

    fn pattern_entry(&self, pattern: &str) -> Result<&PatternEntry> {
        let concept = self.resolver.resolve(pattern, ConceptKind::Pattern)?;
        self.patterns
            .get(&concept.id)
            .ok_or_else(|| XapiError::LookupFailure {
                identifier: pattern.to_string(),
                kind: ConceptKind::Pattern,
            })
    }

    fn prefill(&self, template: &Arc<Template>, registration: Option<Uuid>) -> Result<Builder> {
        let mut builder = Builder::statement()
            .with_resolver(self.resolver())
            .with_options(self.options.clone())
            .with_template(Arc::clone(template));

        if let Some(verb) = &template.verb {
            builder = builder.verb(verb)?;
        }
        if let Some(activity_type) = &template.object_activity_type {
            builder = builder.object_activity_type(activity_type)?;
        }
        if let Some(registration) = registration {
            builder = builder.registration(registration)?;
        }
        if let Some(version) = &template.profile_version {
            let profile = Builder::activity(version.clone())?
                .with_resolver(self.resolver())
                .activity_type(PROFILE_ACTIVITY_TYPE)?;
            builder = builder.context_activity(ContextRelation::Category, &profile)?;
        }
        Ok(builder)
    }

    fn known_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.profiles.iter().flat_map(|p| profile_ids(p))
    }

    fn rebuild_resolver(&mut self) {
        self.resolver = Arc::new(self.resolver_over(&self.concepts));
    }

    fn resolver_over(&self, concepts: &Arc<ProfileLookup>) -> Resolver {
        let mut lookups: Vec<Arc<dyn Lookup>> = Vec::with_capacity(self.lookups.len() + 1);
        lookups.push(Arc::clone(concepts) as Arc<dyn Lookup>);
        lookups.extend(self.lookups.iter().cloned());
        Resolver::with_defaults(lookups)
    }
}

// Every id a profile introduces, including its own.
fn profile_ids(profile: &Profile) -> impl Iterator<Item = &str> + '_ {
    std::iter::once(profile.id.as_str())
        .chain(profile.versions.iter().map(|v| v.id.as_str()))
        .chain(profile.concepts.iter().map(|c| c.id.as_str()))
        .chain(profile.templates.iter().map(|t| t.id.as_str()))
        .chain(profile.patterns.iter().map(|p| p.id.as_str()))
}

fn named(
    id: &str,
    kind: ConceptKind,
    labels: &std::collections::BTreeMap<String, String>,
    scheme: Option<&str>,
) -> Concept {
    Concept {
        id: id.to_string(),
        kind,
        pref_label: labels.clone(),
        definition: Default::default(),
        in_scheme: scheme.map(str::to_string),
    }
}
