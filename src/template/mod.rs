//! Statement templates and their rules
//!
//! A [`Template`] is compiled from a profile's template definition: rule
//! locations and selectors are parsed once, determining properties are kept
//! as IRIs. Validation lives in [`validator`].
//!
//! # Example
//!
//! ```
//! use xapi_profiles::template::{Rule, Presence, Template};
//! use serde_json::json;
//!
//! let template = Template::builder("https://example.com/templates/scored")
//!     .verb("https://example.com/verbs/scored")
//!     .rule(Rule::new("$.result.score.raw").presence(Presence::Included))
//!     .build()
//!     .unwrap();
//!
//! let statement = json!({
//!     "verb": {"id": "https://example.com/verbs/scored"},
//!     "result": {"score": {"raw": 4}}
//! });
//! assert!(template.validate(&statement).is_ok());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::document::ContextRelation;
use crate::error::{ErrorContext, Result};
use crate::lookup::{ConceptKind, Resolver};
use crate::profile::TemplateDefinition;

pub mod selector;
pub mod validator;

pub use selector::PathSelector;
pub use validator::{check_rule, validate};

/// Presence requirement of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    /// Location must match at least one value
    Included,
    /// Location must match nothing
    Excluded,
    /// Value checks apply only when something matched
    Recommended,
}

/// How violations are reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Stop at the first failed check
    #[default]
    FailFast,
    /// Run every check and report all failures together
    Collect,
}

/// Rule as written in a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// `|`-separated JSONPath locations
    pub location: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// `|`-separated JSONPath evaluated against each located value
    pub selector: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Presence requirement
    pub presence: Option<Presence>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// At least one matched value must be among these
    pub any: Option<Vec<Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Every matched value must be among these
    pub all: Option<Vec<Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// No matched value may be among these
    pub none: Option<Vec<Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Free-text explanation from the profile author
    pub scope_note: Option<BTreeMap<String, String>>,
}

impl Rule {
    /// Rule with only a location
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            selector: None,
            presence: None,
            any: None,
            all: None,
            none: None,
            scope_note: None,
        }
    }

    /// Set the selector
    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    /// Set the presence requirement
    pub fn presence(mut self, presence: Presence) -> Self {
        self.presence = Some(presence);
        self
    }

    /// Set the `any` values
    pub fn any(mut self, values: Vec<Value>) -> Self {
        self.any = Some(values);
        self
    }

    /// Set the `all` values
    pub fn all(mut self, values: Vec<Value>) -> Self {
        self.all = Some(values);
        self
    }

    /// Set the `none` values
    pub fn none(mut self, values: Vec<Value>) -> Self {
        self.none = Some(values);
        self
    }
}

/// A rule with its paths parsed
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateRule {
    /// The rule as declared
    pub rule: Rule,
    /// Parsed location
    pub location: PathSelector,
    /// Parsed selector
    pub selector: Option<PathSelector>,
}

impl TemplateRule {
    /// Parse the rule's paths
    pub fn compile(rule: Rule) -> Result<Self> {
        let location = PathSelector::parse(&rule.location)?;
        let selector = rule.selector.as_deref().map(PathSelector::parse).transpose()?;
        Ok(Self {
            rule,
            location,
            selector,
        })
    }
}

/// Required context activity types, per relation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextActivityTypes {
    /// Types required under `parent`
    pub parent: Vec<String>,
    /// Types required under `grouping`
    pub grouping: Vec<String>,
    /// Types required under `category`
    pub category: Vec<String>,
    /// Types required under `other`
    pub other: Vec<String>,
}

impl ContextActivityTypes {
    /// Types required for `relation`
    pub fn required(&self, relation: ContextRelation) -> &[String] {
        match relation {
            ContextRelation::Parent => &self.parent,
            ContextRelation::Grouping => &self.grouping,
            ContextRelation::Category => &self.category,
            ContextRelation::Other => &self.other,
        }
    }
}

/// Compiled statement template
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    /// Template IRI
    pub id: String,
    /// Display names keyed by language tag
    pub pref_label: BTreeMap<String, String>,
    /// Profile the template was registered from
    pub profile_id: Option<String>,
    /// Current version of that profile
    pub profile_version: Option<String>,
    /// Required verb IRI
    pub verb: Option<String>,
    /// Required object activity type IRI
    pub object_activity_type: Option<String>,
    /// Required context activity types
    pub context_activity_types: ContextActivityTypes,
    /// Required attachment usage types
    pub attachment_usage_types: Vec<String>,
    /// The object must be a StatementRef
    pub object_statement_ref: bool,
    /// `context.statement` must be a StatementRef
    pub context_statement_ref: bool,
    /// Rules in declaration order
    pub rules: Vec<TemplateRule>,
}

impl Template {
    /// Start building a template by hand
    pub fn builder(id: impl Into<String>) -> TemplateBuilder {
        TemplateBuilder::new(id)
    }

    /// Compile a profile's template definition
    ///
    /// A non-empty `objectStatementRefTemplate` or
    /// `contextStatementRefTemplate` list makes the matching StatementRef
    /// required.
    pub fn from_definition(
        definition: &TemplateDefinition,
        profile_id: &str,
        profile_version: Option<&str>,
    ) -> Result<Self> {
        let mut builder = Template::builder(definition.id.clone())
            .profile(profile_id, profile_version.map(str::to_string))
            .context_activity_types(ContextRelation::Parent, definition.context_parent_activity_type.clone())
            .context_activity_types(
                ContextRelation::Grouping,
                definition.context_grouping_activity_type.clone(),
            )
            .context_activity_types(
                ContextRelation::Category,
                definition.context_category_activity_type.clone(),
            )
            .context_activity_types(ContextRelation::Other, definition.context_other_activity_type.clone())
            .attachment_usage_types(definition.attachment_usage_type.clone())
            .object_statement_ref(!definition.object_statement_ref_template.is_empty())
            .context_statement_ref(!definition.context_statement_ref_template.is_empty());

        for (lang, label) in &definition.pref_label {
            builder = builder.label(lang.clone(), label.clone());
        }
        if let Some(verb) = &definition.verb {
            builder = builder.verb(verb.clone());
        }
        if let Some(activity_type) = &definition.object_activity_type {
            builder = builder.object_activity_type(activity_type.clone());
        }
        for rule in &definition.rules {
            builder = builder.rule(rule.clone());
        }
        builder.build()
    }

    /// Replace every determining property written as a name with its IRI
    ///
    /// A name `resolver` cannot resolve is a [`XapiError::LookupFailure`](crate::XapiError::LookupFailure).
    pub fn resolve_names(mut self, resolver: &Resolver) -> Result<Self> {
        let resolve = |name: &str, kind: ConceptKind| resolver.resolve(name, kind).map(|concept| concept.id);

        if let Some(verb) = self.verb.take() {
            self.verb = Some(resolve(&verb, ConceptKind::Verb)?);
        }
        if let Some(activity_type) = self.object_activity_type.take() {
            self.object_activity_type = Some(resolve(&activity_type, ConceptKind::ActivityType)?);
        }

        let types = &mut self.context_activity_types;
        for required in [&mut types.parent, &mut types.grouping, &mut types.category, &mut types.other] {
            *required = required
                .iter()
                .map(|name| resolve(name, ConceptKind::ActivityType))
                .collect::<Result<_>>()?;
        }
        self.attachment_usage_types = self
            .attachment_usage_types
            .iter()
            .map(|name| resolve(name, ConceptKind::AttachmentUsageType))
            .collect::<Result<_>>()?;

        Ok(self)
    }

    /// Check `statement`, stopping at the first violation
    pub fn validate(&self, statement: &Value) -> Result<()> {
        validate(statement, self)
    }

    /// Check `statement` in the given mode
    pub fn validate_with(&self, statement: &Value, mode: ValidationMode) -> Result<()> {
        validator::validate_with(statement, self, mode)
    }

    /// Every violation `statement` commits against this template
    pub fn violations(&self, statement: &Value) -> Vec<String> {
        validator::violations(statement, self, ValidationMode::Collect)
    }

    /// Label in `lang`, falling back to any label, then the IRI
    pub fn label(&self, lang: &str) -> &str {
        self.pref_label
            .get(lang)
            .or_else(|| self.pref_label.values().next())
            .map(String::as_str)
            .unwrap_or(&self.id)
    }
}

/// Fluent constructor for [`Template`]
#[derive(Debug, Clone)]
pub struct TemplateBuilder {
    template: Template,
    rules: Vec<Rule>,
}

impl TemplateBuilder {
    /// Create a builder for the template with IRI `id`
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            template: Template {
                id: id.into(),
                pref_label: BTreeMap::new(),
                profile_id: None,
                profile_version: None,
                verb: None,
                object_activity_type: None,
                context_activity_types: ContextActivityTypes::default(),
                attachment_usage_types: Vec::new(),
                object_statement_ref: false,
                context_statement_ref: false,
                rules: Vec::new(),
            },
            rules: Vec::new(),
        }
    }

    /// Add a display name
    pub fn label(mut self, lang: impl Into<String>, label: impl Into<String>) -> Self {
        self.template.pref_label.insert(lang.into(), label.into());
        self
    }

    /// Record the owning profile and its current version
    pub fn profile(mut self, profile_id: impl Into<String>, version: Option<String>) -> Self {
        self.template.profile_id = Some(profile_id.into());
        self.template.profile_version = version;
        self
    }

    /// Require a verb
    pub fn verb(mut self, verb: impl Into<String>) -> Self {
        self.template.verb = Some(verb.into());
        self
    }

    /// Require an object activity type
    pub fn object_activity_type(mut self, activity_type: impl Into<String>) -> Self {
        self.template.object_activity_type = Some(activity_type.into());
        self
    }

    /// Require context activity types under `relation`
    pub fn context_activity_types(mut self, relation: ContextRelation, types: Vec<String>) -> Self {
        let types_ref = &mut self.template.context_activity_types;
        match relation {
            ContextRelation::Parent => types_ref.parent = types,
            ContextRelation::Grouping => types_ref.grouping = types,
            ContextRelation::Category => types_ref.category = types,
            ContextRelation::Other => types_ref.other = types,
        }
        self
    }

    /// Require attachment usage types
    pub fn attachment_usage_types(mut self, types: Vec<String>) -> Self {
        self.template.attachment_usage_types = types;
        self
    }

    /// Require the object to be a StatementRef
    pub fn object_statement_ref(mut self, required: bool) -> Self {
        self.template.object_statement_ref = required;
        self
    }

    /// Require `context.statement` to be a StatementRef
    pub fn context_statement_ref(mut self, required: bool) -> Self {
        self.template.context_statement_ref = required;
        self
    }

    /// Append a rule
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Parse every rule and produce the template
    pub fn build(self) -> Result<Template> {
        let Self { mut template, rules } = self;
        let id = template.id.clone();
        template.rules = rules
            .into_iter()
            .enumerate()
            .map(|(index, rule)| {
                TemplateRule::compile(rule).with_context(|| format!("rule {} of template '{}'", index, id))
            })
            .collect::<Result<_>>()?;
        Ok(template)
    }
}
