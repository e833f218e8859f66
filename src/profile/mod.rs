//! Profile documents
//!
//! Serde model of xAPI profiles as published in JSON-LD, also accepted as
//! YAML. Parsing runs structural checks on the single profile; checks that
//! span several profiles happen when the profile is registered.
//!
//! # Example
//!
//! ```
//! use xapi_profiles::profile::profile_from_json;
//!
//! # fn example() -> xapi_profiles::Result<()> {
//! let json = br#"{
//!     "id": "https://example.com/profiles/lesson",
//!     "prefLabel": {"en": "Lesson"},
//!     "versions": [{"id": "https://example.com/profiles/lesson/v1"}],
//!     "concepts": [{
//!         "id": "https://example.com/verbs/launched",
//!         "type": "Verb",
//!         "prefLabel": {"en": "launched"}
//!     }]
//! }"#;
//!
//! let profile = profile_from_json(json)?;
//! assert_eq!(profile.current_version().unwrap().id, "https://example.com/profiles/lesson/v1");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::error::{ErrorContext, Result, XapiError};
use crate::lookup::{Concept, ConceptKind};
use crate::template::Rule;

static IRI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:[^\s]+$").expect("IRI pattern is valid")
});

/// Language map, keyed by language tag
pub type LanguageMap = BTreeMap<String, String>;

/// A complete profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Profile IRI
    pub id: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    /// Document type, normally `Profile`
    pub kind: Option<String>,

    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    /// JSON-LD context
    pub context: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Profile format version this document conforms to
    pub conforms_to: Option<String>,

    #[serde(default)]
    /// Display names
    pub pref_label: LanguageMap,

    #[serde(default)]
    /// Descriptions
    pub definition: LanguageMap,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Author organization or person
    pub author: Option<Value>,

    /// Versions, current version first
    pub versions: Vec<ProfileVersion>,

    #[serde(default)]
    /// Vocabulary
    pub concepts: Vec<ConceptDefinition>,

    #[serde(default)]
    /// Statement templates
    pub templates: Vec<TemplateDefinition>,

    #[serde(default)]
    /// Patterns
    pub patterns: Vec<PatternDefinition>,
}

impl Profile {
    /// The current (first listed) version
    pub fn current_version(&self) -> Option<&ProfileVersion> {
        self.versions.first()
    }

    /// Label in `lang`, falling back to any label, then the IRI
    pub fn label(&self, lang: &str) -> &str {
        label_in(&self.pref_label, lang).unwrap_or(&self.id)
    }
}

/// One entry of a profile's version history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileVersion {
    /// Version IRI
    pub id: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    /// Versions this one replaces
    pub was_revision_of: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Publication time
    pub generated_at_time: Option<DateTime<Utc>>,
}

/// Vocabulary entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptDefinition {
    /// Concept IRI
    pub id: String,

    #[serde(rename = "type")]
    /// Concept type
    pub kind: ConceptKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Profile version that defines the concept
    pub in_scheme: Option<String>,

    #[serde(default)]
    /// Display names
    pub pref_label: LanguageMap,

    #[serde(default)]
    /// Descriptions
    pub definition: LanguageMap,

    #[serde(flatten)]
    /// Type specific properties kept as written
    pub extra: BTreeMap<String, Value>,
}

impl ConceptDefinition {
    /// Lookup record for this concept
    pub fn to_concept(&self) -> Concept {
        Concept {
            id: self.id.clone(),
            kind: self.kind,
            pref_label: self.pref_label.clone(),
            definition: self.definition.clone(),
            in_scheme: self.in_scheme.clone(),
        }
    }
}

/// Statement template as written in a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDefinition {
    /// Template IRI
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Profile version that defines the template
    pub in_scheme: Option<String>,

    #[serde(default)]
    /// Display names
    pub pref_label: LanguageMap,

    #[serde(default)]
    /// Descriptions
    pub definition: LanguageMap,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Determining verb
    pub verb: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Determining object activity type
    pub object_activity_type: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    /// Required `parent` context activity types
    pub context_parent_activity_type: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    /// Required `grouping` context activity types
    pub context_grouping_activity_type: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    /// Required `category` context activity types
    pub context_category_activity_type: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    /// Required `other` context activity types
    pub context_other_activity_type: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    /// Required attachment usage types
    pub attachment_usage_type: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    /// Templates the object StatementRef may point at
    pub object_statement_ref_template: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    /// Templates `context.statement` may point at
    pub context_statement_ref_template: Vec<String>,

    #[serde(default)]
    /// Rules in declaration order
    pub rules: Vec<Rule>,
}

/// Pattern as written in a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternDefinition {
    /// Pattern IRI
    pub id: String,

    #[serde(default)]
    /// Whether the pattern is meant to be followed on its own
    pub primary: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Profile version that defines the pattern
    pub in_scheme: Option<String>,

    #[serde(default)]
    /// Display names
    pub pref_label: LanguageMap,

    #[serde(default)]
    /// Descriptions
    pub definition: LanguageMap,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Children matched in order
    pub sequence: Option<Vec<Reference>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Children of which exactly one matches
    pub alternates: Option<Vec<Reference>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Child matched at most once
    pub optional: Option<Reference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Child matched at least once
    pub one_or_more: Option<Reference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Child matched any number of times
    pub zero_or_more: Option<Reference>,
}

/// Reference to a template or pattern, written as an IRI or `{"id": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reference {
    /// Bare IRI
    Iri(String),
    /// Object carrying the IRI
    Object {
        /// Referenced IRI
        id: String,
    },
}

impl Reference {
    /// Referenced IRI
    pub fn id(&self) -> &str {
        match self {
            Reference::Iri(id) | Reference::Object { id } => id,
        }
    }
}

/// The single operator of a pattern definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternOperator<'a> {
    /// `sequence`
    Sequence(&'a [Reference]),
    /// `alternates`
    Alternates(&'a [Reference]),
    /// `optional`
    Optional(&'a Reference),
    /// `oneOrMore`
    OneOrMore(&'a Reference),
    /// `zeroOrMore`
    ZeroOrMore(&'a Reference),
}

impl PatternDefinition {
    /// The pattern's operator
    ///
    /// Errors when the definition carries no operator or more than one.
    pub fn operator(&self) -> Result<PatternOperator<'_>> {
        let mut operators = Vec::with_capacity(1);
        if let Some(children) = &self.sequence {
            operators.push(PatternOperator::Sequence(children));
        }
        if let Some(children) = &self.alternates {
            operators.push(PatternOperator::Alternates(children));
        }
        if let Some(child) = &self.optional {
            operators.push(PatternOperator::Optional(child));
        }
        if let Some(child) = &self.one_or_more {
            operators.push(PatternOperator::OneOrMore(child));
        }
        if let Some(child) = &self.zero_or_more {
            operators.push(PatternOperator::ZeroOrMore(child));
        }

        match operators.as_slice() {
            [operator] => Ok(*operator),
            [] => Err(XapiError::structural(format!("pattern '{}' has no operator", self.id))),
            _ => Err(XapiError::structural(format!(
                "pattern '{}' has {} operators, expected exactly one",
                self.id,
                operators.len()
            ))),
        }
    }

    /// IRIs of every directly referenced template or pattern
    pub fn references(&self) -> Result<Vec<&str>> {
        Ok(match self.operator()? {
            PatternOperator::Sequence(children) | PatternOperator::Alternates(children) => {
                children.iter().map(Reference::id).collect()
            }
            PatternOperator::Optional(child)
            | PatternOperator::OneOrMore(child)
            | PatternOperator::ZeroOrMore(child) => vec![child.id()],
        })
    }
}

/// Check whether `s` looks like an absolute IRI
pub fn is_absolute_iri(s: &str) -> bool {
    IRI.is_match(s)
}

/// Parse a profile from JSON and check its structure
pub fn profile_from_json(data: &[u8]) -> Result<Profile> {
    let profile: Profile = serde_json::from_slice(data)?;
    validate_profile(&profile)?;
    Ok(profile)
}

/// Parse a profile from YAML and check its structure
pub fn profile_from_yaml(data: &[u8]) -> Result<Profile> {
    let profile: Profile = serde_yaml::from_slice(data)?;
    validate_profile(&profile)?;
    Ok(profile)
}

/// Read a profile file, choosing the format by extension
///
/// `.yml` and `.yaml` are read as YAML, anything else as JSON.
pub fn profile_from_path(path: &Path) -> Result<Profile> {
    let data = std::fs::read(path)
        .map_err(XapiError::from)
        .with_context(|| format!("reading {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml") | Some("yaml")
    );
    let parsed = if is_yaml {
        profile_from_yaml(&data)
    } else {
        profile_from_json(&data)
    };
    parsed.with_context(|| format!("profile {}", path.display()))
}

/// Structural checks on a single profile
pub fn validate_profile(profile: &Profile) -> Result<()> {
    if !is_absolute_iri(&profile.id) {
        return Err(XapiError::structural(format!(
            "profile id '{}' is not an absolute IRI",
            profile.id
        )));
    }

    if profile.versions.is_empty() {
        return Err(XapiError::structural(format!(
            "profile '{}' has no versions",
            profile.id
        )));
    }

    let mut seen = HashSet::new();
    let ids = profile
        .versions
        .iter()
        .map(|v| ("version", v.id.as_str()))
        .chain(profile.concepts.iter().map(|c| ("concept", c.id.as_str())))
        .chain(profile.templates.iter().map(|t| ("template", t.id.as_str())))
        .chain(profile.patterns.iter().map(|p| ("pattern", p.id.as_str())));
    for (what, id) in ids {
        if !is_absolute_iri(id) {
            return Err(XapiError::structural(format!(
                "{} id '{}' in profile '{}' is not an absolute IRI",
                what, id, profile.id
            )));
        }
        if !seen.insert(id) {
            return Err(XapiError::structural(format!(
                "duplicate id '{}' in profile '{}'",
                id, profile.id
            )));
        }
    }

    for pattern in &profile.patterns {
        match pattern.operator()? {
            PatternOperator::Sequence([]) | PatternOperator::Alternates([]) => {
                return Err(XapiError::structural(format!(
                    "pattern '{}' has an empty child list",
                    pattern.id
                )));
            }
            _ => {}
        }
    }

    Ok(())
}

pub(crate) fn label_in<'a>(labels: &'a LanguageMap, lang: &str) -> Option<&'a str> {
    labels
        .get(lang)
        .or_else(|| labels.values().next())
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> Value {
        json!({
            "id": "https://example.com/profiles/lesson",
            "type": "Profile",
            "prefLabel": {"en": "Lesson"},
            "versions": [
                {"id": "https://example.com/profiles/lesson/v2", "wasRevisionOf": ["https://example.com/profiles/lesson/v1"], "generatedAtTime": "2024-03-01T00:00:00Z"},
                {"id": "https://example.com/profiles/lesson/v1"}
            ],
            "concepts": [
                {"id": "https://example.com/verbs/launched", "type": "Verb", "prefLabel": {"en": "launched"}},
                {"id": "https://example.com/ext/score", "type": "ResultExtension", "prefLabel": {"en": "score"}, "recommendedVerbs": ["https://example.com/verbs/launched"]}
            ],
            "templates": [{
                "id": "https://example.com/templates/launched",
                "prefLabel": {"en": "launched"},
                "verb": "https://example.com/verbs/launched",
                "rules": [{"location": "$.actor", "presence": "included"}]
            }],
            "patterns": [{
                "id": "https://example.com/patterns/lesson",
                "primary": true,
                "sequence": ["https://example.com/templates/launched", {"id": "https://example.com/templates/launched"}]
            }]
        })
    }

    fn parse(value: Value) -> Result<Profile> {
        profile_from_json(&serde_json::to_vec(&value).unwrap())
    }

    #[test]
    fn test_parse_profile() {
        let profile = parse(base()).unwrap();
        assert_eq!(profile.label("fr"), "Lesson");
        assert_eq!(profile.current_version().unwrap().id, "https://example.com/profiles/lesson/v2");
        assert!(profile.versions[0].generated_at_time.is_some());
        assert_eq!(profile.concepts[1].kind, ConceptKind::ResultExtension);
        assert!(profile.concepts[1].extra.contains_key("recommendedVerbs"));
        assert_eq!(profile.templates[0].rules.len(), 1);

        let pattern = &profile.patterns[0];
        assert!(pattern.primary);
        assert_eq!(
            pattern.references().unwrap(),
            vec!["https://example.com/templates/launched", "https://example.com/templates/launched"]
        );
    }

    #[test]
    fn test_parse_yaml_profile() {
        let yaml = r#"
id: https://example.com/profiles/yaml
prefLabel:
  en: YAML profile
versions:
  - id: https://example.com/profiles/yaml/v1
patterns:
  - id: https://example.com/patterns/p
    zeroOrMore: https://example.com/templates/t
"#;
        let profile = profile_from_yaml(yaml.as_bytes()).unwrap();
        assert!(matches!(
            profile.patterns[0].operator().unwrap(),
            PatternOperator::ZeroOrMore(Reference::Iri(_))
        ));
    }

    #[test]
    fn test_concept_to_lookup_record() {
        let profile = parse(base()).unwrap();
        let concept = profile.concepts[0].to_concept();
        assert_eq!(concept.kind, ConceptKind::Verb);
        assert!(concept.is_named("launched"));
    }

    #[test]
    fn test_rejects_missing_versions() {
        let mut value = base();
        value["versions"] = json!([]);
        let err = parse(value).unwrap_err();
        assert!(err.to_string().contains("has no versions"));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let mut value = base();
        value["patterns"][0]["id"] = json!("https://example.com/templates/launched");
        let err = parse(value).unwrap_err();
        assert!(err.to_string().contains("duplicate id"));
    }

    #[test]
    fn test_rejects_relative_ids() {
        let mut value = base();
        value["id"] = json!("lesson");
        assert!(matches!(parse(value), Err(XapiError::StructuralError(_))));
    }

    #[test]
    fn test_pattern_operator_count() {
        let mut value = base();
        value["patterns"][0]["optional"] = json!("https://example.com/templates/launched");
        let err = parse(value).unwrap_err();
        assert!(err.to_string().contains("expected exactly one"));

        let mut value = base();
        value["patterns"][0] = json!({"id": "https://example.com/patterns/empty"});
        assert!(parse(value).unwrap_err().to_string().contains("no operator"));

        let mut value = base();
        value["patterns"][0]["sequence"] = json!([]);
        assert!(parse(value).unwrap_err().to_string().contains("empty child list"));
    }

    #[test]
    fn test_iri_check() {
        assert!(is_absolute_iri("https://example.com/a"));
        assert!(is_absolute_iri("urn:uuid:1234"));
        assert!(!is_absolute_iri("launched"));
        assert!(!is_absolute_iri("http://example.com/has space"));
    }
}
