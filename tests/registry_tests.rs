//! Integration tests for loading profiles and following their patterns

use pretty_assertions::assert_eq;
use serde_json::json;
use std::path::PathBuf;
use xapi_profiles::{Builder, ConceptKind, ContextRelation, ProfileConfig, Registry, ValidationMode, XapiError};

const LESSON: &str = "https://example.com/patterns/lesson";
const LAUNCHED: &str = "https://example.com/templates/lesson-launched";
const PROGRESSED: &str = "https://example.com/templates/lesson-progressed";
const COMPLETED: &str = "https://example.com/templates/lesson-completed";

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/profiles")
}

fn registry() -> Registry {
    Registry::load(&ProfileConfig::new().add_profile_dir(fixtures())).unwrap()
}

fn learner() -> Builder {
    Builder::agent().name("Grace").unwrap().mbox("grace@example.com").unwrap()
}

fn lesson() -> Builder {
    Builder::activity("https://example.com/lessons/intro").unwrap().name("Introduction").unwrap()
}

#[test]
fn test_load_fixture_directory() {
    let registry = registry();
    let metadata = registry.metadata();

    assert_eq!(metadata.profiles, 2);
    assert_eq!(metadata.templates, 4);
    assert_eq!(metadata.patterns, 3);
    assert_eq!(metadata.failed_files, 0);

    let primary: Vec<&str> = registry.primary_patterns().map(|p| p.id.as_str()).collect();
    assert_eq!(primary, vec![LESSON, "https://example.com/patterns/quiz"]);
}

#[test]
fn test_full_lesson_walkthrough() {
    let registry = registry();
    let mut occurrence = registry.occurrence("lesson").unwrap();

    let launched = registry
        .statement("lesson launched", &mut occurrence)
        .unwrap()
        .actor(&learner())
        .unwrap()
        .object(&lesson())
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(launched["verb"]["id"], "http://adlnet.gov/expapi/verbs/launched");
    assert_eq!(launched["object"]["definition"]["type"], "http://adlnet.gov/expapi/activities/lesson");
    assert_eq!(
        launched["context"]["contextActivities"]["category"][0]["id"],
        "https://example.com/profiles/lesson/v2"
    );

    for progress in [0.25, 0.75] {
        registry
            .statement("lesson progressed", &mut occurrence)
            .unwrap()
            .actor(&learner())
            .unwrap()
            .object(&lesson())
            .unwrap()
            .result_extension("https://example.com/extensions/progress", json!(progress))
            .unwrap()
            .build()
            .unwrap();
    }
    assert!(!occurrence.is_complete());

    let completed = registry
        .statement(COMPLETED, &mut occurrence)
        .unwrap()
        .actor(&learner())
        .unwrap()
        .object(&lesson())
        .unwrap()
        .completion(true)
        .unwrap()
        .build()
        .unwrap();

    assert!(occurrence.is_complete());
    assert_eq!(occurrence.templates(), [LAUNCHED, PROGRESSED, PROGRESSED, COMPLETED]);
    assert_eq!(
        completed["context"]["registration"],
        json!(occurrence.registration().to_string())
    );
    assert_eq!(launched["context"]["registration"], completed["context"]["registration"]);
}

#[test]
fn test_out_of_order_template_is_sequence_violation() {
    let registry = registry();
    let mut occurrence = registry.occurrence(LESSON).unwrap();

    let err = registry.statement("lesson completed", &mut occurrence).unwrap_err();
    match err {
        XapiError::SequenceViolation { pattern, template, sequence } => {
            assert_eq!(pattern, LESSON);
            assert_eq!(template, COMPLETED);
            assert!(sequence.is_empty());
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(occurrence.can_append(LAUNCHED));
}

fn named_profile(verb: &str) -> xapi_profiles::profile::Profile {
    let profile = json!({
        "id": "https://example.com/profiles/named",
        "versions": [{"id": "https://example.com/profiles/named/v1"}],
        "concepts": [
            {"id": "https://example.com/verbs/opened", "type": "Verb", "prefLabel": {"en": "opened"}},
            {"id": "https://example.com/types/module", "type": "ActivityType", "prefLabel": {"en": "module"}}
        ],
        "templates": [{
            "id": "https://example.com/templates/module-opened",
            "prefLabel": {"en": "module opened"},
            "verb": verb,
            "objectActivityType": "module",
            "contextGroupingActivityType": ["lesson"]
        }],
        "patterns": [{
            "id": "https://example.com/patterns/module",
            "prefLabel": {"en": "module"},
            "oneOrMore": "https://example.com/templates/module-opened"
        }]
    });
    xapi_profiles::profile::profile_from_json(profile.to_string().as_bytes()).unwrap()
}

#[test]
fn test_determining_properties_by_name() {
    // "lesson" comes from the lesson profile loaded from the fixtures
    let mut registry = registry();
    registry.register(named_profile("opened")).unwrap();

    let template = registry.template("module opened").unwrap();
    assert_eq!(template.verb.as_deref(), Some("https://example.com/verbs/opened"));
    assert_eq!(template.object_activity_type.as_deref(), Some("https://example.com/types/module"));
    assert_eq!(
        template.context_activity_types.grouping,
        vec!["http://adlnet.gov/expapi/activities/lesson".to_string()]
    );

    let mut occurrence = registry.occurrence("https://example.com/patterns/module").unwrap();
    let grouping = Builder::activity("https://example.com/lessons/intro")
        .unwrap()
        .with_resolver(registry.resolver())
        .activity_type("lesson")
        .unwrap();
    let statement = registry
        .statement("module opened", &mut occurrence)
        .unwrap()
        .actor(&learner())
        .unwrap()
        .object(&Builder::activity("https://example.com/modules/1").unwrap())
        .unwrap()
        .context_activity(ContextRelation::Grouping, &grouping)
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(statement["verb"]["id"], "https://example.com/verbs/opened");
    assert!(occurrence.is_complete());
}

#[test]
fn test_unknown_determining_name_fails_registration() {
    let mut registry = registry();
    let before = registry.metadata();

    let err = registry.register(named_profile("no-such-verb")).unwrap_err();
    assert!(matches!(err, XapiError::LookupFailure { kind: ConceptKind::Verb, .. }), "{}", err);

    assert_eq!(registry.metadata(), before);
    assert!(registry.template("module opened").is_err());
    assert!(Builder::statement().with_resolver(registry.resolver()).verb("opened").is_err());
}

#[test]
fn test_rejected_statement_leaves_occurrence() {
    let registry = registry();
    let mut occurrence = registry.occurrence(LESSON).unwrap();
    registry.statement(LAUNCHED, &mut occurrence).unwrap();

    assert!(registry.statement("lesson launched", &mut occurrence).is_err());
    assert!(registry.statement("not a template", &mut occurrence).is_err());
    assert_eq!(occurrence.templates(), [LAUNCHED]);
}

#[test]
fn test_template_rules_checked_on_build() {
    let registry = registry();
    let builder = registry
        .template_statement("lesson completed")
        .unwrap()
        .actor(&learner())
        .unwrap()
        .object(&lesson())
        .unwrap();

    let err = builder.completion(false).unwrap().build().unwrap_err();
    assert!(err.is_template_violation());
    assert!(err.to_string().contains("$.result.completion"));

    // the rule is `included`, so leaving it out fails too
    assert!(builder.build().unwrap_err().is_template_violation());
}

#[test]
fn test_collect_mode_reports_every_violation() {
    let config = ProfileConfig::new()
        .add_profile_dir(fixtures())
        .validation(ValidationMode::Collect);
    let registry = Registry::load(&config).unwrap();
    let template = registry.template("question answered").unwrap();

    let statement = Builder::statement()
        .actor(&learner())
        .unwrap()
        .verb("http://adlnet.gov/expapi/verbs/attempted")
        .unwrap()
        .object(&Builder::activity("https://example.com/q/1").unwrap())
        .unwrap()
        .build()
        .unwrap();

    let violations = template.violations(&statement);
    assert_eq!(violations.len(), 5, "{:#?}", violations);
    assert!(violations[0].contains("verb"));
}

#[test]
fn test_parent_context_types_from_yaml_profile() {
    let registry = registry();
    let mut occurrence = registry.occurrence("quiz").unwrap();
    let assessment = Builder::activity("https://example.com/quizzes/1")
        .unwrap()
        .with_resolver(registry.resolver())
        .activity_type("assessment")
        .unwrap();

    let statement = registry
        .statement("question answered", &mut occurrence)
        .unwrap()
        .actor(&learner())
        .unwrap()
        .object(&Builder::activity("https://example.com/quizzes/1/q/1").unwrap())
        .unwrap()
        .context_activity(ContextRelation::Parent, &assessment)
        .unwrap()
        .success(true)
        .unwrap()
        .response("true")
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(
        statement["context"]["contextActivities"]["parent"][0]["definition"]["type"],
        "http://adlnet.gov/expapi/activities/assessment"
    );
    assert!(occurrence.is_complete());
}

#[test]
fn test_unparseable_file_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::copy(fixtures().join("quiz.yaml"), dir.path().join("quiz.yaml")).unwrap();
    std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not a profile").unwrap();

    let registry = Registry::load(&ProfileConfig::new().add_profile_dir(dir.path())).unwrap();
    assert_eq!(registry.metadata().profiles, 1);
    assert_eq!(registry.metadata().failed_files, 1);

    let err = Registry::load(
        &ProfileConfig::new()
            .add_profile_dir(dir.path())
            .fail_on_parse_error(true),
    )
    .unwrap_err();
    assert!(err.to_string().contains("broken.json"), "{}", err);
}

#[test]
fn test_duplicate_profile_across_files_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::copy(fixtures().join("lesson.json"), dir.path().join("a.json")).unwrap();
    std::fs::copy(fixtures().join("lesson.json"), dir.path().join("b.json")).unwrap();

    let mut registry = Registry::new();
    let loaded = registry.load_directory(dir.path(), false).unwrap();
    assert_eq!(loaded, 1);
    assert_eq!(registry.metadata().failed_files, 1);
    assert_eq!(registry.metadata().templates, 3);
}

#[test]
fn test_missing_directory_is_configuration_error() {
    let err = Registry::load(&ProfileConfig::new().add_profile_dir("/nonexistent/profiles")).unwrap_err();
    assert!(matches!(err, XapiError::Configuration(_)));
}

#[test]
fn test_pattern_referencing_absent_template() {
    let dir = tempfile::tempdir().unwrap();
    let profile = json!({
        "id": "https://example.com/profiles/partial",
        "versions": [{"id": "https://example.com/profiles/partial/v1"}],
        "templates": [{"id": "https://example.com/templates/present", "prefLabel": {"en": "present"}}],
        "patterns": [{
            "id": "https://example.com/patterns/partial",
            "prefLabel": {"en": "partial"},
            "sequence": ["https://example.com/templates/present", "https://example.com/templates/absent"]
        }]
    });
    std::fs::write(dir.path().join("partial.json"), profile.to_string()).unwrap();

    let registry = Registry::load(&ProfileConfig::new().add_profile_dir(dir.path())).unwrap();
    // loading succeeds; the pattern only fails when it is used
    assert_eq!(registry.metadata().patterns, 1);
    let err = registry.occurrence("partial").unwrap_err();
    assert!(matches!(err, XapiError::StructuralError(_)));
    assert!(err.to_string().contains("https://example.com/templates/absent"));
}

#[test]
fn test_config_file_drives_loading() {
    let dir = tempfile::tempdir().unwrap();
    let profiles = dir.path().join("profiles");
    std::fs::create_dir(&profiles).unwrap();
    std::fs::copy(fixtures().join("lesson.json"), profiles.join("lesson.json")).unwrap();
    std::fs::write(
        dir.path().join("xapi.yml"),
        "profile_dirs:\n  - profiles\nlanguage: en-US\ngenerate_timestamps: false\n",
    )
    .unwrap();

    let config = ProfileConfig::from_yaml_file(dir.path().join("xapi.yml")).unwrap();
    let registry = Registry::load(&config).unwrap();
    let statement = registry
        .template_statement("lesson launched")
        .unwrap()
        .actor(&learner())
        .unwrap()
        .object(&lesson())
        .unwrap()
        .build()
        .unwrap();

    assert!(statement.get("timestamp").is_none());
    assert!(statement["id"].is_string());
    assert_eq!(registry.options().language, "en-US");
}
