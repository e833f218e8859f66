//! Integration tests for pattern matching and occurrences

use proptest::prelude::*;
use std::sync::Arc;
use xapi_profiles::pattern::{can_append, matches, MatchState, Outcome, Pattern, PatternOccurrence};

fn leaf(id: &str) -> Pattern {
    Pattern::leaf(id)
}

// launched, then any number of progressed, then completed or abandoned
fn lesson() -> Pattern {
    Pattern::sequence([
        leaf("launched"),
        Pattern::zero_or_more(leaf("progressed")),
        Pattern::alternates([leaf("completed"), leaf("abandoned")]),
    ])
}

fn occurrence(grammar: Pattern) -> PatternOccurrence {
    PatternOccurrence::new(Arc::new(grammar), MatchState::new("https://example.com/p/lesson", None))
}

#[test]
fn test_empty_sequence_outcomes() {
    let empty: [&str; 0] = [];
    assert_eq!(matches(&empty, &leaf("a")).outcome, Outcome::Partial);
    assert_eq!(matches(&empty, &lesson()).outcome, Outcome::Partial);
    assert!(matches(&empty, &Pattern::optional(leaf("a"))).is_complete());
    assert!(matches(&empty, &Pattern::zero_or_more(leaf("a"))).is_complete());
    assert_eq!(matches(&empty, &Pattern::one_or_more(leaf("a"))).outcome, Outcome::Partial);
}

#[test]
fn test_lesson_sequences() {
    let grammar = lesson();
    assert!(matches(&["launched", "completed"], &grammar).is_complete());
    assert!(matches(&["launched", "progressed", "progressed", "abandoned"], &grammar).is_complete());
    assert!(matches(&["launched", "progressed"], &grammar).is_partial());
    assert!(matches(&["progressed"], &grammar).is_failure());

    let extra = ["launched", "completed", "completed"];
    let result = matches(&extra, &grammar);
    assert!(result.is_success());
    assert_eq!(result.remainder, ["completed"]);
}

#[test]
fn test_can_append_walk() {
    let grammar = lesson();
    let mut so_far: Vec<&str> = Vec::new();

    for next in ["launched", "progressed", "progressed", "completed"] {
        assert!(can_append(&so_far, next, &grammar), "{} after {:?}", next, so_far);
        so_far.push(next);
    }
    assert!(!can_append(&so_far, "progressed", &grammar));
    assert!(!can_append(&so_far, "launched", &grammar));
}

#[test]
fn test_occurrence_round_trip() {
    let mut occ = occurrence(lesson());
    occ.append("launched").unwrap();
    occ.append("progressed").unwrap();

    let err = occ.append("launched").unwrap_err();
    assert!(err.is_sequence_violation());
    assert_eq!(occ.templates(), ["launched", "progressed"]);

    occ.append("abandoned").unwrap();
    assert!(occ.is_complete());

    let state = occ.into_state();
    let json = serde_json::to_value(&state).unwrap();
    let restored: MatchState = serde_json::from_value(json).unwrap();
    let resumed = PatternOccurrence::new(Arc::new(lesson()), restored);
    assert!(resumed.is_complete());
    assert!(!resumed.can_append("completed"));
}

#[test]
fn test_nested_repetition() {
    // one or more lessons, each launched and completed
    let course = Pattern::one_or_more(Pattern::sequence([leaf("launched"), leaf("completed")]));
    assert!(matches(&["launched", "completed", "launched", "completed"], &course).is_complete());

    let half = ["launched", "completed", "launched"];
    let result = matches(&half, &course);
    assert!(result.is_partial());
    assert!(can_append(&half, "completed", &course));
    assert!(!can_append(&half, "launched", &course));
}

fn arb_id() -> impl Strategy<Value = String> {
    prop_oneof![Just("a"), Just("b"), Just("c")].prop_map(str::to_string)
}

fn arb_pattern() -> impl Strategy<Value = Pattern> {
    let leaf = arb_id().prop_map(Pattern::leaf);
    leaf.prop_recursive(4, 24, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(Pattern::sequence),
            prop::collection::vec(inner.clone(), 1..4).prop_map(Pattern::alternates),
            inner.clone().prop_map(Pattern::one_or_more),
            inner.clone().prop_map(Pattern::zero_or_more),
            inner.prop_map(Pattern::optional),
        ]
    })
}

proptest! {
    #[test]
    fn prop_matching_is_deterministic(
        pattern in arb_pattern(),
        input in prop::collection::vec(arb_id(), 0..8),
    ) {
        let first = matches(&input, &pattern);
        let second = matches(&input, &pattern);
        prop_assert_eq!(first.outcome, second.outcome);
        prop_assert_eq!(first.remainder, second.remainder);
    }

    #[test]
    fn prop_remainder_is_suffix(
        pattern in arb_pattern(),
        input in prop::collection::vec(arb_id(), 0..8),
    ) {
        let result = matches(&input, &pattern);
        prop_assert!(input.ends_with(result.remainder));
        if result.is_failure() {
            prop_assert_eq!(result.remainder.len(), input.len());
        }
    }

    #[test]
    fn prop_zero_or_more_accepts_any_repetition(count in 0usize..12) {
        let input = vec!["a"; count];
        prop_assert!(matches(&input, &Pattern::zero_or_more(leaf("a"))).is_complete());
    }

    #[test]
    fn prop_append_agrees_with_can_append(
        pattern in arb_pattern(),
        input in prop::collection::vec(arb_id(), 0..6),
    ) {
        let mut occ = PatternOccurrence::new(Arc::new(pattern), MatchState::new("p", None));
        for id in &input {
            let allowed = occ.can_append(id);
            let before = occ.templates().len();
            prop_assert_eq!(occ.append(id).is_ok(), allowed);
            prop_assert_eq!(occ.templates().len(), before + usize::from(allowed));
        }
    }
}
