//! Recursive descent matching of template sequences

use std::fmt;

use super::Pattern;

/// Outcome of matching a sequence against a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The pattern is satisfied by a prefix of the sequence
    Success,
    /// The sequence ran out while the pattern still expected statements
    Partial,
    /// The sequence cannot be produced by the pattern
    Failure,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Outcome::Success => "success",
            Outcome::Partial => "partial",
            Outcome::Failure => "failure",
        };
        f.write_str(name)
    }
}

/// Result of a match operation
///
/// `remainder` is the suffix of the input that was not consumed.
#[derive(Debug, PartialEq, Eq)]
pub struct MatchResult<'s, S> {
    /// Outcome
    pub outcome: Outcome,
    /// Unconsumed elements
    pub remainder: &'s [S],
}

impl<'s, S> Clone for MatchResult<'s, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'s, S> Copy for MatchResult<'s, S> {}

impl<'s, S> MatchResult<'s, S> {
    /// Successful match leaving `remainder`
    pub fn success(remainder: &'s [S]) -> Self {
        Self {
            outcome: Outcome::Success,
            remainder,
        }
    }

    /// Partial match of `input`; nothing is left over
    pub fn partial(input: &'s [S]) -> Self {
        Self {
            outcome: Outcome::Partial,
            remainder: &input[input.len()..],
        }
    }

    /// Failed match that consumed nothing of `input`
    pub fn failure(input: &'s [S]) -> Self {
        Self {
            outcome: Outcome::Failure,
            remainder: input,
        }
    }

    /// Whether the outcome is [`Outcome::Success`]
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Whether the outcome is [`Outcome::Partial`]
    pub fn is_partial(&self) -> bool {
        self.outcome == Outcome::Partial
    }

    /// Whether the outcome is [`Outcome::Failure`]
    pub fn is_failure(&self) -> bool {
        self.outcome == Outcome::Failure
    }

    /// Success with nothing left over
    pub fn is_complete(&self) -> bool {
        self.is_success() && self.remainder.is_empty()
    }
}

/// Match `sequence` against `pattern`
///
/// Pure and deterministic: the same inputs always produce the same result.
pub fn matches<'s, S: AsRef<str>>(sequence: &'s [S], pattern: &Pattern) -> MatchResult<'s, S> {
    match pattern {
        Pattern::Leaf(id) => match sequence.split_first() {
            None => MatchResult::partial(sequence),
            Some((head, tail)) if head.as_ref() == &**id => MatchResult::success(tail),
            Some(_) => MatchResult::failure(sequence),
        },
        Pattern::Sequence(children) => {
            let mut remainder = sequence;
            for child in children {
                let result = matches(remainder, child);
                match result.outcome {
                    Outcome::Success => remainder = result.remainder,
                    Outcome::Partial => return MatchResult::partial(sequence),
                    Outcome::Failure => return MatchResult::failure(sequence),
                }
            }
            MatchResult::success(remainder)
        }
        Pattern::Alternates(children) => {
            let mut best: Option<&'s [S]> = None;
            let mut partial = false;
            for child in children {
                let result = matches(sequence, child);
                match result.outcome {
                    // strict comparison keeps the first declared child on ties
                    Outcome::Success if best.map_or(true, |b| result.remainder.len() < b.len()) => {
                        best = Some(result.remainder)
                    }
                    Outcome::Success | Outcome::Failure => {}
                    Outcome::Partial => partial = true,
                }
            }
            match best {
                Some(remainder) => MatchResult::success(remainder),
                None if partial => MatchResult::partial(sequence),
                None => MatchResult::failure(sequence),
            }
        }
        Pattern::OneOrMore(child) => repeat(sequence, child, true),
        Pattern::ZeroOrMore(child) => repeat(sequence, child, false),
        Pattern::Optional(child) => {
            if sequence.is_empty() {
                return MatchResult::success(sequence);
            }
            let result = matches(sequence, child);
            match result.outcome {
                Outcome::Failure => MatchResult::success(sequence),
                Outcome::Success | Outcome::Partial => result,
            }
        }
    }
}

fn repeat<'s, S: AsRef<str>>(sequence: &'s [S], child: &Pattern, at_least_once: bool) -> MatchResult<'s, S> {
    let first = matches(sequence, child);
    match first.outcome {
        Outcome::Failure if at_least_once => return MatchResult::failure(sequence),
        Outcome::Failure => return MatchResult::success(sequence),
        Outcome::Partial if !at_least_once && sequence.is_empty() => return MatchResult::success(sequence),
        Outcome::Partial => return MatchResult::partial(sequence),
        Outcome::Success => {}
    }

    let mut remainder = first.remainder;
    if remainder.len() == sequence.len() {
        return MatchResult::success(remainder);
    }

    loop {
        let attempt = matches(remainder, child);
        match attempt.outcome {
            Outcome::Success if attempt.remainder.len() < remainder.len() => remainder = attempt.remainder,
            Outcome::Partial if !remainder.is_empty() => {
                return MatchResult {
                    outcome: Outcome::Partial,
                    remainder,
                }
            }
            Outcome::Success | Outcome::Partial | Outcome::Failure => return MatchResult::success(remainder),
        }
    }
}

/// Whether appending `next` to `so_far` keeps the sequence matchable
///
/// Accepts a complete match or a partial one; rejects failures and
/// successes that leave statements unconsumed.
pub fn can_append<S: AsRef<str>>(so_far: &[S], next: &str, pattern: &Pattern) -> bool {
    let extended: Vec<&str> = so_far
        .iter()
        .map(AsRef::as_ref)
        .chain(std::iter::once(next))
        .collect();
    let result = matches(&extended, pattern);
    result.is_complete() || result.is_partial()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn leaf(id: &str) -> Pattern {
        Pattern::leaf(id)
    }

    fn run<'s>(pattern: &Pattern, sequence: &'s [&'s str]) -> (Outcome, Vec<&'s str>) {
        let result = matches(sequence, pattern);
        (result.outcome, result.remainder.to_vec())
    }

    #[rstest]
    #[case(&["a"], Outcome::Success, &[])]
    #[case(&[], Outcome::Partial, &[])]
    #[case(&["b"], Outcome::Failure, &["b"])]
    #[case(&["a", "b"], Outcome::Success, &["b"])]
    fn test_leaf(#[case] input: &[&str], #[case] outcome: Outcome, #[case] remainder: &[&str]) {
        assert_eq!(run(&leaf("a"), input), (outcome, remainder.to_vec()));
    }

    #[rstest]
    #[case(&["a", "b"], Outcome::Success, &[])]
    #[case(&["a"], Outcome::Partial, &[])]
    #[case(&["b"], Outcome::Failure, &["b"])]
    #[case(&["a", "c"], Outcome::Failure, &["a", "c"])]
    #[case(&["a", "b", "c"], Outcome::Success, &["c"])]
    fn test_sequence(#[case] input: &[&str], #[case] outcome: Outcome, #[case] remainder: &[&str]) {
        let pattern = Pattern::sequence([leaf("a"), leaf("b")]);
        assert_eq!(run(&pattern, input), (outcome, remainder.to_vec()));
    }

    #[test]
    fn test_alternates_prefers_longest_consumption() {
        let pattern = Pattern::alternates([leaf("a"), Pattern::sequence([leaf("a"), leaf("b")])]);
        assert_eq!(run(&pattern, &["a", "b"]), (Outcome::Success, vec![]));
        assert_eq!(run(&pattern, &["a"]), (Outcome::Success, vec![]));
        assert_eq!(run(&pattern, &["c"]), (Outcome::Failure, vec!["c"]));
    }

    #[test]
    fn test_alternates_partial_when_no_success() {
        let pattern = Pattern::alternates([
            Pattern::sequence([leaf("a"), leaf("b")]),
            Pattern::sequence([leaf("a"), leaf("c")]),
        ]);
        assert_eq!(run(&pattern, &["a"]), (Outcome::Partial, vec![]));
        assert_eq!(run(&pattern, &[]), (Outcome::Partial, vec![]));
    }

    #[test]
    fn test_alternates_tie_goes_to_first_child() {
        let pattern = Pattern::alternates([leaf("a"), Pattern::optional(leaf("a"))]);
        let input = ["a", "x"];
        let result = matches(&input, &pattern);
        assert!(result.is_success());
        assert_eq!(result.remainder, &["x"]);
    }

    #[rstest]
    #[case(&[], Outcome::Success, &[])]
    #[case(&["a", "a"], Outcome::Success, &[])]
    #[case(&["a", "a", "b"], Outcome::Success, &["b"])]
    #[case(&["b"], Outcome::Success, &["b"])]
    fn test_zero_or_more(#[case] input: &[&str], #[case] outcome: Outcome, #[case] remainder: &[&str]) {
        let pattern = Pattern::zero_or_more(leaf("a"));
        assert_eq!(run(&pattern, input), (outcome, remainder.to_vec()));
    }

    #[rstest]
    #[case(&[], Outcome::Partial, &[])]
    #[case(&["b"], Outcome::Failure, &["b"])]
    #[case(&["a"], Outcome::Success, &[])]
    #[case(&["a", "a", "b"], Outcome::Success, &["b"])]
    fn test_one_or_more(#[case] input: &[&str], #[case] outcome: Outcome, #[case] remainder: &[&str]) {
        let pattern = Pattern::one_or_more(leaf("a"));
        assert_eq!(run(&pattern, input), (outcome, remainder.to_vec()));
    }

    #[test]
    fn test_repetition_of_partial_sequence() {
        let pattern = Pattern::one_or_more(Pattern::sequence([leaf("a"), leaf("b")]));
        assert_eq!(run(&pattern, &["a"]), (Outcome::Partial, vec![]));
        assert_eq!(run(&pattern, &["a", "b"]), (Outcome::Success, vec![]));
        // a second iteration that is under way keeps the match partial
        assert_eq!(run(&pattern, &["a", "b", "a"]), (Outcome::Partial, vec!["a"]));

        let pattern = Pattern::zero_or_more(Pattern::sequence([leaf("a"), leaf("b")]));
        assert_eq!(run(&pattern, &["a"]), (Outcome::Partial, vec![]));
    }

    #[test]
    fn test_repetition_stops_on_empty_iteration() {
        let pattern = Pattern::one_or_more(Pattern::optional(leaf("a")));
        assert_eq!(run(&pattern, &["b"]), (Outcome::Success, vec!["b"]));
        assert_eq!(run(&pattern, &["a", "a", "b"]), (Outcome::Success, vec!["b"]));
    }

    #[rstest]
    #[case(&[], Outcome::Success, &[])]
    #[case(&["a"], Outcome::Success, &[])]
    #[case(&["b"], Outcome::Success, &["b"])]
    fn test_optional(#[case] input: &[&str], #[case] outcome: Outcome, #[case] remainder: &[&str]) {
        let pattern = Pattern::optional(leaf("a"));
        assert_eq!(run(&pattern, input), (outcome, remainder.to_vec()));
    }

    #[test]
    fn test_optional_passes_partial_through() {
        let pattern = Pattern::optional(Pattern::sequence([leaf("a"), leaf("b")]));
        assert_eq!(run(&pattern, &["a"]), (Outcome::Partial, vec![]));
    }

    #[test]
    fn test_can_append() {
        let pattern = Pattern::sequence([
            leaf("launched"),
            Pattern::zero_or_more(leaf("progressed")),
            leaf("completed"),
        ]);
        let empty: [&str; 0] = [];
        assert!(can_append(&empty, "launched", &pattern));
        assert!(!can_append(&empty, "completed", &pattern));
        assert!(can_append(&["launched"], "progressed", &pattern));
        assert!(can_append(&["launched", "progressed"], "completed", &pattern));
        assert!(!can_append(&["launched", "completed"], "progressed", &pattern));
    }

    #[test]
    fn test_can_append_rejects_leftover() {
        let pattern = leaf("a");
        assert!(!can_append(&["a"], "a", &pattern));
    }

    #[test]
    fn test_owned_strings() {
        let pattern = Pattern::sequence([leaf("a"), leaf("b")]);
        let owned = vec!["a".to_string()];
        assert!(matches(&owned, &pattern).is_partial());
        assert!(can_append(&owned, "b", &pattern));
    }
}
