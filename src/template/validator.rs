//! Statement validation against a [`Template`]
//!
//! Checks run in a fixed order: verb, object activity type, context activity
//! types per relation, attachment usage types, the two StatementRef flags and
//! finally every rule in declaration order. Each check yields at most one
//! human readable violation.

use serde_json::Value;
use std::iter;

use super::{Presence, Template, TemplateRule, ValidationMode};
use crate::document::ContextRelation;
use crate::error::{Result, XapiError};

/// Validate `statement`, failing on the first violation
pub fn validate(statement: &Value, template: &Template) -> Result<()> {
    validate_with(statement, template, ValidationMode::FailFast)
}

/// Validate `statement` in `mode`
pub fn validate_with(statement: &Value, template: &Template, mode: ValidationMode) -> Result<()> {
    let violations = violations(statement, template, mode);
    if violations.is_empty() {
        tracing::trace!(template = %template.id, "statement matches template");
        Ok(())
    } else {
        Err(XapiError::TemplateViolation {
            template: template.id.clone(),
            violations,
        })
    }
}

/// Violations of `template` by `statement`
///
/// In [`ValidationMode::FailFast`] at most one violation is returned and no
/// later check is evaluated.
pub fn violations(statement: &Value, template: &Template, mode: ValidationMode) -> Vec<String> {
    let checks = iter::once_with(|| check_verb(statement, template))
        .chain(iter::once_with(|| check_object_activity_type(statement, template)))
        .chain(
            ContextRelation::ALL
                .into_iter()
                .map(|relation| check_context_types(statement, template, relation)),
        )
        .chain(iter::once_with(|| check_attachment_usage_types(statement, template)))
        .chain(iter::once_with(|| check_object_statement_ref(statement, template)))
        .chain(iter::once_with(|| check_context_statement_ref(statement, template)))
        .chain(template.rules.iter().map(|rule| check_rule(statement, rule)))
        .flatten();

    match mode {
        ValidationMode::FailFast => checks.take(1).collect(),
        ValidationMode::Collect => checks.collect(),
    }
}

fn check_verb(statement: &Value, template: &Template) -> Option<String> {
    let expected = template.verb.as_deref()?;
    let actual = statement.pointer("/verb/id").and_then(Value::as_str);
    (actual != Some(expected)).then(|| {
        format!(
            "verb {} does not match required verb {}",
            describe(actual),
            expected
        )
    })
}

fn check_object_activity_type(statement: &Value, template: &Template) -> Option<String> {
    let expected = template.object_activity_type.as_deref()?;
    let actual = statement.pointer("/object/definition/type").and_then(Value::as_str);
    (actual != Some(expected)).then(|| {
        format!(
            "object activity type {} does not match required type {}",
            describe(actual),
            expected
        )
    })
}

fn check_context_types(statement: &Value, template: &Template, relation: ContextRelation) -> Option<String> {
    let required = template.context_activity_types.required(relation);
    if required.is_empty() {
        return None;
    }

    let present: Vec<&str> = statement
        .pointer(&format!("/context/contextActivities/{}", relation.key()))
        .map(as_list)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|activity| activity.pointer("/definition/type").and_then(Value::as_str))
        .collect();

    let missing: Vec<&str> = required
        .iter()
        .map(String::as_str)
        .filter(|t| !present.contains(t))
        .collect();
    (!missing.is_empty()).then(|| {
        format!(
            "context activities '{}' lack required types [{}]",
            relation.key(),
            missing.join(", ")
        )
    })
}

fn check_attachment_usage_types(statement: &Value, template: &Template) -> Option<String> {
    if template.attachment_usage_types.is_empty() {
        return None;
    }

    let present: Vec<&str> = statement
        .get("attachments")
        .map(as_list)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|attachment| attachment.get("usageType").and_then(Value::as_str))
        .collect();

    let missing: Vec<&str> = template
        .attachment_usage_types
        .iter()
        .map(String::as_str)
        .filter(|t| !present.contains(t))
        .collect();
    (!missing.is_empty()).then(|| format!("attachments lack required usage types [{}]", missing.join(", ")))
}

fn check_object_statement_ref(statement: &Value, template: &Template) -> Option<String> {
    if !template.object_statement_ref {
        return None;
    }
    let object_type = statement.pointer("/object/objectType").and_then(Value::as_str);
    (object_type != Some("StatementRef")).then(|| "object must be a StatementRef".to_string())
}

fn check_context_statement_ref(statement: &Value, template: &Template) -> Option<String> {
    if !template.context_statement_ref {
        return None;
    }
    let object_type = statement
        .pointer("/context/statement/objectType")
        .and_then(Value::as_str);
    (object_type != Some("StatementRef")).then(|| "context.statement must be a StatementRef".to_string())
}

/// Check one rule against `statement`
///
/// Returns a description of the violation, or `None` when the rule holds.
pub fn check_rule(statement: &Value, rule: &TemplateRule) -> Option<String> {
    let location = &rule.location;
    let located = match location.select(statement) {
        Ok(values) => values,
        Err(e) => return Some(format!("rule at {}: {}", location, e)),
    };

    let (values, has_unmatchable) = match &rule.selector {
        None => (located, false),
        Some(selector) => {
            let mut selected = Vec::new();
            let mut has_unmatchable = false;
            for value in located {
                match selector.select(value) {
                    Ok(found) if found.is_empty() => has_unmatchable = true,
                    Ok(found) => selected.extend(found),
                    Err(e) => return Some(format!("rule at {}: {}", location, e)),
                }
            }
            (selected, has_unmatchable)
        }
    };

    let target = match &rule.selector {
        Some(selector) => format!("{} (selector {})", location, selector),
        None => location.to_string(),
    };

    match rule.rule.presence {
        Some(Presence::Included) if values.is_empty() => {
            return Some(format!("{} is required but matched nothing", target));
        }
        Some(Presence::Included) if has_unmatchable => {
            return Some(format!("{} is required but some located values have no match", target));
        }
        Some(Presence::Excluded) => {
            return (!values.is_empty()).then(|| format!("{} is excluded but matched {}", target, render(&values)));
        }
        Some(Presence::Recommended) if values.is_empty() => return None,
        _ => {}
    }

    if let Some(any) = &rule.rule.any {
        if !values.iter().any(|&v| any.contains(v)) {
            return Some(format!(
                "{} matched {}, none of which is among {}",
                target,
                render(&values),
                render_owned(any)
            ));
        }
    }

    if let Some(all) = &rule.rule.all {
        let offending: Vec<&Value> = values.iter().copied().filter(|&v| !all.contains(v)).collect();
        if !offending.is_empty() {
            return Some(format!(
                "{} matched {} which are not among {}",
                target,
                render(&offending),
                render_owned(all)
            ));
        }
        if has_unmatchable {
            return Some(format!("{} has located values with no match for 'all'", target));
        }
    }

    if let Some(none) = &rule.rule.none {
        let forbidden: Vec<&Value> = values.iter().copied().filter(|&v| none.contains(v)).collect();
        if !forbidden.is_empty() {
            return Some(format!("{} matched forbidden values {}", target, render(&forbidden)));
        }
    }

    None
}

// A JSON array as its items, anything else as a single item.
fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn describe(actual: Option<&str>) -> String {
    actual.map_or_else(|| "(absent)".to_string(), str::to_string)
}

fn render(values: &[&Value]) -> String {
    let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", items.join(", "))
}

fn render_owned(values: &[Value]) -> String {
    let items: Vec<String> = values.iter().map(Value::to_string).collect();
    format!("[{}]", items.join(", "))
}
