//! Per-type match semantics for one query value against one field.
//!
//! A raw query value is a comma-separated list of terms.  How the terms
//! combine depends on the field's classified type. The asymmetry is
//! deliberate (labels are conjunctive selectors, free-text search is
//! disjunctive) and must not be unified:
//!
//! | field type            | terms combine as                               |
//! |-----------------------|------------------------------------------------|
//! | string                | OR: any case-insensitive substring match       |
//! | label map             | AND: every `k=v` term must be present          |
//! | condition array       | AND: every term's migratability must hold      |
//! | null                  | AND: every term must be the literal `null`     |
//! | anything else         | never matches                                  |

use serde_json::Value;

use crate::value::FieldValue;

/// Condition type whose `status: "True"` marks an item as live-migratable.
const LIVE_MIGRATABLE: &str = "LiveMigratable";

/// Evaluate one raw query value (comma-separated terms) against a field.
pub(crate) fn matches(field: &FieldValue<'_>, raw_value: &str) -> bool {
    match field {
        FieldValue::Text(text) => {
            let haystack = text.to_lowercase();
            raw_value
                .split(',')
                .any(|term| haystack.contains(&term.to_lowercase()))
        }
        FieldValue::Labels(labels) => raw_value.split(',').all(|term| {
            let Some((key, expected)) = term.split_once('=') else {
                return false;
            };
            labels.get(key).and_then(Value::as_str) == Some(expected)
        }),
        FieldValue::Conditions(conditions) => {
            let migratable = has_live_migratable(conditions);
            raw_value.split(',').all(|term| match term {
                "migratable" => migratable,
                "notMigratable" => !migratable,
                _ => true,
            })
        }
        FieldValue::Null => raw_value
            .split(',')
            .all(|term| term.eq_ignore_ascii_case("null")),
        FieldValue::Unsupported => false,
    }
}

/// True when the condition list contains a `LiveMigratable` entry with
/// status `"True"`.
fn has_live_migratable(conditions: &[Value]) -> bool {
    conditions.iter().any(|cond| {
        cond.get("type").and_then(Value::as_str) == Some(LIVE_MIGRATABLE)
            && cond.get("status").and_then(Value::as_str) == Some("True")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classify<'a>(item: &'a Value, key: &str) -> FieldValue<'a> {
        FieldValue::classify(item, key)
    }

    // -- string: OR across terms, case-insensitive substring --

    #[test]
    fn text_substring_is_case_insensitive() {
        let item = json!({"status": "Running"});
        let field = classify(&item, "status");
        assert!(matches(&field, "run"));
        assert!(matches(&field, "RUN"));
        assert!(!matches(&field, "stopped"));
    }

    #[test]
    fn text_terms_combine_as_or() {
        let item = json!({"status": "Running"});
        let field = classify(&item, "status");
        assert!(matches(&field, "stopped,run"));
        assert!(matches(&field, "run,stopped"));
        assert!(!matches(&field, "stopped,paused"));
    }

    // -- labels: AND across terms --

    #[test]
    fn labels_require_every_pair() {
        let item = json!({"labels": {"env": "prod", "tier": "web"}});
        let field = classify(&item, "labels");
        assert!(matches(&field, "env=prod"));
        assert!(matches(&field, "env=prod,tier=web"));
        assert!(!matches(&field, "env=prod,tier=db"));
        assert!(!matches(&field, "region=eu"));
    }

    #[test]
    fn label_term_without_equals_never_matches() {
        let item = json!({"labels": {"env": "prod"}});
        let field = classify(&item, "labels");
        assert!(!matches(&field, "env"));
    }

    #[test]
    fn label_value_must_be_a_string() {
        let item = json!({"labels": {"count": 3}});
        let field = classify(&item, "labels");
        assert!(!matches(&field, "count=3"));
    }

    // -- conditions: AND across terms, keyed on LiveMigratable --

    #[test]
    fn migratable_term_requires_condition() {
        let with = json!({"status": {"conditions": [
            {"type": "LiveMigratable", "status": "True"}
        ]}});
        let without = json!({"status": {"conditions": [
            {"type": "Ready", "status": "True"}
        ]}});

        assert!(matches(&classify(&with, "status.conditions"), "migratable"));
        assert!(!matches(
            &classify(&without, "status.conditions"),
            "migratable"
        ));
    }

    #[test]
    fn not_migratable_term_requires_absence() {
        let with = json!({"status": {"conditions": [
            {"type": "LiveMigratable", "status": "True"}
        ]}});
        let false_status = json!({"status": {"conditions": [
            {"type": "LiveMigratable", "status": "False"}
        ]}});

        assert!(!matches(
            &classify(&with, "status.conditions"),
            "notMigratable"
        ));
        assert!(matches(
            &classify(&false_status, "status.conditions"),
            "notMigratable"
        ));
    }

    #[test]
    fn other_condition_terms_pass() {
        let item = json!({"status": {"conditions": []}});
        let field = classify(&item, "status.conditions");
        assert!(matches(&field, "anything"));
        // But an AND with a failing term still fails.
        assert!(!matches(&field, "anything,migratable"));
    }

    // -- null --

    #[test]
    fn null_field_matches_only_null_terms() {
        let item = json!({"spec": null});
        let field = classify(&item, "spec");
        assert!(matches(&field, "null"));
        assert!(matches(&field, "NULL"));
        assert!(matches(&field, "null,null"));
        assert!(!matches(&field, "null,running"));
        assert!(!matches(&field, "running"));
    }

    // -- unsupported --

    #[test]
    fn unsupported_types_never_match() {
        let item = json!({"replicas": 3});
        let field = classify(&item, "replicas");
        assert!(!matches(&field, "3"));
        assert!(!matches(&field, "anything"));
    }
}
