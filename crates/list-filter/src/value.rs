use serde_json::{Map, Value};

/// Key whose array value is interpreted as a Kubernetes-style condition
/// list rather than a label map.
pub(crate) const CONDITIONS_KEY: &str = "status.conditions";

/// The classified value of one item field, as seen by the matcher.
///
/// List items are heterogeneous JSON objects, so the type of a field is
/// only known at evaluation time.  Classifying the field once up front
/// keeps the per-type match semantics in a single dispatch instead of
/// being spread across inline type checks.
#[derive(Debug)]
pub enum FieldValue<'a> {
    /// A string field, matched by case-insensitive substring.
    Text(&'a str),
    /// An object field treated as a label map (`key=value` constraints).
    Labels(&'a Map<String, Value>),
    /// The condition array under [`CONDITIONS_KEY`].
    Conditions(&'a [Value]),
    /// An explicit JSON `null`.
    Null,
    /// Anything the engine has no comparison for: numbers, booleans,
    /// arrays outside [`CONDITIONS_KEY`], objects *at* [`CONDITIONS_KEY`],
    /// or a missing field.  Always disqualifies the item when queried.
    Unsupported,
}

impl<'a> FieldValue<'a> {
    /// Resolve `key` as a dotted path into `item` and classify the result.
    ///
    /// Path segments index into nested objects only; any segment that does
    /// not resolve yields [`FieldValue::Unsupported`].
    pub fn classify(item: &'a Value, key: &str) -> Self {
        let Some(found) = lookup(item, key) else {
            return FieldValue::Unsupported;
        };

        match found {
            Value::String(s) => FieldValue::Text(s),
            Value::Object(map) if key != CONDITIONS_KEY => FieldValue::Labels(map),
            Value::Array(entries) if key == CONDITIONS_KEY => {
                FieldValue::Conditions(entries)
            }
            Value::Null => FieldValue::Null,
            _ => FieldValue::Unsupported,
        }
    }
}

/// Walk a dotted path through nested objects.
fn lookup<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = item;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_string_field() {
        let item = json!({"status": "Running"});
        assert!(matches!(
            FieldValue::classify(&item, "status"),
            FieldValue::Text("Running")
        ));
    }

    #[test]
    fn classify_nested_path() {
        let item = json!({"metadata": {"name": "vm-1"}});
        assert!(matches!(
            FieldValue::classify(&item, "metadata.name"),
            FieldValue::Text("vm-1")
        ));
    }

    #[test]
    fn classify_label_map() {
        let item = json!({"labels": {"env": "prod"}});
        assert!(matches!(
            FieldValue::classify(&item, "labels"),
            FieldValue::Labels(_)
        ));
    }

    #[test]
    fn classify_conditions_array_only_under_conditions_key() {
        let item = json!({
            "status": {"conditions": [{"type": "Ready", "status": "True"}]},
            "tags": ["a", "b"],
        });
        assert!(matches!(
            FieldValue::classify(&item, "status.conditions"),
            FieldValue::Conditions(_)
        ));
        // Arrays anywhere else have no comparison semantics.
        assert!(matches!(
            FieldValue::classify(&item, "tags"),
            FieldValue::Unsupported
        ));
    }

    #[test]
    fn classify_null_and_missing() {
        let item = json!({"spec": null});
        assert!(matches!(
            FieldValue::classify(&item, "spec"),
            FieldValue::Null
        ));
        assert!(matches!(
            FieldValue::classify(&item, "nope"),
            FieldValue::Unsupported
        ));
    }

    #[test]
    fn classify_scalars_are_unsupported() {
        let item = json!({"replicas": 3, "ready": true});
        assert!(matches!(
            FieldValue::classify(&item, "replicas"),
            FieldValue::Unsupported
        ));
        assert!(matches!(
            FieldValue::classify(&item, "ready"),
            FieldValue::Unsupported
        ));
    }

    #[test]
    fn path_through_non_object_is_unsupported() {
        let item = json!({"status": "Running"});
        assert!(matches!(
            FieldValue::classify(&item, "status.phase"),
            FieldValue::Unsupported
        ));
    }
}
