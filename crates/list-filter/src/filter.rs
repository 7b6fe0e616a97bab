use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::warn;

use crate::matcher::matches;
use crate::value::FieldValue;

/// The filter predicates of one request: field-path keys mapped to the raw
/// values supplied for them.  A key repeated in the query string collects
/// multiple values; every value is a separate AND-ed condition.
#[derive(Debug, Default, Clone)]
pub struct FilterQuery {
    keys: BTreeMap<String, Vec<String>>,
}

impl FilterQuery {
    /// Build a query from decoded `(key, value)` pairs, preserving repeats.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut query = Self::default();
        for (key, value) in pairs {
            query.keys.entry(key).or_default().push(value);
        }
        query
    }

    /// True when no predicates were supplied.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.keys.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Filter a backend list response against the request's query predicates.
///
/// The returned object is a copy of the body with `totalItems` set to the
/// unfiltered item count and, when any predicate is present, `items`
/// replaced by the matching subset.  An item is kept only if it passes
/// every key, and for each key every supplied value (AND across keys and
/// across repeated values; term combination within one value is per-type,
/// see [`crate::matcher`]).
///
/// Never fails: an unparseable body or a missing `items` array degrades to
/// an empty item list so the gateway stays available.
pub fn filter(raw_body: &[u8], query: &FilterQuery) -> Value {
    let mut body = match serde_json::from_slice::<Value>(raw_body) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!(kind = json_kind(&other), "list body is not a JSON object");
            Map::new()
        }
        Err(err) => {
            warn!(%err, "failed to parse list body");
            Map::new()
        }
    };

    let items: Vec<Value> = match body.get("items") {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    // Clients see "N total, M shown": totalItems always reports the
    // pre-filter count.
    body.insert("totalItems".to_string(), Value::from(items.len()));

    if !query.is_empty() {
        let kept: Vec<Value> = items
            .into_iter()
            .filter(|item| item_passes(item, query))
            .collect();
        body.insert("items".to_string(), Value::Array(kept));
    }

    Value::Object(body)
}

/// One item passes only if every key's every value matches its field.
/// The first failing value disqualifies the item outright.
fn item_passes(item: &Value, query: &FilterQuery) -> bool {
    query.iter().all(|(key, values)| {
        let field = FieldValue::classify(item, key);
        values.iter().all(|value| matches(&field, value))
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
