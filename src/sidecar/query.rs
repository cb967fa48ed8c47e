use serde_json::Value;

/// Extracts a value at a dotted path (`"geoData.latitude"`) from a sidecar document.
///
/// Values are rendered the way `jq -r` prints them: strings without quotes,
/// numbers and booleans as text, objects and arrays as compact JSON. Absent
/// keys, `null` and the empty string yield `None`.
pub trait JsonQuery: Send + Sync {
    fn query(&self, doc: &Value, path: &str) -> Option<String>;
}

/// [`JsonQuery`] over an already parsed `serde_json::Value`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DottedPathQuery;

impl JsonQuery for DottedPathQuery {
    fn query(&self, doc: &Value, path: &str) -> Option<String> {
        let mut current = doc;
        for key in path.split('.').filter(|k| !k.is_empty()) {
            current = match current {
                Value::Object(map) => map.get(key)?,
                Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        render(current)
    }
}

fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}
