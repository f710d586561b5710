use crate::core::DocId;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key under which a document exposes its identity.
pub const ID_FIELD: &str = "_id";
/// Key under which a document exposes its creation time.
pub const CREATED_FIELD: &str = "dateCreated";
/// Key under which a document exposes its last update time.
pub const UPDATED_FIELD: &str = "dateUpdated";

/// Field names owned by the collection layer; payloads can never set them.
pub const RESERVED_FIELDS: [&str; 3] = [ID_FIELD, CREATED_FIELD, UPDATED_FIELD];

pub fn is_reserved_field(name: &str) -> bool {
    RESERVED_FIELDS.contains(&name)
}

/// Fixed-width RFC 3339 rendering, so lexical order is chronological order.
fn wire_time(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Untyped stored record: identity, lifecycle stamps and a JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: DocId,
    #[serde(rename = "dateCreated")]
    pub date_created: DateTime<Utc>,
    #[serde(rename = "dateUpdated")]
    pub date_updated: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    /// Resolves a dotted field path (`options.backgroundColor`).
    ///
    /// Reserved fields resolve to their wire representation.
    pub fn get_path(&self, path: &str) -> Option<Value> {
        match path {
            ID_FIELD => return Some(Value::from(self.id)),
            CREATED_FIELD => return Some(Value::String(wire_time(&self.date_created))),
            UPDATED_FIELD => return Some(Value::String(wire_time(&self.date_updated))),
            _ => {}
        }

        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.fields.get(first)?;
        for part in parts {
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current.clone())
    }

    /// Full JSON form, reserved fields included.
    pub fn to_json(&self) -> Value {
        let mut map = Map::with_capacity(self.fields.len() + RESERVED_FIELDS.len());
        map.insert(ID_FIELD.to_string(), Value::from(self.id));
        map.insert(
            CREATED_FIELD.to_string(),
            Value::String(wire_time(&self.date_created)),
        );
        map.insert(
            UPDATED_FIELD.to_string(),
            Value::String(wire_time(&self.date_updated)),
        );
        for (key, value) in &self.fields {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Document {
        let now = Utc::now();
        let Value::Object(fields) = json!({
            "content": "hello",
            "options": { "backgroundColor": "red" },
            "items": ["a", "b"]
        }) else {
            unreachable!()
        };
        Document {
            id: DocId::new(),
            date_created: now,
            date_updated: now,
            fields,
        }
    }

    #[test]
    fn resolves_nested_and_reserved_paths() {
        let doc = sample();
        assert_eq!(doc.get_path("content"), Some(json!("hello")));
        assert_eq!(doc.get_path("options.backgroundColor"), Some(json!("red")));
        assert_eq!(doc.get_path("items.1"), Some(json!("b")));
        assert_eq!(doc.get_path("_id"), Some(Value::from(doc.id)));
        assert_eq!(doc.get_path("options.missing"), None);
        assert_eq!(doc.get_path("content.deeper"), None);
    }

    #[test]
    fn json_form_carries_reserved_fields() {
        let doc = sample();
        let value = doc.to_json();
        assert_eq!(value["_id"], json!(doc.id.to_string()));
        assert!(value["dateCreated"].is_string());
        assert_eq!(value["content"], json!("hello"));
    }
}
