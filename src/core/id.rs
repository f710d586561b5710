use crate::core::{AppError, AppResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identity of a stored document.
///
/// Rendered as a hyphenated UUID on the wire and in every storage format, so
/// ids compare equal no matter which serializer produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocId(Uuid);

impl DocId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Coerces a raw request string into an id.
    ///
    /// This is the only place request text becomes a `DocId`; a malformed
    /// literal is a `BadRequest`.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let trimmed = raw.trim();
        Uuid::parse_str(trimmed)
            .map(Self)
            .map_err(|_| AppError::bad_request(format!("'{raw}' is not a valid id")))
    }

}

impl Default for DocId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for DocId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Uuid> for DocId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<DocId> for Value {
    fn from(value: DocId) -> Self {
        Value::String(value.to_string())
    }
}

impl Serialize for DocId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DocId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Uuid::parse_str(&raw)
            .map(Self)
            .map_err(|err| serde::de::Error::custom(format!("invalid id '{raw}': {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn parse_accepts_display_form() {
        let id = DocId::new();
        let parsed = DocId::parse(&id.to_string()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn parse_tolerates_surrounding_whitespace() {
        let id = DocId::new();
        assert_eq!(DocId::parse(&format!("  {id} ")).unwrap(), id);
    }

    #[test]
    fn parse_rejects_malformed_literals() {
        for raw in ["", "abc", "not-an-id", "65f1c0ffee0000000000000", "1234"] {
            let err = DocId::parse(raw).unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST, "{raw}");
        }
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = DocId::new();
        let value = serde_json::to_value(id).unwrap();
        assert_eq!(value, Value::String(id.to_string()));
        assert_eq!(Value::from(id), value);

        let back: DocId = serde_json::from_value(value).unwrap();
        assert_eq!(back, id);
    }
}
