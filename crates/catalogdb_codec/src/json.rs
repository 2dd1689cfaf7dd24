//! Bridge between [`Value`] and `serde_json`, used to map typed models onto
//! documents.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::document::Document;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map_or(Value::Null, Value::Float),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Document(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Value {
    /// Convert into a `serde_json` value. Infinite floats become null.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(n) => serde_json::Value::from(*n),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Document(doc) => doc.to_json(),
        }
    }
}

impl Document {
    /// Convert into a `serde_json` object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

/// Serialize a typed value into a document.
///
/// # Errors
///
/// Fails if serialization fails or the value is not a map.
pub fn to_document<T: Serialize>(value: &T) -> CodecResult<Document> {
    let json = serde_json::to_value(value).map_err(|e| CodecError::conversion(e.to_string()))?;
    match Value::from(json) {
        Value::Document(doc) => Ok(doc),
        other => Err(CodecError::conversion(format!(
            "expected a document, got {}",
            other.type_name()
        ))),
    }
}

/// Deserialize a typed value from a document.
///
/// # Errors
///
/// Fails if the document does not match the target type.
pub fn from_document<T: DeserializeOwned>(doc: &Document) -> CodecResult<T> {
    serde_json::from_value(doc.to_json()).map_err(|e| CodecError::conversion(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Member {
        #[serde(rename = "_uid")]
        uid: u64,
        id: String,
        father_id: Option<String>,
        score: f64,
    }

    #[test]
    fn typed_model_maps_to_document() {
        let member = Member {
            uid: 7,
            id: "I1".into(),
            father_id: None,
            score: 0.5,
        };
        let doc = to_document(&member).unwrap();
        assert_eq!(doc.get_i64("_uid"), Some(7));
        assert_eq!(doc.get("fatherId"), Some(&Value::Null));
        assert_eq!(doc.get("score"), Some(&Value::Float(0.5)));
        let back: Member = from_document(&doc).unwrap();
        assert_eq!(back, member);
    }

    #[test]
    fn extra_fields_are_ignored_on_read() {
        let doc = Document::new()
            .with("_uid", 1i64)
            .with("id", "I1")
            .with("fatherId", ())
            .with("score", 1i64)
            .with("_lastOfVersion", true);
        let member: Member = from_document(&doc).unwrap();
        assert_eq!(member.score, 1.0);
    }

    #[test]
    fn non_map_is_rejected() {
        assert!(to_document(&vec![1, 2]).is_err());
    }
}
