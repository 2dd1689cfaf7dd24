//! Documents: string-keyed maps of values with dot-path access.

use std::collections::BTreeMap;

use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// A document: an ordered map from field name to value.
///
/// Nested fields are addressed with dot paths (`internal.status.id`). Path
/// helpers only descend through nested documents; array traversal is left to
/// the filter evaluator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    fields: BTreeMap<String, Value>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Number of top-level fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Get a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a mutable top-level field.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.fields.get_mut(key)
    }

    /// Insert a top-level field, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    /// Remove a top-level field.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Whether a top-level field exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Iterate over fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Resolve a dot path through nested documents.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = current.as_document()?.get(part)?;
        }
        Some(current)
    }

    /// Set a value at a dot path, creating intermediate documents.
    ///
    /// # Errors
    ///
    /// Fails if an intermediate segment exists and is not a document.
    pub fn set_path(&mut self, path: &str, value: impl Into<Value>) -> CodecResult<()> {
        let (parent, leaf) = match path.rsplit_once('.') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, path),
        };
        let target = match parent {
            Some(parent) => self.document_at_mut(parent, path)?,
            None => self,
        };
        target.fields.insert(leaf.to_string(), value.into());
        Ok(())
    }

    /// Remove the value at a dot path. Missing paths are not an error.
    pub fn remove_path(&mut self, path: &str) -> Option<Value> {
        match path.rsplit_once('.') {
            None => self.fields.remove(path),
            Some((parent, leaf)) => {
                let mut current = self;
                for part in parent.split('.') {
                    current = current.fields.get_mut(part)?.as_document_mut()?;
                }
                current.fields.remove(leaf)
            }
        }
    }

    /// Mutable access to the value at a dot path.
    pub fn get_path_mut(&mut self, path: &str) -> Option<&mut Value> {
        let mut parts = path.split('.');
        let mut current = self.fields.get_mut(parts.next()?)?;
        for part in parts {
            current = current.as_document_mut()?.fields.get_mut(part)?;
        }
        Some(current)
    }

    fn document_at_mut(&mut self, parent: &str, full: &str) -> CodecResult<&mut Document> {
        let mut current = self;
        for part in parent.split('.') {
            let slot = current
                .fields
                .entry(part.to_string())
                .or_insert_with(|| Value::Document(Document::new()));
            current = slot
                .as_document_mut()
                .ok_or_else(|| CodecError::invalid_path(full, format!("'{part}' is not a document")))?;
        }
        Ok(current)
    }

    /// Text at a dot path.
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get_path(path).and_then(Value::as_text)
    }

    /// Integer at a dot path.
    pub fn get_i64(&self, path: &str) -> Option<i64> {
        self.get_path(path).and_then(Value::as_integer)
    }

    /// Boolean at a dot path.
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get_path(path).and_then(Value::as_bool)
    }

    /// Array at a dot path.
    pub fn get_array(&self, path: &str) -> Option<&[Value]> {
        self.get_path(path).and_then(Value::as_array)
    }

    /// Nested document at a dot path.
    pub fn get_document(&self, path: &str) -> Option<&Document> {
        self.get_path(path).and_then(Value::as_document)
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}
