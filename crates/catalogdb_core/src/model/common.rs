//! Building blocks shared by several entity models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::Uid;

/// Free-form attribute map.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// A status with the time it was set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Status id, e.g. `READY`.
    #[serde(default)]
    pub id: String,
    /// `yyyyMMddHHmmss` timestamp.
    #[serde(default)]
    pub date: String,
    /// Optional free text.
    #[serde(default)]
    pub description: String,
}

impl Status {
    /// A status with only an id; the store stamps the date.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// Lifecycle information maintained by the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Internal {
    /// Lifecycle status: `READY` or `DELETED`.
    #[serde(default)]
    pub status: Status,
}

/// Unversioned reference to another entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    /// Referenced uid.
    pub uid: Uid,
    /// Referenced id at the time the reference was last refreshed.
    pub id: String,
}

/// Reference pinned to a specific version of another entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedRef {
    /// Referenced uid.
    pub uid: Uid,
    /// Referenced id at the pinned version.
    pub id: String,
    /// Pinned version.
    pub version: u32,
}

/// Value type of an annotation variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariableType {
    /// `true` / `false`.
    Boolean,
    /// Whole numbers.
    Integer,
    /// Floating point numbers.
    Decimal,
    /// Free text.
    Text,
    /// One of a fixed list of values.
    Category,
}

/// A variable declared by a variable set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    /// Variable id.
    pub id: String,
    /// Value type.
    #[serde(rename = "type")]
    pub kind: VariableType,
    /// Allowed values for categorical variables.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<String>,
}

impl Variable {
    /// Declares a variable.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: VariableType) -> Self {
        Self {
            id: id.into(),
            kind,
            allowed_values: Vec::new(),
        }
    }
}

/// Schema for annotation sets, defined at study level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSet {
    /// Variable set id.
    pub id: String,
    /// Declared variables.
    #[serde(default)]
    pub variables: Vec<Variable>,
}

impl VariableSet {
    /// Looks up a variable by id.
    #[must_use]
    pub fn variable(&self, id: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.id == id)
    }
}

/// Values for one variable set attached to an entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationSet {
    /// Annotation set id, unique within the entity.
    pub id: String,
    /// Variable set the values follow.
    pub variable_set_id: String,
    /// Variable id to value.
    #[serde(default)]
    pub annotations: BTreeMap<String, serde_json::Value>,
}
