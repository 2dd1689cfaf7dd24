//! Field-level update operators.

use catalogdb_codec::{Document, Value};

use crate::error::{StoreError, StoreResult};
use crate::filter::Filter;

/// A single update operator.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    /// Set a path, creating intermediate documents.
    Set(String, Value),
    /// Remove a path.
    Unset(String),
    /// Append to an array, creating it when missing.
    Push(String, Value),
    /// Append to an array unless an equal element exists.
    AddToSet(String, Value),
    /// Remove array elements equal to the value.
    Pull(String, Value),
    /// Remove document elements of an array that match the filter.
    PullWhere(String, Filter),
    /// Add to a numeric field, treating a missing field as zero.
    Inc(String, i64),
}

/// An ordered list of update operators applied to each matched document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    ops: Vec<UpdateOp>,
}

impl Update {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `Set`.
    #[must_use]
    pub fn set(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Set(path.into(), value.into()));
        self
    }

    /// Add an `Unset`.
    #[must_use]
    pub fn unset(mut self, path: impl Into<String>) -> Self {
        self.ops.push(UpdateOp::Unset(path.into()));
        self
    }

    /// Add a `Push`.
    #[must_use]
    pub fn push(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Push(path.into(), value.into()));
        self
    }

    /// Add an `AddToSet`.
    #[must_use]
    pub fn add_to_set(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::AddToSet(path.into(), value.into()));
        self
    }

    /// Add a `Pull`.
    #[must_use]
    pub fn pull(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Pull(path.into(), value.into()));
        self
    }

    /// Add a `PullWhere`.
    #[must_use]
    pub fn pull_where(mut self, path: impl Into<String>, filter: Filter) -> Self {
        self.ops.push(UpdateOp::PullWhere(path.into(), filter));
        self
    }

    /// Add an `Inc`.
    #[must_use]
    pub fn inc(mut self, path: impl Into<String>, by: i64) -> Self {
        self.ops.push(UpdateOp::Inc(path.into(), by));
        self
    }

    /// Whether the update has no operators.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply every operator in order.
    ///
    /// # Errors
    ///
    /// Fails when an operator meets a value of the wrong type, leaving the
    /// document partially updated; callers apply updates to copies.
    pub fn apply(&self, doc: &mut Document) -> StoreResult<()> {
        for op in &self.ops {
            match op {
                UpdateOp::Set(path, value) => doc.set_path(path, value.clone())?,
                UpdateOp::Unset(path) => {
                    doc.remove_path(path);
                }
                UpdateOp::Push(path, value) => array_at(doc, path)?.push(value.clone()),
                UpdateOp::AddToSet(path, value) => {
                    let items = array_at(doc, path)?;
                    if !items.iter().any(|i| i.loose_eq(value)) {
                        items.push(value.clone());
                    }
                }
                UpdateOp::Pull(path, value) => {
                    if doc.get_path(path).is_some() {
                        array_at(doc, path)?.retain(|i| !i.loose_eq(value));
                    }
                }
                UpdateOp::PullWhere(path, filter) => {
                    if doc.get_path(path).is_some() {
                        array_at(doc, path)?
                            .retain(|i| !i.as_document().is_some_and(|d| filter.matches(d)));
                    }
                }
                UpdateOp::Inc(path, by) => {
                    let next = match doc.get_path(path) {
                        None | Some(Value::Null) => Value::Integer(*by),
                        Some(Value::Integer(n)) => Value::Integer(n.saturating_add(*by)),
                        #[allow(clippy::cast_precision_loss)]
                        Some(Value::Float(f)) => Value::Float(f + *by as f64),
                        Some(other) => {
                            return Err(StoreError::invalid_update(
                                path.clone(),
                                format!("cannot increment {}", other.type_name()),
                            ))
                        }
                    };
                    doc.set_path(path, next)?;
                }
            }
        }
        Ok(())
    }
}

fn array_at<'a>(doc: &'a mut Document, path: &str) -> StoreResult<&'a mut Vec<Value>> {
    if doc.get_path(path).is_none() {
        doc.set_path(path, Value::Array(Vec::new()))?;
    }
    let slot = doc
        .get_path_mut(path)
        .ok_or_else(|| StoreError::invalid_update(path, "path not reachable"))?;
    let type_name = slot.type_name();
    slot.as_array_mut()
        .ok_or_else(|| StoreError::invalid_update(path, format!("expected array, found {type_name}")))
}
