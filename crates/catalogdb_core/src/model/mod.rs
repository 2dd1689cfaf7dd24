//! Typed entity models.
//!
//! Models are plain values. Adaptors convert them to documents on the way in
//! and back on the way out; the versioned store only ever sees documents.

mod common;
mod file;
mod individual;
mod study;

pub use common::{
    AnnotationSet, Attributes, EntityRef, Internal, PinnedRef, Status, Variable, VariableSet,
    VariableType,
};
pub use file::{Dataset, File, Job};
pub use individual::{Family, FamilyRoles, Individual, Sample, Sex};
pub use study::{Group, Project, Study};

use catalogdb_codec::{from_document, to_document, Document, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CatalogResult;

/// Serializes a model into a document.
pub(crate) fn to_doc<T: Serialize>(model: &T) -> CatalogResult<Document> {
    Ok(to_document(model)?)
}

/// Reads a model back from a document, ignoring bookkeeping fields the
/// model does not declare.
pub(crate) fn from_doc<T: DeserializeOwned>(doc: &Document) -> CatalogResult<T> {
    Ok(from_document(doc)?)
}

/// Serializes a list of models into array elements.
pub(crate) fn to_values<T: Serialize>(models: &[T]) -> CatalogResult<Vec<Value>> {
    models
        .iter()
        .map(|m| to_doc(m).map(Value::from))
        .collect()
}
