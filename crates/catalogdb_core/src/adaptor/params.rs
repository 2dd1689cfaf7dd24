//! Typed update parameters.
//!
//! `None` leaves a field untouched. Attributes are merged key by key and
//! annotation sets replace the set with the same id.

use crate::model::{AnnotationSet, Attributes, Sex};

/// Changes to a sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleUpdateParams {
    /// New id; must be free in the study.
    pub id: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New somatic flag.
    pub somatic: Option<bool>,
    /// New business status id.
    pub status: Option<String>,
    /// Attributes to set.
    pub attributes: Option<Attributes>,
    /// Annotation sets to add or replace.
    pub annotation_sets: Option<Vec<AnnotationSet>>,
}

/// Changes to an individual.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndividualUpdateParams {
    /// New id; must be free in the study.
    pub id: Option<String>,
    /// New display name.
    pub name: Option<String>,
    /// New sex.
    pub sex: Option<Sex>,
    /// New father id; `Some(None)` clears it.
    pub father: Option<Option<String>>,
    /// New mother id; `Some(None)` clears it.
    pub mother: Option<Option<String>>,
    /// Replacement list of sample ids.
    pub samples: Option<Vec<String>>,
    /// New business status id.
    pub status: Option<String>,
    /// Attributes to set.
    pub attributes: Option<Attributes>,
    /// Annotation sets to add or replace.
    pub annotation_sets: Option<Vec<AnnotationSet>>,
}

/// Changes to a family.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FamilyUpdateParams {
    /// New id; must be free in the study.
    pub id: Option<String>,
    /// New display name.
    pub name: Option<String>,
    /// Replacement list of member ids, pinned at their latest versions.
    pub members: Option<Vec<String>>,
    /// New business status id.
    pub status: Option<String>,
    /// Attributes to set.
    pub attributes: Option<Attributes>,
    /// Annotation sets to add or replace.
    pub annotation_sets: Option<Vec<AnnotationSet>>,
}

/// Changes to a file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileUpdateParams {
    /// New name.
    pub name: Option<String>,
    /// New format.
    pub format: Option<String>,
    /// New size in bytes.
    pub size: Option<u64>,
    /// New business status id.
    pub status: Option<String>,
    /// Attributes to set.
    pub attributes: Option<Attributes>,
    /// Annotation sets to add or replace.
    pub annotation_sets: Option<Vec<AnnotationSet>>,
}

/// Changes to a dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetUpdateParams {
    /// New display name.
    pub name: Option<String>,
    /// Replacement list of file ids, pinned at their latest versions.
    pub files: Option<Vec<String>>,
    /// New business status id.
    pub status: Option<String>,
    /// Attributes to set.
    pub attributes: Option<Attributes>,
}
