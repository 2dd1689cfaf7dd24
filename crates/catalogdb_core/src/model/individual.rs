//! Clinical entities: samples, individuals and families.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::common::{AnnotationSet, Attributes, EntityRef, Internal, PinnedRef, Status};
use crate::pedigree::Relation;
use crate::types::Uid;

/// Recorded sex of an individual.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sex {
    /// Male.
    Male,
    /// Female.
    Female,
    /// Not recorded.
    #[default]
    Unknown,
}

impl Sex {
    /// Stored form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "MALE",
            Self::Female => "FEMALE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// A biological sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    /// Catalog uid, assigned on create.
    #[serde(rename = "_uid", default)]
    pub uid: Uid,
    /// Id, unique among live samples of the study.
    pub id: String,
    /// Owning study.
    #[serde(rename = "_studyUid", default)]
    pub study_uid: Uid,
    /// Version number.
    #[serde(default)]
    pub version: u32,
    /// Release the version was created in.
    #[serde(default)]
    pub release: u32,
    /// Free text.
    #[serde(default)]
    pub description: String,
    /// Individual the sample was taken from, maintained by the individual.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub individual: Option<EntityRef>,
    /// Whether the sample is somatic.
    #[serde(default)]
    pub somatic: bool,
    /// Business status.
    #[serde(default)]
    pub status: Status,
    /// Lifecycle status.
    #[serde(default)]
    pub internal: Internal,
    /// Creation timestamp.
    #[serde(default)]
    pub creation_date: String,
    /// Modification timestamp.
    #[serde(default)]
    pub modification_date: String,
    /// Annotations.
    #[serde(default)]
    pub annotation_sets: Vec<AnnotationSet>,
    /// Free-form attributes.
    #[serde(default)]
    pub attributes: Attributes,
    /// Entity level ACL entries.
    #[serde(rename = "_acl", default)]
    pub acl: Vec<String>,
}

impl Sample {
    /// A new sample with the given id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// A person.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Individual {
    /// Catalog uid.
    #[serde(rename = "_uid", default)]
    pub uid: Uid,
    /// Id, unique among live individuals of the study.
    pub id: String,
    /// Owning study.
    #[serde(rename = "_studyUid", default)]
    pub study_uid: Uid,
    /// Version number.
    #[serde(default)]
    pub version: u32,
    /// Release the version was created in.
    #[serde(default)]
    pub release: u32,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Recorded sex.
    #[serde(default)]
    pub sex: Sex,
    /// Father, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father: Option<EntityRef>,
    /// Mother, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mother: Option<EntityRef>,
    /// Samples taken from this individual, pinned.
    #[serde(default)]
    pub samples: Vec<PinnedRef>,
    /// Business status.
    #[serde(default)]
    pub status: Status,
    /// Lifecycle status.
    #[serde(default)]
    pub internal: Internal,
    /// Creation timestamp.
    #[serde(default)]
    pub creation_date: String,
    /// Modification timestamp.
    #[serde(default)]
    pub modification_date: String,
    /// Annotations.
    #[serde(default)]
    pub annotation_sets: Vec<AnnotationSet>,
    /// Free-form attributes.
    #[serde(default)]
    pub attributes: Attributes,
    /// Entity level ACL entries.
    #[serde(rename = "_acl", default)]
    pub acl: Vec<String>,
}

impl Individual {
    /// A new individual with the given id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// Computed pedigree roles: member id to relative id to relation.
pub type FamilyRoles = BTreeMap<String, BTreeMap<String, Relation>>;

/// A group of individuals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Family {
    /// Catalog uid.
    #[serde(rename = "_uid", default)]
    pub uid: Uid,
    /// Id, unique among live families of the study.
    pub id: String,
    /// Owning study.
    #[serde(rename = "_studyUid", default)]
    pub study_uid: Uid,
    /// Version number.
    #[serde(default)]
    pub version: u32,
    /// Release the version was created in.
    #[serde(default)]
    pub release: u32,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Members, each pinned to a version.
    #[serde(default)]
    pub members: Vec<PinnedRef>,
    /// Relations between members.
    #[serde(default)]
    pub roles: FamilyRoles,
    /// Locked families keep their pinned member versions.
    #[serde(default)]
    pub locked: bool,
    /// Business status.
    #[serde(default)]
    pub status: Status,
    /// Lifecycle status.
    #[serde(default)]
    pub internal: Internal,
    /// Creation timestamp.
    #[serde(default)]
    pub creation_date: String,
    /// Modification timestamp.
    #[serde(default)]
    pub modification_date: String,
    /// Annotations.
    #[serde(default)]
    pub annotation_sets: Vec<AnnotationSet>,
    /// Free-form attributes.
    #[serde(default)]
    pub attributes: Attributes,
    /// Entity level ACL entries.
    #[serde(rename = "_acl", default)]
    pub acl: Vec<String>,
}

impl Family {
    /// A new family with the given id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}
