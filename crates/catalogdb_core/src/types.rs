//! Core type definitions for CatalogDB.

use std::fmt;

use catalogdb_codec::Value;
use serde::{Deserialize, Serialize};

/// Immutable numeric identity of a catalog entity.
///
/// Uids come from a catalog-wide counter and are never reused, not even
/// after the entity is deleted.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Uid(pub u64);

impl Uid {
    /// Creates a uid.
    #[must_use]
    pub const fn new(uid: u64) -> Self {
        Self(uid)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Reads a uid stored in a document value.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        value
            .as_integer()
            .and_then(|n| u64::try_from(n).ok())
            .map(Self)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uid:{}", self.0)
    }
}

impl From<Uid> for Value {
    fn from(uid: Uid) -> Self {
        Value::from(uid.0)
    }
}

/// Entity types managed by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    /// Top-level container of studies; owns the release counter.
    Project,
    /// Authorization and id scope for everything below it.
    Study,
    /// A biological sample.
    Sample,
    /// A person, optionally linked to parents and samples.
    Individual,
    /// A group of individuals with computed pedigree roles.
    Family,
    /// A registered data file.
    File,
    /// A curated set of files.
    Dataset,
    /// An analysis run consuming and producing files.
    Job,
}

impl EntityKind {
    /// Lowercase name, also the live collection name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Study => "study",
            Self::Sample => "sample",
            Self::Individual => "individual",
            Self::Family => "family",
            Self::File => "file",
            Self::Dataset => "dataset",
            Self::Job => "job",
        }
    }

    /// Whether content updates create new versions.
    #[must_use]
    pub const fn is_versioned(self) -> bool {
        !matches!(self, Self::Project | Self::Study | Self::Job)
    }

    /// Suffix of study-level permissions for this kind, e.g. `VIEW_SAMPLES`.
    #[must_use]
    pub const fn permission_suffix(self) -> &'static str {
        match self {
            Self::Project => "PROJECTS",
            Self::Study => "STUDIES",
            Self::Sample => "SAMPLES",
            Self::Individual => "INDIVIDUALS",
            Self::Family => "FAMILIES",
            Self::File => "FILES",
            Self::Dataset => "DATASETS",
            Self::Job => "JOBS",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stored field names shared by every entity document.
pub mod fields {
    /// Private uid key.
    pub const UID: &str = "_uid";
    /// Private parent study key.
    pub const STUDY_UID: &str = "_studyUid";
    /// Human readable id.
    pub const ID: &str = "id";
    /// Version number.
    pub const VERSION: &str = "version";
    /// Release the version was created in.
    pub const RELEASE: &str = "release";
    /// Releases at which this version was the current one.
    pub const RELEASE_FROM_VERSION: &str = "_releaseFromVersion";
    /// Newest version of the entity.
    pub const LAST_OF_VERSION: &str = "_lastOfVersion";
    /// Newest version within each release it belongs to.
    pub const LAST_OF_RELEASE: &str = "_lastOfRelease";
    /// Entity level ACL entries, `member__PERMISSION`.
    pub const ACL: &str = "_acl";
    /// Creation timestamp.
    pub const CREATION_DATE: &str = "creationDate";
    /// Modification timestamp.
    pub const MODIFICATION_DATE: &str = "modificationDate";
    /// Business status id.
    pub const STATUS_ID: &str = "status.id";
    /// Lifecycle status document.
    pub const INTERNAL_STATUS: &str = "internal.status";
    /// Lifecycle status id.
    pub const INTERNAL_STATUS_ID: &str = "internal.status.id";
    /// Propagation exemption flag.
    pub const LOCKED: &str = "locked";
    /// Annotation set sub-documents.
    pub const ANNOTATION_SETS: &str = "annotationSets";
}

/// Status identifiers.
pub mod status {
    /// Usable entity.
    pub const READY: &str = "READY";
    /// Deleted entity; only found in deleted collections.
    pub const DELETED: &str = "DELETED";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_value_round_trip() {
        let uid = Uid::new(42);
        assert_eq!(Uid::from_value(&Value::from(uid)), Some(uid));
        assert_eq!(Uid::from_value(&Value::Integer(-1)), None);
        assert_eq!(uid.to_string(), "uid:42");
    }

    #[test]
    fn only_leaf_entities_are_versioned() {
        assert!(EntityKind::Sample.is_versioned());
        assert!(EntityKind::Family.is_versioned());
        assert!(!EntityKind::Study.is_versioned());
        assert!(!EntityKind::Job.is_versioned());
        assert_eq!(EntityKind::Family.permission_suffix(), "FAMILIES");
    }
}
