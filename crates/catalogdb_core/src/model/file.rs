//! Files, datasets and the jobs that consume files.

use serde::{Deserialize, Serialize};

use super::common::{AnnotationSet, Attributes, EntityRef, Internal, PinnedRef, Status};
use crate::types::Uid;

/// A registered data file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    /// Catalog uid.
    #[serde(rename = "_uid", default)]
    pub uid: Uid,
    /// Id, unique among live files of the study.
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
    /// File name.
    #[serde(default)]
    pub name: String,
    /// Path relative to the study root.
    #[serde(default)]
    pub path: String,
    /// Format, e.g. `VCF`.
    #[serde(default)]
    pub format: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
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

impl File {
    /// A new file; the id defaults to the path.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            id: path.clone(),
            name,
            path,
            ..Self::default()
        }
    }
}

/// A curated set of files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// Catalog uid.
    #[serde(rename = "_uid", default)]
    pub uid: Uid,
    /// Id, unique among live datasets of the study.
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
    /// Files, each pinned to a version.
    #[serde(default)]
    pub files: Vec<PinnedRef>,
    /// Locked datasets keep their pinned file versions.
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
    /// Free-form attributes.
    #[serde(default)]
    pub attributes: Attributes,
    /// Entity level ACL entries.
    #[serde(rename = "_acl", default)]
    pub acl: Vec<String>,
}

impl Dataset {
    /// A new dataset with the given id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// An analysis run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Catalog uid.
    #[serde(rename = "_uid", default)]
    pub uid: Uid,
    /// Id, unique among live jobs of the study.
    pub id: String,
    /// Owning study.
    #[serde(rename = "_studyUid", default)]
    pub study_uid: Uid,
    /// Always 1; jobs are not versioned.
    #[serde(default)]
    pub version: u32,
    /// Release the job was created in.
    #[serde(default)]
    pub release: u32,
    /// Tool that ran.
    #[serde(default)]
    pub tool: String,
    /// Files read.
    #[serde(default)]
    pub input: Vec<EntityRef>,
    /// Files written.
    #[serde(default)]
    pub output: Vec<EntityRef>,
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
    /// Entity level ACL entries.
    #[serde(rename = "_acl", default)]
    pub acl: Vec<String>,
}

impl Job {
    /// A new job with the given id.
    #[must_use]
    pub fn new(id: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tool: tool.into(),
            ..Self::default()
        }
    }
}
