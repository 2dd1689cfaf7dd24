//! Projects and studies: the scopes everything else lives in.

use serde::{Deserialize, Serialize};

use super::common::{Attributes, Internal, Status, VariableSet};
use crate::types::Uid;

fn first_release() -> u32 {
    1
}

/// Top level container; owns the release counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Catalog uid.
    #[serde(rename = "_uid", default)]
    pub uid: Uid,
    /// Id, unique among live projects.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Release new versions are stamped with.
    #[serde(default = "first_release")]
    pub current_release: u32,
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
}

impl Project {
    /// A new project at release 1.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            uid: Uid::default(),
            id: id.into(),
            name: String::new(),
            current_release: first_release(),
            status: Status::default(),
            internal: Internal::default(),
            creation_date: String::new(),
            modification_date: String::new(),
            attributes: Attributes::new(),
        }
    }
}

/// A named set of users within a study.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Group id, always starting with `@`.
    pub id: String,
    /// Member user ids.
    #[serde(default)]
    pub user_ids: Vec<String>,
}

/// Authorization and id scope for samples, individuals, families, files,
/// datasets and jobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Study {
    /// Catalog uid.
    #[serde(rename = "_uid", default)]
    pub uid: Uid,
    /// Id, unique among live studies of the project.
    pub id: String,
    /// Owning project.
    #[serde(rename = "_projectUid", default)]
    pub project_uid: Uid,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// User with every permission.
    #[serde(rename = "_ownerId", default)]
    pub owner: String,
    /// Groups, including `@members` and `@admins`.
    #[serde(default)]
    pub groups: Vec<Group>,
    /// Study level ACL entries, `member__VIEW_SAMPLES` style.
    #[serde(rename = "_acl", default)]
    pub acl: Vec<String>,
    /// Annotation schemas.
    #[serde(default)]
    pub variable_sets: Vec<VariableSet>,
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
}

impl Study {
    /// A new study owned by `owner`.
    #[must_use]
    pub fn new(id: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner: owner.into(),
            ..Self::default()
        }
    }

    /// Looks up a group by id.
    #[must_use]
    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// Ids of the groups `user` belongs to.
    #[must_use]
    pub fn groups_of(&self, user: &str) -> Vec<&str> {
        self.groups
            .iter()
            .filter(|g| g.user_ids.iter().any(|u| u == user))
            .map(|g| g.id.as_str())
            .collect()
    }
}
