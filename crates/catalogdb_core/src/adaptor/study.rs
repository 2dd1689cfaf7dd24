//! Studies: groups, study level ACLs and variable sets.

use std::sync::Arc;

use catalogdb_store::{DocumentStore, Filter, FindOptions};
use tracing::info;

use super::{merge_model, AdaptorCore};
use crate::authorization::{ADMINS, MEMBERS};
use crate::config::CatalogConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::model::{from_doc, to_doc, Group, Project, Study, VariableSet};
use crate::types::{fields, EntityKind, Uid};
use crate::utils::CatalogUtils;
use crate::versioned::Mutation;

/// Study operations.
#[derive(Debug, Clone)]
pub struct StudyAdaptor {
    core: AdaptorCore,
}

fn ensure_group<'a>(study: &'a mut Study, id: &str) -> &'a mut Group {
    if let Some(index) = study.groups.iter().position(|g| g.id == id) {
        return &mut study.groups[index];
    }
    study.groups.push(Group {
        id: id.to_string(),
        user_ids: Vec::new(),
    });
    let last = study.groups.len() - 1;
    &mut study.groups[last]
}

fn add_users(group: &mut Group, users: &[&str]) {
    for user in users {
        if !group.user_ids.iter().any(|u| u == user) {
            group.user_ids.push((*user).to_string());
        }
    }
}

impl StudyAdaptor {
    pub(crate) fn new(
        store: &Arc<dyn DocumentStore>,
        utils: &CatalogUtils,
        config: &CatalogConfig,
    ) -> Self {
        Self {
            core: AdaptorCore::new(EntityKind::Study, store, utils, config),
        }
    }

    /// Creates a study in the project with id `project_id`. The owner joins
    /// `@members`; `@admins` starts empty.
    ///
    /// # Errors
    ///
    /// `NotFound` for the project, `AlreadyExists` when the project has a
    /// live study with the same id.
    pub fn create(&self, project_id: &str, study: &Study) -> CatalogResult<Study> {
        if study.id.trim().is_empty() {
            return Err(CatalogError::invalid_argument("study id must not be empty"));
        }
        let core = &self.core;
        let created = core.runner.run(|session| {
            let project_doc = core
                .projects
                .find_live(Some(session), &Filter::eq(fields::ID, project_id), &FindOptions::default())?
                .into_iter()
                .next()
                .ok_or_else(|| CatalogError::not_found("project", project_id))?;
            let project: Project = from_doc(&project_doc)?;
            let taken = Filter::And(vec![
                Filter::eq("_projectUid", project.uid),
                Filter::eq(fields::ID, study.id.as_str()),
            ]);
            if core.studies.count_live(Some(session), &taken)? > 0 {
                return Err(CatalogError::already_exists("study", &study.id));
            }

            let mut study = study.clone();
            study.uid = core.studies.next_uid();
            study.project_uid = project.uid;
            let owner = study.owner.clone();
            add_users(ensure_group(&mut study, MEMBERS), &[owner.as_str()]);
            ensure_group(&mut study, ADMINS);
            let doc = core
                .studies
                .insert(session, to_doc(&study)?, project.current_release)?;
            from_doc::<Study>(&doc)
        })?;
        info!(target: "catalogdb::adaptor", study = %created.id, uid = %created.uid, "study created");
        Ok(created)
    }

    /// The live study with `uid`.
    ///
    /// # Errors
    ///
    /// `NotFound`.
    pub fn get(&self, uid: Uid) -> CatalogResult<Study> {
        self.core.study(None, uid)
    }

    /// Current release of the study's project.
    ///
    /// # Errors
    ///
    /// `NotFound`.
    pub fn current_release(&self, uid: Uid) -> CatalogResult<u32> {
        self.core.release(None, uid)
    }

    fn modify(
        &self,
        uid: Uid,
        change: impl Fn(&mut Study) -> CatalogResult<()>,
    ) -> CatalogResult<Study> {
        let mutation = Mutation::versioned(|doc| {
            let mut study: Study = from_doc(doc)?;
            change(&mut study)?;
            merge_model(doc, &study)
        });
        let core = &self.core;
        let outcome = core.runner.run(|session| {
            core.studies.update_single(
                session,
                &Filter::eq(fields::UID, uid),
                core.release(Some(session), uid)?,
                &mutation,
            )
        })?;
        from_doc(&outcome.document)
    }

    /// Adds users to a group, creating it if needed. Users also join
    /// `@members`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for group ids not starting with `@`.
    pub fn add_group_members(&self, uid: Uid, group: &str, users: &[&str]) -> CatalogResult<Study> {
        if !group.starts_with('@') {
            return Err(CatalogError::invalid_argument(format!(
                "group id '{group}' must start with '@'"
            )));
        }
        self.modify(uid, |study| {
            add_users(ensure_group(study, group), users);
            add_users(ensure_group(study, MEMBERS), users);
            Ok(())
        })
    }

    /// Replaces the study level permissions of `member`, e.g.
    /// `["VIEW_SAMPLES", "WRITE_SAMPLES"]`.
    ///
    /// # Errors
    ///
    /// `NotFound`.
    pub fn set_acl(&self, uid: Uid, member: &str, permissions: &[&str]) -> CatalogResult<Study> {
        let prefix = format!("{member}__");
        self.modify(uid, |study| {
            study.acl.retain(|e| !e.starts_with(&prefix));
            study
                .acl
                .extend(permissions.iter().map(|p| format!("{prefix}{p}")));
            Ok(())
        })
    }

    /// Declares a variable set for annotations.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` when the study has a set with the same id.
    pub fn add_variable_set(&self, uid: Uid, set: &VariableSet) -> CatalogResult<Study> {
        self.modify(uid, |study| {
            if study.variable_sets.iter().any(|s| s.id == set.id) {
                return Err(CatalogError::already_exists("variable set", &set.id));
            }
            study.variable_sets.push(set.clone());
            Ok(())
        })
    }
}
