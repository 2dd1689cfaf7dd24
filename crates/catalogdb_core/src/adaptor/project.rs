//! Projects and the release counter.

use std::sync::Arc;

use catalogdb_store::{DocumentStore, Filter, FindOptions, SessionId};
use tracing::info;

use super::{uid_of, AdaptorCore};
use crate::config::CatalogConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::model::{from_doc, to_doc, Project};
use crate::types::{fields, EntityKind, Uid};
use crate::utils::CatalogUtils;
use crate::versioned::{Mutation, VersionedStore};

/// Kinds whose documents carry release bookkeeping per study.
const RELEASED_KINDS: [EntityKind; 5] = [
    EntityKind::Sample,
    EntityKind::Individual,
    EntityKind::Family,
    EntityKind::File,
    EntityKind::Dataset,
];

/// Project operations.
#[derive(Debug, Clone)]
pub struct ProjectAdaptor {
    core: AdaptorCore,
    released: Vec<VersionedStore>,
}

impl ProjectAdaptor {
    pub(crate) fn new(
        store: &Arc<dyn DocumentStore>,
        utils: &CatalogUtils,
        config: &CatalogConfig,
    ) -> Self {
        Self {
            core: AdaptorCore::new(EntityKind::Project, store, utils, config),
            released: RELEASED_KINDS
                .iter()
                .map(|kind| VersionedStore::new(*kind, store.clone(), utils.clone()))
                .collect(),
        }
    }

    fn live(&self, session: Option<SessionId>, id: &str) -> CatalogResult<Project> {
        let doc = self
            .core
            .versioned
            .find_live(session, &Filter::eq(fields::ID, id), &FindOptions::default())?
            .into_iter()
            .next()
            .ok_or_else(|| CatalogError::not_found("project", id))?;
        from_doc(&doc)
    }

    /// Creates a project; ids are unique among live projects.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` or `InvalidArgument` for an empty id.
    pub fn create(&self, project: &Project) -> CatalogResult<Project> {
        if project.id.trim().is_empty() {
            return Err(CatalogError::invalid_argument("project id must not be empty"));
        }
        let versioned = &self.core.versioned;
        self.core.runner.run(|session| {
            if versioned.count_live(Some(session), &Filter::eq(fields::ID, project.id.as_str()))? > 0 {
                return Err(CatalogError::already_exists("project", &project.id));
            }
            let mut project = project.clone();
            project.uid = versioned.next_uid();
            project.current_release = project.current_release.max(1);
            let doc = versioned.insert(session, to_doc(&project)?, project.current_release)?;
            from_doc(&doc)
        })
    }

    /// The live project with `id`.
    ///
    /// # Errors
    ///
    /// `NotFound`.
    pub fn get(&self, id: &str) -> CatalogResult<Project> {
        self.live(None, id)
    }

    /// Starts the next release: new versions get the new number and every
    /// version current in the previous release stays visible at the new
    /// snapshot. Returns the new release.
    ///
    /// # Errors
    ///
    /// `NotFound`, or store errors.
    pub fn increment_release(&self, id: &str) -> CatalogResult<u32> {
        let core = &self.core;
        let release = core.runner.run(|session| {
            let project = self.live(Some(session), id)?;
            let release = project.current_release + 1;
            let mutation = Mutation::versioned(|doc| {
                doc.insert("currentRelease", release);
                Ok(())
            });
            core.versioned.update_single(
                session,
                &Filter::eq(fields::UID, project.uid),
                release,
                &mutation,
            )?;

            let studies = core.studies.find_live(
                Some(session),
                &Filter::eq("_projectUid", project.uid),
                &FindOptions::default(),
            )?;
            for study in &studies {
                let study_uid: Uid = uid_of(study);
                for versioned in &self.released {
                    versioned.update_release(session, study_uid, release)?;
                }
            }
            Ok(release)
        })?;
        info!(target: "catalogdb::adaptor", project = id, release, "release incremented");
        Ok(release)
    }
}
