//! Jobs: analysis runs reading and writing files.

use std::sync::Arc;

use catalogdb_store::{DocumentStore, Filter, FindOptions, SessionId};
use tracing::info;

use super::{uid_of, AdaptorCore, EntityAdaptor};
use crate::config::CatalogConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::model::{from_doc, to_doc, EntityRef, Job};
use crate::propagation::{ChangedEntity, PropagationContext, ReferenceHolder};
use crate::types::{fields, EntityKind, Uid};
use crate::utils::CatalogUtils;
use crate::versioned::VersionedStore;

/// Job operations. Jobs are not versioned and keep unpinned file
/// references, so a referenced file can never be deleted.
#[derive(Debug, Clone)]
pub struct JobAdaptor {
    core: AdaptorCore,
    files: VersionedStore,
}

fn uses_file(uid: Uid) -> Filter {
    Filter::Or(vec![Filter::eq("input.uid", uid), Filter::eq("output.uid", uid)])
}

impl JobAdaptor {
    pub(crate) fn new(
        store: &Arc<dyn DocumentStore>,
        utils: &CatalogUtils,
        config: &CatalogConfig,
    ) -> Self {
        Self {
            core: AdaptorCore::new(EntityKind::Job, store, utils, config),
            files: VersionedStore::new(EntityKind::File, store.clone(), utils.clone()),
        }
    }

    fn resolve(
        &self,
        session: SessionId,
        study_uid: Uid,
        refs: &[EntityRef],
    ) -> CatalogResult<Vec<EntityRef>> {
        refs.iter()
            .map(|r| {
                let filter = Filter::And(vec![
                    Filter::eq(fields::STUDY_UID, study_uid),
                    Filter::eq(fields::ID, r.id.as_str()),
                ]);
                let doc = self
                    .files
                    .find_live(Some(session), &filter, &FindOptions::default())?
                    .into_iter()
                    .next()
                    .ok_or_else(|| CatalogError::not_found("file", r.id.as_str()))?;
                Ok(EntityRef {
                    uid: uid_of(&doc),
                    id: r.id.clone(),
                })
            })
            .collect()
    }

    /// Creates a job. Input and output files are given by id.
    ///
    /// # Errors
    ///
    /// `AlreadyExists`, or `NotFound` for an unknown file.
    pub fn create(&self, study_uid: Uid, job: &Job) -> CatalogResult<Job> {
        let core = &self.core;
        let created = core.write(study_uid, |ctx| {
            core.ensure_id_free(Some(ctx.session), study_uid, &job.id)?;
            let mut new = job.clone();
            new.uid = core.versioned.next_uid();
            new.study_uid = study_uid;
            new.input = self.resolve(ctx.session, study_uid, &job.input)?;
            new.output = self.resolve(ctx.session, study_uid, &job.output)?;
            let doc = core.versioned.insert(ctx.session, to_doc(&new)?, ctx.release)?;
            from_doc::<Job>(&doc)
        })?;
        info!(target: "catalogdb::adaptor", job = %created.id, tool = %created.tool, "job created");
        Ok(created)
    }

    /// Deletes a job, releasing its files.
    ///
    /// # Errors
    ///
    /// `NotFound`.
    pub fn delete(&self, study_uid: Uid, id: &str) -> CatalogResult<usize> {
        let core = &self.core;
        core.write(study_uid, |ctx| {
            let current = core.live_by_id(Some(ctx.session), study_uid, id)?;
            core.versioned.delete(ctx.session, uid_of(&current))
        })
    }
}

impl EntityAdaptor for JobAdaptor {
    type Entity = Job;

    fn core(&self) -> &AdaptorCore {
        &self.core
    }
}

impl ReferenceHolder for JobAdaptor {
    fn kind(&self) -> EntityKind {
        EntityKind::Job
    }

    /// File references carry no version.
    fn refresh_references(
        &self,
        _ctx: &PropagationContext,
        _changed: &ChangedEntity,
    ) -> CatalogResult<usize> {
        Ok(0)
    }

    fn remove_references(
        &self,
        ctx: &PropagationContext,
        source: EntityKind,
        uid: Uid,
    ) -> CatalogResult<usize> {
        if let Some(job) = self.referencing(Some(ctx.session), source, uid)?.first() {
            return Err(CatalogError::in_use(
                source.name(),
                uid.to_string(),
                format!("used by job {job}"),
            ));
        }
        Ok(0)
    }

    fn referencing(
        &self,
        session: Option<SessionId>,
        _source: EntityKind,
        uid: Uid,
    ) -> CatalogResult<Vec<String>> {
        Ok(self
            .core
            .versioned
            .find_live(session, &uses_file(uid), &FindOptions::default())?
            .iter()
            .filter_map(|d| d.get_str(fields::ID).map(str::to_string))
            .collect())
    }
}
