//! Datasets: curated, version pinned sets of files.

use std::sync::Arc;

use catalogdb_codec::{Document, Value};
use catalogdb_store::{DocumentStore, Filter, FindOptions, SessionId};
use tracing::info;

use super::params::DatasetUpdateParams;
use super::{apply_common, pin_live, uid_of, AdaptorCore, EntityAdaptor};
use crate::config::CatalogConfig;
use crate::error::CatalogResult;
use crate::model::{from_doc, to_doc, to_values, Dataset, PinnedRef};
use crate::propagation::{ChangedEntity, PropagationContext, ReferenceHolder};
use crate::types::{fields, EntityKind, Uid};
use crate::utils::CatalogUtils;
use crate::versioned::{Mutation, VersionedStore};

const FILES: &str = "files";
const FILE_UID: &str = "files.uid";

/// Dataset operations.
#[derive(Debug, Clone)]
pub struct DatasetAdaptor {
    core: AdaptorCore,
    files: VersionedStore,
}

fn files_of(doc: &Document) -> CatalogResult<Vec<PinnedRef>> {
    doc.get_array(FILES)
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_document)
        .map(from_doc)
        .collect()
}

impl DatasetAdaptor {
    pub(crate) fn new(
        store: &Arc<dyn DocumentStore>,
        utils: &CatalogUtils,
        config: &CatalogConfig,
    ) -> Self {
        Self {
            core: AdaptorCore::new(EntityKind::Dataset, store, utils, config),
            files: VersionedStore::new(EntityKind::File, store.clone(), utils.clone()),
        }
    }

    /// Creates a dataset. Files are given by id and pinned at their latest
    /// versions.
    ///
    /// # Errors
    ///
    /// `AlreadyExists`, or `NotFound` for an unknown file.
    pub fn create(&self, study_uid: Uid, dataset: &Dataset) -> CatalogResult<Dataset> {
        let core = &self.core;
        let created = core.write(study_uid, |ctx| {
            core.ensure_id_free(Some(ctx.session), study_uid, &dataset.id)?;
            let mut new = dataset.clone();
            new.uid = core.versioned.next_uid();
            new.study_uid = study_uid;
            let ids: Vec<String> = dataset.files.iter().map(|f| f.id.clone()).collect();
            new.files = pin_live(&self.files, Some(ctx.session), study_uid, &ids)?;
            let doc = core.versioned.insert(ctx.session, to_doc(&new)?, ctx.release)?;
            from_doc::<Dataset>(&doc)
        })?;
        info!(
            target: "catalogdb::adaptor",
            dataset = %created.id,
            files = created.files.len(),
            "dataset created"
        );
        Ok(created)
    }

    /// Applies `params` as a new version.
    ///
    /// # Errors
    ///
    /// `NotFound` for the dataset or a listed file.
    pub fn update(
        &self,
        study_uid: Uid,
        id: &str,
        params: &DatasetUpdateParams,
    ) -> CatalogResult<Dataset> {
        let core = &self.core;
        let outcome = core.write(study_uid, |ctx| {
            let current = core.live_by_id(Some(ctx.session), study_uid, id)?;
            let files = params
                .files
                .as_ref()
                .map(|ids| pin_live(&self.files, Some(ctx.session), study_uid, ids))
                .transpose()?;
            let mutation = Mutation::versioned(|doc| {
                if let Some(name) = &params.name {
                    doc.insert("name", name.as_str());
                }
                if let Some(files) = &files {
                    doc.insert(FILES, to_values(files)?);
                }
                apply_common(doc, params.status.as_deref(), params.attributes.as_ref(), None)
            });
            core.versioned.update_single(
                ctx.session,
                &Filter::eq(fields::UID, uid_of(&current)),
                ctx.release,
                &mutation,
            )
        })?;
        from_doc(&outcome.document)
    }

    /// Deletes the dataset with its whole history. Returns the number of
    /// versions moved.
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

impl EntityAdaptor for DatasetAdaptor {
    type Entity = Dataset;

    fn core(&self) -> &AdaptorCore {
        &self.core
    }
}

impl ReferenceHolder for DatasetAdaptor {
    fn kind(&self) -> EntityKind {
        EntityKind::Dataset
    }

    fn refresh_references(
        &self,
        ctx: &PropagationContext,
        changed: &ChangedEntity,
    ) -> CatalogResult<usize> {
        let filter = Filter::And(vec![
            Filter::eq(FILE_UID, changed.uid),
            Filter::ne(fields::LOCKED, true),
        ]);
        let mutation = Mutation::versioned(|doc| {
            let mut files = files_of(doc)?;
            for file in files.iter_mut().filter(|f| f.uid == changed.uid) {
                file.id.clone_from(&changed.id);
                file.version = changed.version;
            }
            doc.insert(FILES, to_values(&files)?);
            Ok(())
        });
        let outcomes = self
            .core
            .versioned
            .update(ctx.session, &filter, ctx.release, &mutation)?;
        Ok(outcomes.iter().filter(|o| o.changed).count())
    }

    fn remove_references(
        &self,
        ctx: &PropagationContext,
        _source: EntityKind,
        uid: Uid,
    ) -> CatalogResult<usize> {
        let mutation = Mutation::versioned(|doc| {
            let files: Vec<PinnedRef> =
                files_of(doc)?.into_iter().filter(|f| f.uid != uid).collect();
            doc.insert(FILES, to_values(&files)?);
            Ok(())
        });
        let outcomes = self.core.versioned.update(
            ctx.session,
            &Filter::eq(FILE_UID, uid),
            ctx.release,
            &mutation,
        )?;
        Ok(outcomes.iter().filter(|o| o.changed).count())
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
            .find_live(session, &Filter::eq(FILE_UID, uid), &FindOptions::default())?
            .iter()
            .filter_map(|d| d.get_str(fields::ID).map(str::to_string))
            .collect())
    }
}
