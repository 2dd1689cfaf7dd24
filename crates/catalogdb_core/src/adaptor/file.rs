//! Files.

use std::sync::Arc;

use catalogdb_store::{DocumentStore, Filter};
use tracing::info;

use super::params::FileUpdateParams;
use super::{apply_common, uid_of, AdaptorCore, EntityAdaptor};
use crate::config::CatalogConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::model::{from_doc, to_doc, File};
use crate::propagation::{ChangedEntity, ReferencePropagator};
use crate::types::{fields, EntityKind, Uid};
use crate::utils::CatalogUtils;
use crate::versioned::Mutation;

/// File operations. Datasets pin files; jobs reference them by uid.
#[derive(Debug, Clone)]
pub struct FileAdaptor {
    core: AdaptorCore,
    propagator: ReferencePropagator,
}

impl FileAdaptor {
    pub(crate) fn new(
        store: &Arc<dyn DocumentStore>,
        utils: &CatalogUtils,
        config: &CatalogConfig,
        propagator: ReferencePropagator,
    ) -> Self {
        Self {
            core: AdaptorCore::new(EntityKind::File, store, utils, config),
            propagator,
        }
    }

    /// Registers a file. Its id is its path.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` when the path is taken.
    pub fn create(&self, study_uid: Uid, file: &File) -> CatalogResult<File> {
        let core = &self.core;
        let created = core.write(study_uid, |ctx| {
            let mut new = file.clone();
            if new.id.is_empty() {
                new.id.clone_from(&new.path);
            }
            core.ensure_id_free(Some(ctx.session), study_uid, &new.id)?;
            new.uid = core.versioned.next_uid();
            new.study_uid = study_uid;
            let doc = core.versioned.insert(ctx.session, to_doc(&new)?, ctx.release)?;
            from_doc::<File>(&doc)
        })?;
        info!(target: "catalogdb::adaptor", file = %created.id, uid = %created.uid, "file registered");
        Ok(created)
    }

    /// Applies `params` as a new version and refreshes the datasets that pin
    /// the file.
    ///
    /// # Errors
    ///
    /// `NotFound`.
    pub fn update(
        &self,
        study_uid: Uid,
        id: &str,
        params: &FileUpdateParams,
    ) -> CatalogResult<File> {
        let core = &self.core;
        let mutation = Mutation::versioned(|doc| {
            if let Some(name) = &params.name {
                doc.insert("name", name.as_str());
            }
            if let Some(format) = &params.format {
                doc.insert("format", format.as_str());
            }
            if let Some(size) = params.size {
                doc.insert("size", size);
            }
            apply_common(
                doc,
                params.status.as_deref(),
                params.attributes.as_ref(),
                params.annotation_sets.as_deref(),
            )
        });
        let outcome = core.write(study_uid, |ctx| {
            let current = core.live_by_id(Some(ctx.session), study_uid, id)?;
            let outcome = core.versioned.update_single(
                ctx.session,
                &Filter::eq(fields::UID, uid_of(&current)),
                ctx.release,
                &mutation,
            )?;
            if outcome.bumped() {
                self.propagator.propagate(
                    ctx,
                    &ChangedEntity {
                        kind: EntityKind::File,
                        uid: outcome.uid,
                        id: outcome.id.clone(),
                        version: outcome.version,
                    },
                )?;
            }
            Ok(outcome)
        })?;
        from_doc(&outcome.document)
    }

    /// Deletes a file with its whole history. Returns the number of
    /// versions moved.
    ///
    /// Jobs always block the deletion. Datasets block it unless `force`, in
    /// which case they drop the file first.
    ///
    /// # Errors
    ///
    /// `NotFound`, `InUse`.
    pub fn delete(&self, study_uid: Uid, id: &str, force: bool) -> CatalogResult<usize> {
        let core = &self.core;
        core.write(study_uid, |ctx| {
            let current = core.live_by_id(Some(ctx.session), study_uid, id)?;
            let uid = uid_of(&current);
            let references = self
                .propagator
                .references(Some(ctx.session), EntityKind::File, uid)?;
            let blocking = references
                .iter()
                .find(|(kind, _)| !force || *kind == EntityKind::Job);
            if let Some((kind, holder)) = blocking {
                return Err(CatalogError::in_use(
                    EntityKind::File.name(),
                    id,
                    format!("referenced by {kind} {holder}"),
                ));
            }
            if !references.is_empty() {
                self.propagator.detach(ctx, EntityKind::File, uid)?;
            }
            core.versioned.delete(ctx.session, uid)
        })
    }
}

impl EntityAdaptor for FileAdaptor {
    type Entity = File;

    fn core(&self) -> &AdaptorCore {
        &self.core
    }
}
