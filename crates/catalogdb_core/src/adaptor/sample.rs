//! Samples.

use std::sync::Arc;

use catalogdb_store::{DocumentStore, Filter};
use tracing::info;

use super::batch::{BatchResult, UNCHANGED};
use super::individual::IndividualAdaptor;
use super::params::SampleUpdateParams;
use super::{apply_common, uid_of, AdaptorCore, EntityAdaptor};
use crate::config::CatalogConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::model::{from_doc, to_doc, Sample};
use crate::propagation::{ChangedEntity, PropagationContext, ReferencePropagator};
use crate::query::Query;
use crate::types::{fields, EntityKind, Uid};
use crate::utils::CatalogUtils;
use crate::versioned::{Mutation, UpdateOutcome};

/// Sample operations. New sample versions are pushed to the individuals
/// pinning them.
#[derive(Debug, Clone)]
pub struct SampleAdaptor {
    core: AdaptorCore,
    propagator: ReferencePropagator,
    individuals: Arc<IndividualAdaptor>,
}

impl SampleAdaptor {
    pub(crate) fn new(
        store: &Arc<dyn DocumentStore>,
        utils: &CatalogUtils,
        config: &CatalogConfig,
        propagator: ReferencePropagator,
        individuals: Arc<IndividualAdaptor>,
    ) -> Self {
        Self {
            core: AdaptorCore::new(EntityKind::Sample, store, utils, config),
            propagator,
            individuals,
        }
    }

    /// Creates a sample. When `sample.individual` names an individual id,
    /// the sample is linked to it in the same transaction.
    ///
    /// # Errors
    ///
    /// `AlreadyExists`, or `NotFound` for an unknown individual.
    pub fn create(&self, study_uid: Uid, sample: &Sample) -> CatalogResult<Sample> {
        let core = &self.core;
        let created = core.write(study_uid, |ctx| {
            core.ensure_id_free(Some(ctx.session), study_uid, &sample.id)?;
            let mut new = sample.clone();
            new.uid = core.versioned.next_uid();
            new.study_uid = study_uid;
            new.individual = None;
            let mut doc = core.versioned.insert(ctx.session, to_doc(&new)?, ctx.release)?;
            if let Some(individual) = &sample.individual {
                let owner = self
                    .individuals
                    .attach_sample_in(ctx, study_uid, &individual.id, &doc)?;
                doc.insert("individual", to_doc(&owner)?);
            }
            from_doc::<Sample>(&doc)
        })?;
        info!(target: "catalogdb::adaptor", sample = %created.id, uid = %created.uid, "sample created");
        Ok(created)
    }

    fn update_in(
        &self,
        ctx: &PropagationContext,
        study_uid: Uid,
        id: &str,
        params: &SampleUpdateParams,
    ) -> CatalogResult<UpdateOutcome> {
        let core = &self.core;
        let current = core.live_by_id(Some(ctx.session), study_uid, id)?;
        if let Some(new_id) = params.id.as_deref().filter(|n| *n != id) {
            core.ensure_id_free(Some(ctx.session), study_uid, new_id)?;
        }
        let mutation = Mutation::versioned(|doc| {
            if let Some(new_id) = &params.id {
                doc.insert(fields::ID, new_id.as_str());
            }
            if let Some(description) = &params.description {
                doc.insert("description", description.as_str());
            }
            if let Some(somatic) = params.somatic {
                doc.insert("somatic", somatic);
            }
            apply_common(
                doc,
                params.status.as_deref(),
                params.attributes.as_ref(),
                params.annotation_sets.as_deref(),
            )
        });
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
                    kind: EntityKind::Sample,
                    uid: outcome.uid,
                    id: outcome.id.clone(),
                    version: outcome.version,
                },
            )?;
        }
        Ok(outcome)
    }

    /// Applies `params` as a new version and refreshes the individuals that
    /// pin the sample.
    ///
    /// # Errors
    ///
    /// `NotFound`, `AlreadyExists` for a taken id.
    pub fn update(
        &self,
        study_uid: Uid,
        id: &str,
        params: &SampleUpdateParams,
    ) -> CatalogResult<Sample> {
        let outcome = self
            .core
            .write(study_uid, |ctx| self.update_in(ctx, study_uid, id, params))?;
        from_doc(&outcome.document)
    }

    /// Updates every sample matching `query`, each in its own transaction.
    ///
    /// # Errors
    ///
    /// Query errors, or `AmbiguousUpdate` when a rename matches more than
    /// one sample.
    pub fn update_many(
        &self,
        study_uid: Uid,
        query: &Query,
        params: &SampleUpdateParams,
    ) -> CatalogResult<BatchResult<Sample>> {
        let ids = self.core.matching_ids(study_uid, query, None)?;
        if params.id.is_some() && ids.len() > 1 {
            return Err(CatalogError::ambiguous_update(EntityKind::Sample.name(), ids.len()));
        }
        Ok(BatchResult::collect_noted("update", ids, |id| {
            let outcome = self
                .core
                .write(study_uid, |ctx| self.update_in(ctx, study_uid, id, params))?;
            let note = (!outcome.changed).then(|| UNCHANGED.to_string());
            Ok((from_doc(&outcome.document)?, note))
        }))
    }

    /// Deletes a sample with its whole history. Returns the number of
    /// versions moved.
    ///
    /// Without `force`, fails while an individual pins the sample; with
    /// `force`, the individuals drop it first.
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
                .references(Some(ctx.session), EntityKind::Sample, uid)?;
            if let Some((kind, holder)) = references.first() {
                if !force {
                    return Err(CatalogError::in_use(
                        EntityKind::Sample.name(),
                        id,
                        format!("referenced by {kind} {holder}"),
                    ));
                }
                self.propagator.detach(ctx, EntityKind::Sample, uid)?;
            }
            core.versioned.delete(ctx.session, uid)
        })
    }

    /// Deletes every sample matching `query`, each in its own transaction.
    ///
    /// # Errors
    ///
    /// Query errors.
    pub fn delete_many(
        &self,
        study_uid: Uid,
        query: &Query,
        force: bool,
    ) -> CatalogResult<BatchResult<usize>> {
        let ids = self.core.matching_ids(study_uid, query, None)?;
        Ok(BatchResult::collect("delete", ids, |id| {
            self.delete(study_uid, id, force)
        }))
    }
}

impl EntityAdaptor for SampleAdaptor {
    type Entity = Sample;

    fn core(&self) -> &AdaptorCore {
        &self.core
    }
}
