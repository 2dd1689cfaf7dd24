//! Individuals: parents, linked samples and relatives.

use std::sync::Arc;

use catalogdb_codec::{Document, Value};
use catalogdb_store::{DocumentStore, Filter, FindOptions, SessionId, Update};
use tracing::{debug, info};

use super::batch::{BatchResult, UNCHANGED};
use super::params::IndividualUpdateParams;
use super::{apply_common, pinned, uid_of, AdaptorCore, EntityAdaptor};
use crate::config::CatalogConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::model::{from_doc, to_doc, to_values, EntityRef, Individual, PinnedRef};
use crate::pedigree::{PedigreeMember, PedigreeSource, Relative, RelativesCalculator};
use crate::propagation::{ChangedEntity, PropagationContext, ReferenceHolder, ReferencePropagator};
use crate::query::Query;
use crate::types::{fields, EntityKind, Uid};
use crate::utils::CatalogUtils;
use crate::versioned::{Mutation, UpdateOutcome, VersionedStore};

const SAMPLES: &str = "samples";
const SAMPLE_UID: &str = "samples.uid";
const BACK_REF: &str = "individual";
const BACK_REF_UID: &str = "individual.uid";

/// Individual operations. Individuals pin samples and are pinned by
/// families.
#[derive(Debug, Clone)]
pub struct IndividualAdaptor {
    core: AdaptorCore,
    propagator: ReferencePropagator,
    samples: VersionedStore,
}

fn samples_of(doc: &Document) -> CatalogResult<Vec<PinnedRef>> {
    doc.get_array(SAMPLES)
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_document)
        .map(from_doc)
        .collect()
}

fn changed(outcome: &UpdateOutcome) -> ChangedEntity {
    ChangedEntity {
        kind: EntityKind::Individual,
        uid: outcome.uid,
        id: outcome.id.clone(),
        version: outcome.version,
    }
}

fn set_parent(doc: &mut Document, key: &str, parent: Option<&EntityRef>) -> CatalogResult<()> {
    match parent {
        Some(parent) => {
            doc.insert(key, to_doc(parent)?);
        }
        None => {
            doc.remove(key);
        }
    }
    Ok(())
}

/// Looks up pedigree members in the live individuals of one study.
struct StudyPedigree<'a> {
    individuals: &'a VersionedStore,
    study_uid: Uid,
}

impl StudyPedigree<'_> {
    fn load(&self, filter: Filter) -> CatalogResult<Vec<PedigreeMember>> {
        let filter = Filter::And(vec![Filter::eq(fields::STUDY_UID, self.study_uid), filter]);
        self.individuals
            .find_live(None, &filter, &FindOptions::default())?
            .iter()
            .map(|doc| from_doc::<Individual>(doc).map(|i| PedigreeMember::from(&i)))
            .collect()
    }
}

impl PedigreeSource for StudyPedigree<'_> {
    fn member(&self, uid: Uid) -> CatalogResult<Option<PedigreeMember>> {
        Ok(self.load(Filter::eq(fields::UID, uid))?.into_iter().next())
    }

    fn children(&self, uid: Uid) -> CatalogResult<Vec<PedigreeMember>> {
        self.load(Filter::Or(vec![
            Filter::eq("father.uid", uid),
            Filter::eq("mother.uid", uid),
        ]))
    }
}

impl IndividualAdaptor {
    pub(crate) fn new(
        store: &Arc<dyn DocumentStore>,
        utils: &CatalogUtils,
        config: &CatalogConfig,
        propagator: ReferencePropagator,
    ) -> Self {
        Self {
            core: AdaptorCore::new(EntityKind::Individual, store, utils, config),
            propagator,
            samples: VersionedStore::new(EntityKind::Sample, store.clone(), utils.clone()),
        }
    }

    fn propagate(&self, ctx: &PropagationContext, outcome: &UpdateOutcome) -> CatalogResult<()> {
        if outcome.bumped() {
            self.propagator.propagate(ctx, &changed(outcome))?;
        }
        Ok(())
    }

    /// Resolves a parent id; an individual cannot be its own parent.
    fn parent(
        &self,
        session: SessionId,
        study_uid: Uid,
        child_id: &str,
        parent_id: &str,
    ) -> CatalogResult<EntityRef> {
        if parent_id == child_id {
            return Err(CatalogError::invalid_argument(format!(
                "individual '{child_id}' cannot be its own parent"
            )));
        }
        let doc = self.core.live_by_id(Some(session), study_uid, parent_id)?;
        Ok(EntityRef {
            uid: uid_of(&doc),
            id: parent_id.to_string(),
        })
    }

    /// Pins samples by id. A sample belongs to at most one individual.
    fn pin_samples(
        &self,
        session: SessionId,
        study_uid: Uid,
        ids: &[String],
        owner: Option<Uid>,
    ) -> CatalogResult<Vec<PinnedRef>> {
        let mut pins: Vec<PinnedRef> = Vec::with_capacity(ids.len());
        for id in ids {
            let filter = Filter::And(vec![
                Filter::eq(fields::STUDY_UID, study_uid),
                Filter::eq(fields::ID, id.as_str()),
            ]);
            let doc = self
                .samples
                .find_live(Some(session), &filter, &FindOptions::default())?
                .into_iter()
                .next()
                .ok_or_else(|| CatalogError::not_found("sample", id))?;
            if let Some(linked) = doc.get(BACK_REF_UID).and_then(Uid::from_value) {
                if Some(linked) != owner {
                    return Err(CatalogError::invalid_argument(format!(
                        "sample '{id}' already belongs to another individual"
                    )));
                }
            }
            let pin = pinned(&doc);
            if !pins.iter().any(|p| p.uid == pin.uid) {
                pins.push(pin);
            }
        }
        Ok(pins)
    }

    /// Sets or clears the individual back-reference of samples. Back
    /// references do not version the sample.
    fn link_samples(
        &self,
        ctx: &PropagationContext,
        samples: &[Uid],
        owner: Option<&EntityRef>,
    ) -> CatalogResult<()> {
        if samples.is_empty() {
            return Ok(());
        }
        let update = match owner {
            Some(owner) => Update::new().set(BACK_REF, to_doc(owner)?),
            None => Update::new().unset(BACK_REF),
        };
        let uids = samples.iter().map(|uid| Value::from(*uid)).collect();
        self.samples.update(
            ctx.session,
            &Filter::is_in(fields::UID, uids),
            ctx.release,
            &Mutation::patch(update),
        )?;
        Ok(())
    }

    /// Creates an individual. Parents and samples are given by id.
    ///
    /// # Errors
    ///
    /// `AlreadyExists`, `NotFound` for unknown parents or samples,
    /// `InvalidArgument` for samples owned by another individual.
    pub fn create(&self, study_uid: Uid, individual: &Individual) -> CatalogResult<Individual> {
        let core = &self.core;
        let created = core.write(study_uid, |ctx| {
            core.ensure_id_free(Some(ctx.session), study_uid, &individual.id)?;
            let mut new = individual.clone();
            new.uid = core.versioned.next_uid();
            new.study_uid = study_uid;
            new.father = individual
                .father
                .as_ref()
                .map(|f| self.parent(ctx.session, study_uid, &individual.id, &f.id))
                .transpose()?;
            new.mother = individual
                .mother
                .as_ref()
                .map(|m| self.parent(ctx.session, study_uid, &individual.id, &m.id))
                .transpose()?;
            let sample_ids: Vec<String> = individual.samples.iter().map(|s| s.id.clone()).collect();
            new.samples = self.pin_samples(ctx.session, study_uid, &sample_ids, None)?;

            let doc = core.versioned.insert(ctx.session, to_doc(&new)?, ctx.release)?;
            let owner = EntityRef {
                uid: new.uid,
                id: new.id.clone(),
            };
            let linked: Vec<Uid> = new.samples.iter().map(|s| s.uid).collect();
            self.link_samples(ctx, &linked, Some(&owner))?;
            from_doc::<Individual>(&doc)
        })?;
        info!(
            target: "catalogdb::adaptor",
            individual = %created.id,
            uid = %created.uid,
            "individual created"
        );
        Ok(created)
    }

    fn update_in(
        &self,
        ctx: &PropagationContext,
        study_uid: Uid,
        id: &str,
        params: &IndividualUpdateParams,
    ) -> CatalogResult<UpdateOutcome> {
        let core = &self.core;
        let session = ctx.session;
        let current = core.live_by_id(Some(session), study_uid, id)?;
        let uid = uid_of(&current);
        let rename = params.id.as_deref().filter(|n| *n != id);
        if let Some(new_id) = rename {
            core.ensure_id_free(Some(session), study_uid, new_id)?;
        }
        let own_id = rename.unwrap_or(id);

        let father = params
            .father
            .as_ref()
            .map(|f| f.as_deref().map(|p| self.parent(session, study_uid, own_id, p)).transpose())
            .transpose()?;
        let mother = params
            .mother
            .as_ref()
            .map(|m| m.as_deref().map(|p| self.parent(session, study_uid, own_id, p)).transpose())
            .transpose()?;

        let previous = samples_of(&current)?;
        let samples = params
            .samples
            .as_ref()
            .map(|ids| self.pin_samples(session, study_uid, ids, Some(uid)))
            .transpose()?;

        let mutation = Mutation::versioned(|doc| {
            if let Some(new_id) = &params.id {
                doc.insert(fields::ID, new_id.as_str());
            }
            if let Some(name) = &params.name {
                doc.insert("name", name.as_str());
            }
            if let Some(sex) = params.sex {
                doc.insert("sex", sex.as_str());
            }
            if let Some(father) = &father {
                set_parent(doc, "father", father.as_ref())?;
            }
            if let Some(mother) = &mother {
                set_parent(doc, "mother", mother.as_ref())?;
            }
            if let Some(samples) = &samples {
                doc.insert(SAMPLES, to_values(samples)?);
            }
            apply_common(
                doc,
                params.status.as_deref(),
                params.attributes.as_ref(),
                params.annotation_sets.as_deref(),
            )
        });
        let outcome = core.versioned.update_single(
            session,
            &Filter::eq(fields::UID, uid),
            ctx.release,
            &mutation,
        )?;

        let owner = EntityRef {
            uid,
            id: outcome.id.clone(),
        };
        if let Some(samples) = &samples {
            let dropped: Vec<Uid> = previous
                .iter()
                .filter(|p| !samples.iter().any(|s| s.uid == p.uid))
                .map(|p| p.uid)
                .collect();
            self.link_samples(ctx, &dropped, None)?;
            let linked: Vec<Uid> = samples.iter().map(|s| s.uid).collect();
            self.link_samples(ctx, &linked, Some(&owner))?;
        } else if rename.is_some() {
            let linked: Vec<Uid> = previous.iter().map(|s| s.uid).collect();
            self.link_samples(ctx, &linked, Some(&owner))?;
        }
        if let Some(new_id) = rename {
            for parent in ["father", "mother"] {
                let filter = Filter::eq(format!("{parent}.uid"), uid);
                let update = Update::new().set(format!("{parent}.id"), new_id);
                core.versioned
                    .update(session, &filter, ctx.release, &Mutation::patch(update))?;
            }
        }
        self.propagate(ctx, &outcome)?;
        Ok(outcome)
    }

    /// Applies `params` as a new version and refreshes the families that
    /// pin the individual.
    ///
    /// # Errors
    ///
    /// `NotFound`, `AlreadyExists` for a taken id, `InvalidArgument` for a
    /// self parent or a sample owned by another individual.
    pub fn update(
        &self,
        study_uid: Uid,
        id: &str,
        params: &IndividualUpdateParams,
    ) -> CatalogResult<Individual> {
        let outcome = self
            .core
            .write(study_uid, |ctx| self.update_in(ctx, study_uid, id, params))?;
        from_doc(&outcome.document)
    }

    /// Updates every individual matching `query`, each in its own
    /// transaction.
    ///
    /// # Errors
    ///
    /// Query errors, or `AmbiguousUpdate` when a rename matches more than
    /// one individual.
    pub fn update_many(
        &self,
        study_uid: Uid,
        query: &Query,
        params: &IndividualUpdateParams,
    ) -> CatalogResult<BatchResult<Individual>> {
        let ids = self.core.matching_ids(study_uid, query, None)?;
        if params.id.is_some() && ids.len() > 1 {
            return Err(CatalogError::ambiguous_update(EntityKind::Individual.name(), ids.len()));
        }
        Ok(BatchResult::collect_noted("update", ids, |id| {
            let outcome = self
                .core
                .write(study_uid, |ctx| self.update_in(ctx, study_uid, id, params))?;
            let note = (!outcome.changed).then(|| UNCHANGED.to_string());
            Ok((from_doc(&outcome.document)?, note))
        }))
    }

    /// Deletes an individual with its whole history. Returns the number of
    /// versions moved.
    ///
    /// Without `force`, fails while a family has it as a member or a live
    /// individual has it as a parent. With `force`, families drop it,
    /// children lose the parent and samples lose their back-reference.
    ///
    /// # Errors
    ///
    /// `NotFound`, `InUse`.
    pub fn delete(&self, study_uid: Uid, id: &str, force: bool) -> CatalogResult<usize> {
        let core = &self.core;
        core.write(study_uid, |ctx| {
            let current = core.live_by_id(Some(ctx.session), study_uid, id)?;
            let uid = uid_of(&current);
            let families = self
                .propagator
                .references(Some(ctx.session), EntityKind::Individual, uid)?;
            let children_filter = Filter::Or(vec![
                Filter::eq("father.uid", uid),
                Filter::eq("mother.uid", uid),
            ]);
            let children = core
                .versioned
                .find_live(Some(ctx.session), &children_filter, &FindOptions::default())?;

            if !force {
                if let Some((kind, holder)) = families.first() {
                    return Err(CatalogError::in_use(
                        EntityKind::Individual.name(),
                        id,
                        format!("member of {kind} {holder}"),
                    ));
                }
                if let Some(child) = children.first() {
                    let child_id = child.get_str(fields::ID).unwrap_or_default();
                    return Err(CatalogError::in_use(
                        EntityKind::Individual.name(),
                        id,
                        format!("parent of individual {child_id}"),
                    ));
                }
            }

            self.propagator.detach(ctx, EntityKind::Individual, uid)?;
            for parent in ["father", "mother"] {
                let filter = Filter::eq(format!("{parent}.uid"), uid);
                let unset = Mutation::update(Update::new().unset(parent));
                for outcome in core.versioned.update(ctx.session, &filter, ctx.release, &unset)? {
                    self.propagate(ctx, &outcome)?;
                }
            }
            let linked: Vec<Uid> = samples_of(&current)?.iter().map(|s| s.uid).collect();
            self.link_samples(ctx, &linked, None)?;
            let versions = core.versioned.delete(ctx.session, uid)?;
            debug!(
                target: "catalogdb::adaptor",
                individual = id,
                families = families.len(),
                children = children.len(),
                "individual deleted"
            );
            Ok(versions)
        })
    }

    /// Relatives of the individual within `max_degree`, nearest first.
    ///
    /// # Errors
    ///
    /// `NotFound`.
    pub fn relatives(
        &self,
        study_uid: Uid,
        id: &str,
        max_degree: u32,
    ) -> CatalogResult<Vec<Relative>> {
        let doc = self.core.live_by_id(None, study_uid, id)?;
        let proband = PedigreeMember::from(&from_doc::<Individual>(&doc)?);
        let source = StudyPedigree {
            individuals: &self.core.versioned,
            study_uid,
        };
        RelativesCalculator::relatives(&source, &proband, max_degree)
    }

    /// Adds a freshly created sample to an individual inside the caller's
    /// transaction.
    pub(crate) fn attach_sample_in(
        &self,
        ctx: &PropagationContext,
        study_uid: Uid,
        individual_id: &str,
        sample: &Document,
    ) -> CatalogResult<EntityRef> {
        let current = self.core.live_by_id(Some(ctx.session), study_uid, individual_id)?;
        let pin = pinned(sample);
        let mutation = Mutation::versioned(|doc| {
            let mut samples = samples_of(doc)?;
            if !samples.iter().any(|s| s.uid == pin.uid) {
                samples.push(pin.clone());
            }
            doc.insert(SAMPLES, to_values(&samples)?);
            Ok(())
        });
        let outcome = self.core.versioned.update_single(
            ctx.session,
            &Filter::eq(fields::UID, uid_of(&current)),
            ctx.release,
            &mutation,
        )?;
        let owner = EntityRef {
            uid: outcome.uid,
            id: outcome.id.clone(),
        };
        self.link_samples(ctx, &[pin.uid], Some(&owner))?;
        self.propagate(ctx, &outcome)?;
        Ok(owner)
    }
}

impl EntityAdaptor for IndividualAdaptor {
    type Entity = Individual;

    fn core(&self) -> &AdaptorCore {
        &self.core
    }
}

impl ReferenceHolder for IndividualAdaptor {
    fn kind(&self) -> EntityKind {
        EntityKind::Individual
    }

    fn refresh_references(
        &self,
        ctx: &PropagationContext,
        changed: &ChangedEntity,
    ) -> CatalogResult<usize> {
        let filter = Filter::And(vec![
            Filter::eq(SAMPLE_UID, changed.uid),
            Filter::ne(fields::LOCKED, true),
        ]);
        let mutation = Mutation::versioned(|doc| {
            let mut samples = samples_of(doc)?;
            for sample in samples.iter_mut().filter(|s| s.uid == changed.uid) {
                sample.id.clone_from(&changed.id);
                sample.version = changed.version;
            }
            doc.insert(SAMPLES, to_values(&samples)?);
            Ok(())
        });
        let outcomes = self
            .core
            .versioned
            .update(ctx.session, &filter, ctx.release, &mutation)?;
        for outcome in &outcomes {
            self.propagate(ctx, outcome)?;
        }
        Ok(outcomes.iter().filter(|o| o.changed).count())
    }

    fn remove_references(
        &self,
        ctx: &PropagationContext,
        _source: EntityKind,
        uid: Uid,
    ) -> CatalogResult<usize> {
        let mutation = Mutation::versioned(|doc| {
            let samples: Vec<PinnedRef> =
                samples_of(doc)?.into_iter().filter(|s| s.uid != uid).collect();
            doc.insert(SAMPLES, to_values(&samples)?);
            Ok(())
        });
        let outcomes = self.core.versioned.update(
            ctx.session,
            &Filter::eq(SAMPLE_UID, uid),
            ctx.release,
            &mutation,
        )?;
        for outcome in &outcomes {
            self.propagate(ctx, outcome)?;
        }
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
            .find_live(session, &Filter::eq(SAMPLE_UID, uid), &FindOptions::default())?
            .iter()
            .filter_map(|d| d.get_str(fields::ID).map(str::to_string))
            .collect())
    }
}
