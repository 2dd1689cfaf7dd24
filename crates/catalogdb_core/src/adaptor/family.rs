//! Families: pinned members and the roles computed between them.

use std::sync::Arc;

use catalogdb_codec::{Document, Value};
use catalogdb_store::{DocumentStore, Filter, FindOptions, SessionId};
use tracing::{debug, info};

use super::params::FamilyUpdateParams;
use super::{apply_common, pin_live, uid_of, AdaptorCore, EntityAdaptor};
use crate::config::CatalogConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::model::{from_doc, to_doc, to_values, Family, FamilyRoles, Individual, PinnedRef};
use crate::pedigree::{MemberSet, PedigreeMember, RelativesCalculator};
use crate::propagation::{ChangedEntity, PropagationContext, ReferenceHolder};
use crate::types::{fields, EntityKind, Uid};
use crate::utils::CatalogUtils;
use crate::versioned::{Mutation, VersionedStore};

const MEMBERS: &str = "members";
const MEMBER_UID: &str = "members.uid";

/// Family operations. Families hold pinned copies of individuals.
#[derive(Debug, Clone)]
pub struct FamilyAdaptor {
    core: AdaptorCore,
    individuals: VersionedStore,
}

fn members_of(doc: &Document) -> CatalogResult<Vec<PinnedRef>> {
    doc.get_array(MEMBERS)
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_document)
        .map(from_doc)
        .collect()
}

fn write_members(
    doc: &mut Document,
    members: &[PinnedRef],
    roles: &FamilyRoles,
) -> CatalogResult<()> {
    doc.insert(MEMBERS, to_values(members)?);
    doc.insert("roles", to_doc(roles)?);
    Ok(())
}

impl FamilyAdaptor {
    pub(crate) fn new(
        store: &Arc<dyn DocumentStore>,
        utils: &CatalogUtils,
        config: &CatalogConfig,
    ) -> Self {
        Self {
            core: AdaptorCore::new(EntityKind::Family, store, utils, config),
            individuals: VersionedStore::new(EntityKind::Individual, store.clone(), utils.clone()),
        }
    }

    /// Roles between the live versions of `members`, up to the configured
    /// degree. Members without relatives in the family are left out.
    fn roles(
        &self,
        session: Option<SessionId>,
        members: &[PinnedRef],
    ) -> CatalogResult<FamilyRoles> {
        let uids = members.iter().map(|m| Value::from(m.uid)).collect();
        let pedigree = self
            .individuals
            .find_live(session, &Filter::is_in(fields::UID, uids), &FindOptions::default())?
            .iter()
            .map(|doc| from_doc::<Individual>(doc).map(|i| PedigreeMember::from(&i)))
            .collect::<CatalogResult<Vec<_>>>()?;
        let source = MemberSet::new(pedigree);

        let mut roles = FamilyRoles::new();
        for member in source.members() {
            let relatives =
                RelativesCalculator::relatives(&source, member, self.core.config.family_role_degree)?;
            if relatives.is_empty() {
                continue;
            }
            roles.insert(
                member.id.clone(),
                relatives
                    .into_iter()
                    .map(|r| (r.member.id, r.relation))
                    .collect(),
            );
        }
        Ok(roles)
    }

    fn pin_members(
        &self,
        session: SessionId,
        study_uid: Uid,
        members: &[PinnedRef],
    ) -> CatalogResult<Vec<PinnedRef>> {
        let ids: Vec<String> = members.iter().map(|m| m.id.clone()).collect();
        pin_live(&self.individuals, Some(session), study_uid, &ids)
    }

    /// Creates a family. Members are given by id and pinned at their
    /// latest versions.
    ///
    /// # Errors
    ///
    /// `AlreadyExists`, or `NotFound` for an unknown member.
    pub fn create(&self, study_uid: Uid, family: &Family) -> CatalogResult<Family> {
        let core = &self.core;
        let created = core.write(study_uid, |ctx| {
            core.ensure_id_free(Some(ctx.session), study_uid, &family.id)?;
            let mut family = family.clone();
            family.uid = core.versioned.next_uid();
            family.study_uid = study_uid;
            family.members = self.pin_members(ctx.session, study_uid, &family.members)?;
            family.roles = self.roles(Some(ctx.session), &family.members)?;
            let doc = core.versioned.insert(ctx.session, to_doc(&family)?, ctx.release)?;
            from_doc::<Family>(&doc)
        })?;
        info!(
            target: "catalogdb::adaptor",
            family = %created.id,
            members = created.members.len(),
            "family created"
        );
        Ok(created)
    }

    /// Applies `params` as a new version.
    ///
    /// # Errors
    ///
    /// `NotFound`, `AlreadyExists` for a taken id.
    pub fn update(
        &self,
        study_uid: Uid,
        id: &str,
        params: &FamilyUpdateParams,
    ) -> CatalogResult<Family> {
        let core = &self.core;
        let outcome = core.write(study_uid, |ctx| {
            let current = core.live_by_id(Some(ctx.session), study_uid, id)?;
            if let Some(new_id) = params.id.as_deref().filter(|n| *n != id) {
                core.ensure_id_free(Some(ctx.session), study_uid, new_id)?;
            }
            let members = params
                .members
                .as_ref()
                .map(|ids| {
                    let pinned = pin_live(&self.individuals, Some(ctx.session), study_uid, ids)?;
                    let roles = self.roles(Some(ctx.session), &pinned)?;
                    Ok::<_, CatalogError>((pinned, roles))
                })
                .transpose()?;

            let mutation = Mutation::versioned(|doc| {
                if let Some(new_id) = &params.id {
                    doc.insert(fields::ID, new_id.as_str());
                }
                if let Some(name) = &params.name {
                    doc.insert("name", name.as_str());
                }
                if let Some((pinned, roles)) = &members {
                    write_members(doc, pinned, roles)?;
                }
                apply_common(
                    doc,
                    params.status.as_deref(),
                    params.attributes.as_ref(),
                    params.annotation_sets.as_deref(),
                )
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

    /// Pins every member at its latest version and recomputes the roles.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the family is locked.
    pub fn refresh_members(&self, study_uid: Uid, id: &str) -> CatalogResult<Family> {
        let core = &self.core;
        let outcome = core.write(study_uid, |ctx| {
            let current = core.live_by_id(Some(ctx.session), study_uid, id)?;
            if current.get_bool(fields::LOCKED) == Some(true) {
                return Err(CatalogError::invalid_argument(format!(
                    "family '{id}' is locked"
                )));
            }
            let members = self.pin_members(ctx.session, study_uid, &members_of(&current)?)?;
            let roles = self.roles(Some(ctx.session), &members)?;
            let mutation = Mutation::versioned(|doc| write_members(doc, &members, &roles));
            core.versioned.update_single(
                ctx.session,
                &Filter::eq(fields::UID, uid_of(&current)),
                ctx.release,
                &mutation,
            )
        })?;
        from_doc(&outcome.document)
    }

    fn set_locked(&self, study_uid: Uid, id: &str, locked: bool) -> CatalogResult<Family> {
        let core = &self.core;
        let mutation = Mutation::in_place(|doc| {
            doc.insert(fields::LOCKED, locked);
            Ok(())
        });
        let outcome = core.write(study_uid, |ctx| {
            let current = core.live_by_id(Some(ctx.session), study_uid, id)?;
            core.versioned.update_single(
                ctx.session,
                &Filter::eq(fields::UID, uid_of(&current)),
                ctx.release,
                &mutation,
            )
        })?;
        debug!(target: "catalogdb::adaptor", family = id, locked, "family lock changed");
        from_doc(&outcome.document)
    }

    /// Freezes the pinned member versions; propagation skips the family.
    ///
    /// # Errors
    ///
    /// `NotFound`.
    pub fn lock(&self, study_uid: Uid, id: &str) -> CatalogResult<Family> {
        self.set_locked(study_uid, id, true)
    }

    /// Lets propagation refresh the family again. Pins stay as they are
    /// until the next member change or [`FamilyAdaptor::refresh_members`].
    ///
    /// # Errors
    ///
    /// `NotFound`.
    pub fn unlock(&self, study_uid: Uid, id: &str) -> CatalogResult<Family> {
        self.set_locked(study_uid, id, false)
    }

    /// Deletes the family with its whole history. Returns the number of
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

impl EntityAdaptor for FamilyAdaptor {
    type Entity = Family;

    fn core(&self) -> &AdaptorCore {
        &self.core
    }
}

impl ReferenceHolder for FamilyAdaptor {
    fn kind(&self) -> EntityKind {
        EntityKind::Family
    }

    fn refresh_references(
        &self,
        ctx: &PropagationContext,
        changed: &ChangedEntity,
    ) -> CatalogResult<usize> {
        let filter = Filter::And(vec![
            Filter::eq(MEMBER_UID, changed.uid),
            Filter::ne(fields::LOCKED, true),
        ]);
        let mutation = Mutation::versioned(|doc| {
            let mut members = members_of(doc)?;
            for member in members.iter_mut().filter(|m| m.uid == changed.uid) {
                member.id.clone_from(&changed.id);
                member.version = changed.version;
            }
            let roles = self.roles(Some(ctx.session), &members)?;
            write_members(doc, &members, &roles)
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
            let members: Vec<PinnedRef> =
                members_of(doc)?.into_iter().filter(|m| m.uid != uid).collect();
            let roles = self.roles(Some(ctx.session), &members)?;
            write_members(doc, &members, &roles)
        });
        let outcomes = self.core.versioned.update(
            ctx.session,
            &Filter::eq(MEMBER_UID, uid),
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
            .find_live(session, &Filter::eq(MEMBER_UID, uid), &FindOptions::default())?
            .iter()
            .filter_map(|d| d.get_str(fields::ID).map(str::to_string))
            .collect())
    }
}
