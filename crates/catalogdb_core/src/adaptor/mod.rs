//! Entity adaptors: domain operations on top of the versioned stores.
//!
//! Public methods open their own transaction through the
//! [`crate::TransactionRunner`]; the `*_in` variants used between adaptors
//! join the caller's session instead. Adaptors are composed by
//! [`CatalogAdaptorFactory`], which wires the reference propagation edges.

mod batch;
mod dataset;
mod factory;
mod family;
mod file;
mod individual;
mod job;
mod params;
mod project;
mod sample;
mod study;

pub use batch::{BatchResult, Event, EventKind};
pub use dataset::DatasetAdaptor;
pub use factory::CatalogAdaptorFactory;
pub use family::FamilyAdaptor;
pub use file::FileAdaptor;
pub use individual::IndividualAdaptor;
pub use job::JobAdaptor;
pub use params::{
    DatasetUpdateParams, FamilyUpdateParams, FileUpdateParams, IndividualUpdateParams,
    SampleUpdateParams,
};
pub use project::ProjectAdaptor;
pub use sample::SampleAdaptor;
pub use study::StudyAdaptor;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use catalogdb_codec::{Document, Value};
use catalogdb_store::{DocumentStore, Filter, FindOptions, SessionId};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::authorization::{check_entity_permission, query_for_authorised_entries, AuthorizationContext};
use crate::config::CatalogConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::model::{from_doc, to_doc, AnnotationSet, Attributes, PinnedRef, Project, Study};
use crate::propagation::PropagationContext;
use crate::query::{CompileContext, CompiledQuery, EntitySchema, FilterCompiler, Query, VersionScope};
use crate::txn::TransactionRunner;
use crate::types::{fields, status, EntityKind, Uid};
use crate::utils::{text_list, CatalogUtils};
use crate::versioned::{Mutation, VersionedStore};

/// State shared by every adaptor of one entity kind.
#[derive(Clone)]
pub struct AdaptorCore {
    pub(crate) versioned: VersionedStore,
    pub(crate) runner: TransactionRunner,
    pub(crate) studies: VersionedStore,
    pub(crate) projects: VersionedStore,
    pub(crate) config: CatalogConfig,
}

impl AdaptorCore {
    pub(crate) fn new(
        kind: EntityKind,
        store: &Arc<dyn DocumentStore>,
        utils: &CatalogUtils,
        config: &CatalogConfig,
    ) -> Self {
        Self {
            versioned: VersionedStore::new(kind, store.clone(), utils.clone()),
            runner: TransactionRunner::new(store.clone(), config.retry.clone()),
            studies: VersionedStore::new(EntityKind::Study, store.clone(), utils.clone()),
            projects: VersionedStore::new(EntityKind::Project, store.clone(), utils.clone()),
            config: config.clone(),
        }
    }

    pub(crate) fn kind(&self) -> EntityKind {
        self.versioned.kind()
    }

    /// The live study with `study_uid`.
    pub(crate) fn study(&self, session: Option<SessionId>, study_uid: Uid) -> CatalogResult<Study> {
        let doc = self
            .studies
            .find_live(session, &Filter::eq(fields::UID, study_uid), &FindOptions::default())?
            .into_iter()
            .next()
            .ok_or_else(|| CatalogError::not_found("study", study_uid.to_string()))?;
        from_doc(&doc)
    }

    /// Current release of the project owning `study_uid`.
    pub(crate) fn release(&self, session: Option<SessionId>, study_uid: Uid) -> CatalogResult<u32> {
        let study = self.study(session, study_uid)?;
        let doc = self
            .projects
            .find_live(
                session,
                &Filter::eq(fields::UID, study.project_uid),
                &FindOptions::default(),
            )?
            .into_iter()
            .next()
            .ok_or_else(|| CatalogError::not_found("project", study.project_uid.to_string()))?;
        Ok(from_doc::<Project>(&doc)?.current_release)
    }

    /// Runs `work` in a transaction stamped with the study's release.
    pub(crate) fn write<T>(
        &self,
        study_uid: Uid,
        work: impl Fn(&PropagationContext) -> CatalogResult<T>,
    ) -> CatalogResult<T> {
        self.runner.run(|session| {
            let release = self.release(Some(session), study_uid)?;
            work(&PropagationContext { session, release })
        })
    }

    fn by_id(study_uid: Uid, id: &str) -> Filter {
        Filter::And(vec![
            Filter::eq(fields::STUDY_UID, study_uid),
            Filter::eq(fields::ID, id),
        ])
    }

    /// The live entity with `id` in the study.
    pub(crate) fn live_by_id(
        &self,
        session: Option<SessionId>,
        study_uid: Uid,
        id: &str,
    ) -> CatalogResult<Document> {
        self.versioned
            .find_live(session, &Self::by_id(study_uid, id), &FindOptions::default())?
            .into_iter()
            .next()
            .ok_or_else(|| CatalogError::not_found(self.kind().name(), id))
    }

    /// Fails with `AlreadyExists` when a live entity of the study uses `id`.
    pub(crate) fn ensure_id_free(
        &self,
        session: Option<SessionId>,
        study_uid: Uid,
        id: &str,
    ) -> CatalogResult<()> {
        if id.trim().is_empty() {
            return Err(CatalogError::invalid_argument(format!(
                "{} id must not be empty",
                self.kind()
            )));
        }
        if self
            .versioned
            .count_live(session, &Self::by_id(study_uid, id))?
            > 0
        {
            return Err(CatalogError::already_exists(self.kind().name(), id));
        }
        Ok(())
    }

    /// Compiles `query` within the study, hiding deleted entities and
    /// applying `auth`.
    pub(crate) fn compile(
        &self,
        study: &Study,
        query: &Query,
        auth: Option<&AuthorizationContext>,
    ) -> CatalogResult<CompiledQuery> {
        let mut query = query.clone();
        query.set("studyUid", study.uid.as_u64().to_string());
        if !query.contains("internalStatus") {
            query.set("internalStatus", format!("!={}", status::DELETED));
        }
        let authorization = match auth {
            Some(ctx) => {
                let with_acls = Filter::And(vec![
                    Filter::eq(fields::STUDY_UID, study.uid),
                    Filter::Exists(format!("{}.0", fields::ACL), true),
                ]);
                let entity_acls = self.versioned.count_live(None, &with_acls)? > 0;
                query_for_authorised_entries(study, ctx, self.kind(), entity_acls)?
            }
            None => None,
        };
        let ctx = CompileContext {
            authorization,
            variable_sets: &study.variable_sets,
            strict_annotations: self.config.strict_annotation_queries,
        };
        FilterCompiler::compile(&EntitySchema::of(self.kind()), &query, &ctx)
    }

    /// Ids of the latest versions matching `query`.
    pub(crate) fn matching_ids(
        &self,
        study_uid: Uid,
        query: &Query,
        auth: Option<&AuthorizationContext>,
    ) -> CatalogResult<Vec<String>> {
        let study = self.study(None, study_uid)?;
        let compiled = self.compile(&study, query, auth)?;
        if compiled.scope != VersionScope::Latest {
            return Err(CatalogError::invalid_argument(
                "batch operations apply to the latest versions only",
            ));
        }
        let docs = self.versioned.find(
            None,
            &compiled,
            &FindOptions::default().project(vec![fields::ID.to_string()]),
        )?;
        Ok(docs
            .iter()
            .filter_map(|d| d.get_str(fields::ID).map(str::to_string))
            .collect())
    }
}

impl fmt::Debug for AdaptorCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptorCore")
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

/// Pinned copy of a live document.
pub(crate) fn pinned(doc: &Document) -> PinnedRef {
    PinnedRef {
        uid: doc.get(fields::UID).and_then(Uid::from_value).unwrap_or_default(),
        id: doc.get_str(fields::ID).unwrap_or_default().to_string(),
        version: doc
            .get_i64(fields::VERSION)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(1),
    }
}

/// Pins the live entities of `store` with the given ids, in order and
/// without duplicates.
pub(crate) fn pin_live(
    store: &VersionedStore,
    session: Option<SessionId>,
    study_uid: Uid,
    ids: &[String],
) -> CatalogResult<Vec<PinnedRef>> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .map(|id| {
            let doc = store
                .find_live(session, &AdaptorCore::by_id(study_uid, id), &FindOptions::default())?
                .into_iter()
                .next()
                .ok_or_else(|| CatalogError::not_found(store.kind().name(), id.as_str()))?;
            Ok(pinned(&doc))
        })
        .collect()
}

/// Writes the fields of a typed model over `doc`, keeping fields the model
/// does not declare.
pub(crate) fn merge_model<T: Serialize>(doc: &mut Document, model: &T) -> CatalogResult<()> {
    for (key, value) in to_doc(model)? {
        doc.insert(key, value);
    }
    Ok(())
}

/// Uid of a live document.
pub(crate) fn uid_of(doc: &Document) -> Uid {
    doc.get(fields::UID).and_then(Uid::from_value).unwrap_or_default()
}

/// Applies the updates every entity kind shares.
pub(crate) fn apply_common(
    doc: &mut Document,
    status_id: Option<&str>,
    attributes: Option<&Attributes>,
    annotation_sets: Option<&[AnnotationSet]>,
) -> CatalogResult<()> {
    if let Some(status_id) = status_id {
        if doc.get_str(fields::STATUS_ID) != Some(status_id) {
            doc.set_path(fields::STATUS_ID, status_id)?;
        }
    }
    if let Some(attributes) = attributes {
        for (key, value) in attributes {
            doc.set_path(&format!("attributes.{key}"), Value::from(value.clone()))?;
        }
    }
    if let Some(sets) = annotation_sets {
        let mut current: Vec<Value> = doc
            .get_array(fields::ANNOTATION_SETS)
            .map(<[Value]>::to_vec)
            .unwrap_or_default();
        for set in sets {
            let value = Value::from(to_doc(set)?);
            let existing = current.iter().position(|v| {
                v.as_document()
                    .and_then(|d| d.get_str("id"))
                    .is_some_and(|id| id == set.id)
            });
            match existing {
                Some(i) => current[i] = value,
                None => current.push(value),
            }
        }
        doc.insert(fields::ANNOTATION_SETS, current);
    }
    Ok(())
}

/// Read operations every study scoped adaptor offers.
pub trait EntityAdaptor {
    /// Typed model returned by reads.
    type Entity: DeserializeOwned;

    /// Shared state.
    fn core(&self) -> &AdaptorCore;

    /// The live entity with `id`.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `Authorization` when `auth` lacks the permission.
    fn get(
        &self,
        study_uid: Uid,
        id: &str,
        auth: Option<&AuthorizationContext>,
    ) -> CatalogResult<Self::Entity> {
        let core = self.core();
        let doc = core.live_by_id(None, study_uid, id)?;
        if let Some(ctx) = auth {
            let study = core.study(None, study_uid)?;
            check_entity_permission(&study, &doc, ctx, core.kind())?;
        }
        from_doc(&doc)
    }

    /// Entities matching `query`. Entities `auth` may not see are silently
    /// left out.
    ///
    /// # Errors
    ///
    /// Query errors, or `Authorization` when `auth` has no access to the
    /// study.
    fn search(
        &self,
        study_uid: Uid,
        query: &Query,
        auth: Option<&AuthorizationContext>,
        options: &FindOptions,
    ) -> CatalogResult<Vec<Self::Entity>> {
        let core = self.core();
        let study = core.study(None, study_uid)?;
        let compiled = core.compile(&study, query, auth)?;
        core.versioned
            .find(None, &compiled, options)?
            .iter()
            .map(from_doc)
            .collect()
    }

    /// Number of entities `search` would return.
    ///
    /// # Errors
    ///
    /// As [`EntityAdaptor::search`].
    fn count(
        &self,
        study_uid: Uid,
        query: &Query,
        auth: Option<&AuthorizationContext>,
    ) -> CatalogResult<u64> {
        let core = self.core();
        let study = core.study(None, study_uid)?;
        let compiled = core.compile(&study, query, auth)?;
        core.versioned.count(None, &compiled)
    }

    /// Every version of the live entity with `id`, oldest first.
    ///
    /// # Errors
    ///
    /// `NotFound`.
    fn history(&self, study_uid: Uid, id: &str) -> CatalogResult<Vec<Self::Entity>> {
        let core = self.core();
        let doc = core.live_by_id(None, study_uid, id)?;
        core.versioned
            .history(None, uid_of(&doc))?
            .iter()
            .map(from_doc)
            .collect()
    }

    /// Replaces the entity level permissions of `member`. ACLs are not
    /// versioned.
    ///
    /// # Errors
    ///
    /// `NotFound`.
    fn set_acl(
        &self,
        study_uid: Uid,
        id: &str,
        member: &str,
        permissions: &[&str],
    ) -> CatalogResult<()> {
        let core = self.core();
        let prefix = format!("{member}__");
        let mutation = Mutation::in_place(|doc| {
            let mut acl: Vec<String> = text_list(doc.get_array(fields::ACL))
                .into_iter()
                .filter(|e| !e.starts_with(&prefix))
                .collect();
            acl.extend(permissions.iter().map(|p| format!("{prefix}{p}")));
            doc.insert(fields::ACL, acl);
            Ok(())
        });
        core.write(study_uid, |ctx| {
            let doc = core.live_by_id(Some(ctx.session), study_uid, id)?;
            core.versioned.update_single(
                ctx.session,
                &Filter::eq(fields::UID, uid_of(&doc)),
                ctx.release,
                &mutation,
            )?;
            Ok(())
        })
    }
}
