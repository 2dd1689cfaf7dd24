//! The versioning protocol over a document store.

use std::fmt;
use std::sync::Arc;

use catalogdb_codec::{Document, Value};
use catalogdb_store::{run_pipeline, DocumentStore, Filter, FindOptions, SessionId, Update};
use tracing::{debug, info};

use super::mutation::{Mutation, UpdateOutcome};
use crate::error::{CatalogError, CatalogResult};
use crate::query::{CompiledQuery, VersionScope};
use crate::types::{fields, status, EntityKind, Uid};
use crate::utils::CatalogUtils;

/// Fields a mutation may not change; restored from the current document.
const PROTECTED: &[&str] = &[
    fields::UID,
    fields::STUDY_UID,
    fields::VERSION,
    fields::RELEASE,
    fields::RELEASE_FROM_VERSION,
    fields::LAST_OF_VERSION,
    fields::LAST_OF_RELEASE,
    fields::CREATION_DATE,
];

/// Names of the collections backing one entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    /// Entity kind.
    pub kind: EntityKind,
    /// Live collection.
    pub live: String,
    /// Superseded versions.
    pub archive: String,
    /// Deleted histories.
    pub deleted: String,
}

impl CollectionSpec {
    /// Collections of `kind`.
    #[must_use]
    pub fn of(kind: EntityKind) -> Self {
        let name = kind.name();
        Self {
            kind,
            live: name.to_string(),
            archive: format!("{name}_archive"),
            deleted: format!("{name}_deleted"),
        }
    }

    /// Whether content updates create versions.
    #[must_use]
    pub const fn versioned(&self) -> bool {
        self.kind.is_versioned()
    }
}

/// Live, archive and deleted collections of one entity kind.
///
/// Writes take the caller's session; the store never opens one itself.
/// Handles are cheap to clone and share the underlying store.
#[derive(Clone)]
pub struct VersionedStore {
    collections: CollectionSpec,
    store: Arc<dyn DocumentStore>,
    utils: CatalogUtils,
}

fn version_of(doc: &Document) -> u32 {
    doc.get_i64(fields::VERSION)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(1)
}

fn uid_of(doc: &Document) -> CatalogResult<Uid> {
    doc.get(fields::UID)
        .and_then(Uid::from_value)
        .ok_or_else(|| CatalogError::invalid_argument("document without a uid"))
}

fn by_uid(uid: Uid) -> Filter {
    Filter::eq(fields::UID, uid)
}

fn sort_by_version(docs: &mut [Document]) {
    docs.sort_by_key(|d| {
        (
            d.get_i64(fields::UID).unwrap_or_default(),
            d.get_i64(fields::VERSION).unwrap_or_default(),
        )
    });
}

impl VersionedStore {
    /// Creates the store for `kind`.
    pub fn new(kind: EntityKind, store: Arc<dyn DocumentStore>, utils: CatalogUtils) -> Self {
        Self {
            collections: CollectionSpec::of(kind),
            store,
            utils,
        }
    }

    /// Entity kind.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.collections.kind
    }

    /// Collection names.
    #[must_use]
    pub fn collections(&self) -> &CollectionSpec {
        &self.collections
    }

    /// Shared helpers.
    #[must_use]
    pub fn utils(&self) -> &CatalogUtils {
        &self.utils
    }

    /// A fresh catalog-wide uid.
    #[must_use]
    pub fn next_uid(&self) -> Uid {
        Uid::new(self.store.next_uid())
    }

    /// Inserts a new entity at version 1 of `release`.
    ///
    /// # Errors
    ///
    /// Store errors.
    pub fn insert(
        &self,
        session: SessionId,
        mut doc: Document,
        release: u32,
    ) -> CatalogResult<Document> {
        doc.insert(fields::VERSION, 1);
        doc.insert(fields::RELEASE, release);
        doc.insert(fields::RELEASE_FROM_VERSION, vec![release]);
        doc.insert(fields::LAST_OF_VERSION, true);
        doc.insert(fields::LAST_OF_RELEASE, true);
        self.utils.stamp_new(&mut doc);
        self.store
            .insert(Some(session), &self.collections.live, doc.clone())?;
        info!(
            target: "catalogdb::versioned",
            collection = %self.collections.live,
            id = doc.get_str(fields::ID).unwrap_or_default(),
            %session,
            "entity inserted"
        );
        Ok(doc)
    }

    /// Runs a compiled query against the collections its scope needs.
    ///
    /// History results are ordered by uid then version unless `options`
    /// sorts them.
    ///
    /// # Errors
    ///
    /// Store errors.
    pub fn find(
        &self,
        session: Option<SessionId>,
        query: &CompiledQuery,
        options: &FindOptions,
    ) -> CatalogResult<Vec<Document>> {
        match query.scope {
            VersionScope::Latest => {
                Ok(self
                    .store
                    .find(session, &self.collections.live, &query.filter, options)?)
            }
            VersionScope::History => {
                let all = FindOptions::default();
                let mut docs = self
                    .store
                    .find(session, &self.collections.live, &query.filter, &all)?;
                docs.extend(
                    self.store
                        .find(session, &self.collections.archive, &query.filter, &all)?,
                );
                if options.sort.is_empty() {
                    sort_by_version(&mut docs);
                }
                Ok(run_pipeline(docs, &options.to_stages())?)
            }
        }
    }

    /// Live documents matching a native filter.
    ///
    /// # Errors
    ///
    /// Store errors.
    pub fn find_live(
        &self,
        session: Option<SessionId>,
        filter: &Filter,
        options: &FindOptions,
    ) -> CatalogResult<Vec<Document>> {
        Ok(self.store.find(session, &self.collections.live, filter, options)?)
    }

    /// Counts what a compiled query would return.
    ///
    /// # Errors
    ///
    /// Store errors.
    pub fn count(&self, session: Option<SessionId>, query: &CompiledQuery) -> CatalogResult<u64> {
        let live = self.store.count(session, &self.collections.live, &query.filter)?;
        match query.scope {
            VersionScope::Latest => Ok(live),
            VersionScope::History => {
                Ok(live + self.store.count(session, &self.collections.archive, &query.filter)?)
            }
        }
    }

    /// Counts live documents matching a native filter.
    ///
    /// # Errors
    ///
    /// Store errors.
    pub fn count_live(&self, session: Option<SessionId>, filter: &Filter) -> CatalogResult<u64> {
        Ok(self.store.count(session, &self.collections.live, filter)?)
    }

    /// Documents in the deleted collection.
    ///
    /// # Errors
    ///
    /// Store errors.
    pub fn find_deleted(
        &self,
        session: Option<SessionId>,
        filter: &Filter,
        options: &FindOptions,
    ) -> CatalogResult<Vec<Document>> {
        Ok(self
            .store
            .find(session, &self.collections.deleted, filter, options)?)
    }

    /// Every version of a live entity, oldest first.
    ///
    /// # Errors
    ///
    /// Store errors.
    pub fn history(&self, session: Option<SessionId>, uid: Uid) -> CatalogResult<Vec<Document>> {
        let query = CompiledQuery {
            filter: by_uid(uid),
            scope: VersionScope::History,
        };
        self.find(session, &query, &FindOptions::default())
    }

    /// Every version of a deleted entity, oldest first.
    ///
    /// # Errors
    ///
    /// Store errors.
    pub fn deleted_history(
        &self,
        session: Option<SessionId>,
        uid: Uid,
    ) -> CatalogResult<Vec<Document>> {
        let mut docs = self.find_deleted(session, &by_uid(uid), &FindOptions::default())?;
        sort_by_version(&mut docs);
        Ok(docs)
    }

    /// Applies `mutation` to every live document matching `filter`.
    ///
    /// Each document is copied, mutated and compared with its current form.
    /// Unchanged documents are left alone. A versioned mutation of a
    /// versioned kind archives the current document and replaces it with
    /// version + 1 stamped with `release`.
    ///
    /// # Errors
    ///
    /// Whatever the mutation returns, or store errors.
    pub fn update(
        &self,
        session: SessionId,
        filter: &Filter,
        release: u32,
        mutation: &Mutation<'_>,
    ) -> CatalogResult<Vec<UpdateOutcome>> {
        let current = self.store.find(
            Some(session),
            &self.collections.live,
            filter,
            &FindOptions::default(),
        )?;
        current
            .into_iter()
            .map(|doc| self.update_document(session, doc, release, mutation))
            .collect()
    }

    /// Like [`VersionedStore::update`] for exactly one live document.
    ///
    /// # Errors
    ///
    /// `NotFound` when nothing matches, `AmbiguousUpdate` when more than one
    /// document matches; nothing is written in either case.
    pub fn update_single(
        &self,
        session: SessionId,
        filter: &Filter,
        release: u32,
        mutation: &Mutation<'_>,
    ) -> CatalogResult<UpdateOutcome> {
        let mut current = self.store.find(
            Some(session),
            &self.collections.live,
            filter,
            &FindOptions::default().limit(2),
        )?;
        match current.len() {
            0 => Err(CatalogError::not_found(
                self.collections.kind.name(),
                format!("{filter:?}"),
            )),
            1 => self.update_document(session, current.remove(0), release, mutation),
            _ => {
                let matched = self.store.count(Some(session), &self.collections.live, filter)?;
                Err(CatalogError::ambiguous_update(
                    self.collections.kind.name(),
                    usize::try_from(matched).unwrap_or(usize::MAX),
                ))
            }
        }
    }

    fn update_document(
        &self,
        session: SessionId,
        current: Document,
        release: u32,
        mutation: &Mutation<'_>,
    ) -> CatalogResult<UpdateOutcome> {
        let uid = uid_of(&current)?;
        let previous_version = version_of(&current);

        let mut next = current.clone();
        mutation.apply(&mut next)?;
        for key in PROTECTED {
            match current.get(key) {
                Some(value) => next.insert(*key, value.clone()),
                None => next.remove(key),
            };
        }

        let id = next.get_str(fields::ID).unwrap_or_default().to_string();
        if next == current {
            return Ok(UpdateOutcome {
                uid,
                id,
                previous_version,
                version: previous_version,
                changed: false,
                document: current,
            });
        }

        let mut version = previous_version;
        if mutation.is_versioned() {
            if self.collections.versioned() {
                self.archive(session, current, release)?;
                version = previous_version + 1;
                next.insert(fields::VERSION, version);
                next.insert(fields::RELEASE, release);
                next.insert(fields::RELEASE_FROM_VERSION, vec![release]);
                next.insert(fields::LAST_OF_VERSION, true);
                next.insert(fields::LAST_OF_RELEASE, true);
            }
            self.utils.touch(&mut next);
        }

        self.store
            .replace(Some(session), &self.collections.live, &by_uid(uid), next.clone())?;
        debug!(
            target: "catalogdb::versioned",
            collection = %self.collections.live,
            %uid,
            previous_version,
            version,
            %session,
            "entity updated"
        );
        Ok(UpdateOutcome {
            uid,
            id,
            previous_version,
            version,
            changed: true,
            document: next,
        })
    }

    /// Copies the superseded document into the archive.
    ///
    /// When the new version is created in the same release the superseded
    /// one became current in, that release now belongs to the new version.
    fn archive(&self, session: SessionId, mut doc: Document, release: u32) -> CatalogResult<()> {
        let release_value = Value::from(release);
        let mut releases: Vec<Value> = doc
            .get_array(fields::RELEASE_FROM_VERSION)
            .map(<[Value]>::to_vec)
            .unwrap_or_default();
        if releases.contains(&release_value) {
            if releases.len() > 1 {
                releases.retain(|r| *r != release_value);
            } else {
                doc.insert(fields::LAST_OF_RELEASE, false);
            }
        }
        doc.insert(fields::RELEASE_FROM_VERSION, releases);
        doc.insert(fields::LAST_OF_VERSION, false);
        self.store.insert(Some(session), &self.collections.archive, doc)?;
        Ok(())
    }

    /// Moves the whole history of `uid` into the deleted collection.
    ///
    /// Each moved version has its lifecycle status set to `DELETED` and is
    /// otherwise unchanged. Returns the number of versions moved.
    ///
    /// # Errors
    ///
    /// `NotFound` when `uid` has no live document.
    pub fn delete(&self, session: SessionId, uid: Uid) -> CatalogResult<usize> {
        let filter = by_uid(uid);
        if self.store.count(Some(session), &self.collections.live, &filter)? == 0 {
            return Err(CatalogError::not_found(
                self.collections.kind.name(),
                uid.to_string(),
            ));
        }
        let versions = self.history(Some(session), uid)?;
        let deleted_status = self.utils.status(status::DELETED, "");
        for mut doc in versions.iter().cloned() {
            doc.set_path(fields::INTERNAL_STATUS, deleted_status.clone())?;
            self.store.insert(Some(session), &self.collections.deleted, doc)?;
        }
        self.store.remove(Some(session), &self.collections.live, &filter)?;
        self.store
            .remove(Some(session), &self.collections.archive, &filter)?;
        info!(
            target: "catalogdb::versioned",
            collection = %self.collections.live,
            %uid,
            versions = versions.len(),
            %session,
            "entity deleted"
        );
        Ok(versions.len())
    }

    /// Carries the versions visible at snapshot `release - 1` of a study
    /// into `release`.
    ///
    /// # Errors
    ///
    /// Store errors.
    pub fn update_release(
        &self,
        session: SessionId,
        study_uid: Uid,
        release: u32,
    ) -> CatalogResult<u64> {
        let previous = release.saturating_sub(1);
        let filter = Filter::And(vec![
            Filter::eq(fields::STUDY_UID, study_uid),
            Filter::eq(fields::RELEASE_FROM_VERSION, previous),
            Filter::eq(fields::LAST_OF_RELEASE, true),
        ]);
        let update = Update::new().add_to_set(fields::RELEASE_FROM_VERSION, release);
        let mut modified = 0;
        for collection in [&self.collections.live, &self.collections.archive] {
            modified += self
                .store
                .update(Some(session), collection, &filter, &update, true)?
                .modified;
        }
        debug!(
            target: "catalogdb::versioned",
            collection = %self.collections.live,
            %study_uid,
            release,
            modified,
            "release carried over"
        );
        Ok(modified)
    }
}

impl fmt::Debug for VersionedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionedStore")
            .field("collections", &self.collections)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::txn::TransactionRunner;
    use catalogdb_store::MemoryDocumentStore;

    fn setup(kind: EntityKind) -> (VersionedStore, TransactionRunner) {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        (
            VersionedStore::new(kind, store.clone(), CatalogUtils::default()),
            TransactionRunner::new(store, RetryConfig::no_retry()),
        )
    }

    fn create(versioned: &VersionedStore, runner: &TransactionRunner, id: &str) -> Uid {
        let uid = versioned.next_uid();
        runner
            .run(|s| {
                versioned.insert(
                    s,
                    Document::new()
                        .with(fields::UID, uid)
                        .with(fields::STUDY_UID, 1)
                        .with(fields::ID, id),
                    1,
                )
            })
            .unwrap();
        uid
    }

    fn set_description(text: &str) -> Mutation<'_> {
        Mutation::versioned(move |doc| {
            doc.insert("description", text);
            Ok(())
        })
    }

    #[test]
    fn insert_sets_version_bookkeeping() {
        let (versioned, runner) = setup(EntityKind::Sample);
        let uid = create(&versioned, &runner, "S1");
        let history = versioned.history(None, uid).unwrap();
        assert_eq!(history.len(), 1);
        let doc = &history[0];
        assert_eq!(doc.get_i64("version"), Some(1));
        assert_eq!(doc.get_bool("_lastOfVersion"), Some(true));
        assert_eq!(doc.get_bool("_lastOfRelease"), Some(true));
        assert_eq!(doc.get_str("internal.status.id"), Some("READY"));
    }

    #[test]
    fn versioned_update_archives_previous() {
        let (versioned, runner) = setup(EntityKind::Sample);
        let uid = create(&versioned, &runner, "S1");
        let outcome = runner
            .run(|s| versioned.update_single(s, &by_uid(uid), 1, &set_description("a")))
            .unwrap();
        assert!(outcome.bumped());
        assert_eq!(outcome.version, 2);

        let history = versioned.history(None, uid).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].get_i64("version"), Some(1));
        assert_eq!(history[0].get_bool("_lastOfVersion"), Some(false));
        // superseded within its own release
        assert_eq!(history[0].get_bool("_lastOfRelease"), Some(false));
        assert_eq!(history[1].get_str("description"), Some("a"));
        assert_eq!(history[1].get_bool("_lastOfVersion"), Some(true));
    }

    #[test]
    fn unchanged_documents_keep_their_version() {
        let (versioned, runner) = setup(EntityKind::Sample);
        let uid = create(&versioned, &runner, "S1");
        runner
            .run(|s| versioned.update_single(s, &by_uid(uid), 1, &set_description("a")))
            .unwrap();
        let outcome = runner
            .run(|s| versioned.update_single(s, &by_uid(uid), 1, &set_description("a")))
            .unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.version, 2);
        assert_eq!(versioned.history(None, uid).unwrap().len(), 2);
    }

    #[test]
    fn in_place_updates_do_not_version() {
        let (versioned, runner) = setup(EntityKind::Sample);
        let uid = create(&versioned, &runner, "S1");
        let mutation = Mutation::in_place(|doc| {
            doc.insert("cache", 7);
            Ok(())
        });
        let outcome = runner
            .run(|s| versioned.update_single(s, &by_uid(uid), 1, &mutation))
            .unwrap();
        assert!(outcome.changed);
        assert!(!outcome.bumped());
        assert_eq!(versioned.history(None, uid).unwrap().len(), 1);
    }

    #[test]
    fn mutations_cannot_touch_bookkeeping() {
        let (versioned, runner) = setup(EntityKind::Sample);
        let uid = create(&versioned, &runner, "S1");
        let mutation = Mutation::versioned(|doc| {
            doc.insert(fields::VERSION, 99);
            doc.insert(fields::UID, 12345);
            Ok(())
        });
        let outcome = runner
            .run(|s| versioned.update_single(s, &by_uid(uid), 1, &mutation))
            .unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.uid, uid);
    }

    #[test]
    fn ambiguous_single_update_writes_nothing() {
        let (versioned, runner) = setup(EntityKind::Sample);
        create(&versioned, &runner, "S1");
        create(&versioned, &runner, "S2");
        let result = runner.run(|s| {
            versioned.update_single(s, &Filter::eq(fields::STUDY_UID, 1), 1, &set_description("x"))
        });
        assert!(matches!(
            result,
            Err(CatalogError::AmbiguousUpdate { matched: 2, .. })
        ));
        let missing =
            runner.run(|s| versioned.update_single(s, &by_uid(Uid::new(999)), 1, &set_description("x")));
        assert!(matches!(missing, Err(CatalogError::NotFound { .. })));
    }

    #[test]
    fn non_versioned_kinds_update_in_place() {
        let (versioned, runner) = setup(EntityKind::Study);
        let uid = create(&versioned, &runner, "st");
        let outcome = runner
            .run(|s| versioned.update_single(s, &by_uid(uid), 1, &set_description("a")))
            .unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.version, 1);
        assert_eq!(versioned.history(None, uid).unwrap().len(), 1);
    }

    #[test]
    fn delete_moves_every_version() {
        let (versioned, runner) = setup(EntityKind::Sample);
        let uid = create(&versioned, &runner, "S1");
        runner
            .run(|s| versioned.update_single(s, &by_uid(uid), 1, &set_description("a")))
            .unwrap();
        let before = versioned.history(None, uid).unwrap();
        assert_eq!(runner.run(|s| versioned.delete(s, uid)).unwrap(), 2);

        assert!(versioned.history(None, uid).unwrap().is_empty());
        let deleted = versioned.deleted_history(None, uid).unwrap();
        assert_eq!(deleted.len(), 2);
        for (mut old, mut gone) in before.into_iter().zip(deleted) {
            assert_eq!(gone.get_str("internal.status.id"), Some("DELETED"));
            old.remove_path("internal.status");
            gone.remove_path("internal.status");
            assert_eq!(old, gone);
        }
        assert!(matches!(
            runner.run(|s| versioned.delete(s, uid)),
            Err(CatalogError::NotFound { .. })
        ));
    }

    #[test]
    fn release_rules_across_releases() {
        let (versioned, runner) = setup(EntityKind::Sample);
        let uid = create(&versioned, &runner, "S1");
        // release 2 begins: v1 is carried over
        runner
            .run(|s| versioned.update_release(s, Uid::new(1), 2))
            .unwrap();
        runner
            .run(|s| versioned.update_single(s, &by_uid(uid), 2, &set_description("a")))
            .unwrap();

        let history = versioned.history(None, uid).unwrap();
        let v1 = &history[0];
        assert_eq!(v1.get_array("_releaseFromVersion").unwrap(), &[Value::Integer(1)]);
        assert_eq!(v1.get_bool("_lastOfRelease"), Some(true));
        let v2 = &history[1];
        assert_eq!(v2.get_array("_releaseFromVersion").unwrap(), &[Value::Integer(2)]);
        assert_eq!(v2.get_i64("release"), Some(2));
    }
}
