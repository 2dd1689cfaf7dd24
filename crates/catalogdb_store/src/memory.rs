//! In-memory document store.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use catalogdb_codec::{Decode, Document, Encode};
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::backend::{DocumentStore, UpdateResult};
use crate::error::{StoreError, StoreResult};
use crate::filter::Filter;
use crate::pipeline::{run_pipeline, FindOptions, Stage};
use crate::session::{PendingWrite, SessionId, SessionState};
use crate::update::Update;

#[derive(Debug, Default)]
struct CollectionData {
    /// Row id -> canonical CBOR bytes.
    rows: BTreeMap<u64, Vec<u8>>,
    /// Bumped on every commit that writes to the collection.
    seq: u64,
}

/// An in-memory [`DocumentStore`] with optimistic transactions.
///
/// Documents are held as canonical CBOR. Sessions buffer their writes and
/// read committed data overlaid with their own writes. Commit is serialized
/// by a single writer lock and validates that:
/// - no collection the session read has been committed to since, and
/// - every row the session overwrote still hashes to the bytes it was based on.
///
/// Either violation fails the commit with [`StoreError::TransientConflict`].
///
/// # Example
///
/// ```rust
/// use catalogdb_codec::Document;
/// use catalogdb_store::{DocumentStore, Filter, FindOptions, MemoryDocumentStore};
///
/// let store = MemoryDocumentStore::new();
/// let session = store.begin().unwrap();
/// store.insert(Some(session), "sample", Document::new().with("id", "S1")).unwrap();
/// assert!(store.find(None, "sample", &Filter::All, &FindOptions::default()).unwrap().is_empty());
/// store.commit(session).unwrap();
/// assert_eq!(store.count(None, "sample", &Filter::eq("id", "S1")).unwrap(), 1);
/// ```
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, CollectionData>>,
    sessions: Mutex<HashMap<SessionId, SessionState>>,
    next_session: AtomicU64,
    next_row: AtomicU64,
    next_uid: AtomicU64,
    /// Only one commit at a time.
    write_lock: Mutex<()>,
    /// Number of upcoming writing commits to fail with a conflict.
    injected_conflicts: AtomicU32,
}

impl MemoryDocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` commits that carry writes fail with a
    /// transient conflict.
    pub fn inject_conflicts(&self, count: u32) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    /// Number of sessions that are neither committed nor aborted.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Number of committed documents in a collection.
    #[must_use]
    pub fn collection_len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, |c| c.rows.len())
    }

    fn snapshot(&self, collection: &str) -> (BTreeMap<u64, Vec<u8>>, u64) {
        self.collections
            .read()
            .get(collection)
            .map(|c| (c.rows.clone(), c.seq))
            .unwrap_or_default()
    }

    /// Committed rows overlaid with the session's writes, decoded.
    fn view(&self, session: Option<SessionId>, collection: &str) -> StoreResult<Vec<(u64, Document)>> {
        let (mut rows, seq) = self.snapshot(collection);
        if let Some(session) = session {
            let mut sessions = self.sessions.lock();
            let state = sessions
                .get_mut(&session)
                .ok_or(StoreError::SessionNotFound { session })?;
            state.observed.entry(collection.to_string()).or_insert(seq);
            for (row, write) in state.writes_for(collection) {
                match write {
                    PendingWrite::Put(bytes) => {
                        rows.insert(row, bytes.clone());
                    }
                    PendingWrite::Delete => {
                        rows.remove(&row);
                    }
                }
            }
        }
        rows.into_iter()
            .map(|(row, bytes)| {
                Document::decode(&bytes)
                    .map(|doc| (row, doc))
                    .map_err(StoreError::from)
            })
            .collect()
    }

    fn stage(&self, session: SessionId, collection: &str, row: u64, write: PendingWrite) -> StoreResult<()> {
        let mut sessions = self.sessions.lock();
        let state = sessions
            .get_mut(&session)
            .ok_or(StoreError::SessionNotFound { session })?;
        let key = (collection.to_string(), row);
        if !state.writes.contains_key(&key) && !state.before_hashes.contains_key(&key) {
            let committed = self
                .collections
                .read()
                .get(collection)
                .and_then(|c| c.rows.get(&row))
                .map(|bytes| hash(bytes));
            if let Some(before) = committed {
                state.before_hashes.insert(key.clone(), before);
            }
        }
        state.writes.insert(key, write);
        Ok(())
    }

    /// Runs `f` in the given session, or in a fresh one committed on success.
    fn in_session<T>(
        &self,
        session: Option<SessionId>,
        f: impl FnOnce(SessionId) -> StoreResult<T>,
    ) -> StoreResult<T> {
        if let Some(session) = session {
            return f(session);
        }
        let session = self.begin()?;
        match f(session) {
            Ok(value) => {
                self.commit(session)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort_error) = self.abort(session) {
                    warn!(
                        target: "catalogdb::store",
                        %session,
                        error = %abort_error,
                        "abort failed"
                    );
                }
                Err(e)
            }
        }
    }
}

fn hash(bytes: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(bytes));
    out
}

impl DocumentStore for MemoryDocumentStore {
    fn begin(&self) -> StoreResult<SessionId> {
        let session = SessionId::new(self.next_session.fetch_add(1, Ordering::SeqCst) + 1);
        self.sessions.lock().insert(session, SessionState::default());
        Ok(session)
    }

    fn commit(&self, session: SessionId) -> StoreResult<()> {
        let _write_guard = self.write_lock.lock();
        let state = self
            .sessions
            .lock()
            .remove(&session)
            .ok_or(StoreError::SessionNotFound { session })?;

        if state.is_read_only() {
            return Ok(());
        }

        if self
            .injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            debug!(target: "catalogdb::store", %session, "injected commit conflict");
            return Err(StoreError::conflict(format!("injected conflict for {session}")));
        }

        let mut collections = self.collections.write();
        for (name, seen) in &state.observed {
            let current = collections.get(name).map_or(0, |c| c.seq);
            if current != *seen {
                return Err(StoreError::conflict(format!(
                    "collection '{name}' changed since {session} read it"
                )));
            }
        }
        for ((name, row), before) in &state.before_hashes {
            let current = collections
                .get(name)
                .and_then(|c| c.rows.get(row))
                .map(|bytes| hash(bytes));
            if current.as_ref() != Some(before) {
                return Err(StoreError::conflict(format!(
                    "document {row} in '{name}' was modified concurrently"
                )));
            }
        }

        let write_count = state.writes.len();
        let mut touched = BTreeSet::new();
        for ((name, row), write) in state.writes {
            let data = collections.entry(name.clone()).or_default();
            match write {
                PendingWrite::Put(bytes) => {
                    data.rows.insert(row, bytes);
                }
                PendingWrite::Delete => {
                    data.rows.remove(&row);
                }
            }
            touched.insert(name);
        }
        for name in touched {
            if let Some(data) = collections.get_mut(&name) {
                data.seq += 1;
            }
        }

        debug!(target: "catalogdb::store", %session, writes = write_count, "session committed");
        Ok(())
    }

    fn abort(&self, session: SessionId) -> StoreResult<()> {
        self.sessions
            .lock()
            .remove(&session)
            .map(|_| ())
            .ok_or(StoreError::SessionNotFound { session })
    }

    fn insert(&self, session: Option<SessionId>, collection: &str, doc: Document) -> StoreResult<()> {
        let bytes = doc.encode()?;
        self.in_session(session, |s| {
            let row = self.next_row.fetch_add(1, Ordering::SeqCst);
            self.stage(s, collection, row, PendingWrite::Put(bytes))
        })
    }

    fn find(
        &self,
        session: Option<SessionId>,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> StoreResult<Vec<Document>> {
        let docs = self
            .view(session, collection)?
            .into_iter()
            .map(|(_, doc)| doc)
            .filter(|doc| filter.matches(doc))
            .collect();
        run_pipeline(docs, &options.to_stages())
    }

    fn count(&self, session: Option<SessionId>, collection: &str, filter: &Filter) -> StoreResult<u64> {
        let view = self.view(session, collection)?;
        Ok(view.iter().filter(|(_, doc)| filter.matches(doc)).count() as u64)
    }

    fn update(
        &self,
        session: Option<SessionId>,
        collection: &str,
        filter: &Filter,
        update: &Update,
        multi: bool,
    ) -> StoreResult<UpdateResult> {
        self.in_session(session, |s| {
            let mut result = UpdateResult::default();
            for (row, doc) in self.view(Some(s), collection)? {
                if !filter.matches(&doc) {
                    continue;
                }
                result.matched += 1;
                let mut next = doc.clone();
                update.apply(&mut next)?;
                if next != doc {
                    self.stage(s, collection, row, PendingWrite::Put(next.encode()?))?;
                    result.modified += 1;
                }
                if !multi {
                    break;
                }
            }
            Ok(result)
        })
    }

    fn replace(
        &self,
        session: Option<SessionId>,
        collection: &str,
        filter: &Filter,
        doc: Document,
    ) -> StoreResult<UpdateResult> {
        let bytes = doc.encode()?;
        self.in_session(session, |s| {
            let target = self
                .view(Some(s), collection)?
                .into_iter()
                .find(|(_, existing)| filter.matches(existing));
            match target {
                Some((row, existing)) => {
                    let modified = u64::from(existing != doc);
                    self.stage(s, collection, row, PendingWrite::Put(bytes))?;
                    Ok(UpdateResult {
                        matched: 1,
                        modified,
                    })
                }
                None => Ok(UpdateResult::default()),
            }
        })
    }

    fn remove(&self, session: Option<SessionId>, collection: &str, filter: &Filter) -> StoreResult<u64> {
        self.in_session(session, |s| {
            let mut removed = 0;
            for (row, doc) in self.view(Some(s), collection)? {
                if filter.matches(&doc) {
                    self.stage(s, collection, row, PendingWrite::Delete)?;
                    removed += 1;
                }
            }
            Ok(removed)
        })
    }

    fn aggregate(
        &self,
        session: Option<SessionId>,
        collection: &str,
        pipeline: &[Stage],
    ) -> StoreResult<Vec<Document>> {
        let docs = self
            .view(session, collection)?
            .into_iter()
            .map(|(_, doc)| doc)
            .collect();
        run_pipeline(docs, pipeline)
    }

    fn next_uid(&self) -> u64 {
        self.next_uid.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl std::fmt::Debug for MemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // One lock at a time; `stage` takes `sessions` before `collections`.
        let collections = self.collections.read().len();
        let active_sessions = self.active_sessions();
        f.debug_struct("MemoryDocumentStore")
            .field("collections", &collections)
            .field("active_sessions", &active_sessions)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, uid: i64) -> Document {
        Document::new().with("id", id).with("_uid", uid)
    }

    fn all(store: &MemoryDocumentStore, collection: &str) -> Vec<Document> {
        store
            .find(None, collection, &Filter::All, &FindOptions::default())
            .unwrap()
    }

    #[test]
    fn session_reads_its_own_writes() {
        let store = MemoryDocumentStore::new();
        let s = store.begin().unwrap();
        store.insert(Some(s), "sample", sample("S1", 1)).unwrap();
        assert_eq!(store.count(Some(s), "sample", &Filter::All).unwrap(), 1);
        assert_eq!(store.count(None, "sample", &Filter::All).unwrap(), 0);
        store.commit(s).unwrap();
        assert_eq!(all(&store, "sample").len(), 1);
        assert_eq!(store.active_sessions(), 0);
    }

    #[test]
    fn abort_discards_writes() {
        let store = MemoryDocumentStore::new();
        let s = store.begin().unwrap();
        store.insert(Some(s), "sample", sample("S1", 1)).unwrap();
        store.abort(s).unwrap();
        assert!(all(&store, "sample").is_empty());
        assert!(matches!(
            store.commit(s),
            Err(StoreError::SessionNotFound { .. })
        ));
    }

    #[test]
    fn concurrent_writer_causes_conflict() {
        let store = MemoryDocumentStore::new();
        store.insert(None, "sample", sample("S1", 1)).unwrap();

        let first = store.begin().unwrap();
        let second = store.begin().unwrap();
        let rename = |s, id: &str| {
            store
                .update(
                    Some(s),
                    "sample",
                    &Filter::eq("_uid", 1i64),
                    &Update::new().set("id", id),
                    false,
                )
                .unwrap()
        };
        assert_eq!(rename(first, "A").modified, 1);
        assert_eq!(rename(second, "B").modified, 1);

        store.commit(first).unwrap();
        let err = store.commit(second).unwrap_err();
        assert!(err.is_transient());
        assert_eq!(all(&store, "sample")[0].get_str("id"), Some("A"));
    }

    #[test]
    fn read_only_session_never_conflicts() {
        let store = MemoryDocumentStore::new();
        let reader = store.begin().unwrap();
        store.count(Some(reader), "sample", &Filter::All).unwrap();
        store.insert(None, "sample", sample("S1", 1)).unwrap();
        store.commit(reader).unwrap();
    }

    #[test]
    fn injected_conflicts_only_hit_writing_commits() {
        let store = MemoryDocumentStore::new();
        store.inject_conflicts(1);
        let reader = store.begin().unwrap();
        store.commit(reader).unwrap();
        assert!(store.insert(None, "sample", sample("S1", 1)).unwrap_err().is_transient());
        store.insert(None, "sample", sample("S1", 1)).unwrap();
        assert_eq!(store.collection_len("sample"), 1);
    }

    #[test]
    fn failed_autocommit_write_closes_its_session() {
        let store = MemoryDocumentStore::new();
        store.insert(None, "sample", sample("S1", 1)).unwrap();
        let err = store
            .update(None, "sample", &Filter::All, &Update::new().push("id", "S2"), false)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidUpdate { .. }));
        assert_eq!(store.active_sessions(), 0);
        assert_eq!(all(&store, "sample"), vec![sample("S1", 1)]);
    }

    #[test]
    fn debug_output_while_a_commit_is_in_flight() {
        let store = MemoryDocumentStore::new();
        let s = store.begin().unwrap();
        store.insert(Some(s), "sample", sample("S1", 1)).unwrap();
        std::thread::scope(|scope| {
            scope.spawn(|| store.commit(s).unwrap());
            for _ in 0..100 {
                assert!(format!("{store:?}").starts_with("MemoryDocumentStore"));
            }
        });
        assert_eq!(
            format!("{store:?}"),
            "MemoryDocumentStore { collections: 1, active_sessions: 0, .. }"
        );
    }

    #[test]
    fn update_multi_and_remove() {
        let store = MemoryDocumentStore::new();
        for (i, id) in ["S1", "S2", "S3"].iter().enumerate() {
            store.insert(None, "sample", sample(id, i as i64 + 1)).unwrap();
        }
        let result = store
            .update(
                None,
                "sample",
                &Filter::Gt("_uid".into(), 1i64.into()),
                &Update::new().set("status.id", "READY"),
                true,
            )
            .unwrap();
        assert_eq!(result, UpdateResult { matched: 2, modified: 2 });
        assert_eq!(store.remove(None, "sample", &Filter::eq("status.id", "READY")).unwrap(), 2);
        assert_eq!(all(&store, "sample").len(), 1);
    }

    #[test]
    fn replace_keeps_insertion_position() {
        let store = MemoryDocumentStore::new();
        store.insert(None, "sample", sample("S1", 1)).unwrap();
        store.insert(None, "sample", sample("S2", 2)).unwrap();
        store
            .replace(None, "sample", &Filter::eq("_uid", 1i64), sample("S1b", 1))
            .unwrap();
        let ids: Vec<String> = all(&store, "sample")
            .iter()
            .filter_map(|d| d.get_str("id").map(str::to_string))
            .collect();
        assert_eq!(ids, vec!["S1b", "S2"]);
    }

    #[test]
    fn uids_are_never_reused() {
        let store = MemoryDocumentStore::new();
        let s = store.begin().unwrap();
        let first = store.next_uid();
        store.abort(s).unwrap();
        assert!(store.next_uid() > first);
    }
}
