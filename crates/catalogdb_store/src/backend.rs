//! Document store trait definition.

use catalogdb_codec::Document;

use crate::error::StoreResult;
use crate::filter::Filter;
use crate::pipeline::{FindOptions, Stage};
use crate::session::SessionId;
use crate::update::Update;

/// Outcome of an update or replace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    /// Documents matched by the filter.
    pub matched: u64,
    /// Documents whose content actually changed.
    pub modified: u64,
}

/// A collection-oriented document store with multi-document transactions.
///
/// Every data operation takes an optional session. With `Some(session)` the
/// operation joins that transaction: writes stay invisible to others until
/// [`DocumentStore::commit`], and reads see the session's own writes. With
/// `None`, reads are read-committed and writes commit immediately.
///
/// # Invariants
///
/// - A session is finished exactly once, by `commit` or `abort`
/// - A failed `commit` has already discarded the session
/// - `commit` fails with a transient conflict when data the session read or
///   wrote changed underneath it; the caller retries the whole unit of work
/// - `next_uid` never returns the same value twice, even across aborts
///
/// # Implementors
///
/// - [`super::MemoryDocumentStore`] - For testing and embedding
pub trait DocumentStore: Send + Sync {
    /// Opens a session.
    ///
    /// # Errors
    ///
    /// Implementation specific.
    fn begin(&self) -> StoreResult<SessionId>;

    /// Validates and applies a session's writes atomically.
    ///
    /// # Errors
    ///
    /// Returns a transient conflict if validation fails, or
    /// `SessionNotFound` for a finished session.
    fn commit(&self, session: SessionId) -> StoreResult<()>;

    /// Discards a session's writes.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` for a finished session.
    fn abort(&self, session: SessionId) -> StoreResult<()>;

    /// Inserts a document.
    ///
    /// # Errors
    ///
    /// Fails on encoding errors or an unknown session.
    fn insert(&self, session: Option<SessionId>, collection: &str, doc: Document) -> StoreResult<()>;

    /// Returns documents matching a filter, in insertion order unless sorted.
    ///
    /// # Errors
    ///
    /// Fails on decoding errors or an unknown session.
    fn find(
        &self,
        session: Option<SessionId>,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> StoreResult<Vec<Document>>;

    /// Counts documents matching a filter.
    ///
    /// # Errors
    ///
    /// Fails on decoding errors or an unknown session.
    fn count(&self, session: Option<SessionId>, collection: &str, filter: &Filter)
        -> StoreResult<u64>;

    /// Applies an update to the first (or, with `multi`, every) match.
    ///
    /// # Errors
    ///
    /// Fails if the update cannot be applied to a matched document.
    fn update(
        &self,
        session: Option<SessionId>,
        collection: &str,
        filter: &Filter,
        update: &Update,
        multi: bool,
    ) -> StoreResult<UpdateResult>;

    /// Replaces the first document matching a filter.
    ///
    /// # Errors
    ///
    /// Fails on encoding errors or an unknown session.
    fn replace(
        &self,
        session: Option<SessionId>,
        collection: &str,
        filter: &Filter,
        doc: Document,
    ) -> StoreResult<UpdateResult>;

    /// Removes every document matching a filter, returning how many.
    ///
    /// # Errors
    ///
    /// Fails on decoding errors or an unknown session.
    fn remove(&self, session: Option<SessionId>, collection: &str, filter: &Filter)
        -> StoreResult<u64>;

    /// Runs an aggregation pipeline over a collection.
    ///
    /// # Errors
    ///
    /// Fails if a stage cannot be applied.
    fn aggregate(
        &self,
        session: Option<SessionId>,
        collection: &str,
        pipeline: &[Stage],
    ) -> StoreResult<Vec<Document>>;

    /// Returns the next catalog-wide unique identifier.
    fn next_uid(&self) -> u64;
}
