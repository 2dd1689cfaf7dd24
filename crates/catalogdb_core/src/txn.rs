//! Transaction runner: the only place sessions are opened.

use std::fmt;
use std::sync::Arc;

use catalogdb_store::{DocumentStore, SessionId};
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{CatalogError, CatalogResult};

/// Runs units of work inside store sessions, retrying on transient
/// conflicts.
///
/// Every path through [`TransactionRunner::run`] ends the session it opened
/// with a commit or an abort. A retry re-runs the whole unit of work from
/// its captured inputs; nothing from a failed attempt is reused.
#[derive(Clone)]
pub struct TransactionRunner {
    store: Arc<dyn DocumentStore>,
    retry: RetryConfig,
}

impl TransactionRunner {
    /// Creates a runner over a store.
    pub fn new(store: Arc<dyn DocumentStore>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Executes `work` atomically.
    ///
    /// Commits when `work` succeeds. On a transient conflict from `work` or
    /// from the commit, retries with exponential backoff up to the configured
    /// bound, then fails with [`CatalogError::TransientConflict`]. Any other
    /// error aborts and is returned unchanged.
    ///
    /// # Errors
    ///
    /// Whatever `work` returns, or the store's errors.
    pub fn run<T, F>(&self, work: F) -> CatalogResult<T>
    where
        F: Fn(SessionId) -> CatalogResult<T>,
    {
        let attempts = self.retry.max_retries + 1;
        for attempt in 0..attempts {
            let session = self.store.begin()?;
            debug!(target: "catalogdb::txn", %session, attempt, "transaction started");

            let error = match work(session) {
                Ok(value) => match self.store.commit(session) {
                    Ok(()) => {
                        debug!(target: "catalogdb::txn", %session, "transaction committed");
                        return Ok(value);
                    }
                    // A failed commit has already discarded the session.
                    Err(e) => CatalogError::from(e),
                },
                Err(e) => {
                    if let Err(abort_error) = self.store.abort(session) {
                        warn!(
                            target: "catalogdb::txn",
                            %session,
                            error = %abort_error,
                            "abort failed"
                        );
                    }
                    e
                }
            };

            if !error.is_transient() {
                debug!(target: "catalogdb::txn", %session, error = %error, "transaction aborted");
                return Err(error);
            }
            if attempt + 1 < attempts {
                let delay = self.retry.delay_for(attempt);
                warn!(
                    target: "catalogdb::txn",
                    %session,
                    attempt = attempt + 1,
                    max_retries = self.retry.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "transient conflict, retrying"
                );
                std::thread::sleep(delay);
            }
        }

        warn!(target: "catalogdb::txn", attempts, "retries exhausted");
        Err(CatalogError::TransientConflict { attempts })
    }
}

impl fmt::Debug for TransactionRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionRunner")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogdb_codec::Document;
    use catalogdb_store::{Filter, MemoryDocumentStore};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn runner(store: &Arc<MemoryDocumentStore>, retries: u32) -> TransactionRunner {
        TransactionRunner::new(
            store.clone(),
            RetryConfig::new().max_retries(retries).base_delay_ms(0),
        )
    }

    #[test]
    fn commit_on_success() {
        let store = Arc::new(MemoryDocumentStore::new());
        runner(&store, 0)
            .run(|s| {
                store.insert(Some(s), "sample", Document::new().with("id", "S1"))?;
                Ok(())
            })
            .unwrap();
        assert_eq!(store.collection_len("sample"), 1);
        assert_eq!(store.active_sessions(), 0);
    }

    #[test]
    fn rollback_on_error_keeps_original_error() {
        let store = Arc::new(MemoryDocumentStore::new());
        let result: CatalogResult<()> = runner(&store, 3).run(|s| {
            store.insert(Some(s), "sample", Document::new().with("id", "S1"))?;
            Err(CatalogError::invalid_argument("boom"))
        });
        assert!(matches!(result, Err(CatalogError::InvalidArgument { .. })));
        assert_eq!(store.collection_len("sample"), 0);
        assert_eq!(store.active_sessions(), 0);
    }

    #[test]
    fn retries_whole_unit_after_commit_conflict() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.inject_conflicts(2);
        let calls = AtomicU32::new(0);
        runner(&store, 3)
            .run(|s| {
                calls.fetch_add(1, Ordering::SeqCst);
                store.insert(Some(s), "sample", Document::new().with("id", "S1"))?;
                Ok(())
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.count(None, "sample", &Filter::All).unwrap(), 1);
    }

    #[test]
    fn exhausted_retries_surface_transient_conflict() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.inject_conflicts(10);
        let result = runner(&store, 2).run(|s| {
            store.insert(Some(s), "sample", Document::new())?;
            Ok(())
        });
        assert!(matches!(
            result,
            Err(CatalogError::TransientConflict { attempts: 3 })
        ));
        assert_eq!(store.collection_len("sample"), 0);
        assert_eq!(store.active_sessions(), 0);
    }
}
