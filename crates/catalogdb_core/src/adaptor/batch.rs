//! Per-entity outcomes of batch operations.

use std::fmt;

use tracing::warn;

use crate::error::{CatalogError, CatalogResult};

/// Warning for an update that matched but changed nothing.
pub(crate) const UNCHANGED: &str = "nothing to update";

/// Severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The entity was processed.
    Success,
    /// Processed, with something worth reporting.
    Warning,
    /// The entity was not processed.
    Error,
}

/// Outcome for one entity of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Severity.
    pub kind: EventKind,
    /// Entity id.
    pub id: String,
    /// Human readable detail; empty on success.
    pub message: String,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.kind, self.id)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

/// Result of an operation applied to many entities, each in its own
/// transaction. One failure never stops the others.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult<T> {
    /// Results of the entities that succeeded.
    pub results: Vec<T>,
    /// One event per entity, in processing order.
    pub events: Vec<Event>,
}

impl<T> Default for BatchResult<T> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            events: Vec::new(),
        }
    }
}

impl<T> BatchResult<T> {
    /// Runs `op` for every id and records the outcomes.
    pub(crate) fn collect<I, F>(operation: &str, ids: I, op: F) -> Self
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> CatalogResult<T>,
    {
        Self::collect_noted(operation, ids, |id| op(id).map(|result| (result, None)))
    }

    /// Like [`collect`](Self::collect), where `op` may attach a warning to
    /// an entity it processed.
    pub(crate) fn collect_noted<I, F>(operation: &str, ids: I, op: F) -> Self
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> CatalogResult<(T, Option<String>)>,
    {
        let mut batch = Self::default();
        for id in ids {
            match op(&id) {
                Ok((result, None)) => batch.push_success(id, result),
                Ok((result, Some(note))) => batch.push_warning(id, result, note),
                Err(error) => {
                    warn!(
                        target: "catalogdb::batch",
                        operation,
                        %id,
                        %error,
                        "batch item failed"
                    );
                    batch.push_error(id, &error);
                }
            }
        }
        batch
    }

    /// Records a success.
    pub fn push_success(&mut self, id: impl Into<String>, result: T) {
        self.results.push(result);
        self.events.push(Event {
            kind: EventKind::Success,
            id: id.into(),
            message: String::new(),
        });
    }

    /// Records an entity that was processed with something to report.
    pub fn push_warning(&mut self, id: impl Into<String>, result: T, message: impl Into<String>) {
        self.results.push(result);
        self.events.push(Event {
            kind: EventKind::Warning,
            id: id.into(),
            message: message.into(),
        });
    }

    /// Records a failure.
    pub fn push_error(&mut self, id: impl Into<String>, error: &CatalogError) {
        self.events.push(Event {
            kind: EventKind::Error,
            id: id.into(),
            message: error.to_string(),
        });
    }

    /// Number of entities processed, warnings included.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.events.len() - self.error_count()
    }

    /// Number of entities processed with a warning.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.count(EventKind::Warning)
    }

    /// Number of entities that failed.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.count(EventKind::Error)
    }

    /// Whether every entity was processed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.error_count() == 0
    }

    /// Failure events keyed by entity id.
    pub fn failures(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(|e| e.kind == EventKind::Error)
    }

    fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }
}
