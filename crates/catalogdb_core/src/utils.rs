//! Stateless helpers shared by the versioned stores and adaptors.

use std::fmt;
use std::sync::Arc;

use catalogdb_codec::{Document, Value};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::types::fields;

/// Timestamp layout used for every stored date.
pub const DATE_FORMAT: &str = "%Y%m%d%H%M%S";

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A manually driven clock for deterministic tests.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Starts at the given instant.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Shared document helpers, injected into each versioned store.
///
/// Holds no state besides the clock, so clones are interchangeable.
#[derive(Clone)]
pub struct CatalogUtils {
    clock: Arc<dyn Clock>,
}

impl CatalogUtils {
    /// Creates helpers over a clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Current time formatted as `yyyyMMddHHmmss`.
    #[must_use]
    pub fn now(&self) -> String {
        self.clock.now().format(DATE_FORMAT).to_string()
    }

    /// A `{id, date, description}` status sub-document stamped now.
    #[must_use]
    pub fn status(&self, id: &str, description: &str) -> Document {
        Document::new()
            .with("id", id)
            .with("date", self.now())
            .with("description", description)
    }

    /// Fills in creation/modification dates and statuses a new document
    /// lacks.
    pub fn stamp_new(&self, doc: &mut Document) {
        let now = self.now();
        if doc.get_str(fields::CREATION_DATE).map_or(true, str::is_empty) {
            doc.insert(fields::CREATION_DATE, now.clone());
        }
        doc.insert(fields::MODIFICATION_DATE, now);
        if doc.get_str(fields::STATUS_ID).map_or(true, str::is_empty) {
            doc.insert("status", self.status(crate::types::status::READY, ""));
        }
        if doc.get_str(fields::INTERNAL_STATUS_ID).map_or(true, str::is_empty) {
            let mut internal = doc.get_document("internal").cloned().unwrap_or_default();
            internal.insert("status", self.status(crate::types::status::READY, ""));
            doc.insert("internal", internal);
        }
    }

    /// Sets the modification date to now.
    pub fn touch(&self, doc: &mut Document) {
        doc.insert(fields::MODIFICATION_DATE, self.now());
    }
}

impl Default for CatalogUtils {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl fmt::Debug for CatalogUtils {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogUtils")
            .field("now", &self.now())
            .finish_non_exhaustive()
    }
}

/// Text values of an array of strings, skipping anything else.
pub(crate) fn text_list(value: Option<&[Value]>) -> Vec<String> {
    value
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_text)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed() -> (Arc<FixedClock>, CatalogUtils) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap(),
        ));
        let utils = CatalogUtils::new(clock.clone());
        (clock, utils)
    }

    #[test]
    fn dates_use_compact_format() {
        let (clock, utils) = fixed();
        assert_eq!(utils.now(), "20240301123005");
        clock.advance(Duration::seconds(60));
        assert_eq!(utils.now(), "20240301123105");
    }

    #[test]
    fn stamp_new_keeps_existing_status() {
        let (_, utils) = fixed();
        let mut doc = Document::new();
        doc.set_path("status.id", "PENDING").unwrap();
        utils.stamp_new(&mut doc);
        assert_eq!(doc.get_str("status.id"), Some("PENDING"));
        assert_eq!(doc.get_str("internal.status.id"), Some("READY"));
        assert_eq!(doc.get_str("creationDate"), Some("20240301123005"));
    }
}
