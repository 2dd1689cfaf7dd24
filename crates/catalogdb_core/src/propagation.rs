//! Reference propagation between entity kinds.
//!
//! Some entities embed pinned `{uid, id, version}` copies of others:
//! individuals pin samples, families pin individuals, datasets pin files.
//! Jobs reference files by uid only. After a version bump the owner of the
//! changed entity hands it to its [`ReferencePropagator`], which asks every
//! [`ReferenceHolder`] registered for that kind to refresh its copies.
//!
//! Edges are fixed when the adaptors are composed and always point from a
//! kind to kinds built before it (sample to individual to family, file to
//! dataset and job), so propagation terminates.

use std::fmt;
use std::sync::Arc;

use catalogdb_store::SessionId;
use tracing::debug;

use crate::error::CatalogResult;
use crate::types::{EntityKind, Uid};

/// Transaction the propagation runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropagationContext {
    /// Session of the enclosing transaction.
    pub session: SessionId,
    /// Release new versions are stamped with.
    pub release: u32,
}

/// An entity whose id or version just changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedEntity {
    /// Kind of the entity.
    pub kind: EntityKind,
    /// Its uid.
    pub uid: Uid,
    /// Its current id.
    pub id: String,
    /// Its current version.
    pub version: u32,
}

/// An entity kind that embeds references to another kind.
pub trait ReferenceHolder: Send + Sync {
    /// Kind of the holding entities.
    fn kind(&self) -> EntityKind;

    /// Refreshes every non-locked live reference to `changed`, going through
    /// the holder's own versioning. Returns how many holders changed.
    ///
    /// # Errors
    ///
    /// Store errors, or errors from further propagation.
    fn refresh_references(
        &self,
        ctx: &PropagationContext,
        changed: &ChangedEntity,
    ) -> CatalogResult<usize>;

    /// Removes every live reference to `uid`. Returns how many holders
    /// changed.
    ///
    /// # Errors
    ///
    /// `InUse` when the holder never lets go of the reference.
    fn remove_references(
        &self,
        ctx: &PropagationContext,
        source: EntityKind,
        uid: Uid,
    ) -> CatalogResult<usize>;

    /// Ids of live holders referencing `uid`, locked ones included.
    ///
    /// # Errors
    ///
    /// Store errors.
    fn referencing(
        &self,
        session: Option<SessionId>,
        source: EntityKind,
        uid: Uid,
    ) -> CatalogResult<Vec<String>>;
}

/// One registered dependency.
#[derive(Clone)]
pub struct ReferenceEdge {
    /// Kind being referenced.
    pub source: EntityKind,
    /// Kind holding the references.
    pub holder: Arc<dyn ReferenceHolder>,
}

impl fmt::Debug for ReferenceEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceEdge")
            .field("source", &self.source)
            .field("holder", &self.holder.kind())
            .finish()
    }
}

/// The outgoing edges of one entity kind, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ReferencePropagator {
    edges: Vec<ReferenceEdge>,
}

impl ReferencePropagator {
    /// A propagator with no edges.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `holder` as referencing `source`.
    #[must_use]
    pub fn with_edge(mut self, source: EntityKind, holder: Arc<dyn ReferenceHolder>) -> Self {
        self.edges.push(ReferenceEdge { source, holder });
        self
    }

    /// Registered edges.
    #[must_use]
    pub fn edges(&self) -> &[ReferenceEdge] {
        &self.edges
    }

    fn holders(&self, source: EntityKind) -> impl Iterator<Item = &ReferenceEdge> {
        self.edges.iter().filter(move |e| e.source == source)
    }

    /// Refreshes every pinned copy of `changed`. Returns the number of
    /// holders updated at the first level.
    ///
    /// # Errors
    ///
    /// The first holder error; the enclosing transaction aborts.
    pub fn propagate(
        &self,
        ctx: &PropagationContext,
        changed: &ChangedEntity,
    ) -> CatalogResult<usize> {
        let mut updated = 0;
        for edge in self.holders(changed.kind) {
            let n = edge.holder.refresh_references(ctx, changed)?;
            debug!(
                target: "catalogdb::propagation",
                source = %changed.kind,
                holder = %edge.holder.kind(),
                uid = %changed.uid,
                version = changed.version,
                updated = n,
                "references refreshed"
            );
            updated += n;
        }
        Ok(updated)
    }

    /// Removes every reference to `uid`, e.g. before a forced delete.
    ///
    /// # Errors
    ///
    /// `InUse` from holders that block removal.
    pub fn detach(
        &self,
        ctx: &PropagationContext,
        source: EntityKind,
        uid: Uid,
    ) -> CatalogResult<usize> {
        let mut updated = 0;
        for edge in self.holders(source) {
            let n = edge.holder.remove_references(ctx, source, uid)?;
            debug!(
                target: "catalogdb::propagation",
                %source,
                holder = %edge.holder.kind(),
                %uid,
                updated = n,
                "references removed"
            );
            updated += n;
        }
        Ok(updated)
    }

    /// Live entities referencing `uid`, as `(kind, id)` pairs.
    ///
    /// # Errors
    ///
    /// Store errors.
    pub fn references(
        &self,
        session: Option<SessionId>,
        source: EntityKind,
        uid: Uid,
    ) -> CatalogResult<Vec<(EntityKind, String)>> {
        let mut found = Vec::new();
        for edge in self.holders(source) {
            let kind = edge.holder.kind();
            found.extend(
                edge.holder
                    .referencing(session, source, uid)?
                    .into_iter()
                    .map(|id| (kind, id)),
            );
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        refreshed: Mutex<Vec<(Uid, u32)>>,
        block_removal: bool,
    }

    impl ReferenceHolder for Recorder {
        fn kind(&self) -> EntityKind {
            EntityKind::Family
        }

        fn refresh_references(
            &self,
            _ctx: &PropagationContext,
            changed: &ChangedEntity,
        ) -> CatalogResult<usize> {
            self.refreshed.lock().push((changed.uid, changed.version));
            Ok(1)
        }

        fn remove_references(
            &self,
            _ctx: &PropagationContext,
            _source: EntityKind,
            uid: Uid,
        ) -> CatalogResult<usize> {
            if self.block_removal {
                Err(CatalogError::in_use("individual", uid.to_string(), "blocked"))
            } else {
                Ok(2)
            }
        }

        fn referencing(
            &self,
            _session: Option<SessionId>,
            _source: EntityKind,
            _uid: Uid,
        ) -> CatalogResult<Vec<String>> {
            Ok(vec!["F1".to_string()])
        }
    }

    fn ctx() -> PropagationContext {
        PropagationContext {
            session: SessionId::new(1),
            release: 1,
        }
    }

    fn changed(kind: EntityKind) -> ChangedEntity {
        ChangedEntity {
            kind,
            uid: Uid::new(7),
            id: "I1".to_string(),
            version: 3,
        }
    }

    #[test]
    fn only_edges_of_the_source_kind_fire() {
        let recorder = Arc::new(Recorder::default());
        let propagator =
            ReferencePropagator::new().with_edge(EntityKind::Individual, recorder.clone());
        assert_eq!(propagator.propagate(&ctx(), &changed(EntityKind::Individual)).unwrap(), 1);
        assert_eq!(propagator.propagate(&ctx(), &changed(EntityKind::Sample)).unwrap(), 0);
        assert_eq!(*recorder.refreshed.lock(), vec![(Uid::new(7), 3)]);
    }

    #[test]
    fn references_are_labelled_with_the_holder_kind() {
        let propagator = ReferencePropagator::new()
            .with_edge(EntityKind::Individual, Arc::new(Recorder::default()));
        assert_eq!(
            propagator
                .references(None, EntityKind::Individual, Uid::new(7))
                .unwrap(),
            vec![(EntityKind::Family, "F1".to_string())]
        );
    }

    #[test]
    fn blocking_holder_stops_detach() {
        let propagator = ReferencePropagator::new().with_edge(
            EntityKind::File,
            Arc::new(Recorder {
                block_removal: true,
                ..Recorder::default()
            }),
        );
        assert!(matches!(
            propagator.detach(&ctx(), EntityKind::File, Uid::new(7)),
            Err(CatalogError::InUse { .. })
        ));
    }
}
