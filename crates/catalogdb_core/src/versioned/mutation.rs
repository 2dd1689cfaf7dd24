//! Caller supplied document mutations.

use std::fmt;

use catalogdb_codec::Document;
use catalogdb_store::Update;

use crate::error::CatalogResult;
use crate::types::Uid;

/// Body of a mutation. Invoked on a fresh copy of the current document in
/// every attempt, so it must not depend on state from earlier attempts.
pub type MutationFn<'a> = Box<dyn Fn(&mut Document) -> CatalogResult<()> + 'a>;

/// A change to apply to live documents.
pub enum Mutation<'a> {
    /// Content change: archives the current version and bumps it.
    Versioned(MutationFn<'a>),
    /// Patch of non-versioning fields, applied in place.
    InPlace(MutationFn<'a>),
}

impl<'a> Mutation<'a> {
    /// A versioned mutation from a closure.
    pub fn versioned(f: impl Fn(&mut Document) -> CatalogResult<()> + 'a) -> Self {
        Self::Versioned(Box::new(f))
    }

    /// An in-place mutation from a closure.
    pub fn in_place(f: impl Fn(&mut Document) -> CatalogResult<()> + 'a) -> Self {
        Self::InPlace(Box::new(f))
    }

    /// A versioned mutation applying a store update.
    #[must_use]
    pub fn update(update: Update) -> Self {
        Self::versioned(move |doc| Ok(update.apply(doc)?))
    }

    /// An in-place mutation applying a store update.
    #[must_use]
    pub fn patch(update: Update) -> Self {
        Self::in_place(move |doc| Ok(update.apply(doc)?))
    }

    /// Whether applying this may create a new version.
    #[must_use]
    pub const fn is_versioned(&self) -> bool {
        matches!(self, Self::Versioned(_))
    }

    pub(crate) fn apply(&self, doc: &mut Document) -> CatalogResult<()> {
        match self {
            Self::Versioned(f) | Self::InPlace(f) => f(doc),
        }
    }
}

impl fmt::Debug for Mutation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Versioned(_) => f.write_str("Mutation::Versioned"),
            Self::InPlace(_) => f.write_str("Mutation::InPlace"),
        }
    }
}

/// What an update did to one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    /// Entity uid.
    pub uid: Uid,
    /// Entity id after the update.
    pub id: String,
    /// Version before the update.
    pub previous_version: u32,
    /// Version after the update.
    pub version: u32,
    /// Whether the document changed at all.
    pub changed: bool,
    /// The live document after the update.
    pub document: Document,
}

impl UpdateOutcome {
    /// Whether a new version was created.
    #[must_use]
    pub const fn bumped(&self) -> bool {
        self.version > self.previous_version
    }
}
