//! Versioned collections.
//!
//! Each entity kind owns three collections:
//!
//! - `<name>`: the live collection, exactly one current document per uid
//! - `<name>_archive`: one immutable copy per superseded version
//! - `<name>_deleted`: the full history of deleted entities
//!
//! Live plus archive always hold every version an entity has had.

mod mutation;
mod store;

pub use mutation::{Mutation, MutationFn, UpdateOutcome};
pub use store::{CollectionSpec, VersionedStore};
