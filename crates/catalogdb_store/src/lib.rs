//! # CatalogDB Store
//!
//! The document store that CatalogDB's versioned entity layer runs on.
//!
//! This crate defines what the catalog needs from a document database:
//!
//! - Named collections of [`catalogdb_codec::Document`]s
//! - A native [`Filter`] language with array-aware path semantics
//! - Field-level [`Update`] operators and aggregation [`Stage`]s
//! - Multi-document sessions whose commit can fail with a transient conflict
//! - A catalog-wide monotonic uid generator
//!
//! [`DocumentStore`] is the seam; [`MemoryDocumentStore`] is the in-process
//! implementation used for tests and embedding.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod filter;
mod memory;
mod pipeline;
mod session;
mod update;

pub use backend::{DocumentStore, UpdateResult};
pub use error::{StoreError, StoreResult};
pub use filter::{resolve, Filter, Pattern};
pub use memory::MemoryDocumentStore;
pub use pipeline::{run_pipeline, FindOptions, SortOrder, Stage};
pub use session::SessionId;
pub use update::{Update, UpdateOp};
