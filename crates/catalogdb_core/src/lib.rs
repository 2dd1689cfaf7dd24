//! # CatalogDB Core
//!
//! Versioned entity layer of a research-data catalog.
//!
//! This crate provides:
//! - A filter compiler from abstract field queries to store filters,
//!   including version and snapshot selection and authorization scoping
//! - A versioned store keeping every version of an entity retrievable
//!   across live, archive and deleted collections
//! - A transaction runner retrying units of work on transient conflicts
//! - Reference propagation refreshing pinned copies after version bumps
//! - A relatives calculator for family roles
//! - Entity adaptors for projects, studies, samples, individuals,
//!   families, files, datasets and jobs
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use catalogdb_core::{CatalogAdaptorFactory, CatalogConfig, EntityAdaptor};
//! use catalogdb_core::model::{Project, Sample, Study};
//! use catalogdb_store::MemoryDocumentStore;
//!
//! let store = Arc::new(MemoryDocumentStore::new());
//! let catalog = CatalogAdaptorFactory::new(store, CatalogConfig::default());
//! catalog.projects().create(&Project::new("p1")).unwrap();
//! let study = catalog.studies().create("p1", &Study::new("s1", "owner")).unwrap();
//! catalog.samples().create(study.uid, &Sample::new("S1")).unwrap();
//! let sample = catalog.samples().get(study.uid, "S1", None).unwrap();
//! assert_eq!(sample.version, 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod adaptor;
pub mod authorization;
mod config;
mod error;
pub mod model;
pub mod pedigree;
pub mod propagation;
pub mod query;
mod txn;
mod types;
mod utils;
pub mod versioned;

pub use adaptor::{BatchResult, CatalogAdaptorFactory, EntityAdaptor, Event, EventKind};
pub use authorization::AuthorizationContext;
pub use config::{CatalogConfig, RetryConfig};
pub use error::{CatalogError, CatalogResult};
pub use query::{CompileContext, CompiledQuery, EntitySchema, FilterCompiler, Query, VersionScope};
pub use txn::TransactionRunner;
pub use types::{fields, status, EntityKind, Uid};
pub use utils::{CatalogUtils, Clock, FixedClock, SystemClock, DATE_FORMAT};
pub use versioned::{Mutation, UpdateOutcome, VersionedStore};
