//! # CatalogDB Testkit
//!
//! Test utilities for CatalogDB.
//!
//! This crate provides:
//! - A seeded in-memory catalog with one project and one study
//! - Scenario builders for pedigrees, families and datasets
//! - Property-based test generators using proptest
//! - Tracing initialisation for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use catalogdb_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_catalog() {
//!     let tc = TestCatalog::new();
//!     let family = scenarios::i1_i2_f1(&tc);
//!     // ... test operations
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
