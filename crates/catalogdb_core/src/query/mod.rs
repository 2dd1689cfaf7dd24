//! Filter compiler: abstract, field oriented queries to native filters.
//!
//! A [`Query`] maps public field names to raw values such as `!=DELETED`,
//! `S1,S2` or `>=30`. Keys are resolved against the entity's
//! [`EntitySchema`] first, so compilation only ever sees known fields.
//! Compilation is pure and always yields an AND over fields with an OR
//! within each field.

mod annotation;
mod compiler;
mod parse;
mod schema;

pub use annotation::{compile_annotation, AnnotationClause};
pub use compiler::{CompileContext, CompiledQuery, FilterCompiler, VersionScope};
pub use parse::{
    split_operator, Clause, Combinator, Operator, ParsedField, ParsedQuery, Query, ValueExpr,
};
pub use schema::{EntitySchema, FieldDescriptor, FieldKind, ResolvedField};
