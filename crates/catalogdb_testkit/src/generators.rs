//! Property-based test generators using proptest.
//!
//! Provides strategies for abstract queries that the filter compiler
//! accepts, and for entity ids.

use catalogdb_core::Query;
use proptest::prelude::*;

/// Strategy for generating entity ids.
pub fn entity_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][A-Z0-9_]{0,11}").expect("Invalid regex")
}

/// Strategy for a clause on a text field: an optional operator and a
/// literal.
pub fn text_clause_strategy() -> impl Strategy<Value = String> {
    (
        prop::sample::select(vec!["", "=", "==", "!=", "~", "!~"]),
        prop::string::string_regex("[a-zA-Z0-9]{1,8}").expect("Invalid regex"),
    )
        .prop_map(|(op, value)| format!("{op}{value}"))
}

/// Strategy for a clause on an integer field.
pub fn integer_clause_strategy() -> impl Strategy<Value = String> {
    (
        prop::sample::select(vec!["", "=", "!=", "<", "<=", ">", ">="]),
        0i64..1000,
    )
        .prop_map(|(op, value)| format!("{op}{value}"))
}

/// Joins clauses with one combinator, as the query grammar requires.
fn joined(clauses: impl Strategy<Value = String>) -> impl Strategy<Value = String> {
    (prop::collection::vec(clauses, 1..4), any::<bool>()).prop_map(|(clauses, and)| {
        clauses.join(if and { ";" } else { "," })
    })
}

/// Strategy for a valid sample query over a mix of fields.
pub fn sample_query_strategy() -> impl Strategy<Value = Query> {
    (
        prop::option::of(joined(text_clause_strategy())),
        prop::option::of(joined(text_clause_strategy())),
        prop::option::of(joined(integer_clause_strategy())),
        prop::option::of(prop::sample::select(vec!["true", "false", "!=true"])),
        prop::option::of(prop::sample::select(vec!["all", "1", "2,3"])),
    )
        .prop_map(|(id, description, size, somatic, version)| {
            let mut query = Query::new();
            if let Some(id) = id {
                query.set("id", id);
            }
            if let Some(description) = description {
                query.set("description", description);
            }
            if let Some(size) = size {
                query.set("nattributes.size", size);
            }
            if let Some(somatic) = somatic {
                query.set("somatic", somatic);
            }
            if let Some(version) = version {
                query.set("version", version);
            }
            query
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogdb_core::{CompileContext, EntityKind, EntitySchema, FilterCompiler};
    use proptest::test_runner::TestRunner;

    #[test]
    fn generated_queries_compile() {
        let mut runner = TestRunner::default();
        let schema = EntitySchema::of(EntityKind::Sample);
        runner
            .run(&sample_query_strategy(), |query| {
                FilterCompiler::compile(&schema, &query, &CompileContext::default())
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
                Ok(())
            })
            .unwrap();
    }
}
