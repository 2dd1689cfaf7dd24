//! Abstract query to native filter.

use catalogdb_codec::Value;
use catalogdb_store::Filter;
use tracing::debug;

use super::annotation::compile_annotation;
use super::parse::{Clause, Combinator, Operator, ParsedQuery, Query, ValueExpr};
use super::schema::{EntitySchema, FieldKind, ResolvedField};
use crate::error::{CatalogError, CatalogResult};
use crate::model::VariableSet;
use crate::types::fields;

/// Collections a compiled query must be run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionScope {
    /// Live collection only.
    Latest,
    /// Live and archive collections.
    History,
}

/// Inputs to compilation besides the query itself.
#[derive(Debug, Clone, Default)]
pub struct CompileContext<'a> {
    /// Authorization sub-expression to conjoin, if any.
    pub authorization: Option<Filter>,
    /// Variable sets used to type annotation values.
    pub variable_sets: &'a [VariableSet],
    /// Reject annotation queries on undeclared variable sets.
    pub strict_annotations: bool,
}

/// Result of compiling a query.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// Native filter: AND over fields, OR within a field.
    pub filter: Filter,
    /// Where to run it.
    pub scope: VersionScope,
}

/// Turns abstract queries into native filters. Pure.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterCompiler;

impl FilterCompiler {
    /// Resolves and compiles `query`.
    ///
    /// # Errors
    ///
    /// `Query` for unknown fields or malformed values, `Parse` for literals
    /// that do not fit their field.
    pub fn compile(
        schema: &EntitySchema,
        query: &Query,
        ctx: &CompileContext<'_>,
    ) -> CatalogResult<CompiledQuery> {
        let parsed = ParsedQuery::parse(schema, query)?;
        Self::compile_parsed(&parsed, ctx)
    }

    /// Compiles an already resolved query.
    ///
    /// # Errors
    ///
    /// As [`FilterCompiler::compile`].
    pub fn compile_parsed(
        parsed: &ParsedQuery,
        ctx: &CompileContext<'_>,
    ) -> CatalogResult<CompiledQuery> {
        let mut clauses = Vec::new();
        let mut all_versions = false;
        let mut explicit_version = false;
        let mut snapshot = false;

        for parsed_field in parsed.fields() {
            let field = &parsed_field.field;
            let raw = parsed_field.raw.as_str();
            match field.kind {
                FieldKind::Version if raw.trim().eq_ignore_ascii_case("all") => {
                    all_versions = true;
                }
                FieldKind::Version => {
                    explicit_version = true;
                    clauses.push(compile_field(field, raw)?);
                }
                FieldKind::Snapshot => {
                    snapshot = true;
                    clauses.push(compile_field(field, raw)?);
                }
                FieldKind::Annotation => clauses.push(compile_annotation(
                    raw,
                    ctx.variable_sets,
                    ctx.strict_annotations,
                )?),
                _ => clauses.push(compile_field(field, raw)?),
            }
        }

        if snapshot && !all_versions && !explicit_version {
            clauses.push(Filter::eq(fields::LAST_OF_RELEASE, true));
        } else if !all_versions && !explicit_version {
            clauses.push(Filter::eq(fields::LAST_OF_VERSION, true));
        }
        if let Some(authorization) = &ctx.authorization {
            clauses.push(authorization.clone());
        }

        let scope = if all_versions || explicit_version || snapshot {
            VersionScope::History
        } else {
            VersionScope::Latest
        };
        let filter = if clauses.is_empty() {
            Filter::All
        } else {
            Filter::And(clauses)
        };
        debug!(target: "catalogdb::query", ?filter, ?scope, "query compiled");
        Ok(CompiledQuery { filter, scope })
    }
}

/// Typed operand of a field clause.
fn typed_value(field: &ResolvedField, text: &str) -> CatalogResult<Value> {
    let parse_error = || CatalogError::parse(field.key.as_str(), text);
    match field.kind {
        FieldKind::Uid
        | FieldKind::StudyUid
        | FieldKind::Integer
        | FieldKind::Version
        | FieldKind::Snapshot
        | FieldKind::Release => text
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| parse_error()),
        FieldKind::Decimal | FieldKind::NumAttributes => text
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Value::Float)
            .ok_or_else(parse_error),
        FieldKind::Boolean | FieldKind::BoolAttributes => {
            match text.to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(parse_error()),
            }
        }
        FieldKind::Text
        | FieldKind::Date
        | FieldKind::Attributes
        | FieldKind::Annotation
        | FieldKind::VariableSet
        | FieldKind::Status
        | FieldKind::InternalStatus => Ok(Value::from(text)),
    }
}

const fn accepts_regex(kind: FieldKind) -> bool {
    matches!(
        kind,
        FieldKind::Text
            | FieldKind::Date
            | FieldKind::Attributes
            | FieldKind::VariableSet
            | FieldKind::Status
            | FieldKind::InternalStatus
    )
}

fn compile_field(field: &ResolvedField, raw: &str) -> CatalogResult<Filter> {
    let expr = ValueExpr::parse(&field.key, raw)?;
    let filters = expr
        .clauses
        .iter()
        .map(|clause| {
            if matches!(clause.op, Operator::Regex | Operator::NotRegex) && !accepts_regex(field.kind)
            {
                return Err(CatalogError::query(format!(
                    "field '{}' does not support regular expressions",
                    field.key
                )));
            }
            let value = typed_value(field, &clause.value)?;
            clause_filter(&field.path, clause, value)
        })
        .collect::<CatalogResult<Vec<_>>>()?;
    Ok(combine(&field.path, expr.combinator, filters))
}

/// Native filter for one clause with an already typed operand.
pub(super) fn clause_filter(path: &str, clause: &Clause, value: Value) -> CatalogResult<Filter> {
    let ordered = || {
        if matches!(value, Value::Bool(_)) {
            Err(CatalogError::query(format!(
                "'{path}' is boolean and only supports '=' and '!='"
            )))
        } else {
            Ok(value.clone())
        }
    };
    let regex = || {
        Filter::regex(path, &clause.value).map_err(|e| CatalogError::query(e.to_string()))
    };
    Ok(match clause.op {
        Operator::Eq => Filter::Eq(path.to_string(), value.clone()),
        Operator::Ne => Filter::Ne(path.to_string(), value.clone()),
        Operator::Lt => Filter::Lt(path.to_string(), ordered()?),
        Operator::Lte => Filter::Lte(path.to_string(), ordered()?),
        Operator::Gt => Filter::Gt(path.to_string(), ordered()?),
        Operator::Gte => Filter::Gte(path.to_string(), ordered()?),
        Operator::Regex => regex()?,
        Operator::NotRegex => Filter::not(regex()?),
    })
}

/// Joins the clauses of one field; plain equality alternatives become `In`.
pub(super) fn combine(path: &str, combinator: Combinator, mut filters: Vec<Filter>) -> Filter {
    if filters.len() == 1 {
        return filters.remove(0);
    }
    match combinator {
        Combinator::And => Filter::And(filters),
        Combinator::Or => {
            let values: Option<Vec<Value>> = filters
                .iter()
                .map(|f| match f {
                    Filter::Eq(p, v) if p == path => Some(v.clone()),
                    _ => None,
                })
                .collect();
            match values {
                Some(values) => Filter::In(path.to_string(), values),
                None => Filter::Or(filters),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityKind;
    use catalogdb_codec::Document;

    fn compile(kind: EntityKind, query: &Query) -> CatalogResult<CompiledQuery> {
        FilterCompiler::compile(&EntitySchema::of(kind), query, &CompileContext::default())
    }

    fn sample(id: &str, status: &str, last: bool) -> Document {
        let mut doc = Document::new()
            .with("_uid", 1)
            .with("id", id)
            .with("version", 1)
            .with("_lastOfVersion", last);
        doc.set_path("status.id", status).unwrap();
        doc
    }

    #[test]
    fn conjunction_of_negations() {
        let query = Query::new().with("status", "!=DELETED;!=REMOVED");
        let compiled = compile(EntityKind::Sample, &query).unwrap();
        assert!(compiled.filter.matches(&sample("S1", "READY", true)));
        assert!(!compiled.filter.matches(&sample("S2", "DELETED", true)));
        assert!(!compiled.filter.matches(&sample("S3", "REMOVED", true)));
        assert_eq!(compiled.scope, VersionScope::Latest);
    }

    #[test]
    fn identity_lists_expand_to_in() {
        let query = Query::new().with("uid", "1,2,3");
        let compiled = compile(EntityKind::Sample, &query).unwrap();
        let Filter::And(clauses) = &compiled.filter else {
            panic!("top level must be a conjunction");
        };
        assert_eq!(
            clauses[0],
            Filter::In(
                "_uid".to_string(),
                vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]
            )
        );
        assert_eq!(clauses[1], Filter::eq("_lastOfVersion", true));
    }

    #[test]
    fn version_selectors() {
        let all = compile(EntityKind::Sample, &Query::new().with("version", "all")).unwrap();
        assert_eq!(all.filter, Filter::And(vec![]));
        assert_eq!(all.scope, VersionScope::History);

        let exact = compile(EntityKind::Sample, &Query::new().with("version", "2")).unwrap();
        assert_eq!(exact.filter, Filter::And(vec![Filter::eq("version", 2)]));

        let snapshot = compile(EntityKind::Sample, &Query::new().with("snapshot", "1")).unwrap();
        assert_eq!(
            snapshot.filter,
            Filter::And(vec![
                Filter::eq("_releaseFromVersion", 1),
                Filter::eq("_lastOfRelease", true)
            ])
        );
        assert_eq!(snapshot.scope, VersionScope::History);
    }

    #[test]
    fn malformed_numbers_name_the_field() {
        let err = compile(EntityKind::File, &Query::new().with("size", ">big")).unwrap_err();
        assert!(matches!(err, CatalogError::Parse { field, .. } if field == "size"));
        let err = compile(EntityKind::File, &Query::new().with("bogus", "1")).unwrap_err();
        assert!(matches!(err, CatalogError::Query { .. }));
    }

    #[test]
    fn booleans_reject_ordering_and_regex_needs_text() {
        let locked = Query::new().with("locked", ">true");
        assert!(compile(EntityKind::Family, &locked).is_err());
        let regex_on_number = Query::new().with("size", "~^1");
        assert!(compile(EntityKind::File, &regex_on_number).is_err());
        let regex = compile(EntityKind::Sample, &Query::new().with("id", "~^S")).unwrap();
        assert!(regex.filter.matches(&sample("S1", "READY", true)));
    }

    #[test]
    fn authorization_is_conjoined() {
        let ctx = CompileContext {
            authorization: Some(Filter::eq("_acl", "bob__VIEW")),
            ..CompileContext::default()
        };
        let compiled = FilterCompiler::compile(
            &EntitySchema::of(EntityKind::Sample),
            &Query::new().with("id", "S1"),
            &ctx,
        )
        .unwrap();
        assert_eq!(
            compiled.filter,
            Filter::And(vec![
                Filter::eq("id", "S1"),
                Filter::eq("_lastOfVersion", true),
                Filter::eq("_acl", "bob__VIEW"),
            ])
        );
    }

    #[test]
    fn compiling_twice_gives_the_same_filter() {
        let query = Query::new()
            .with("id", "S1,S2")
            .with("nattributes.depth", ">=30")
            .with("status", "!=DELETED");
        let first = compile(EntityKind::Sample, &query).unwrap();
        let second = compile(EntityKind::Sample, &query).unwrap();
        assert_eq!(first, second);
    }
}
