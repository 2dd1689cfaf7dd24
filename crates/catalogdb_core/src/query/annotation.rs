//! The `variableSet:variable<op>value` annotation grammar.

use catalogdb_codec::Value;
use catalogdb_store::Filter;

use super::compiler::clause_filter;
use super::parse::{split_operator, Clause, Combinator, Operator};
use crate::error::{CatalogError, CatalogResult};
use crate::model::{VariableSet, VariableType};

const FIELD: &str = "annotation";
const OPERATOR_CHARS: &[char] = &['<', '>', '=', '!', '~'];

/// One parsed annotation clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationClause {
    /// Variable set id.
    pub variable_set: String,
    /// Variable id.
    pub variable: String,
    /// Operator applied to every value.
    pub op: Operator,
    /// Alternatives, OR-ed.
    pub values: Vec<String>,
}

impl AnnotationClause {
    /// Parses `vs:var<op>v1,v2`.
    ///
    /// # Errors
    ///
    /// `Query` when a part is missing.
    pub fn parse(text: &str) -> CatalogResult<Self> {
        let malformed =
            || CatalogError::query(format!("malformed annotation '{text}', expected 'set:variable=value'"));
        let (variable_set, rest) = text.trim().split_once(':').ok_or_else(malformed)?;
        let split = rest.find(OPERATOR_CHARS).ok_or_else(malformed)?;
        let (variable, expr) = rest.split_at(split);
        let (op, values) = split_operator(expr);
        let values: Vec<String> = values
            .split(',')
            .map(|v| v.trim().to_string())
            .collect();
        if variable_set.is_empty() || variable.is_empty() || values.iter().any(String::is_empty) {
            return Err(malformed());
        }
        Ok(Self {
            variable_set: variable_set.to_string(),
            variable: variable.to_string(),
            op,
            values,
        })
    }

    fn typed(&self, kind: Option<VariableType>, text: &str) -> CatalogResult<Value> {
        let parse_error = || CatalogError::parse(FIELD, format!("{}:{}={text}", self.variable_set, self.variable));
        match kind {
            Some(VariableType::Boolean) => match text.to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(parse_error()),
            },
            Some(VariableType::Integer) => text.parse::<i64>().map(Value::Integer).map_err(|_| parse_error()),
            Some(VariableType::Decimal) => text
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::Float)
                .ok_or_else(parse_error),
            Some(VariableType::Text | VariableType::Category) => Ok(Value::from(text)),
            None => Ok(infer(text)),
        }
    }
}

/// Type of an undeclared value: number, then boolean, then text.
fn infer(text: &str) -> Value {
    if let Ok(n) = text.parse::<i64>() {
        return Value::Integer(n);
    }
    if let Some(f) = text.parse::<f64>().ok().filter(|f| f.is_finite()) {
        return Value::Float(f);
    }
    match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::from(text),
    }
}

/// Compiles an annotation field value into `annotationSets` element matches.
///
/// Variable types come from `variable_sets` when the set is declared there.
/// Undeclared sets are an error in `strict` mode and inferred otherwise.
///
/// # Errors
///
/// `Query` for malformed clauses or unknown variables, `Parse` for values
/// that do not fit the declared type.
pub fn compile_annotation(
    raw: &str,
    variable_sets: &[VariableSet],
    strict: bool,
) -> CatalogResult<Filter> {
    let mut filters = Vec::new();
    for part in raw.split(';') {
        let clause = AnnotationClause::parse(part)?;
        let kind = match variable_sets.iter().find(|s| s.id == clause.variable_set) {
            Some(set) => Some(
                set.variable(&clause.variable)
                    .ok_or_else(|| {
                        CatalogError::query(format!(
                            "variable '{}' not found in variable set '{}'",
                            clause.variable, clause.variable_set
                        ))
                    })?
                    .kind,
            ),
            None if strict => {
                return Err(CatalogError::query(format!(
                    "unknown variable set '{}'",
                    clause.variable_set
                )))
            }
            None => None,
        };

        let path = format!("annotations.{}", clause.variable);
        let alternatives = clause
            .values
            .iter()
            .map(|text| {
                let value = clause.typed(kind, text)?;
                clause_filter(
                    &path,
                    &Clause {
                        op: clause.op,
                        value: text.clone(),
                    },
                    value,
                )
            })
            .collect::<CatalogResult<Vec<_>>>()?;
        let values = super::compiler::combine(&path, Combinator::Or, alternatives);

        filters.push(Filter::elem_match(
            "annotationSets",
            Filter::And(vec![
                Filter::eq("variableSetId", clause.variable_set.as_str()),
                values,
            ]),
        ));
    }
    Ok(Filter::and(filters))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Variable;
    use catalogdb_codec::Document;

    fn annotated(set: &str, age: i64) -> Document {
        Document::new().with(
            "annotationSets",
            vec![Document::new()
                .with("id", "a1")
                .with("variableSetId", set)
                .with("annotations", Document::new().with("age", age))],
        )
    }

    fn clinical() -> Vec<VariableSet> {
        vec![VariableSet {
            id: "clinical".to_string(),
            variables: vec![Variable::new("age", VariableType::Integer)],
        }]
    }

    #[test]
    fn parses_set_variable_and_operator() {
        let clause = AnnotationClause::parse("clinical:age>=30").unwrap();
        assert_eq!(clause.variable_set, "clinical");
        assert_eq!(clause.variable, "age");
        assert_eq!(clause.op, Operator::Gte);
        assert_eq!(clause.values, vec!["30"]);
        assert!(AnnotationClause::parse("clinical-age=30").is_err());
        assert!(AnnotationClause::parse("clinical:age").is_err());
    }

    #[test]
    fn typed_comparison_inside_the_right_set() {
        let filter = compile_annotation("clinical:age>=30", &clinical(), false).unwrap();
        assert!(filter.matches(&annotated("clinical", 42)));
        assert!(!filter.matches(&annotated("clinical", 12)));
        assert!(!filter.matches(&annotated("other", 42)));
    }

    #[test]
    fn declared_types_reject_bad_literals() {
        assert!(matches!(
            compile_annotation("clinical:age=old", &clinical(), false),
            Err(CatalogError::Parse { .. })
        ));
        assert!(matches!(
            compile_annotation("clinical:weight=3", &clinical(), false),
            Err(CatalogError::Query { .. })
        ));
    }

    #[test]
    fn strict_mode_requires_declared_sets() {
        assert!(compile_annotation("other:age=3", &clinical(), true).is_err());
        let filter = compile_annotation("other:age=3,42", &clinical(), false).unwrap();
        assert!(filter.matches(&annotated("other", 42)));
    }
}
