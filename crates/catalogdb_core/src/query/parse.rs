//! Abstract queries and the value grammar.

use super::schema::{EntitySchema, FieldKind, ResolvedField};
use crate::error::{CatalogError, CatalogResult};

/// An abstract, field oriented query: an ordered mapping from public field
/// name to a raw value that may carry operators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    entries: Vec<(String, String)>,
}

impl Query {
    /// An empty query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Query::set`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets a field, replacing an earlier value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Raw value of a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Removes a field, returning its raw value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Whether the query names `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Whether the query is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Query {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut query = Self::new();
        for (k, v) in iter {
            query.set(k, v);
        }
        query
    }
}

/// Comparison operator of a clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `=` or `==`, also the default.
    Eq,
    /// `!=`.
    Ne,
    /// `<`.
    Lt,
    /// `<=`.
    Lte,
    /// `>`.
    Gt,
    /// `>=`.
    Gte,
    /// `~` or `=~`.
    Regex,
    /// `!~` or `!=~`.
    NotRegex,
}

/// Longest prefixes first so `<=` wins over `<`.
const OPERATORS: &[(&str, Operator)] = &[
    ("!=~", Operator::NotRegex),
    ("<=", Operator::Lte),
    (">=", Operator::Gte),
    ("!=", Operator::Ne),
    ("==", Operator::Eq),
    ("=~", Operator::Regex),
    ("!~", Operator::NotRegex),
    ("<", Operator::Lt),
    (">", Operator::Gt),
    ("~", Operator::Regex),
    ("=", Operator::Eq),
];

/// Splits a leading operator off `text`; no operator means equality.
#[must_use]
pub fn split_operator(text: &str) -> (Operator, &str) {
    OPERATORS
        .iter()
        .find_map(|(prefix, op)| text.strip_prefix(prefix).map(|rest| (*op, rest)))
        .unwrap_or((Operator::Eq, text))
}

/// One operator and operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    /// Operator.
    pub op: Operator,
    /// Untyped operand.
    pub value: String,
}

/// How the clauses of one field combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// `a;b`.
    And,
    /// `a,b`.
    Or,
}

/// A field value split into clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueExpr {
    /// How clauses combine.
    pub combinator: Combinator,
    /// Clauses, at least one.
    pub clauses: Vec<Clause>,
}

impl ValueExpr {
    /// Parses `raw` for `field`.
    ///
    /// # Errors
    ///
    /// `Query` for empty operands or a value mixing `;` and `,`.
    pub fn parse(field: &str, raw: &str) -> CatalogResult<Self> {
        let (combinator, parts): (Combinator, Vec<&str>) =
            match (raw.contains(';'), raw.contains(',')) {
                (true, true) => {
                    return Err(CatalogError::query(format!(
                        "field '{field}' mixes ';' and ',' in '{raw}'"
                    )))
                }
                (true, false) => (Combinator::And, raw.split(';').collect()),
                (false, _) => (Combinator::Or, raw.split(',').collect()),
            };

        let clauses = parts
            .into_iter()
            .map(|part| {
                let (op, value) = split_operator(part.trim());
                if value.is_empty() {
                    return Err(CatalogError::query(format!(
                        "field '{field}' has an empty value in '{raw}'"
                    )));
                }
                Ok(Clause {
                    op,
                    value: value.to_string(),
                })
            })
            .collect::<CatalogResult<Vec<_>>>()?;
        Ok(Self {
            combinator,
            clauses,
        })
    }
}

/// A field of a parsed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedField {
    /// The resolved field.
    pub field: ResolvedField,
    /// The raw value.
    pub raw: String,
}

/// A query whose keys have all been resolved against a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    fields: Vec<ParsedField>,
}

impl ParsedQuery {
    /// Resolves every key of `query`.
    ///
    /// # Errors
    ///
    /// `Query` for unknown keys.
    pub fn parse(schema: &EntitySchema, query: &Query) -> CatalogResult<Self> {
        let fields = query
            .iter()
            .map(|(key, raw)| {
                Ok(ParsedField {
                    field: schema.resolve(key)?,
                    raw: raw.to_string(),
                })
            })
            .collect::<CatalogResult<Vec<_>>>()?;
        Ok(Self { fields })
    }

    /// Resolved fields in query order.
    #[must_use]
    pub fn fields(&self) -> &[ParsedField] {
        &self.fields
    }

    /// Whether any field has the given kind.
    #[must_use]
    pub fn has(&self, kind: FieldKind) -> bool {
        self.fields.iter().any(|f| f.field.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_prefer_longest_prefix() {
        assert_eq!(split_operator("<=5"), (Operator::Lte, "5"));
        assert_eq!(split_operator("<5"), (Operator::Lt, "5"));
        assert_eq!(split_operator("!=~^S"), (Operator::NotRegex, "^S"));
        assert_eq!(split_operator("~^S"), (Operator::Regex, "^S"));
        assert_eq!(split_operator("READY"), (Operator::Eq, "READY"));
    }

    #[test]
    fn semicolons_conjoin_commas_disjoin() {
        let and = ValueExpr::parse("status", "!=DELETED;!=REMOVED").unwrap();
        assert_eq!(and.combinator, Combinator::And);
        assert_eq!(and.clauses.len(), 2);
        assert!(and.clauses.iter().all(|c| c.op == Operator::Ne));

        let or = ValueExpr::parse("id", "S1,S2").unwrap();
        assert_eq!(or.combinator, Combinator::Or);
        assert_eq!(or.clauses[1].value, "S2");
    }

    #[test]
    fn mixed_or_empty_values_are_rejected() {
        assert!(ValueExpr::parse("id", "a;b,c").is_err());
        assert!(ValueExpr::parse("id", "a,").is_err());
        assert!(ValueExpr::parse("size", ">=").is_err());
    }

    #[test]
    fn query_keeps_insertion_order_and_replaces() {
        let query = Query::new().with("b", "1").with("a", "2").with("b", "3");
        let entries: Vec<_> = query.iter().collect();
        assert_eq!(entries, vec![("b", "3"), ("a", "2")]);
    }
}
