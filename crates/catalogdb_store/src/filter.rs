//! The store's native filter language and its evaluation.
//!
//! Paths are dot separated. When a path crosses an array, every element is
//! visited, and a comparison succeeds if any reached value (or any element of
//! a reached array) satisfies it. Negations (`Ne`, `Nin`, `Not`) invert the
//! whole "any" test, so `Ne("tags", "x")` means no element equals `"x"`.

use std::cmp::Ordering;
use std::fmt;

use catalogdb_codec::{Document, Value};
use regex::Regex;

use crate::error::{StoreError, StoreResult};

/// A compiled regular expression that compares by pattern text.
#[derive(Clone)]
pub struct Pattern(Regex);

impl Pattern {
    /// Compile a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidFilter`] for a malformed expression.
    pub fn new(pattern: &str) -> StoreResult<Self> {
        Regex::new(pattern)
            .map(Self)
            .map_err(|e| StoreError::invalid_filter(format!("bad regex '{pattern}': {e}")))
    }

    /// The pattern text.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Test a string.
    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.as_str())
    }
}

/// A filter expression over documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document.
    All,
    /// Path equals value. A `Null` value also matches a missing path.
    Eq(String, Value),
    /// Negation of [`Filter::Eq`].
    Ne(String, Value),
    /// Path greater than value.
    Gt(String, Value),
    /// Path greater than or equal to value.
    Gte(String, Value),
    /// Path less than value.
    Lt(String, Value),
    /// Path less than or equal to value.
    Lte(String, Value),
    /// Path equals any of the values.
    In(String, Vec<Value>),
    /// Path equals none of the values.
    Nin(String, Vec<Value>),
    /// A text value at path matches the pattern.
    Regex(String, Pattern),
    /// Path is present (`true`) or absent (`false`).
    Exists(String, bool),
    /// Some document element of the array at path matches the inner filter.
    ElemMatch(String, Box<Filter>),
    /// All sub-filters match. Empty matches everything.
    And(Vec<Filter>),
    /// Any sub-filter matches. Empty matches nothing.
    Or(Vec<Filter>),
    /// The inner filter does not match.
    Not(Box<Filter>),
}

impl Filter {
    /// `path == value`
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(path.into(), value.into())
    }

    /// `path != value`
    pub fn ne(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne(path.into(), value.into())
    }

    /// `path in values`
    pub fn is_in(path: impl Into<String>, values: Vec<Value>) -> Self {
        Self::In(path.into(), values)
    }

    /// Regex match on a text path.
    ///
    /// # Errors
    ///
    /// Fails if the pattern does not compile.
    pub fn regex(path: impl Into<String>, pattern: &str) -> StoreResult<Self> {
        Ok(Self::Regex(path.into(), Pattern::new(pattern)?))
    }

    /// Array element match.
    pub fn elem_match(path: impl Into<String>, inner: Filter) -> Self {
        Self::ElemMatch(path.into(), Box::new(inner))
    }

    /// Logical negation.
    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Filter) -> Self {
        Self::Not(Box::new(inner))
    }

    /// Conjunction; a single clause is returned unwrapped.
    pub fn and(mut filters: Vec<Filter>) -> Self {
        if filters.len() == 1 {
            filters.remove(0)
        } else {
            Self::And(filters)
        }
    }

    /// Disjunction; a single clause is returned unwrapped.
    pub fn or(mut filters: Vec<Filter>) -> Self {
        if filters.len() == 1 {
            filters.remove(0)
        } else {
            Self::Or(filters)
        }
    }

    /// Evaluate against a document.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(path, value) => eq_matches(doc, path, value),
            Filter::Ne(path, value) => !eq_matches(doc, path, value),
            Filter::Gt(path, value) => cmp_matches(doc, path, value, |o| o == Ordering::Greater),
            Filter::Gte(path, value) => cmp_matches(doc, path, value, |o| o != Ordering::Less),
            Filter::Lt(path, value) => cmp_matches(doc, path, value, |o| o == Ordering::Less),
            Filter::Lte(path, value) => cmp_matches(doc, path, value, |o| o != Ordering::Greater),
            Filter::In(path, values) => values.iter().any(|v| eq_matches(doc, path, v)),
            Filter::Nin(path, values) => !values.iter().any(|v| eq_matches(doc, path, v)),
            Filter::Regex(path, pattern) => flattened(doc, path)
                .into_iter()
                .any(|v| v.as_text().is_some_and(|t| pattern.is_match(t))),
            Filter::Exists(path, expected) => !resolve(doc, path).is_empty() == *expected,
            Filter::ElemMatch(path, inner) => resolve(doc, path).into_iter().any(|v| {
                v.as_array().is_some_and(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_document)
                        .any(|d| inner.matches(d))
                })
            }),
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(doc)),
            Filter::Not(inner) => !inner.matches(doc),
        }
    }
}

/// Every value reachable at `path`, descending through arrays.
pub fn resolve<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let parts: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    if let Some((first, rest)) = parts.split_first() {
        if let Some(value) = doc.get(first) {
            descend(value, rest, &mut out);
        }
    }
    out
}

fn descend<'a>(value: &'a Value, parts: &[&str], out: &mut Vec<&'a Value>) {
    let Some((head, rest)) = parts.split_first() else {
        out.push(value);
        return;
    };
    match value {
        Value::Document(doc) => {
            if let Some(child) = doc.get(head) {
                descend(child, rest, out);
            }
        }
        Value::Array(items) => {
            if let Ok(index) = head.parse::<usize>() {
                if let Some(item) = items.get(index) {
                    descend(item, rest, out);
                }
                return;
            }
            for item in items {
                if let Value::Document(_) = item {
                    descend(item, parts, out);
                }
            }
        }
        _ => {}
    }
}

/// Reached values with arrays expanded one level, plus the arrays themselves.
fn flattened<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let mut out = Vec::new();
    for value in resolve(doc, path) {
        if let Value::Array(items) = value {
            out.extend(items.iter());
        }
        out.push(value);
    }
    out
}

fn eq_matches(doc: &Document, path: &str, expected: &Value) -> bool {
    let reached = resolve(doc, path);
    if reached.is_empty() {
        return expected.is_null();
    }
    reached.into_iter().any(|v| {
        v.loose_eq(expected)
            || v.as_array()
                .is_some_and(|items| items.iter().any(|i| i.loose_eq(expected)))
    })
}

fn cmp_matches(doc: &Document, path: &str, expected: &Value, pred: impl Fn(Ordering) -> bool) -> bool {
    flattened(doc, path)
        .into_iter()
        .any(|v| v.compare(expected).is_some_and(&pred))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family() -> Document {
        let member = |uid: i64, version: i64| {
            Value::Document(Document::new().with("uid", uid).with("version", version))
        };
        let mut doc = Document::new()
            .with("id", "F1")
            .with("members", Value::Array(vec![member(1, 1), member(2, 3)]))
            .with("tags", Value::from(vec!["a", "b"]));
        doc.set_path("status.id", "READY").unwrap();
        doc
    }

    #[test]
    fn eq_traverses_arrays_of_documents() {
        let doc = family();
        assert!(Filter::eq("members.uid", 2i64).matches(&doc));
        assert!(!Filter::eq("members.uid", 3i64).matches(&doc));
        assert!(Filter::eq("tags", "b").matches(&doc));
    }

    #[test]
    fn ne_means_no_element_equals() {
        let doc = family();
        assert!(!Filter::ne("tags", "a").matches(&doc));
        assert!(Filter::ne("tags", "z").matches(&doc));
        assert!(Filter::ne("locked", true).matches(&doc));
    }

    #[test]
    fn null_equality_matches_missing() {
        let doc = family();
        assert!(Filter::eq("locked", ()).matches(&doc));
        assert!(!Filter::Exists("locked".into(), true).matches(&doc));
        assert!(Filter::Exists("status.id".into(), true).matches(&doc));
    }

    #[test]
    fn comparisons_reach_array_elements() {
        let doc = family();
        assert!(Filter::Gt("members.version".into(), Value::Integer(2)).matches(&doc));
        assert!(!Filter::Gt("members.version".into(), Value::Integer(3)).matches(&doc));
        assert!(Filter::Lte("members.version".into(), Value::Float(1.0)).matches(&doc));
    }

    #[test]
    fn elem_match_requires_same_element() {
        let doc = family();
        let same = Filter::elem_match(
            "members",
            Filter::And(vec![Filter::eq("uid", 2i64), Filter::eq("version", 3i64)]),
        );
        let split = Filter::elem_match(
            "members",
            Filter::And(vec![Filter::eq("uid", 1i64), Filter::eq("version", 3i64)]),
        );
        assert!(same.matches(&doc));
        assert!(!split.matches(&doc));
    }

    #[test]
    fn regex_and_logic() {
        let doc = family();
        let f = Filter::And(vec![
            Filter::regex("id", "^F").unwrap(),
            Filter::Or(vec![Filter::eq("status.id", "DELETED"), Filter::eq("tags", "a")]),
            Filter::not(Filter::regex("tags", "^z").unwrap()),
        ]);
        assert!(f.matches(&doc));
        assert!(!Filter::Or(vec![]).matches(&doc));
        assert!(Filter::And(vec![]).matches(&doc));
    }

    #[test]
    fn invalid_regex_is_reported() {
        assert!(matches!(
            Filter::regex("id", "(unclosed"),
            Err(StoreError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn numeric_index_selects_element() {
        let doc = family();
        assert!(Filter::eq("members.1.uid", 2i64).matches(&doc));
        assert!(!Filter::eq("members.0.uid", 2i64).matches(&doc));
    }
}
