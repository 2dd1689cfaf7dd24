//! Dynamic document value type.

use std::cmp::Ordering;

use crate::document::Document;

/// A dynamic document value.
///
/// Integers and floats are distinct variants but compare numerically with
/// each other, so a query for `3` matches a stored `3.0`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (supports full i64 range).
    Integer(i64),
    /// Double precision float. NaN is rejected by the encoder.
    Float(f64),
    /// Text string (UTF-8).
    Text(String),
    /// Array of values.
    Array(Vec<Value>),
    /// Nested document.
    Document(Document),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    ///
    /// Floats with no fractional part are accepted when they fit in an
    /// `i64`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Float(f) if f.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(f) => {
                Some(*f as i64)
            }
            _ => None,
        }
    }

    /// Get this value as a float, widening integers.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get this value as a mutable array, if it is one.
    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get this value as a document, if it is one.
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    /// Get this value as a mutable document, if it is one.
    pub fn as_document_mut(&mut self) -> Option<&mut Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    /// Short name of the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Array(_) => "array",
            Value::Document(_) => "document",
        }
    }

    /// Order two values of comparable types.
    ///
    /// Numbers compare across integer and float, text compares bytewise and
    /// booleans compare `false < true`. Mixed or structured types are
    /// incomparable and yield `None`.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Float(b)) => cmp_integer_float(*a, *b),
            (Value::Float(a), Value::Integer(b)) => cmp_integer_float(*b, *a).map(Ordering::reverse),
            _ => None,
        }
    }

    /// Equality used by filters: numeric across integer/float, structural
    /// otherwise.
    pub fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Document(_), Value::Document(_)) => self == other,
            _ => self.compare(other) == Some(Ordering::Equal),
        }
    }
}

/// 2^63, the first float above every `i64`.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Orders an integer against a float without rounding the integer.
#[allow(clippy::cast_possible_truncation)]
fn cmp_integer_float(n: i64, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        None
    } else if f >= I64_BOUND {
        Some(Ordering::Less)
    } else if f < -I64_BOUND {
        Some(Ordering::Greater)
    } else {
        let floor = f.floor() as i64;
        let rest = if f.fract() == 0.0 { Ordering::Equal } else { Ordering::Less };
        Some(n.cmp(&floor).then(rest))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        i64::try_from(n).map_or(Value::Float(n as f64), Value::Integer)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Document> for Value {
    fn from(d: Document) -> Self {
        Value::Document(d)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_compare_across_variants() {
        assert_eq!(
            Value::Integer(3).compare(&Value::Float(3.0)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            Value::Float(2.5).compare(&Value::Integer(3)),
            Some(Ordering::Less)
        );
        assert!(Value::Integer(3).loose_eq(&Value::Float(3.0)));
        assert_eq!(
            Value::Integer(-3).compare(&Value::Float(-2.5)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn floats_beyond_i64_do_not_saturate() {
        assert_eq!(Value::Float(1e20).as_integer(), None);
        assert_eq!(Value::Float(-1e20).as_integer(), None);
        assert!(!Value::Float(1e20).loose_eq(&Value::Integer(i64::MAX)));
        assert_eq!(
            Value::Float(9_223_372_036_854_775_808.0).compare(&Value::Integer(i64::MAX)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Value::Integer(i64::MIN).compare(&Value::Float(-9_223_372_036_854_775_808.0)),
            Some(Ordering::Equal)
        );
        assert_eq!(Value::Float(f64::NAN).compare(&Value::Integer(0)), None);
    }

    #[test]
    fn mixed_types_are_incomparable() {
        assert_eq!(Value::Text("3".into()).compare(&Value::Integer(3)), None);
        assert_eq!(Value::Bool(true).compare(&Value::Null), None);
        assert!(!Value::Text("true".into()).loose_eq(&Value::Bool(true)));
    }

    #[test]
    fn value_accessors() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Integer(42).as_bool(), None);
        assert_eq!(Value::Float(4.0).as_integer(), Some(4));
        assert_eq!(Value::Float(4.5).as_integer(), None);
        assert_eq!(Value::Text("hello".into()).as_text(), Some("hello"));
        assert_eq!(Value::from(7u64), Value::Integer(7));
    }

    #[test]
    fn arrays_compare_elementwise() {
        let a = Value::from(vec![1i64, 2]);
        let b = Value::Array(vec![Value::Float(1.0), Value::Integer(2)]);
        assert!(a.loose_eq(&b));
        assert!(!a.loose_eq(&Value::from(vec![1i64])));
    }
}
