//! Condition and filter expressions evaluated against JSON documents.

use std::cmp::Ordering;

use serde_json::Value;

use super::path::AttrPath;
use crate::error::ExpressionError;
use crate::number::compare_numbers;

/// Maximum nesting depth for condition expressions.
const MAX_EXPRESSION_DEPTH: usize = 16;

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// The value stored at a document path.
    Path(AttrPath),
    /// A literal value (an expression attribute value on the wire).
    Value(Value),
    /// `size(path)`: length of a string, list or map.
    Size(AttrPath),
}

impl Operand {
    pub fn size(path: AttrPath) -> Self {
        Operand::Size(path)
    }
}

impl From<AttrPath> for Operand {
    fn from(path: AttrPath) -> Self {
        Operand::Path(path)
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Value(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::Ne => "<>",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
        }
    }

    fn holds(&self, ord: Option<Ordering>) -> bool {
        match self {
            Comparator::Eq => ord == Some(Ordering::Equal),
            Comparator::Ne => ord != Some(Ordering::Equal),
            Comparator::Lt => ord == Some(Ordering::Less),
            Comparator::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
            Comparator::Gt => ord == Some(Ordering::Greater),
            Comparator::Ge => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

/// A server-side predicate: a write condition or a read filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        left: Operand,
        op: Comparator,
        right: Operand,
    },
    /// `value BETWEEN low AND high`, inclusive on both ends.
    Between {
        value: Operand,
        low: Operand,
        high: Operand,
    },
    BeginsWith(AttrPath, String),
    Contains(AttrPath, Value),
    AttributeExists(AttrPath),
    AttributeNotExists(AttrPath),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn compare(left: impl Into<Operand>, op: Comparator, right: impl Into<Operand>) -> Self {
        Condition::Compare {
            left: left.into(),
            op,
            right: right.into(),
        }
    }

    pub fn eq(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::compare(left, Comparator::Eq, right)
    }

    pub fn le(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::compare(left, Comparator::Le, right)
    }

    pub fn ge(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::compare(left, Comparator::Ge, right)
    }

    pub fn between(
        value: impl Into<Operand>,
        low: impl Into<Operand>,
        high: impl Into<Operand>,
    ) -> Self {
        Condition::Between {
            value: value.into(),
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn and(conditions: Vec<Condition>) -> Self {
        Condition::And(conditions)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(condition: Condition) -> Self {
        Condition::Not(Box::new(condition))
    }

    /// Evaluate against a document. A missing document is the empty map.
    pub fn eval(&self, doc: &Value) -> Result<bool, ExpressionError> {
        self.validate()?;
        self.eval_inner(doc)
    }

    /// Check nesting depth and that every AND/OR has operands.
    pub fn validate(&self) -> Result<(), ExpressionError> {
        self.validate_at(0)
    }

    fn validate_at(&self, depth: usize) -> Result<(), ExpressionError> {
        if depth > MAX_EXPRESSION_DEPTH {
            return Err(ExpressionError::TooDeep(MAX_EXPRESSION_DEPTH));
        }
        match self {
            Condition::And(conditions) | Condition::Or(conditions) => {
                if conditions.is_empty() {
                    return Err(ExpressionError::EmptyGroup);
                }
                conditions.iter().try_for_each(|c| c.validate_at(depth + 1))
            }
            Condition::Not(c) => c.validate_at(depth + 1),
            _ => Ok(()),
        }
    }

    fn eval_inner(&self, doc: &Value) -> Result<bool, ExpressionError> {
        match self {
            Condition::Compare { left, op, right } => {
                let l = resolve_operand(left, doc);
                let r = resolve_operand(right, doc);
                match (l, r) {
                    (Some(l), Some(r)) => Ok(op.holds(compare_values(&l, &r))),
                    // A comparison against a missing attribute never holds.
                    _ => Ok(false),
                }
            }
            Condition::Between { value, low, high } => {
                let (Some(v), Some(lo), Some(hi)) = (
                    resolve_operand(value, doc),
                    resolve_operand(low, doc),
                    resolve_operand(high, doc),
                ) else {
                    return Ok(false);
                };
                Ok(Comparator::Ge.holds(compare_values(&v, &lo))
                    && Comparator::Le.holds(compare_values(&v, &hi)))
            }
            Condition::BeginsWith(path, prefix) => Ok(matches!(
                path.resolve(doc),
                Some(Value::String(s)) if s.starts_with(prefix.as_str())
            )),
            Condition::Contains(path, needle) => Ok(match (path.resolve(doc), needle) {
                (Some(Value::String(s)), Value::String(n)) => s.contains(n.as_str()),
                (Some(Value::Array(items)), needle) => items
                    .iter()
                    .any(|item| compare_values(item, needle) == Some(Ordering::Equal)),
                _ => false,
            }),
            Condition::AttributeExists(path) => Ok(path.resolve(doc).is_some()),
            Condition::AttributeNotExists(path) => Ok(path.resolve(doc).is_none()),
            Condition::And(conditions) => {
                for c in conditions {
                    if !c.eval_inner(doc)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Condition::Or(conditions) => {
                for c in conditions {
                    if c.eval_inner(doc)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Condition::Not(c) => Ok(!c.eval_inner(doc)?),
        }
    }
}

fn resolve_operand(operand: &Operand, doc: &Value) -> Option<Value> {
    match operand {
        Operand::Path(path) => path.resolve(doc).cloned(),
        Operand::Value(v) => Some(v.clone()),
        Operand::Size(path) => {
            let len = match path.resolve(doc)? {
                Value::String(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                _ => return None,
            };
            Some(Value::from(len))
        }
    }
}

/// Compare two JSON values, returning an ordering if the types are comparable.
///
/// Numbers compare as exact decimals, strings by bytes. Lists and maps only
/// support equality.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Number(a), Value::Number(b)) => compare_numbers(a, b),
        (Value::String(a), Value::String(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
        (Value::Bool(a), Value::Bool(b)) if a == b => Some(Ordering::Equal),
        (Value::Array(a), Value::Array(b)) => {
            let equal = a.len() == b.len()
                && a.iter()
                    .zip(b)
                    .all(|(x, y)| compare_values(x, y) == Some(Ordering::Equal));
            equal.then_some(Ordering::Equal)
        }
        (Value::Object(a), Value::Object(b)) => {
            let equal = a.len() == b.len()
                && a.iter().all(|(k, x)| {
                    b.get(k)
                        .is_some_and(|y| compare_values(x, y) == Some(Ordering::Equal))
                });
            equal.then_some(Ordering::Equal)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn movie() -> Value {
        serde_json::from_str(
            r#"{
                "year": 2013,
                "title": "Rush",
                "info": {"rating": 8.30, "plot": "F1 rivalry", "actors": ["A", "B", "C"]}
            }"#,
        )
        .unwrap()
    }

    fn rating() -> AttrPath {
        AttrPath::new("info").key("rating")
    }

    fn actors() -> AttrPath {
        AttrPath::new("info").key("actors")
    }

    fn dec(text: &str) -> Value {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_le_is_inclusive_and_exact() {
        let doc = movie();
        assert!(Condition::le(rating(), dec("8.3")).eval(&doc).unwrap());
        assert!(Condition::le(rating(), dec("8.31")).eval(&doc).unwrap());
        assert!(!Condition::le(rating(), dec("8.29")).eval(&doc).unwrap());
    }

    #[test]
    fn test_size_comparison() {
        let doc = movie();
        assert!(Condition::ge(Operand::size(actors()), json!(3)).eval(&doc).unwrap());
        assert!(!Condition::ge(Operand::size(actors()), json!(4)).eval(&doc).unwrap());
    }

    #[test]
    fn test_missing_attribute_fails_comparison() {
        let doc = json!({"year": 2013, "title": "x"});
        assert!(!Condition::le(rating(), json!(10)).eval(&doc).unwrap());
        assert!(!Condition::ge(Operand::size(actors()), json!(0)).eval(&doc).unwrap());
    }

    #[test]
    fn test_between_inclusive() {
        let year = AttrPath::new("year");
        for (y, expected) in [(2009, false), (2010, true), (2013, true), (2015, true), (2016, false)] {
            let doc = json!({"year": y});
            let c = Condition::between(year.clone(), json!(2010), json!(2015));
            assert_eq!(c.eval(&doc).unwrap(), expected, "year {y}");
        }
    }

    #[test]
    fn test_string_ops() {
        let doc = movie();
        assert!(
            Condition::BeginsWith(AttrPath::new("title"), "Ru".to_string())
                .eval(&doc)
                .unwrap()
        );
        assert!(Condition::Contains(actors(), json!("B")).eval(&doc).unwrap());
        assert!(!Condition::Contains(actors(), json!("Z")).eval(&doc).unwrap());
    }

    #[test]
    fn test_existence_and_logic() {
        let doc = movie();
        let exists = Condition::AttributeExists(rating());
        let missing = Condition::AttributeNotExists(AttrPath::new("nope"));
        assert!(Condition::and(vec![exists.clone(), missing]).eval(&doc).unwrap());
        assert!(!Condition::not(exists.clone()).eval(&doc).unwrap());
        assert!(
            Condition::Or(vec![Condition::not(exists), Condition::eq(AttrPath::new("year"), json!(2013))])
                .eval(&doc)
                .unwrap()
        );
    }

    #[test]
    fn test_depth_limit() {
        let mut c = Condition::AttributeExists(AttrPath::new("year"));
        for _ in 0..20 {
            c = Condition::not(c);
        }
        assert_eq!(c.eval(&movie()), Err(ExpressionError::TooDeep(16)));
    }

    #[test]
    fn test_empty_group_rejected() {
        assert_eq!(
            Condition::and(vec![]).eval(&movie()),
            Err(ExpressionError::EmptyGroup)
        );
    }

    #[test]
    fn test_list_equality_uses_decimal_compare() {
        assert_eq!(
            compare_values(&dec("[5.0, 1]"), &dec("[5, 1.00]")),
            Some(Ordering::Equal)
        );
        assert_eq!(compare_values(&json!([1]), &json!([1, 2])), None);
    }
}
