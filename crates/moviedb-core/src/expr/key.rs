//! Key conditions for `query`: partition equality plus an optional sort-key test.

use serde_json::Value;

use super::condition::{Comparator, Condition};
use super::path::AttrPath;

/// Test applied to the sort key within one partition.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKeyCondition {
    Eq(Value),
    Lt(Value),
    Le(Value),
    Gt(Value),
    Ge(Value),
    Between(Value, Value),
    BeginsWith(String),
}

/// A query's key condition.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyCondition {
    pub partition_name: String,
    pub partition_value: Value,
    pub sort: Option<(String, SortKeyCondition)>,
}

impl KeyCondition {
    /// All items whose partition key equals `value`.
    pub fn partition(name: impl Into<String>, value: Value) -> Self {
        Self {
            partition_name: name.into(),
            partition_value: value,
            sort: None,
        }
    }

    pub fn sort(mut self, name: impl Into<String>, condition: SortKeyCondition) -> Self {
        self.sort = Some((name.into(), condition));
        self
    }

    /// The same test expressed as a general condition.
    pub fn to_condition(&self) -> Condition {
        let partition = Condition::eq(
            AttrPath::new(self.partition_name.as_str()),
            self.partition_value.clone(),
        );
        let Some((name, sort)) = &self.sort else {
            return partition;
        };
        let path = AttrPath::new(name.as_str());
        let sort = match sort {
            SortKeyCondition::Eq(v) => Condition::compare(path, Comparator::Eq, v.clone()),
            SortKeyCondition::Lt(v) => Condition::compare(path, Comparator::Lt, v.clone()),
            SortKeyCondition::Le(v) => Condition::compare(path, Comparator::Le, v.clone()),
            SortKeyCondition::Gt(v) => Condition::compare(path, Comparator::Gt, v.clone()),
            SortKeyCondition::Ge(v) => Condition::compare(path, Comparator::Ge, v.clone()),
            SortKeyCondition::Between(lo, hi) => Condition::between(path, lo.clone(), hi.clone()),
            SortKeyCondition::BeginsWith(prefix) => Condition::BeginsWith(path, prefix.clone()),
        };
        Condition::and(vec![partition, sort])
    }

    pub fn matches(&self, item: &Value) -> bool {
        // Key conditions are flat, so evaluation cannot fail.
        self.to_condition().eval(item).unwrap_or(false)
    }
}
