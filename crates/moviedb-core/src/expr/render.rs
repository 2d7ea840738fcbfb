//! Render expressions into the service's textual expression language.
//!
//! Every attribute name becomes a `#nN` placeholder and every literal a
//! `:vN` placeholder, so reserved words (`year`, `size`, ...) never need
//! special handling.

use std::collections::HashMap;

use serde_json::Value;

use super::condition::{Condition, Operand};
use super::key::{KeyCondition, SortKeyCondition};
use super::path::{AttrPath, PathSegment};
use super::update::UpdateAction;

/// Placeholder tables accumulated while rendering one request.
#[derive(Debug, Default)]
pub struct ExpressionContext {
    names: Vec<String>,
    values: Vec<Value>,
}

impl ExpressionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Placeholder for an attribute name. Repeated names share a placeholder.
    pub fn name(&mut self, name: &str) -> String {
        let idx = match self.names.iter().position(|n| n == name) {
            Some(idx) => idx,
            None => {
                self.names.push(name.to_string());
                self.names.len() - 1
            }
        };
        format!("#n{idx}")
    }

    pub fn value(&mut self, value: Value) -> String {
        self.values.push(value);
        format!(":v{}", self.values.len() - 1)
    }

    pub fn path(&mut self, path: &AttrPath) -> String {
        let mut out = String::new();
        for segment in path.segments() {
            match segment {
                PathSegment::Attr(name) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(&self.name(name));
                }
                PathSegment::Index(i) => out.push_str(&format!("[{i}]")),
            }
        }
        out
    }

    fn operand(&mut self, operand: &Operand) -> String {
        match operand {
            Operand::Path(path) => self.path(path),
            Operand::Value(v) => self.value(v.clone()),
            Operand::Size(path) => format!("size({})", self.path(path)),
        }
    }

    pub fn condition(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::Compare { left, op, right } => {
                let l = self.operand(left);
                let r = self.operand(right);
                format!("{l} {} {r}", op.symbol())
            }
            Condition::Between { value, low, high } => {
                let v = self.operand(value);
                let lo = self.operand(low);
                let hi = self.operand(high);
                format!("{v} BETWEEN {lo} AND {hi}")
            }
            Condition::BeginsWith(path, prefix) => {
                let p = self.path(path);
                let v = self.value(Value::String(prefix.clone()));
                format!("begins_with({p}, {v})")
            }
            Condition::Contains(path, needle) => {
                let p = self.path(path);
                let v = self.value(needle.clone());
                format!("contains({p}, {v})")
            }
            Condition::AttributeExists(path) => format!("attribute_exists({})", self.path(path)),
            Condition::AttributeNotExists(path) => {
                format!("attribute_not_exists({})", self.path(path))
            }
            Condition::And(conditions) => self.group(conditions, " AND "),
            Condition::Or(conditions) => self.group(conditions, " OR "),
            Condition::Not(c) => format!("NOT ({})", self.condition(c)),
        }
    }

    fn group(&mut self, conditions: &[Condition], sep: &str) -> String {
        let parts: Vec<String> = conditions
            .iter()
            .map(|c| format!("({})", self.condition(c)))
            .collect();
        parts.join(sep)
    }

    pub fn key_condition(&mut self, kc: &KeyCondition) -> String {
        let pk = self.name(&kc.partition_name);
        let pv = self.value(kc.partition_value.clone());
        let mut out = format!("{pk} = {pv}");

        if let Some((name, sort)) = &kc.sort {
            let sk = self.name(name);
            let clause = match sort {
                SortKeyCondition::Eq(v) => format!("{sk} = {}", self.value(v.clone())),
                SortKeyCondition::Lt(v) => format!("{sk} < {}", self.value(v.clone())),
                SortKeyCondition::Le(v) => format!("{sk} <= {}", self.value(v.clone())),
                SortKeyCondition::Gt(v) => format!("{sk} > {}", self.value(v.clone())),
                SortKeyCondition::Ge(v) => format!("{sk} >= {}", self.value(v.clone())),
                SortKeyCondition::Between(lo, hi) => {
                    let lo = self.value(lo.clone());
                    let hi = self.value(hi.clone());
                    format!("{sk} BETWEEN {lo} AND {hi}")
                }
                SortKeyCondition::BeginsWith(prefix) => {
                    let v = self.value(Value::String(prefix.clone()));
                    format!("begins_with({sk}, {v})")
                }
            };
            out.push_str(" AND ");
            out.push_str(&clause);
        }
        out
    }

    /// `SET a = :v0, b = :v1 REMOVE c`
    pub fn update(&mut self, actions: &[UpdateAction]) -> String {
        let mut sets = Vec::new();
        let mut removes = Vec::new();
        for action in actions {
            match action {
                UpdateAction::Set { path, value } => {
                    let p = self.path(path);
                    let v = self.value(value.clone());
                    sets.push(format!("{p} = {v}"));
                }
                UpdateAction::Remove { path } => removes.push(self.path(path)),
            }
        }

        let mut clauses = Vec::new();
        if !sets.is_empty() {
            clauses.push(format!("SET {}", sets.join(", ")));
        }
        if !removes.is_empty() {
            clauses.push(format!("REMOVE {}", removes.join(", ")));
        }
        clauses.join(" ")
    }

    pub fn projection(&mut self, paths: &[AttrPath]) -> String {
        let parts: Vec<String> = paths.iter().map(|p| self.path(p)).collect();
        parts.join(", ")
    }

    /// `#nN -> name`; `None` when no names were used.
    pub fn names(&self) -> Option<HashMap<String, String>> {
        if self.names.is_empty() {
            return None;
        }
        Some(
            self.names
                .iter()
                .enumerate()
                .map(|(i, n)| (format!("#n{i}"), n.clone()))
                .collect(),
        )
    }

    /// `:vN -> value`; `None` when no values were used.
    pub fn values(&self) -> Option<HashMap<String, Value>> {
        if self.values.is_empty() {
            return None;
        }
        Some(
            self.values
                .iter()
                .enumerate()
                .map(|(i, v)| (format!(":v{i}"), v.clone()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(s: &str) -> AttrPath {
        AttrPath::parse(s).unwrap()
    }

    #[test]
    fn test_update_expression() {
        let mut ctx = ExpressionContext::new();
        let expr = ctx.update(&[
            UpdateAction::set(p("info.rating"), json!(5.5)),
            UpdateAction::set(p("info.plot"), json!("x")),
            UpdateAction::remove(p("info.actors[0]")),
        ]);
        assert_eq!(
            expr,
            "SET #n0.#n1 = :v0, #n0.#n2 = :v1 REMOVE #n0.#n3[0]"
        );
        let names = ctx.names().unwrap();
        assert_eq!(names["#n0"], "info");
        assert_eq!(names["#n3"], "actors");
        assert_eq!(ctx.values().unwrap()[":v1"], json!("x"));
    }

    #[test]
    fn test_condition_expression() {
        let mut ctx = ExpressionContext::new();
        let cond = Condition::ge(Operand::size(p("info.actors")), json!(3));
        assert_eq!(ctx.condition(&cond), "size(#n0.#n1) >= :v0");

        let mut ctx = ExpressionContext::new();
        let cond = Condition::and(vec![
            Condition::between(p("year"), json!(1950), json!(1959)),
            Condition::not(Condition::AttributeExists(p("info.rank"))),
        ]);
        assert_eq!(
            ctx.condition(&cond),
            "(#n0 BETWEEN :v0 AND :v1) AND (NOT (attribute_exists(#n1.#n2)))"
        );
    }

    #[test]
    fn test_key_condition_expression() {
        let mut ctx = ExpressionContext::new();
        let kc = KeyCondition::partition("year", json!(1985))
            .sort("title", SortKeyCondition::BeginsWith("A".to_string()));
        assert_eq!(
            ctx.key_condition(&kc),
            "#n0 = :v0 AND begins_with(#n1, :v1)"
        );
    }

    #[test]
    fn test_projection_expression() {
        let mut ctx = ExpressionContext::new();
        let expr = ctx.projection(&[p("year"), p("title"), p("info.rating")]);
        assert_eq!(expr, "#n0, #n1, #n2.#n3");
        assert!(ctx.values().is_none());
    }
}
