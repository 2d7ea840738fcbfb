//! In-process [`ItemService`] with the service's read and write semantics.
//!
//! Tables live in a `parking_lot::RwLock` and each table keeps its items in a
//! `BTreeMap` ordered by (partition key, sort key), so queries walk one
//! partition in sort-key order. Reads page at a configurable item count
//! instead of a byte budget.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ServiceError;
use crate::expr::{
    AttrPath, Condition, apply_projection, apply_updates, updated_paths, validate_updates,
};
use crate::number::value_to_decimal;
use crate::service::{
    DeleteItemInput, GetItemInput, ItemService, Page, PutItemInput, QueryInput, ScanInput,
    TableDescription, UpdateItemInput, WriteOutput,
};
use crate::types::{KeyDefinition, ReturnValues, ScalarType, TableSchema, TableStatus};

/// Items returned per page when the caller sets no smaller limit.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// A typed key attribute value. Numbers order numerically, strings and
/// binaries bytewise.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum KeyValue {
    N(Decimal),
    S(String),
    B(Vec<u8>),
}

type ItemKey = (KeyValue, Option<KeyValue>);

struct MemoryTable {
    schema: TableSchema,
    pk: KeyDefinition,
    sk: Option<KeyDefinition>,
    items: BTreeMap<ItemKey, Value>,
}

impl MemoryTable {
    fn key_value(def: &KeyDefinition, value: Option<&Value>) -> Result<KeyValue, ServiceError> {
        let mismatch = || {
            ServiceError::validation(format!(
                "One or more parameter values were invalid: Type mismatch for key {} expected: {}",
                def.name, def.key_type
            ))
        };
        let value = value.ok_or_else(|| {
            ServiceError::validation(format!(
                "One or more parameter values were invalid: Missing the key {} in the item",
                def.name
            ))
        })?;

        match (def.key_type, value) {
            (ScalarType::N, Value::Number(_)) => {
                value_to_decimal(value).map(KeyValue::N).ok_or_else(mismatch)
            }
            (ScalarType::S, Value::String(s)) if !s.is_empty() => Ok(KeyValue::S(s.clone())),
            (ScalarType::B, Value::String(s)) if !s.is_empty() => {
                Ok(KeyValue::B(s.as_bytes().to_vec()))
            }
            (ScalarType::S | ScalarType::B, Value::String(_)) => Err(ServiceError::validation(
                format!(
                    "One or more parameter values are not valid. The AttributeValue for a key attribute cannot contain an empty string value. Key: {}",
                    def.name
                ),
            )),
            _ => Err(mismatch()),
        }
    }

    /// Key of a full item being written.
    fn item_key(&self, item: &Value) -> Result<ItemKey, ServiceError> {
        let Value::Object(map) = item else {
            return Err(ServiceError::validation("Item must be a map of attributes"));
        };
        let pk = Self::key_value(&self.pk, map.get(&self.pk.name))?;
        let sk = match &self.sk {
            Some(def) => Some(Self::key_value(def, map.get(&def.name))?),
            None => None,
        };
        Ok((pk, sk))
    }

    /// Key of a key-only object, which must name exactly the key attributes.
    fn exact_key(&self, key: &Value) -> Result<ItemKey, ServiceError> {
        let expected = 1 + usize::from(self.sk.is_some());
        let matches_schema = match key {
            Value::Object(map) => {
                map.len() == expected
                    && map.contains_key(&self.pk.name)
                    && self.sk.as_ref().is_none_or(|sk| map.contains_key(&sk.name))
            }
            _ => false,
        };
        if !matches_schema {
            return Err(ServiceError::validation(
                "The provided key element does not match the schema",
            ));
        }
        self.item_key(key)
    }

    /// Key object (`{pk: .., sk: ..}`) of a stored item, with the key
    /// attributes copied verbatim.
    fn key_object(&self, item: &Value) -> Value {
        let mut map = Map::new();
        let names = std::iter::once(&self.pk.name).chain(self.sk.as_ref().map(|d| &d.name));
        for name in names {
            if let Some(v) = item.get(name) {
                map.insert(name.clone(), v.clone());
            }
        }
        Value::Object(map)
    }

    fn key_names(&self) -> (&str, Option<&str>) {
        (self.pk.name.as_str(), self.sk.as_ref().map(|d| d.name.as_str()))
    }
}

/// An in-memory stand-in for the remote key-value service.
pub struct MemoryService {
    tables: RwLock<HashMap<String, MemoryTable>>,
    page_size: usize,
}

impl Default for MemoryService {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryService {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Cap every query and scan page at `page_size` evaluated items.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn read_page(
        &self,
        table: &MemoryTable,
        candidates: Vec<(&ItemKey, &Value)>,
        filter: Option<&Condition>,
        projection: &[AttrPath],
        limit: Option<usize>,
    ) -> Result<Page, ServiceError> {
        if let Some(filter) = filter {
            filter.validate()?;
        }
        let limit = limit.map_or(self.page_size, |l| l.min(self.page_size));
        if limit == 0 {
            return Err(ServiceError::validation(
                "Limit must be greater than or equal to 1",
            ));
        }

        let has_more = candidates.len() > limit;
        let evaluated = &candidates[..candidates.len().min(limit)];

        let mut items = Vec::new();
        for (_, item) in evaluated {
            let keep = match filter {
                Some(f) => f.eval(item)?,
                None => true,
            };
            if keep {
                items.push(apply_projection(item, projection));
            }
        }

        let last_evaluated_key = match evaluated.last() {
            Some((_, item)) if has_more => Some(table.key_object(item)),
            _ => None,
        };

        Ok(Page {
            items,
            scanned_count: evaluated.len(),
            last_evaluated_key,
        })
    }
}

fn check_condition(condition: Option<&Condition>, existing: Option<&Value>) -> Result<(), ServiceError> {
    let Some(condition) = condition else {
        return Ok(());
    };
    let empty = Value::Object(Map::new());
    if condition.eval(existing.unwrap_or(&empty))? {
        Ok(())
    } else {
        Err(ServiceError::condition_failed())
    }
}

fn non_empty(value: Value) -> Option<Value> {
    match &value {
        Value::Object(map) if map.is_empty() => None,
        _ => Some(value),
    }
}

fn old_only(return_values: ReturnValues) -> Result<(), ServiceError> {
    match return_values {
        ReturnValues::None | ReturnValues::AllOld => Ok(()),
        other => Err(ServiceError::validation(format!(
            "Return values set to invalid value: {}",
            other.as_str()
        ))),
    }
}

#[async_trait]
impl ItemService for MemoryService {
    async fn create_table(&self, schema: &TableSchema) -> Result<TableStatus, ServiceError> {
        schema
            .validate()
            .map_err(|e| ServiceError::validation(e.to_string()))?;

        let mut tables = self.tables.write();
        if tables.contains_key(&schema.name) {
            return Err(ServiceError::table_in_use(&schema.name));
        }
        let (Some(pk), sk) = (schema.partition_key_def(), schema.sort_key_def()) else {
            return Err(ServiceError::validation("No HASH key specified in key schema"));
        };
        tables.insert(
            schema.name.clone(),
            MemoryTable {
                schema: schema.clone(),
                pk,
                sk,
                items: BTreeMap::new(),
            },
        );
        debug!(table = %schema.name, "table created");
        Ok(TableStatus::Creating)
    }

    async fn describe_table(&self, table_name: &str) -> Result<TableDescription, ServiceError> {
        let tables = self.tables.read();
        let table = tables
            .get(table_name)
            .ok_or_else(|| ServiceError::table_not_found(table_name))?;
        Ok(TableDescription {
            name: table_name.to_string(),
            status: TableStatus::Active,
            item_count: i64::try_from(table.items.len()).ok(),
            schema: Some(table.schema.clone()),
        })
    }

    async fn delete_table(&self, table_name: &str) -> Result<TableStatus, ServiceError> {
        let mut tables = self.tables.write();
        tables
            .remove(table_name)
            .ok_or_else(|| ServiceError::table_not_found(table_name))?;
        debug!(table = %table_name, "table deleted");
        Ok(TableStatus::Deleting)
    }

    async fn put_item(&self, input: PutItemInput) -> Result<WriteOutput, ServiceError> {
        old_only(input.return_values)?;
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(&input.table_name)
            .ok_or_else(|| ServiceError::table_not_found(&input.table_name))?;

        let key = table.item_key(&input.item)?;
        check_condition(input.condition.as_ref(), table.items.get(&key))?;

        let old = table.items.insert(key, input.item);
        let attributes = match input.return_values {
            ReturnValues::AllOld => old,
            _ => None,
        };
        Ok(WriteOutput { attributes })
    }

    async fn get_item(&self, input: GetItemInput) -> Result<Option<Value>, ServiceError> {
        let tables = self.tables.read();
        let table = tables
            .get(&input.table_name)
            .ok_or_else(|| ServiceError::table_not_found(&input.table_name))?;
        let key = table.exact_key(&input.key)?;
        Ok(table
            .items
            .get(&key)
            .map(|item| apply_projection(item, &input.projection)))
    }

    async fn update_item(&self, input: UpdateItemInput) -> Result<WriteOutput, ServiceError> {
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(&input.table_name)
            .ok_or_else(|| ServiceError::table_not_found(&input.table_name))?;

        let key = table.exact_key(&input.key)?;
        let (pk_name, sk_name) = table.key_names();
        validate_updates(&input.actions, pk_name, sk_name)?;

        let old = table.items.get(&key);
        check_condition(input.condition.as_ref(), old)?;

        // Updating a missing item creates it from the key.
        let mut new = old.cloned().unwrap_or_else(|| input.key.clone());
        apply_updates(&mut new, &input.actions)?;

        let paths = updated_paths(&input.actions);
        let attributes = match input.return_values {
            ReturnValues::None => None,
            ReturnValues::AllOld => old.cloned(),
            ReturnValues::UpdatedOld => old.and_then(|o| non_empty(apply_projection(o, &paths))),
            ReturnValues::AllNew => Some(new.clone()),
            ReturnValues::UpdatedNew => non_empty(apply_projection(&new, &paths)),
        };

        table.items.insert(key, new);
        Ok(WriteOutput { attributes })
    }

    async fn delete_item(&self, input: DeleteItemInput) -> Result<WriteOutput, ServiceError> {
        old_only(input.return_values)?;
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(&input.table_name)
            .ok_or_else(|| ServiceError::table_not_found(&input.table_name))?;

        let key = table.exact_key(&input.key)?;
        check_condition(input.condition.as_ref(), table.items.get(&key))?;

        let old = table.items.remove(&key);
        let attributes = match input.return_values {
            ReturnValues::AllOld => old,
            _ => None,
        };
        Ok(WriteOutput { attributes })
    }

    async fn query(&self, input: QueryInput) -> Result<Page, ServiceError> {
        let tables = self.tables.read();
        let table = tables
            .get(&input.table_name)
            .ok_or_else(|| ServiceError::table_not_found(&input.table_name))?;

        let kc = &input.key_condition;
        if kc.partition_name != table.pk.name {
            return Err(ServiceError::validation(
                "Query condition missed key schema element",
            ));
        }
        if let Some((name, _)) = &kc.sort {
            if table.sk.as_ref().is_none_or(|sk| &sk.name != name) {
                return Err(ServiceError::validation(
                    "Query key condition not supported",
                ));
            }
        }
        let pk = MemoryTable::key_value(&table.pk, Some(&kc.partition_value))?;
        let start = match &input.exclusive_start_key {
            Some(k) => Some(table.exact_key(k)?),
            None => None,
        };

        let mut candidates: Vec<(&ItemKey, &Value)> = table
            .items
            .range((pk.clone(), None)..)
            .take_while(|(key, _)| key.0 == pk)
            .filter(|(_, item)| kc.matches(item))
            .collect();
        if !input.scan_forward {
            candidates.reverse();
        }
        if let Some(start) = &start {
            candidates.retain(|(key, _)| {
                if input.scan_forward {
                    *key > start
                } else {
                    *key < start
                }
            });
        }

        self.read_page(
            table,
            candidates,
            input.filter.as_ref(),
            &input.projection,
            input.limit,
        )
    }

    async fn scan(&self, input: ScanInput) -> Result<Page, ServiceError> {
        let tables = self.tables.read();
        let table = tables
            .get(&input.table_name)
            .ok_or_else(|| ServiceError::table_not_found(&input.table_name))?;

        let candidates: Vec<(&ItemKey, &Value)> = match &input.exclusive_start_key {
            Some(k) => {
                let start = table.exact_key(k)?;
                table
                    .items
                    .range((std::ops::Bound::Excluded(start), std::ops::Bound::Unbounded))
                    .collect()
            }
            None => table.items.iter().collect(),
        };

        self.read_page(
            table,
            candidates,
            input.filter.as_ref(),
            &input.projection,
            input.limit,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{KeyCondition, SortKeyCondition, UpdateAction};
    use serde_json::json;

    fn schema() -> TableSchema {
        TableSchema::new("movies")
            .partition_key("year", ScalarType::N)
            .sort_key("title", ScalarType::S)
            .throughput(10, 10)
    }

    async fn service_with(items: &[Value]) -> MemoryService {
        let svc = MemoryService::new().with_page_size(2);
        svc.create_table(&schema()).await.unwrap();
        for item in items {
            svc.put_item(PutItemInput {
                table_name: "movies".to_string(),
                item: item.clone(),
                condition: None,
                return_values: ReturnValues::None,
            })
            .await
            .unwrap();
        }
        svc
    }

    fn key(year: i32, title: &str) -> Value {
        json!({"year": year, "title": title})
    }

    fn get(key: Value) -> GetItemInput {
        GetItemInput {
            table_name: "movies".to_string(),
            key,
            projection: Vec::new(),
            consistent_read: false,
        }
    }

    #[tokio::test]
    async fn test_create_twice_is_resource_in_use() {
        let svc = service_with(&[]).await;
        let err = svc.create_table(&schema()).await.unwrap_err();
        assert_eq!(err.code, ServiceError::RESOURCE_IN_USE);
    }

    #[tokio::test]
    async fn test_missing_table_is_resource_not_found() {
        let svc = MemoryService::new();
        let err = svc.get_item(get(key(2013, "Rush"))).await.unwrap_err();
        assert_eq!(err.code, ServiceError::RESOURCE_NOT_FOUND);
        let err = svc.describe_table("movies").await.unwrap_err();
        assert_eq!(err.code, ServiceError::RESOURCE_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_put_requires_typed_keys() {
        let svc = service_with(&[]).await;
        for item in [
            json!({"title": "No year"}),
            json!({"year": "2013", "title": "String year"}),
            json!({"year": 2013, "title": ""}),
        ] {
            let err = svc
                .put_item(PutItemInput {
                    table_name: "movies".to_string(),
                    item,
                    condition: None,
                    return_values: ReturnValues::None,
                })
                .await
                .unwrap_err();
            assert_eq!(err.code, ServiceError::VALIDATION);
        }
    }

    #[tokio::test]
    async fn test_get_key_must_match_schema() {
        let svc = service_with(&[key(2013, "Rush")]).await;
        let err = svc
            .get_item(get(json!({"year": 2013, "title": "Rush", "extra": 1})))
            .await
            .unwrap_err();
        assert_eq!(err.code, ServiceError::VALIDATION);
        assert!(svc.get_item(get(json!({"year": 2013}))).await.is_err());
    }

    #[tokio::test]
    async fn test_numeric_keys_compare_by_value() {
        let svc = service_with(&[key(2013, "Rush")]).await;
        let k: Value = serde_json::from_str(r#"{"year": 2013.0, "title": "Rush"}"#).unwrap();
        assert!(svc.get_item(get(k)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_upserts_and_returns_updated_new() {
        let svc = service_with(&[]).await;
        let out = svc
            .update_item(UpdateItemInput {
                table_name: "movies".to_string(),
                key: key(2015, "New"),
                actions: vec![UpdateAction::set(AttrPath::new("info"), json!({"rating": 1}))],
                condition: None,
                return_values: ReturnValues::UpdatedNew,
            })
            .await
            .unwrap();
        assert_eq!(out.attributes, Some(json!({"info": {"rating": 1}})));

        let item = svc.get_item(get(key(2015, "New"))).await.unwrap().unwrap();
        assert_eq!(item, json!({"year": 2015, "title": "New", "info": {"rating": 1}}));
    }

    #[tokio::test]
    async fn test_update_rejects_key_attribute() {
        let svc = service_with(&[key(2013, "Rush")]).await;
        let err = svc
            .update_item(UpdateItemInput {
                table_name: "movies".to_string(),
                key: key(2013, "Rush"),
                actions: vec![UpdateAction::set(AttrPath::new("title"), json!("Other"))],
                condition: None,
                return_values: ReturnValues::None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ServiceError::VALIDATION);
    }

    #[tokio::test]
    async fn test_failed_condition_leaves_item_unchanged() {
        let original = json!({"year": 2013, "title": "Rush", "info": {"rating": 8}});
        let svc = service_with(&[original.clone()]).await;
        let err = svc
            .delete_item(DeleteItemInput {
                table_name: "movies".to_string(),
                key: key(2013, "Rush"),
                condition: Some(Condition::le(
                    AttrPath::new("info").key("rating"),
                    json!(5),
                )),
                return_values: ReturnValues::None,
            })
            .await
            .unwrap_err();
        assert!(err.is_condition_failed());
        assert_eq!(svc.get_item(get(key(2013, "Rush"))).await.unwrap(), Some(original));
    }

    #[tokio::test]
    async fn test_put_only_supports_old_return_values() {
        let svc = service_with(&[]).await;
        let err = svc
            .put_item(PutItemInput {
                table_name: "movies".to_string(),
                item: key(2013, "Rush"),
                condition: None,
                return_values: ReturnValues::AllNew,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ServiceError::VALIDATION);
    }

    #[tokio::test]
    async fn test_query_pages_in_sort_order() {
        let svc = service_with(&[
            key(2013, "C"),
            key(2013, "A"),
            key(2013, "B"),
            key(2014, "A"),
            key(2012, "Z"),
        ])
        .await;

        let mut input = QueryInput::new("movies", KeyCondition::partition("year", json!(2013)));
        let first = svc.query(input.clone()).await.unwrap();
        assert_eq!(first.items, vec![key(2013, "A"), key(2013, "B")]);
        assert_eq!(first.last_evaluated_key, Some(key(2013, "B")));

        input.exclusive_start_key = first.last_evaluated_key;
        let second = svc.query(input).await.unwrap();
        assert_eq!(second.items, vec![key(2013, "C")]);
        assert_eq!(second.last_evaluated_key, None);
    }

    #[tokio::test]
    async fn test_query_backward_with_sort_condition() {
        let svc = service_with(&[key(2013, "Alpha"), key(2013, "Apex"), key(2013, "Beta")]).await;
        let mut input = QueryInput::new(
            "movies",
            KeyCondition::partition("year", json!(2013))
                .sort("title", SortKeyCondition::BeginsWith("A".to_string())),
        );
        input.scan_forward = false;
        let page = svc.query(input).await.unwrap();
        assert_eq!(page.items, vec![key(2013, "Apex"), key(2013, "Alpha")]);
    }

    #[tokio::test]
    async fn test_query_on_non_key_attribute_rejected() {
        let svc = service_with(&[]).await;
        let err = svc
            .query(QueryInput::new("movies", KeyCondition::partition("title", json!("x"))))
            .await
            .unwrap_err();
        assert_eq!(err.code, ServiceError::VALIDATION);
    }

    #[tokio::test]
    async fn test_scan_filter_applies_after_limit() {
        let svc = service_with(&[key(2010, "A"), key(2011, "B"), key(2012, "C")]).await;
        let mut input = ScanInput::new("movies");
        input.filter = Some(Condition::eq(AttrPath::new("year"), json!(2012)));

        let first = svc.scan(input.clone()).await.unwrap();
        assert!(first.items.is_empty());
        assert_eq!(first.scanned_count, 2);
        assert!(first.last_evaluated_key.is_some());

        input.exclusive_start_key = first.last_evaluated_key;
        let second = svc.scan(input).await.unwrap();
        assert_eq!(second.items, vec![key(2012, "C")]);
        assert_eq!(second.last_evaluated_key, None);
    }
}
