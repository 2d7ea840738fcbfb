//! The remote item service abstraction.
//!
//! [`ItemService`] is the seam between the movie façade and whatever stores
//! the items: [`crate::dynamo::DynamoDbService`] talks to the managed service
//! over the network, [`crate::memory::MemoryService`] keeps everything in
//! process with the same semantics.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ServiceError;
use crate::expr::{AttrPath, Condition, KeyCondition, UpdateAction};
use crate::types::{ReturnValues, TableSchema, TableStatus};

/// Table metadata as reported by `describe_table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescription {
    pub name: String,
    pub status: TableStatus,
    pub item_count: Option<i64>,
    pub schema: Option<TableSchema>,
}

#[derive(Debug, Clone)]
pub struct PutItemInput {
    pub table_name: String,
    pub item: Value,
    pub condition: Option<Condition>,
    pub return_values: ReturnValues,
}

#[derive(Debug, Clone)]
pub struct GetItemInput {
    pub table_name: String,
    pub key: Value,
    pub projection: Vec<AttrPath>,
    pub consistent_read: bool,
}

#[derive(Debug, Clone)]
pub struct UpdateItemInput {
    pub table_name: String,
    pub key: Value,
    pub actions: Vec<UpdateAction>,
    pub condition: Option<Condition>,
    pub return_values: ReturnValues,
}

#[derive(Debug, Clone)]
pub struct DeleteItemInput {
    pub table_name: String,
    pub key: Value,
    pub condition: Option<Condition>,
    pub return_values: ReturnValues,
}

#[derive(Debug, Clone)]
pub struct QueryInput {
    pub table_name: String,
    pub key_condition: KeyCondition,
    pub filter: Option<Condition>,
    pub projection: Vec<AttrPath>,
    pub limit: Option<usize>,
    pub exclusive_start_key: Option<Value>,
    /// Ascending sort-key order when true.
    pub scan_forward: bool,
}

#[derive(Debug, Clone)]
pub struct ScanInput {
    pub table_name: String,
    pub filter: Option<Condition>,
    pub projection: Vec<AttrPath>,
    pub limit: Option<usize>,
    pub exclusive_start_key: Option<Value>,
}

impl QueryInput {
    pub fn new(table_name: impl Into<String>, key_condition: KeyCondition) -> Self {
        Self {
            table_name: table_name.into(),
            key_condition,
            filter: None,
            projection: Vec::new(),
            limit: None,
            exclusive_start_key: None,
            scan_forward: true,
        }
    }
}

impl ScanInput {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            filter: None,
            projection: Vec::new(),
            limit: None,
            exclusive_start_key: None,
        }
    }
}

/// Result of a write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOutput {
    /// Attributes selected by the request's [`ReturnValues`], if any.
    pub attributes: Option<Value>,
}

/// One page of a query or scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    /// Items evaluated before the filter was applied.
    pub scanned_count: usize,
    /// Continuation token; `None` when the result set is exhausted.
    pub last_evaluated_key: Option<Value>,
}

/// Operations the movie façade needs from the key-value service.
///
/// Every method is a single request: no retries, no pagination. Errors carry
/// the service's code verbatim.
#[async_trait]
pub trait ItemService: Send + Sync {
    async fn create_table(&self, schema: &TableSchema) -> Result<TableStatus, ServiceError>;

    async fn describe_table(&self, table_name: &str) -> Result<TableDescription, ServiceError>;

    async fn delete_table(&self, table_name: &str) -> Result<TableStatus, ServiceError>;

    async fn put_item(&self, input: PutItemInput) -> Result<WriteOutput, ServiceError>;

    async fn get_item(&self, input: GetItemInput) -> Result<Option<Value>, ServiceError>;

    async fn update_item(&self, input: UpdateItemInput) -> Result<WriteOutput, ServiceError>;

    async fn delete_item(&self, input: DeleteItemInput) -> Result<WriteOutput, ServiceError>;

    async fn query(&self, input: QueryInput) -> Result<Page, ServiceError>;

    async fn scan(&self, input: ScanInput) -> Result<Page, ServiceError>;
}
