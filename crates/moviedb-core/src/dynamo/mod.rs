//! [`ItemService`] backed by Amazon DynamoDB through `aws-sdk-dynamodb`.

pub mod convert;

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::config::Region;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_dynamodb::types::{self as ddb, AttributeValue};
use serde_json::Value;
use tracing::debug;

use crate::error::ServiceError;
use crate::expr::{AttrPath, Condition, ExpressionContext};
use crate::service::{
    DeleteItemInput, GetItemInput, ItemService, Page, PutItemInput, QueryInput, ScanInput,
    TableDescription, UpdateItemInput, WriteOutput,
};
use crate::types::{
    AttributeDefinition, KeyRole, KeySchemaElement, ProvisionedThroughput, ReturnValues,
    ScalarType, TableSchema, TableStatus,
};
use convert::{from_item, to_attribute_value, to_item};

/// Where to reach the service. Unset fields fall back to the SDK's default
/// provider chain (environment, profile, instance metadata).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceConfig {
    pub region: Option<String>,
    /// Endpoint override, e.g. `http://localhost:8000` for DynamoDB Local.
    pub endpoint_url: Option<String>,
}

#[derive(Clone)]
pub struct DynamoDbService {
    client: Client,
}

impl std::fmt::Debug for DynamoDbService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoDbService").finish_non_exhaustive()
    }
}

impl DynamoDbService {
    /// Load the SDK defaults and apply `config` on top.
    pub async fn connect(config: &ServiceConfig) -> Self {
        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::from_sdk_config(&sdk_config, config)
    }

    pub fn from_sdk_config(sdk_config: &SdkConfig, config: &ServiceConfig) -> Self {
        let mut builder = aws_sdk_dynamodb::config::Builder::from(sdk_config);
        if let Some(region) = &config.region {
            builder = builder.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }
        Self {
            client: Client::from_conf(builder.build()),
        }
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

/// Map an SDK failure to a [`ServiceError`], keeping the service's code.
fn service_error<E>(err: E) -> ServiceError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    match err.code() {
        Some(code) => ServiceError::new(code, err.message().unwrap_or_default()),
        None => ServiceError::new(
            ServiceError::TRANSPORT,
            DisplayErrorContext(&err).to_string(),
        ),
    }
}

fn build_error(err: aws_sdk_dynamodb::error::BuildError) -> ServiceError {
    ServiceError::validation(err.to_string())
}

fn return_value(rv: ReturnValues) -> ddb::ReturnValue {
    match rv {
        ReturnValues::None => ddb::ReturnValue::None,
        ReturnValues::AllOld => ddb::ReturnValue::AllOld,
        ReturnValues::UpdatedOld => ddb::ReturnValue::UpdatedOld,
        ReturnValues::AllNew => ddb::ReturnValue::AllNew,
        ReturnValues::UpdatedNew => ddb::ReturnValue::UpdatedNew,
    }
}

fn scalar_type(t: ScalarType) -> ddb::ScalarAttributeType {
    match t {
        ScalarType::S => ddb::ScalarAttributeType::S,
        ScalarType::N => ddb::ScalarAttributeType::N,
        ScalarType::B => ddb::ScalarAttributeType::B,
    }
}

fn table_status(status: Option<&ddb::TableStatus>) -> TableStatus {
    status.map_or(TableStatus::Other("UNKNOWN".to_string()), |s| {
        TableStatus::parse(s.as_str())
    })
}

/// Rebuild a [`TableSchema`] from a table description.
fn schema_from_description(desc: &ddb::TableDescription) -> Option<TableSchema> {
    let mut key_schema = Vec::new();
    for k in desc.key_schema() {
        let role = match k.key_type() {
            ddb::KeyType::Hash => KeyRole::Hash,
            ddb::KeyType::Range => KeyRole::Range,
            _ => return None,
        };
        key_schema.push(KeySchemaElement {
            attribute_name: k.attribute_name().to_string(),
            role,
        });
    }

    let mut attribute_definitions = Vec::new();
    for d in desc.attribute_definitions() {
        let attribute_type = match d.attribute_type() {
            ddb::ScalarAttributeType::S => ScalarType::S,
            ddb::ScalarAttributeType::N => ScalarType::N,
            ddb::ScalarAttributeType::B => ScalarType::B,
            _ => return None,
        };
        attribute_definitions.push(AttributeDefinition {
            attribute_name: d.attribute_name().to_string(),
            attribute_type,
        });
    }

    let throughput = desc.provisioned_throughput();
    Some(TableSchema {
        name: desc.table_name()?.to_string(),
        key_schema,
        attribute_definitions,
        throughput: ProvisionedThroughput {
            read_capacity_units: throughput.and_then(|t| t.read_capacity_units()).unwrap_or(0),
            write_capacity_units: throughput.and_then(|t| t.write_capacity_units()).unwrap_or(0),
        },
    })
}

fn attribute_values(ctx: &ExpressionContext) -> Option<HashMap<String, AttributeValue>> {
    ctx.values().map(|values| {
        values
            .into_iter()
            .map(|(k, v)| (k, to_attribute_value(&v)))
            .collect()
    })
}

fn render_condition(
    ctx: &mut ExpressionContext,
    condition: Option<&Condition>,
) -> Result<Option<String>, ServiceError> {
    match condition {
        Some(c) => {
            c.validate()?;
            Ok(Some(ctx.condition(c)))
        }
        None => Ok(None),
    }
}

fn render_projection(ctx: &mut ExpressionContext, paths: &[AttrPath]) -> Option<String> {
    (!paths.is_empty()).then(|| ctx.projection(paths))
}

fn decode_attributes(
    attributes: Option<&HashMap<String, AttributeValue>>,
) -> Result<Option<Value>, ServiceError> {
    match attributes {
        Some(map) if !map.is_empty() => Ok(Some(from_item(map)?)),
        _ => Ok(None),
    }
}

fn decode_page(
    items: &[HashMap<String, AttributeValue>],
    scanned_count: i32,
    last_evaluated_key: Option<&HashMap<String, AttributeValue>>,
) -> Result<Page, ServiceError> {
    Ok(Page {
        items: items.iter().map(from_item).collect::<Result<_, _>>()?,
        scanned_count: usize::try_from(scanned_count).unwrap_or(0),
        last_evaluated_key: decode_attributes(last_evaluated_key)?,
    })
}

fn limit(limit: Option<usize>) -> Option<i32> {
    limit.map(|l| i32::try_from(l).unwrap_or(i32::MAX))
}

fn start_key(key: Option<&Value>) -> Result<Option<HashMap<String, AttributeValue>>, ServiceError> {
    key.map(to_item).transpose()
}

#[async_trait]
impl ItemService for DynamoDbService {
    async fn create_table(&self, schema: &TableSchema) -> Result<TableStatus, ServiceError> {
        let mut req = self.client.create_table().table_name(&schema.name);
        for k in &schema.key_schema {
            let key_type = match k.role {
                KeyRole::Hash => ddb::KeyType::Hash,
                KeyRole::Range => ddb::KeyType::Range,
            };
            req = req.key_schema(
                ddb::KeySchemaElement::builder()
                    .attribute_name(&k.attribute_name)
                    .key_type(key_type)
                    .build()
                    .map_err(build_error)?,
            );
        }
        for d in &schema.attribute_definitions {
            req = req.attribute_definitions(
                ddb::AttributeDefinition::builder()
                    .attribute_name(&d.attribute_name)
                    .attribute_type(scalar_type(d.attribute_type))
                    .build()
                    .map_err(build_error)?,
            );
        }
        req = req.provisioned_throughput(
            ddb::ProvisionedThroughput::builder()
                .read_capacity_units(schema.throughput.read_capacity_units)
                .write_capacity_units(schema.throughput.write_capacity_units)
                .build()
                .map_err(build_error)?,
        );

        debug!(table = %schema.name, "create_table");
        let out = req.send().await.map_err(service_error)?;
        Ok(table_status(
            out.table_description().and_then(|d| d.table_status()),
        ))
    }

    async fn describe_table(&self, table_name: &str) -> Result<TableDescription, ServiceError> {
        let out = self
            .client
            .describe_table()
            .table_name(table_name)
            .send()
            .await
            .map_err(service_error)?;
        let desc = out
            .table()
            .ok_or_else(|| ServiceError::malformed_item("describe_table returned no table"))?;
        Ok(TableDescription {
            name: table_name.to_string(),
            status: table_status(desc.table_status()),
            item_count: desc.item_count(),
            schema: schema_from_description(desc),
        })
    }

    async fn delete_table(&self, table_name: &str) -> Result<TableStatus, ServiceError> {
        debug!(table = %table_name, "delete_table");
        let out = self
            .client
            .delete_table()
            .table_name(table_name)
            .send()
            .await
            .map_err(service_error)?;
        Ok(table_status(
            out.table_description().and_then(|d| d.table_status()),
        ))
    }

    async fn put_item(&self, input: PutItemInput) -> Result<WriteOutput, ServiceError> {
        let mut ctx = ExpressionContext::new();
        let condition = render_condition(&mut ctx, input.condition.as_ref())?;

        debug!(table = %input.table_name, "put_item");
        let out = self
            .client
            .put_item()
            .table_name(&input.table_name)
            .set_item(Some(to_item(&input.item)?))
            .set_condition_expression(condition)
            .set_expression_attribute_names(ctx.names())
            .set_expression_attribute_values(attribute_values(&ctx))
            .return_values(return_value(input.return_values))
            .send()
            .await
            .map_err(service_error)?;
        Ok(WriteOutput {
            attributes: decode_attributes(out.attributes())?,
        })
    }

    async fn get_item(&self, input: GetItemInput) -> Result<Option<Value>, ServiceError> {
        let mut ctx = ExpressionContext::new();
        let projection = render_projection(&mut ctx, &input.projection);

        let out = self
            .client
            .get_item()
            .table_name(&input.table_name)
            .set_key(Some(to_item(&input.key)?))
            .set_projection_expression(projection)
            .set_expression_attribute_names(ctx.names())
            .consistent_read(input.consistent_read)
            .send()
            .await
            .map_err(service_error)?;
        out.item().map(from_item).transpose()
    }

    async fn update_item(&self, input: UpdateItemInput) -> Result<WriteOutput, ServiceError> {
        if input.actions.is_empty() {
            return Err(crate::error::ExpressionError::EmptyUpdate.into());
        }
        let mut ctx = ExpressionContext::new();
        let update = ctx.update(&input.actions);
        let condition = render_condition(&mut ctx, input.condition.as_ref())?;

        debug!(table = %input.table_name, %update, "update_item");
        let out = self
            .client
            .update_item()
            .table_name(&input.table_name)
            .set_key(Some(to_item(&input.key)?))
            .update_expression(update)
            .set_condition_expression(condition)
            .set_expression_attribute_names(ctx.names())
            .set_expression_attribute_values(attribute_values(&ctx))
            .return_values(return_value(input.return_values))
            .send()
            .await
            .map_err(service_error)?;
        Ok(WriteOutput {
            attributes: decode_attributes(out.attributes())?,
        })
    }

    async fn delete_item(&self, input: DeleteItemInput) -> Result<WriteOutput, ServiceError> {
        let mut ctx = ExpressionContext::new();
        let condition = render_condition(&mut ctx, input.condition.as_ref())?;

        debug!(table = %input.table_name, "delete_item");
        let out = self
            .client
            .delete_item()
            .table_name(&input.table_name)
            .set_key(Some(to_item(&input.key)?))
            .set_condition_expression(condition)
            .set_expression_attribute_names(ctx.names())
            .set_expression_attribute_values(attribute_values(&ctx))
            .return_values(return_value(input.return_values))
            .send()
            .await
            .map_err(service_error)?;
        Ok(WriteOutput {
            attributes: decode_attributes(out.attributes())?,
        })
    }

    async fn query(&self, input: QueryInput) -> Result<Page, ServiceError> {
        let mut ctx = ExpressionContext::new();
        let key_condition = ctx.key_condition(&input.key_condition);
        let filter = render_condition(&mut ctx, input.filter.as_ref())?;
        let projection = render_projection(&mut ctx, &input.projection);

        debug!(table = %input.table_name, %key_condition, "query");
        let out = self
            .client
            .query()
            .table_name(&input.table_name)
            .key_condition_expression(key_condition)
            .set_filter_expression(filter)
            .set_projection_expression(projection)
            .set_expression_attribute_names(ctx.names())
            .set_expression_attribute_values(attribute_values(&ctx))
            .set_limit(limit(input.limit))
            .set_exclusive_start_key(start_key(input.exclusive_start_key.as_ref())?)
            .scan_index_forward(input.scan_forward)
            .send()
            .await
            .map_err(service_error)?;
        decode_page(out.items(), out.scanned_count(), out.last_evaluated_key())
    }

    async fn scan(&self, input: ScanInput) -> Result<Page, ServiceError> {
        let mut ctx = ExpressionContext::new();
        let filter = render_condition(&mut ctx, input.filter.as_ref())?;
        let projection = render_projection(&mut ctx, &input.projection);

        debug!(table = %input.table_name, "scan");
        let out = self
            .client
            .scan()
            .table_name(&input.table_name)
            .set_filter_expression(filter)
            .set_projection_expression(projection)
            .set_expression_attribute_names(ctx.names())
            .set_expression_attribute_values(attribute_values(&ctx))
            .set_limit(limit(input.limit))
            .set_exclusive_start_key(start_key(input.exclusive_start_key.as_ref())?)
            .send()
            .await
            .map_err(service_error)?;
        decode_page(out.items(), out.scanned_count(), out.last_evaluated_key())
    }
}
