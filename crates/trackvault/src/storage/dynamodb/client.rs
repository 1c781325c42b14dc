//! [`ItemStore`] backed by a DynamoDB table through `aws-sdk-dynamodb`.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{
    AttributeValue, DeleteRequest, PutRequest, ReturnValue, WriteRequest as SdkWriteRequest,
};
use aws_sdk_dynamodb::Client;

use crate::config::Config;

use super::error::{
    map_batch_write_error, map_delete_item_error, map_get_item_error, map_put_item_error,
    map_query_error, map_scan_error, map_update_item_error,
};
use super::store::{
    Condition, Item, ItemPage, ItemStore, QueryRequest, ScanRequest, SortKeyCondition,
    StoreError, StoreResult, TableKey, Update, WriteRequest, MAX_BATCH_WRITE, PK, SK,
};

/// DynamoDB-backed item store.
#[derive(Debug, Clone)]
pub struct SdkStore {
    client: Client,
    table_name: String,
}

impl SdkStore {
    /// Creates a new store with the given DynamoDB client and table name.
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Creates a store from configuration.
    ///
    /// Uses the AWS SDK default credential chain. `dynamodb_endpoint_url`
    /// points the client at a local DynamoDB when set.
    pub async fn from_config(config: &Config) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(endpoint) = &config.dynamodb_endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;
        Self::new(Client::new(&sdk_config), &config.table_name)
    }

    /// Get the table name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

/// Placeholder bookkeeping for one request's expressions.
///
/// Every attribute name goes through a `#n` placeholder, so reserved words
/// such as `status` and `role` need no special casing.
#[derive(Debug, Default)]
struct Expressions {
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl Expressions {
    fn name(&mut self, attribute: &str) -> String {
        if let Some((placeholder, _)) = self.names.iter().find(|(_, name)| *name == attribute) {
            return placeholder.clone();
        }
        let placeholder = format!("#n{}", self.names.len());
        self.names.insert(placeholder.clone(), attribute.to_string());
        placeholder
    }

    fn value(&mut self, value: AttributeValue) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value);
        placeholder
    }

    fn condition(&mut self, condition: &Condition) -> String {
        let pk = self.name(PK);
        match condition {
            Condition::Exists => format!("attribute_exists({pk})"),
            Condition::NotExists => format!("attribute_not_exists({pk})"),
            Condition::Equals { attribute, value } => {
                let name = self.name(attribute);
                let value = self.value(value.clone());
                format!("attribute_exists({pk}) AND {name} = {value}")
            }
        }
    }

    fn update(&mut self, updates: &[Update]) -> String {
        let mut sets = Vec::new();
        let mut adds = Vec::new();
        let mut removes = Vec::new();
        for update in updates {
            match update {
                Update::Set(attribute, value) => {
                    let name = self.name(attribute);
                    let value = self.value(value.clone());
                    sets.push(format!("{name} = {value}"));
                }
                Update::Add(attribute, delta) => {
                    let name = self.name(attribute);
                    let value = self.value(AttributeValue::N(delta.to_string()));
                    adds.push(format!("{name} {value}"));
                }
                Update::Remove(attribute) => removes.push(self.name(attribute)),
            }
        }

        [("SET", sets), ("ADD", adds), ("REMOVE", removes)]
            .into_iter()
            .filter(|(_, clauses)| !clauses.is_empty())
            .map(|(action, clauses)| format!("{action} {}", clauses.join(", ")))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn sort_key(&mut self, attribute: &str, condition: &SortKeyCondition) -> String {
        let name = self.name(attribute);
        match condition {
            SortKeyCondition::BeginsWith(prefix) => {
                let value = self.value(AttributeValue::S(prefix.clone()));
                format!("begins_with({name}, {value})")
            }
            SortKeyCondition::Equals(sort_key) => {
                let value = self.value(AttributeValue::S(sort_key.clone()));
                format!("{name} = {value}")
            }
        }
    }

    fn into_parts(
        self,
    ) -> (
        Option<HashMap<String, String>>,
        Option<HashMap<String, AttributeValue>>,
    ) {
        let names = (!self.names.is_empty()).then_some(self.names);
        let values = (!self.values.is_empty()).then_some(self.values);
        (names, values)
    }
}

fn to_sdk_write(request: WriteRequest) -> StoreResult<SdkWriteRequest> {
    let invalid = |err: aws_sdk_dynamodb::error::BuildError| {
        StoreError::InvalidRequest(format!("invalid batch entry: {err}"))
    };
    Ok(match request {
        WriteRequest::Put(item) => SdkWriteRequest::builder()
            .put_request(PutRequest::builder().set_item(Some(item)).build().map_err(invalid)?)
            .build(),
        WriteRequest::Delete(key) => SdkWriteRequest::builder()
            .delete_request(
                DeleteRequest::builder()
                    .set_key(Some(key.to_item()))
                    .build()
                    .map_err(invalid)?,
            )
            .build(),
    })
}

#[async_trait]
impl ItemStore for SdkStore {
    async fn put_item(&self, item: Item, condition: Option<Condition>) -> StoreResult<()> {
        tracing::debug!(table = %self.table_name, "PutItem");
        let mut expressions = Expressions::default();
        let condition = condition.map(|c| expressions.condition(&c));
        let (names, values) = expressions.into_parts();

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .set_condition_expression(condition)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .send()
            .await
            .map_err(map_put_item_error)?;

        Ok(())
    }

    async fn get_item(&self, key: &TableKey) -> StoreResult<Option<Item>> {
        tracing::debug!(table = %self.table_name, pk = %key.pk, sk = %key.sk, "GetItem");
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(key.to_item()))
            .send()
            .await
            .map_err(map_get_item_error)?;

        Ok(result.item)
    }

    async fn update_item(
        &self,
        key: &TableKey,
        updates: Vec<Update>,
        condition: Option<Condition>,
    ) -> StoreResult<Item> {
        tracing::debug!(table = %self.table_name, pk = %key.pk, sk = %key.sk, "UpdateItem");
        let mut expressions = Expressions::default();
        let update = expressions.update(&updates);
        let condition = condition.map(|c| expressions.condition(&c));
        let (names, values) = expressions.into_parts();

        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(key.to_item()))
            .update_expression(update)
            .set_condition_expression(condition)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(map_update_item_error)?;

        Ok(result.attributes.unwrap_or_default())
    }

    async fn delete_item(&self, key: &TableKey, condition: Option<Condition>) -> StoreResult<()> {
        tracing::debug!(table = %self.table_name, pk = %key.pk, sk = %key.sk, "DeleteItem");
        let mut expressions = Expressions::default();
        let condition = condition.map(|c| expressions.condition(&c));
        let (names, values) = expressions.into_parts();

        self.client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(key.to_item()))
            .set_condition_expression(condition)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .send()
            .await
            .map_err(map_delete_item_error)?;

        Ok(())
    }

    async fn query(&self, request: QueryRequest) -> StoreResult<ItemPage> {
        tracing::debug!(
            table = %self.table_name,
            index = request.index.map(|index| index.name()),
            partition = %request.partition,
            "Query"
        );
        let (pk_attribute, sk_attribute) = match request.index {
            Some(index) => (index.pk_attribute(), index.sk_attribute()),
            None => (PK, SK),
        };

        let mut expressions = Expressions::default();
        let pk_name = expressions.name(pk_attribute);
        let pk_value = expressions.value(AttributeValue::S(request.partition.clone()));
        let mut key_condition = format!("{pk_name} = {pk_value}");
        if let Some(sort) = &request.sort {
            key_condition.push_str(" AND ");
            key_condition.push_str(&expressions.sort_key(sk_attribute, sort));
        }
        let (names, values) = expressions.into_parts();

        let result = self
            .client
            .query()
            .table_name(&self.table_name)
            .set_index_name(request.index.map(|index| index.name().to_string()))
            .key_condition_expression(key_condition)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .set_limit(request.limit.map(|limit| limit.min(i32::MAX as u32) as i32))
            .set_exclusive_start_key(request.exclusive_start_key)
            .scan_index_forward(request.scan_forward)
            .send()
            .await
            .map_err(map_query_error)?;

        Ok(ItemPage {
            items: result.items.unwrap_or_default(),
            last_evaluated_key: result.last_evaluated_key.filter(|key| !key.is_empty()),
        })
    }

    async fn scan(&self, request: ScanRequest) -> StoreResult<ItemPage> {
        tracing::debug!(table = %self.table_name, "Scan");
        let mut expressions = Expressions::default();
        let filter = request.filter.map(|(attribute, value)| {
            let name = expressions.name(&attribute);
            let value = expressions.value(value);
            format!("{name} = {value}")
        });
        let (names, values) = expressions.into_parts();

        let result = self
            .client
            .scan()
            .table_name(&self.table_name)
            .set_filter_expression(filter)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .set_limit(request.limit.map(|limit| limit.min(i32::MAX as u32) as i32))
            .set_exclusive_start_key(request.exclusive_start_key)
            .send()
            .await
            .map_err(map_scan_error)?;

        Ok(ItemPage {
            items: result.items.unwrap_or_default(),
            last_evaluated_key: result.last_evaluated_key.filter(|key| !key.is_empty()),
        })
    }

    async fn batch_write(&self, requests: Vec<WriteRequest>) -> StoreResult<()> {
        tracing::debug!(table = %self.table_name, count = requests.len(), "BatchWriteItem");
        if requests.is_empty() || requests.len() > MAX_BATCH_WRITE {
            return Err(StoreError::InvalidRequest(format!(
                "batch must hold 1 to {} writes, got {}",
                MAX_BATCH_WRITE,
                requests.len()
            )));
        }

        let writes = requests
            .into_iter()
            .map(to_sdk_write)
            .collect::<StoreResult<Vec<_>>>()?;

        let result = self
            .client
            .batch_write_item()
            .request_items(&self.table_name, writes)
            .send()
            .await
            .map_err(map_batch_write_error)?;

        let unprocessed = result
            .unprocessed_items
            .unwrap_or_default()
            .values()
            .map(Vec::len)
            .sum::<usize>();
        if unprocessed > 0 {
            return Err(StoreError::Throttled(format!(
                "{unprocessed} batch writes were not processed"
            )));
        }

        Ok(())
    }
}
