//! DynamoDB single-table implementation.
//!
//! Table schema:
//! - `PK` (String, partition key), `SK` (String, sort key)
//! - `GSI1PK` (String) projected by the `GSI1` index
//! - `body` (String): JSON encoding of the record

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client;
use log::{debug, info};
use std::collections::HashMap;

use super::{ItemStore, Result, StorageError, StoredItem};

const INDEX_NAME: &str = "GSI1";

pub struct DynamoStore {
    client: Client,
    table_name: String,
}

impl DynamoStore {
    pub async fn new(table_name: impl Into<String>, endpoint_url: Option<&str>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

        let client = if let Some(endpoint) = endpoint_url {
            let dynamo_config = aws_sdk_dynamodb::config::Builder::from(&config)
                .endpoint_url(endpoint)
                .build();
            Client::from_conf(dynamo_config)
        } else {
            Client::new(&config)
        };

        let table_name = table_name.into();
        info!("Using DynamoDB table {table_name}");

        Self { client, table_name }
    }

    fn to_attributes(item: StoredItem) -> HashMap<String, AttributeValue> {
        let mut attrs = HashMap::new();
        attrs.insert("PK".to_string(), AttributeValue::S(item.pk));
        attrs.insert("SK".to_string(), AttributeValue::S(item.sk));
        if let Some(gsi1pk) = item.gsi1pk {
            attrs.insert("GSI1PK".to_string(), AttributeValue::S(gsi1pk));
        }
        attrs.insert("body".to_string(), AttributeValue::S(item.body));
        attrs
    }

    fn from_attributes(attrs: &HashMap<String, AttributeValue>) -> Result<StoredItem> {
        let text = |name: &str| -> Option<String> {
            match attrs.get(name) {
                Some(AttributeValue::S(value)) => Some(value.clone()),
                _ => None,
            }
        };

        let pk = text("PK").unwrap_or_default();
        let sk = text("SK").unwrap_or_default();
        let body = text("body").ok_or_else(|| StorageError::Corrupt {
            pk: pk.clone(),
            sk: sk.clone(),
            reason: "missing body attribute".to_string(),
        })?;

        Ok(StoredItem {
            pk,
            sk,
            gsi1pk: text("GSI1PK"),
            body,
        })
    }
}

#[async_trait]
impl ItemStore for DynamoStore {
    async fn get(&self, pk: &str, sk: &str) -> Result<Option<StoredItem>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk.to_string()))
            .key("SK", AttributeValue::S(sk.to_string()))
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("DynamoDB get_item failed: {e}")))?;

        result.item.as_ref().map(Self::from_attributes).transpose()
    }

    async fn put(&self, item: StoredItem) -> Result<()> {
        let (pk, sk) = (item.pk.clone(), item.sk.clone());

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(Self::to_attributes(item)))
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("DynamoDB put_item failed: {e}")))?;

        debug!("Stored {pk}/{sk} in DynamoDB");
        Ok(())
    }

    async fn delete(&self, pk: &str, sk: &str) -> Result<bool> {
        let result = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk.to_string()))
            .key("SK", AttributeValue::S(sk.to_string()))
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("DynamoDB delete_item failed: {e}")))?;

        Ok(result.attributes.is_some_and(|attrs| !attrs.is_empty()))
    }

    async fn query_prefix(&self, pk: &str, sk_prefix: &str) -> Result<Vec<StoredItem>> {
        let mut items = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let page = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("PK = :pk AND begins_with(SK, :prefix)")
                .expression_attribute_values(":pk", AttributeValue::S(pk.to_string()))
                .expression_attribute_values(":prefix", AttributeValue::S(sk_prefix.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| StorageError::Backend(format!("DynamoDB query failed: {e}")))?;

            for attrs in page.items.unwrap_or_default() {
                items.push(Self::from_attributes(&attrs)?);
            }

            match page.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn query_index(&self, gsi1pk: &str) -> Result<Vec<StoredItem>> {
        let mut items = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let page = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(INDEX_NAME)
                .key_condition_expression("GSI1PK = :pk")
                .expression_attribute_values(":pk", AttributeValue::S(gsi1pk.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| StorageError::Backend(format!("DynamoDB index query failed: {e}")))?;

            for attrs in page.items.unwrap_or_default() {
                items.push(Self::from_attributes(&attrs)?);
            }

            match page.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("DynamoDB describe_table failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_mapping() {
        let item = StoredItem {
            pk: "TENANT#t1".to_string(),
            sk: "EVENT#e1".to_string(),
            gsi1pk: Some("GROUP#t1#g1".to_string()),
            body: "{}".to_string(),
        };

        let attrs = DynamoStore::to_attributes(item.clone());
        assert_eq!(attrs.len(), 4);
        assert_eq!(DynamoStore::from_attributes(&attrs).unwrap(), item);
    }

    #[test]
    fn test_missing_body_is_corrupt() {
        let mut attrs = HashMap::new();
        attrs.insert("PK".to_string(), AttributeValue::S("TENANT#t1".to_string()));
        attrs.insert("SK".to_string(), AttributeValue::S("EVENT#e1".to_string()));

        let err = DynamoStore::from_attributes(&attrs).unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }
}
