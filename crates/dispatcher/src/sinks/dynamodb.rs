//! DynamoDbSink - batch writes into a DynamoDB table

use std::collections::HashMap;

use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{AttributeValue, PutRequest, WriteRequest};
use aws_sdk_dynamodb::Client;
use contracts::{Batch, ContractError, DataSink, DynamoDbConfig, Record, SinkResult};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

/// `BatchWriteItem` request limit
const MAX_ITEMS_PER_REQUEST: usize = 25;

type Item = HashMap<String, AttributeValue>;

/// Items ready to send, after key checks and de-duplication
#[derive(Debug, Default)]
pub(crate) struct PreparedItems {
    pub items: Vec<Item>,
    /// Earlier duplicates replaced by a later record with the same key
    pub superseded: usize,
    /// Records that cannot be written, one message each
    pub rejected: Vec<String>,
}

/// Sink that writes batches with `BatchWriteItem`
pub struct DynamoDbSink {
    name: String,
    config: DynamoDbConfig,
    client: Option<Client>,
}

impl DynamoDbSink {
    pub fn new(name: impl Into<String>, sdk_config: &aws_config::SdkConfig, config: DynamoDbConfig) -> Self {
        Self::from_client(name, Client::new(sdk_config), config)
    }

    pub fn from_client(name: impl Into<String>, client: Client, config: DynamoDbConfig) -> Self {
        Self {
            name: name.into(),
            config,
            client: Some(client),
        }
    }

    /// Send one chunk; returns the number of items that were not written
    async fn write_chunk(&self, client: &Client, chunk: Vec<Item>, errors: &mut Vec<String>) -> usize {
        let size = chunk.len();
        let mut requests = Vec::with_capacity(size);
        for item in chunk {
            match PutRequest::builder().set_item(Some(item)).build() {
                Ok(put) => requests.push(WriteRequest::builder().put_request(put).build()),
                Err(e) => errors.push(format!("build put request: {e}")),
            }
        }
        let mut failed = size - requests.len();
        if requests.is_empty() {
            return failed;
        }

        let sent = requests.len();
        match client
            .batch_write_item()
            .request_items(&self.config.table_name, requests)
            .send()
            .await
        {
            Ok(output) => {
                let unprocessed = output
                    .unprocessed_items()
                    .and_then(|items| items.get(&self.config.table_name))
                    .map(Vec::len)
                    .unwrap_or(0);
                if unprocessed > 0 {
                    warn!(sink = %self.name, unprocessed, "Items left unprocessed");
                    errors.push(format!("{unprocessed} items left unprocessed by BatchWriteItem"));
                }
                failed += unprocessed.min(sent);
            }
            Err(e) => {
                let message = format!("BatchWriteItem: {}", DisplayErrorContext(&e));
                error!(sink = %self.name, error = %message, "Chunk write failed");
                errors.push(message);
                failed += sent;
            }
        }
        failed
    }
}

impl DataSink for DynamoDbSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "dynamodb_sink_upsert",
        skip(self, batch),
        fields(sink = %self.name, table = %self.config.table_name, batch = batch.index())
    )]
    async fn upsert_batch(&mut self, batch: &Batch) -> SinkResult {
        if batch.is_empty() {
            return SinkResult::success(0);
        }
        let Some(client) = self.client.clone() else {
            return SinkResult::total_failure(batch.len(), format!("sink '{}' is closed", self.name));
        };

        let PreparedItems {
            items,
            superseded,
            mut rejected,
        } = prepare_items(batch, &self.config.overwrite_by_pkeys);
        debug!(
            sink = %self.name,
            items = items.len(),
            superseded,
            rejected = rejected.len(),
            "Batch prepared"
        );

        let mut failed = rejected.len();
        let mut items = items.into_iter().peekable();
        while items.peek().is_some() {
            let chunk: Vec<Item> = items.by_ref().take(MAX_ITEMS_PER_REQUEST).collect();
            failed += self.write_chunk(&client, chunk, &mut rejected).await;
        }

        let result = SinkResult::partial(batch.len(), failed, rejected);
        info!(
            sink = %self.name,
            ok = result.successful_records,
            failed = result.failed_records,
            "DynamoDB batch write completed"
        );
        result
    }

    #[instrument(name = "dynamodb_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if self.client.take().is_some() {
            info!(sink = %self.name, "DynamoDB client released");
        }
        Ok(())
    }
}

/// Convert a JSON value into a DynamoDB attribute
pub(crate) fn to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), to_attribute(v)))
                .collect(),
        ),
    }
}

fn to_item(record: &Record) -> Item {
    record
        .fields()
        .iter()
        .map(|(k, v)| (k.clone(), to_attribute(v)))
        .collect()
}

/// Convert records to items, keeping only the last record per key.
///
/// With no key attributes configured every record is sent as-is.
pub(crate) fn prepare_items(batch: &Batch, pkeys: &[String]) -> PreparedItems {
    let mut prepared = PreparedItems::default();
    let mut slots: HashMap<Vec<String>, usize> = HashMap::new();

    for (position, record) in batch.iter().enumerate() {
        if pkeys.is_empty() {
            prepared.items.push(to_item(record));
            continue;
        }

        let key: Option<Vec<String>> = pkeys
            .iter()
            .map(|k| record.get(k).filter(|v| !v.is_null()).map(Value::to_string))
            .collect();
        let Some(key) = key else {
            prepared.rejected.push(format!(
                "record {position}: missing key attribute(s) {pkeys:?}"
            ));
            continue;
        };

        match slots.get(&key) {
            Some(&slot) => {
                prepared.items[slot] = to_item(record);
                prepared.superseded += 1;
            }
            None => {
                slots.insert(key, prepared.items.len());
                prepared.items.push(to_item(record));
            }
        }
    }

    prepared
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_attribute() {
        let value = json!({"n": 1.5, "tags": ["a"], "flag": true, "none": null});
        let AttributeValue::M(map) = to_attribute(&value) else {
            panic!("expected map");
        };
        assert_eq!(map["n"], AttributeValue::N("1.5".into()));
        assert_eq!(map["tags"], AttributeValue::L(vec![AttributeValue::S("a".into())]));
        assert_eq!(map["flag"], AttributeValue::Bool(true));
        assert_eq!(map["none"], AttributeValue::Null(true));
    }

    #[test]
    fn test_last_write_wins_per_key() {
        let batch = Batch::new(
            0,
            vec![
                Record::from_pairs([("orgno", json!("1")), ("v", json!("old"))]),
                Record::from_pairs([("orgno", json!("2")), ("v", json!("other"))]),
                Record::from_pairs([("orgno", json!("1")), ("v", json!("new"))]),
                Record::from_pairs([("v", json!("keyless"))]),
            ],
        );

        let prepared = prepare_items(&batch, &["orgno".to_string()]);
        assert_eq!(prepared.items.len(), 2);
        assert_eq!(prepared.superseded, 1);
        assert_eq!(prepared.rejected.len(), 1);
        assert_eq!(prepared.items[0]["v"], AttributeValue::S("new".into()));
    }

    #[test]
    fn test_no_keys_sends_everything() {
        let batch = Batch::new(0, vec![Record::from_pairs([("a", 1)]); 3]);
        let prepared = prepare_items(&batch, &[]);
        assert_eq!(prepared.items.len(), 3);
        assert_eq!(prepared.superseded, 0);
    }
}
