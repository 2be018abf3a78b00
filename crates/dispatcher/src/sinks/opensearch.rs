//! OpenSearchSink - bulk upsert into a search index
//!
//! Each record becomes one `update` action keyed by the configured id field.
//! The id field itself is left out of the document body.

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use contracts::{Batch, ContractError, DataSink, OpenSearchAuth, OpenSearchConfig, Record, SinkResult};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, instrument, warn};

#[cfg(feature = "aws")]
use super::sigv4::RequestSigner;

const NDJSON: &str = "application/x-ndjson";

/// Longest response body excerpt kept in an error message
const MAX_BODY_EXCERPT: usize = 512;

/// Bulk request payload for one batch
#[derive(Debug)]
pub(crate) struct BulkBody {
    /// NDJSON action/document pairs
    pub body: Bytes,
    /// Records included in the request
    pub sent: usize,
    /// Records rejected before sending, one message each
    pub rejected: Vec<String>,
}

/// Sink that writes batches through the `_bulk` API
pub struct OpenSearchSink {
    name: String,
    config: OpenSearchConfig,
    bulk_url: String,
    client: Option<Client>,
    #[cfg(feature = "aws")]
    signer: Option<RequestSigner>,
}

impl OpenSearchSink {
    /// Create the sink and its HTTP client; no request is made yet
    pub fn new(name: impl Into<String>, config: OpenSearchConfig) -> Result<Self, ContractError> {
        let name = name.into();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ContractError::sink_connection(&name, e.to_string()))?;

        let bulk_url = format!(
            "{}/{}/_bulk",
            config.endpoint.trim_end_matches('/'),
            config.index_name
        );
        debug!(sink = %name, url = %bulk_url, "OpenSearchSink created");

        Ok(Self {
            name,
            config,
            bulk_url,
            client: Some(client),
            #[cfg(feature = "aws")]
            signer: None,
        })
    }

    /// Sign every request with SigV4; used with `auth = "sigv4"`
    #[cfg(feature = "aws")]
    pub fn with_signer(mut self, signer: RequestSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn bulk_url(&self) -> &str {
        &self.bulk_url
    }

    async fn send_bulk(&self, client: &Client, body: Bytes) -> Result<Value, String> {
        let mut request = client.post(&self.bulk_url).header(CONTENT_TYPE, NDJSON);
        match self.config.auth {
            OpenSearchAuth::Basic => {
                if let Some(username) = &self.config.username {
                    request = request.basic_auth(username, self.config.password.as_ref());
                }
            }
            OpenSearchAuth::Sigv4 => {
                for (name, value) in self.signature_headers(&body).await? {
                    request = request.header(name, value);
                }
            }
        }
        let request = request.body(body);

        let response = request.send().await.map_err(|e| format!("bulk request: {e}"))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("bulk request returned {status}: {}", excerpt(&text)));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| format!("bulk response: {e}"))
    }
}

impl DataSink for OpenSearchSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "opensearch_sink_upsert",
        skip(self, batch),
        fields(sink = %self.name, index = %self.config.index_name, batch = batch.index())
    )]
    async fn upsert_batch(&mut self, batch: &Batch) -> SinkResult {
        if batch.is_empty() {
            return SinkResult::success(0);
        }
        let Some(client) = self.client.clone() else {
            return SinkResult::total_failure(batch.len(), format!("sink '{}' is closed", self.name));
        };

        let BulkBody {
            body,
            sent,
            mut rejected,
        } = build_bulk_body(batch, &self.config);
        if sent == 0 {
            let failed = rejected.len();
            return SinkResult::partial(batch.len(), failed, rejected);
        }

        let response = match self.send_bulk(&client, body).await {
            Ok(response) => response,
            Err(message) => {
                error!(sink = %self.name, error = %message, "Bulk request failed");
                return SinkResult::total_failure(batch.len(), message);
            }
        };

        let item_errors = parse_bulk_response(&response, sent);
        let failed = rejected.len() + item_errors.len();
        if !item_errors.is_empty() {
            warn!(sink = %self.name, failed = item_errors.len(), "Bulk items rejected");
        }
        rejected.extend(item_errors);

        let result = SinkResult::partial(batch.len(), failed, rejected);
        info!(
            sink = %self.name,
            ok = result.successful_records,
            failed = result.failed_records,
            "Bulk upsert completed"
        );
        result
    }

    #[instrument(name = "opensearch_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if self.client.take().is_some() {
            info!(sink = %self.name, "OpenSearch connection closed");
        }
        Ok(())
    }
}

/// Render a record field as a document id or routing key
fn key_value(record: &Record, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn build_bulk_body(batch: &Batch, config: &OpenSearchConfig) -> BulkBody {
    let mut buf = BytesMut::new();
    let mut sent = 0;
    let mut rejected = Vec::new();

    for (position, record) in batch.iter().enumerate() {
        let Some(id) = key_value(record, &config.id_field) else {
            rejected.push(format!(
                "record {position}: missing or empty id field '{}'",
                config.id_field
            ));
            continue;
        };

        let mut meta = Map::new();
        meta.insert("_id".to_string(), Value::String(id));
        if let Some(routing) = config
            .routing_field
            .as_deref()
            .and_then(|field| key_value(record, field))
        {
            meta.insert("_routing".to_string(), Value::String(routing));
        }

        let doc: Map<String, Value> = record
            .fields()
            .iter()
            .filter(|(name, _)| name.as_str() != config.id_field)
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        let action = json!({ "update": meta });
        let source = json!({ "doc": doc, "doc_as_upsert": config.doc_as_upsert });

        let encoded = serde_json::to_vec(&action)
            .and_then(|action| serde_json::to_vec(&source).map(|source| (action, source)));
        match encoded {
            Ok((action, source)) => {
                buf.put_slice(&action);
                buf.put_u8(b'\n');
                buf.put_slice(&source);
                buf.put_u8(b'\n');
                sent += 1;
            }
            Err(e) => rejected.push(format!("record {position}: {e}")),
        }
    }

    BulkBody {
        body: buf.freeze(),
        sent,
        rejected,
    }
}

/// Collect per-item failures from a `_bulk` response.
///
/// Items the response does not mention are reported as failed too.
pub(crate) fn parse_bulk_response(response: &Value, sent: usize) -> Vec<String> {
    let items = response
        .get("items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut errors: Vec<String> = items
        .iter()
        .filter_map(|item| {
            let (op, detail) = item.as_object()?.iter().next()?;
            let status = detail.get("status").and_then(Value::as_u64).unwrap_or(0);
            let error = detail.get("error");
            if error.is_none() && (200..300).contains(&status) {
                return None;
            }
            let id = detail.get("_id").and_then(Value::as_str).unwrap_or("?");
            let reason = error
                .map(|e| {
                    e.get("reason")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| e.to_string())
                })
                .unwrap_or_else(|| format!("status {status}"));
            Some(format!("{op} '{id}' failed ({status}): {reason}"))
        })
        .collect();

    if items.len() < sent {
        let missing = sent - items.len();
        errors.extend((0..missing).map(|_| "bulk response omitted item".to_string()));
    }
    errors
}

impl OpenSearchSink {
    #[cfg(feature = "aws")]
    async fn signature_headers(&self, body: &[u8]) -> Result<Vec<(String, String)>, String> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| format!("sink '{}' uses sigv4 auth but has no signer", self.name))?;
        signer
            .sign("POST", &self.bulk_url, &[("content-type", NDJSON)], body)
            .await
    }

    #[cfg(not(feature = "aws"))]
    async fn signature_headers(&self, _body: &[u8]) -> Result<Vec<(String, String)>, String> {
        Err(format!(
            "sink '{}' uses sigv4 auth, which needs the `aws` feature",
            self.name
        ))
    }
}

fn excerpt(text: &str) -> &str {
    match text.char_indices().nth(MAX_BODY_EXCERPT) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
