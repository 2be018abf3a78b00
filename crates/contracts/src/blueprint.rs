//! PipelineBlueprint - Config Loader output
//!
//! Describes a complete run: credentials, source, batching, query, and the
//! sinks every batch is fanned out to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use validator::Validate;

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete pipeline configuration blueprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineBlueprint {
    /// Config version
    #[serde(default)]
    pub version: ConfigVersion,

    /// AWS region and optional static credentials
    #[serde(default)]
    pub aws: AwsConfig,

    /// Where records come from
    pub source: SourceConfig,

    /// Batch size and worker pool
    #[serde(default)]
    pub batch: BatchConfig,

    /// Query text (inline or from a file)
    #[serde(default)]
    pub query: QueryConfig,

    /// Output routing
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// AWS settings shared by Athena and DynamoDB
#[derive(Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    #[serde(default = "default_region")]
    pub region: String,

    /// Static credentials; the default provider chain is used when absent
    #[serde(default)]
    pub access_key_id: Option<String>,

    #[serde(default)]
    pub secret_access_key: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

impl AwsConfig {
    /// Both static credential halves present
    pub fn has_static_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }
}

impl fmt::Debug for AwsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsConfig")
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Record source selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Amazon Athena query
    Athena(AthenaConfig),
    /// Newline-delimited JSON file, one record per line
    File(FileSourceConfig),
}

impl SourceConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Athena(_) => "athena",
            Self::File(_) => "file",
        }
    }
}

/// Athena source settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AthenaConfig {
    #[validate(length(min = 1, message = "database cannot be empty"))]
    pub database: String,

    /// Informational; the query text names its own tables
    #[serde(default)]
    pub table: Option<String>,

    /// S3 location for query results (s3://bucket/prefix)
    #[validate(length(min = 1, message = "s3_output_location cannot be empty"))]
    pub s3_output_location: String,

    #[serde(default = "default_work_group")]
    pub work_group: String,

    /// Seconds between query status polls
    #[serde(default = "default_poll_interval")]
    #[validate(range(min = 1, max = 60))]
    pub poll_interval_secs: u64,

    /// Give up waiting for the query after this many seconds
    #[serde(default = "default_max_wait")]
    #[validate(range(min = 1, max = 86_400))]
    pub max_wait_secs: u64,

    /// Rows requested per result page; the first page also carries the header row
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 1000))]
    pub page_size: i32,

    /// Expand string-encoded JSON arrays into real arrays
    #[serde(default = "default_true")]
    pub decode_json_arrays: bool,
}

fn default_work_group() -> String {
    "primary".to_string()
}

fn default_poll_interval() -> u64 {
    2
}

fn default_max_wait() -> u64 {
    300
}

fn default_page_size() -> i32 {
    1000
}

fn default_true() -> bool {
    true
}

/// NDJSON file source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSourceConfig {
    pub path: PathBuf,
}

/// Batching and fan-out parallelism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct BatchConfig {
    /// Records per batch
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1, max = 10_000))]
    pub batch_size: usize,

    /// Concurrent sink writes
    #[serde(default = "default_max_workers")]
    #[validate(range(min = 1, max = 64))]
    pub max_workers: usize,
}

fn default_batch_size() -> usize {
    25
}

fn default_max_workers() -> usize {
    4
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_workers: default_max_workers(),
        }
    }
}

/// Query text source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Inline SQL
    #[serde(default)]
    pub sql: Option<String>,

    /// Path to a SQL file, relative to the config file
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Appended as `LIMIT n`
    #[serde(default)]
    pub limit: Option<u64>,
}

/// Sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Unique sink name, used as the report key
    pub name: String,

    #[serde(flatten)]
    pub kind: SinkKind,
}

/// Sink type and its settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "sink_type")]
pub enum SinkKind {
    /// Log a summary of each batch
    #[serde(rename = "log")]
    Log,
    /// Append records as JSON lines
    #[serde(rename = "file")]
    File(FileSinkConfig),
    /// OpenSearch bulk upsert
    #[serde(rename = "opensearch")]
    OpenSearch(OpenSearchConfig),
    /// DynamoDB batch write
    #[serde(rename = "dynamodb")]
    DynamoDb(DynamoDbConfig),
}

impl SinkKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::File(_) => "file",
            Self::OpenSearch(_) => "opensearch",
            Self::DynamoDb(_) => "dynamodb",
        }
    }
}

/// File sink settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSinkConfig {
    pub path: PathBuf,

    /// Append to an existing file instead of truncating it
    #[serde(default = "default_true")]
    pub append: bool,
}

/// OpenSearch sink settings
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct OpenSearchConfig {
    /// Base URL, e.g. `https://search-domain.eu-north-1.es.amazonaws.com`
    #[validate(length(min = 1, message = "endpoint cannot be empty"))]
    pub endpoint: String,

    #[validate(length(min = 1, message = "index_name cannot be empty"))]
    pub index_name: String,

    /// Record field used as document `_id`
    #[serde(default = "default_id_field")]
    #[validate(length(min = 1, message = "id_field cannot be empty"))]
    pub id_field: String,

    /// Record field used as `_routing`
    #[serde(default)]
    pub routing_field: Option<String>,

    /// Create documents that do not exist yet
    #[serde(default = "default_true")]
    pub doc_as_upsert: bool,

    /// How requests are authenticated
    #[serde(default)]
    pub auth: OpenSearchAuth,

    /// Used with `auth = "basic"`; no auth header is sent without it
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// SigV4 service name: `es` for managed domains, `aoss` for serverless
    #[serde(default = "default_signing_service")]
    #[validate(length(min = 1, message = "signing_service cannot be empty"))]
    pub signing_service: String,

    #[serde(default = "default_request_timeout")]
    #[validate(range(min = 1, max = 3600))]
    pub request_timeout_secs: u64,
}

/// OpenSearch request authentication
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenSearchAuth {
    /// HTTP basic auth from `username` / `password`
    #[default]
    Basic,
    /// AWS Signature V4 with the shared AWS credentials
    Sigv4,
}

impl OpenSearchConfig {
    /// Settings with every optional field at its default
    pub fn new(endpoint: impl Into<String>, index_name: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            index_name: index_name.into(),
            id_field: default_id_field(),
            routing_field: None,
            doc_as_upsert: true,
            auth: OpenSearchAuth::default(),
            username: None,
            password: None,
            signing_service: default_signing_service(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_id_field() -> String {
    "id".to_string()
}

fn default_signing_service() -> String {
    "es".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

impl fmt::Debug for OpenSearchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenSearchConfig")
            .field("endpoint", &self.endpoint)
            .field("index_name", &self.index_name)
            .field("id_field", &self.id_field)
            .field("routing_field", &self.routing_field)
            .field("doc_as_upsert", &self.doc_as_upsert)
            .field("auth", &self.auth)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("signing_service", &self.signing_service)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// DynamoDB sink settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DynamoDbConfig {
    #[validate(length(min = 1, message = "table_name cannot be empty"))]
    pub table_name: String,

    /// Key attributes; later records in a batch replace earlier ones with the same key
    #[serde(default)]
    pub overwrite_by_pkeys: Vec<String>,
}
