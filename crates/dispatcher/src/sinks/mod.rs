//! Sink implementations
//!
//! Contains LogSink, FileSink, OpenSearchSink, and DynamoDbSink, plus the SigV4
//! request signer used by OpenSearch.

#[cfg(feature = "aws")]
mod dynamodb;
mod file;
mod log;
mod opensearch;
#[cfg(feature = "aws")]
mod sigv4;

#[cfg(feature = "aws")]
pub use self::dynamodb::DynamoDbSink;
pub use self::file::FileSink;
pub use self::log::LogSink;
pub use self::opensearch::OpenSearchSink;
#[cfg(feature = "aws")]
pub use self::sigv4::RequestSigner;
