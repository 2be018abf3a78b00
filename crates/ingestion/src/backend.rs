//! SourceBackend - closed set of concrete sources
//!
//! The engine is generic over `DataSource`; the CLI picks one variant from
//! configuration and hands it over as a single concrete type.

use contracts::{ContractError, DataSource, RecordStream};

#[cfg(feature = "aws")]
use crate::athena::AthenaSource;
use crate::file::FileSource;
use crate::mock::MockDataSource;

pub enum SourceBackend {
    #[cfg(feature = "aws")]
    Athena(AthenaSource),
    File(FileSource),
    Mock(MockDataSource),
}

impl SourceBackend {
    pub fn kind(&self) -> &'static str {
        match self {
            #[cfg(feature = "aws")]
            Self::Athena(_) => "athena",
            Self::File(_) => "file",
            Self::Mock(_) => "mock",
        }
    }
}

impl DataSource for SourceBackend {
    fn name(&self) -> &str {
        match self {
            #[cfg(feature = "aws")]
            Self::Athena(source) => source.name(),
            Self::File(source) => source.name(),
            Self::Mock(source) => source.name(),
        }
    }

    async fn fetch(&mut self, query: &str) -> Result<RecordStream, ContractError> {
        match self {
            #[cfg(feature = "aws")]
            Self::Athena(source) => source.fetch(query).await,
            Self::File(source) => source.fetch(query).await,
            Self::Mock(source) => source.fetch(query).await,
        }
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        match self {
            #[cfg(feature = "aws")]
            Self::Athena(source) => source.close().await,
            Self::File(source) => source.close().await,
            Self::Mock(source) => source.close().await,
        }
    }
}

impl From<FileSource> for SourceBackend {
    fn from(source: FileSource) -> Self {
        Self::File(source)
    }
}

impl From<MockDataSource> for SourceBackend {
    fn from(source: MockDataSource) -> Self {
        Self::Mock(source)
    }
}

#[cfg(feature = "aws")]
impl From<AthenaSource> for SourceBackend {
    fn from(source: AthenaSource) -> Self {
        Self::Athena(source)
    }
}
