//! NDJSON file source
//!
//! Reads one JSON object per line. Lines are read lazily as the batcher
//! pulls, so large exports never sit in memory.

use std::path::{Path, PathBuf};

use contracts::{ContractError, DataSource, Record, RecordStream};
use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

/// Newline-delimited JSON source
#[derive(Debug)]
pub struct FileSource {
    name: String,
    path: PathBuf,
    open: bool,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            name: "file".to_string(),
            path: path.into(),
            open: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    /// The query text is not interpreted; the whole file is the result set.
    async fn fetch(&mut self, query: &str) -> Result<RecordStream, ContractError> {
        if !self.open {
            return Err(ContractError::source(&self.name, "source is closed"));
        }

        let file = File::open(&self.path).await.map_err(|e| {
            ContractError::source(&self.name, format!("open {}: {e}", self.path.display()))
        })?;
        info!(
            source = %self.name,
            path = %self.path.display(),
            query_len = query.len(),
            "Reading records from file"
        );

        let lines = BufReader::new(file).lines();
        let records = stream::unfold(Some((lines, 0u64)), |state| async move {
            let (mut lines, mut line_no) = state?;
            loop {
                line_no += 1;
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => {
                        return match serde_json::from_str::<Map<String, Value>>(&line) {
                            Ok(fields) => Some((Ok(Record::new(fields)), Some((lines, line_no)))),
                            Err(e) => Some((
                                Err(ContractError::MalformedRecord {
                                    position: line_no,
                                    message: e.to_string(),
                                }),
                                None,
                            )),
                        };
                    }
                    Ok(None) => return None,
                    Err(e) => return Some((Err(ContractError::Io(e)), None)),
                }
            }
        });

        Ok(records.boxed())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        if self.open {
            debug!(source = %self.name, "File source closed");
            self.open = false;
        }
        Ok(())
    }
}
