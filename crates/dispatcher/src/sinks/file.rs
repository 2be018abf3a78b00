//! FileSink - appends records to disk as JSON lines

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use contracts::{Batch, ContractError, DataSink, FileSinkConfig, SinkResult};
use tracing::{debug, error, instrument};

/// Sink that writes one JSON object per line
pub struct FileSink {
    name: String,
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    /// Create a new FileSink, creating parent directories as needed
    pub fn new(name: impl Into<String>, config: &FileSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(config.append)
            .truncate(!config.append)
            .open(&config.path)?;

        Ok(Self {
            name: name.into(),
            path: config.path.clone(),
            writer: Some(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_batch(&mut self, batch: &Batch) -> SinkResult {
        let Some(writer) = self.writer.as_mut() else {
            return SinkResult::total_failure(batch.len(), format!("sink '{}' is closed", self.name));
        };

        let mut buffer = Vec::new();
        let mut errors = Vec::new();
        for (position, record) in batch.iter().enumerate() {
            match serde_json::to_writer(&mut buffer, record) {
                Ok(()) => buffer.push(b'\n'),
                Err(e) => errors.push(format!("record {position}: {e}")),
            }
        }

        if let Err(e) = writer.write_all(&buffer).and_then(|()| writer.flush()) {
            error!(sink = %self.name, batch = batch.index(), error = %e, "Write failed");
            return SinkResult::total_failure(batch.len(), format!("write {}: {e}", self.path.display()));
        }

        let failed = errors.len();
        SinkResult::partial(batch.len(), failed, errors)
    }
}

impl DataSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_upsert",
        skip(self, batch),
        fields(sink = %self.name, batch = batch.index())
    )]
    async fn upsert_batch(&mut self, batch: &Batch) -> SinkResult {
        self.write_batch(batch)
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
            debug!(sink = %self.name, path = %self.path.display(), "FileSink closed");
        }
        Ok(())
    }
}
