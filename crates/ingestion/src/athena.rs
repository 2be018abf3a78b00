//! Amazon Athena source
//!
//! Submits the query, waits for it to finish, then pages through the result
//! set. `GetQueryResults` is called only when the batcher has consumed the
//! previous page.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use aws_sdk_athena::error::{DisplayErrorContext, SdkError};
use aws_sdk_athena::types::{QueryExecutionContext, QueryExecutionState, ResultConfiguration};
use aws_sdk_athena::Client;
use contracts::{AthenaConfig, ContractError, DataSource, RecordStream};
use tracing::{debug, info, instrument, warn};

use crate::paged::{paged_records, ResultPage};
use crate::poll::{wait_for_completion, PollConfig, QueryStatus};
use crate::tabular::TabularDecoder;

const DEFAULT_FAILURE_REASON: &str = "Unknown error";

/// Athena query source
pub struct AthenaSource {
    name: String,
    config: AthenaConfig,
    client: Option<Client>,
    /// Shared with open result streams; set by `close`
    closed: Arc<AtomicBool>,
}

impl AthenaSource {
    /// Create from a loaded AWS SDK config
    pub fn new(sdk_config: &aws_config::SdkConfig, config: AthenaConfig) -> Self {
        Self::from_client(Client::new(sdk_config), config)
    }

    pub fn from_client(client: Client, config: AthenaConfig) -> Self {
        Self {
            name: "athena".to_string(),
            config,
            client: Some(client),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &AthenaConfig {
        &self.config
    }

    fn client(&self) -> Result<Client, ContractError> {
        self.client
            .clone()
            .ok_or_else(|| ContractError::source(&self.name, "source is closed"))
    }
}

impl DataSource for AthenaSource {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "athena_fetch",
        skip(self, query),
        fields(database = %self.config.database, work_group = %self.config.work_group)
    )]
    async fn fetch(&mut self, query: &str) -> Result<RecordStream, ContractError> {
        let client = self.client()?;

        let execution_id = start_query(&client, &self.name, &self.config, query).await?;
        info!(execution_id = %execution_id, "Query submitted");

        let poll = PollConfig::from(&self.config);
        let (client_ref, id_ref, name_ref) = (&client, execution_id.as_str(), self.name.as_str());
        wait_for_completion(&poll, move || query_status(client_ref, name_ref, id_ref)).await?;
        info!(execution_id = %execution_id, "Query completed, streaming results");

        let name = self.name.clone();
        let page_size = self.config.page_size;
        let closed = Arc::clone(&self.closed);
        let fetch_page = move |token: Option<String>| {
            let client = client.clone();
            let execution_id = execution_id.clone();
            let name = name.clone();
            let closed = Arc::clone(&closed);
            async move {
                if closed.load(Ordering::SeqCst) {
                    return Err(ContractError::source(&name, "source is closed"));
                }
                result_page(&client, &name, &execution_id, page_size, token).await
            }
        };

        Ok(paged_records(
            TabularDecoder::new(self.config.decode_json_arrays),
            fetch_page,
        ))
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.closed.store(true, Ordering::SeqCst);
        if self.client.take().is_some() {
            debug!(source = %self.name, "Athena source closed");
        }
        Ok(())
    }
}

async fn result_page(
    client: &Client,
    name: &str,
    execution_id: &str,
    page_size: i32,
    token: Option<String>,
) -> Result<ResultPage, ContractError> {
    let output = client
        .get_query_results()
        .query_execution_id(execution_id)
        .max_results(page_size)
        .set_next_token(token)
        .send()
        .await
        .map_err(|e| {
            let err = map_sdk_error(name, "get_query_results", e);
            warn!(error = %err, "Result page fetch failed");
            err
        })?;

    let rows = output
        .result_set()
        .map(|rs| rs.rows())
        .unwrap_or_default()
        .iter()
        .map(|row| {
            row.data()
                .iter()
                .map(|datum| datum.var_char_value().map(str::to_string))
                .collect()
        })
        .collect();

    Ok(ResultPage {
        rows,
        next_token: output.next_token().map(str::to_string),
    })
}

async fn start_query(
    client: &Client,
    name: &str,
    config: &AthenaConfig,
    query: &str,
) -> Result<String, ContractError> {
    let output = client
        .start_query_execution()
        .query_string(query)
        .query_execution_context(
            QueryExecutionContext::builder()
                .database(&config.database)
                .build(),
        )
        .result_configuration(
            ResultConfiguration::builder()
                .output_location(&config.s3_output_location)
                .build(),
        )
        .work_group(&config.work_group)
        .send()
        .await
        .map_err(|e| map_sdk_error(name, "start_query_execution", e))?;

    output
        .query_execution_id()
        .map(str::to_string)
        .ok_or_else(|| ContractError::source(name, "start_query_execution returned no execution id"))
}

async fn query_status(client: &Client, name: &str, execution_id: &str) -> Result<QueryStatus, ContractError> {
    let output = client
        .get_query_execution()
        .query_execution_id(execution_id)
        .send()
        .await
        .map_err(|e| map_sdk_error(name, "get_query_execution", e))?;

    let status = output.query_execution().and_then(|q| q.status());
    let reason = || {
        status
            .and_then(|s| s.state_change_reason())
            .unwrap_or(DEFAULT_FAILURE_REASON)
            .to_string()
    };

    Ok(match status.and_then(|s| s.state()) {
        Some(QueryExecutionState::Succeeded) => QueryStatus::Succeeded,
        Some(QueryExecutionState::Failed) => QueryStatus::Failed { reason: reason() },
        Some(QueryExecutionState::Cancelled) => QueryStatus::Cancelled { reason: reason() },
        Some(QueryExecutionState::Running) => QueryStatus::Running,
        // QUEUED, missing state, and any state added later
        _ => QueryStatus::Queued,
    })
}

fn map_sdk_error<E, R>(name: &str, operation: &str, err: SdkError<E, R>) -> ContractError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let message = format!("{operation}: {}", DisplayErrorContext(&err));
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => ContractError::transient(message),
        _ => ContractError::source(name, message),
    }
}
