//! Builds the source, the sinks, and the engine from a blueprint.

use contracts::{OpenSearchAuth, PipelineBlueprint, SinkKind, SourceConfig};
use dispatcher::DispatcherBuilder;
use etl_engine::{Pipeline, PipelineError};
use ingestion::{FileSource, SourceBackend};
use tracing::info;

/// Whether any component needs AWS credentials
pub fn needs_aws(blueprint: &PipelineBlueprint) -> bool {
    matches!(blueprint.source, SourceConfig::Athena(_))
        || blueprint
            .sinks
            .iter()
            .any(|s| match &s.kind {
                SinkKind::DynamoDb(_) => true,
                SinkKind::OpenSearch(search) => search.auth == OpenSearchAuth::Sigv4,
                _ => false,
            })
}

/// Assemble a ready-to-run pipeline.
///
/// The AWS SDK config is loaded once and shared by the Athena source and
/// every DynamoDB or SigV4-signed OpenSearch sink.
pub async fn build_pipeline(
    blueprint: &PipelineBlueprint,
) -> Result<Pipeline<SourceBackend>, PipelineError> {
    if blueprint.sinks.is_empty() {
        return Err(PipelineError::Configuration(
            "no sinks configured".to_string(),
        ));
    }

    #[cfg(feature = "aws")]
    let sdk_config = if needs_aws(blueprint) {
        Some(load_aws_config(&blueprint.aws).await)
    } else {
        None
    };

    #[cfg(feature = "aws")]
    let source = build_source(&blueprint.source, sdk_config.as_ref())?;
    #[cfg(not(feature = "aws"))]
    let source = build_source(&blueprint.source)?;

    let builder = DispatcherBuilder::new(blueprint.sinks.clone(), blueprint.batch.max_workers);
    #[cfg(feature = "aws")]
    let builder = match sdk_config {
        Some(config) => builder.with_aws_config(config),
        None => builder,
    };
    let dispatcher = builder.build().await?;

    info!(
        source = source.kind(),
        sinks = dispatcher.sink_count(),
        max_workers = dispatcher.max_workers(),
        "Pipeline assembled"
    );

    Pipeline::new(source, dispatcher, blueprint.batch)
}

#[cfg(feature = "aws")]
fn build_source(
    config: &SourceConfig,
    sdk_config: Option<&aws_config::SdkConfig>,
) -> Result<SourceBackend, PipelineError> {
    match config {
        SourceConfig::Athena(athena) => {
            let sdk_config = sdk_config.ok_or_else(|| {
                PipelineError::Configuration("athena source requires AWS configuration".to_string())
            })?;
            Ok(ingestion::AthenaSource::new(sdk_config, athena.clone()).into())
        }
        SourceConfig::File(file) => Ok(FileSource::new(&file.path).into()),
    }
}

#[cfg(not(feature = "aws"))]
fn build_source(config: &SourceConfig) -> Result<SourceBackend, PipelineError> {
    match config {
        SourceConfig::Athena(_) => Err(PipelineError::Configuration(
            "athena source requires the `aws` feature".to_string(),
        )),
        SourceConfig::File(file) => Ok(FileSource::new(&file.path).into()),
    }
}

/// Region plus static keys when configured, otherwise the default provider chain
#[cfg(feature = "aws")]
async fn load_aws_config(aws: &contracts::AwsConfig) -> aws_config::SdkConfig {
    use aws_config::{BehaviorVersion, Region};
    use aws_sdk_athena::config::Credentials;

    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(aws.region.clone()));

    if let (Some(key_id), Some(secret)) = (&aws.access_key_id, &aws.secret_access_key) {
        loader = loader.credentials_provider(Credentials::new(
            key_id.clone(),
            secret.clone(),
            None,
            None,
            "athena-etl-config",
        ));
    }

    info!(
        region = %aws.region,
        static_credentials = aws.has_static_credentials(),
        "Loading AWS configuration"
    );
    loader.load().await
}
