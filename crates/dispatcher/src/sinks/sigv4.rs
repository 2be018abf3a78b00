//! AWS Signature V4 signing for OpenSearch requests

use std::fmt;
use std::time::SystemTime;

use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sigv4::http_request::{sign, SignableBody, SignableRequest, SigningSettings};
use aws_sigv4::sign::v4;

/// Request signer; credentials are resolved on every call
#[derive(Clone)]
pub struct RequestSigner {
    credentials: SharedCredentialsProvider,
    region: String,
    service: String,
}

impl RequestSigner {
    pub fn new(
        credentials: SharedCredentialsProvider,
        region: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            region: region.into(),
            service: service.into(),
        }
    }

    /// Use the credentials provider and region of a loaded SDK config
    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig, service: &str) -> Result<Self, String> {
        let credentials = sdk_config
            .credentials_provider()
            .ok_or_else(|| "AWS config has no credentials provider".to_string())?;
        let region = sdk_config
            .region()
            .ok_or_else(|| "AWS config has no region".to_string())?;
        Ok(Self::new(credentials, region.as_ref(), service))
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Headers to add to the request: `authorization`, `x-amz-date` and,
    /// for temporary credentials, `x-amz-security-token`.
    ///
    /// `headers` must contain every header that is sent with the request and
    /// should be covered by the signature.
    pub async fn sign(
        &self,
        method: &str,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<Vec<(String, String)>, String> {
        let credentials = self
            .credentials
            .provide_credentials()
            .await
            .map_err(|e| format!("load AWS credentials: {e}"))?;
        let identity = credentials.into();

        let params = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(&self.service)
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()
            .map_err(|e| format!("sigv4 parameters: {e}"))?
            .into();

        let request = SignableRequest::new(
            method,
            url,
            headers.iter().copied(),
            SignableBody::Bytes(body),
        )
        .map_err(|e| format!("sigv4 request: {e}"))?;

        let (instructions, _signature) = sign(request, &params)
            .map_err(|e| format!("sigv4 signing: {e}"))?
            .into_parts();

        Ok(instructions
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect())
    }
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSigner")
            .field("region", &self.region)
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}
