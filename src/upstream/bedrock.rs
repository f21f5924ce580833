use async_trait::async_trait;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use bytes::Bytes;
use chrono::Utc;

use super::sigv4::{self, Credentials, SigningRequest};
use super::ModelInvoker;
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::translate::bedrock_types::InvokeRequest;

const SERVICE: &str = "bedrock";
const JSON: &str = "application/json";

/// Resolve the AWS default credential chain: environment, shared profile
/// files and SSO, web identity, container and instance metadata.
pub async fn default_credentials_provider(
    region: Option<&str>,
) -> Option<SharedCredentialsProvider> {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(aws_config::Region::new(region.to_string()));
    }
    loader.load().await.credentials_provider()
}

/// Bedrock Runtime `InvokeModel` over a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct BedrockClient {
    client: reqwest::Client,
    region: Option<String>,
    endpoint: Option<String>,
    credentials: Option<SharedCredentialsProvider>,
}

impl BedrockClient {
    pub fn new(
        client: reqwest::Client,
        config: &RelayConfig,
        credentials: Option<SharedCredentialsProvider>,
    ) -> Self {
        Self {
            client,
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
            credentials,
        }
    }

    pub fn with_credentials(mut self, provider: impl ProvideCredentials + 'static) -> Self {
        self.credentials = Some(SharedCredentialsProvider::new(provider));
        self
    }

    /// Asked on every call; the provider caches and refreshes on its own.
    async fn credentials(&self) -> Result<Credentials> {
        let provider = self
            .credentials
            .as_ref()
            .ok_or_else(|| RelayError::credentials("no AWS credentials provider configured"))?;
        let resolved = provider
            .provide_credentials()
            .await
            .map_err(|e| RelayError::credentials(format!("could not resolve credentials: {}", e)))?;
        Ok(Credentials::from(&resolved))
    }

    fn region(&self) -> Result<&str> {
        self.region.as_deref().ok_or_else(|| {
            RelayError::config("REGION is not set; cannot reach the Bedrock runtime")
        })
    }

    /// URL of the invoke action for a model id.
    pub fn invoke_url(&self, model_id: &str) -> Result<reqwest::Url> {
        let base = match self.endpoint {
            Some(ref endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://bedrock-runtime.{}.amazonaws.com", self.region()?),
        };
        let url = format!(
            "{}/model/{}/invoke",
            base,
            sigv4::uri_encode(model_id, true)
        );
        reqwest::Url::parse(&url)
            .map_err(|e| RelayError::config(format!("Invalid Bedrock URL {}: {}", url, e)))
    }
}

#[async_trait]
impl ModelInvoker for BedrockClient {
    async fn invoke(&self, model_id: &str, request: &InvokeRequest) -> Result<Bytes> {
        let region = self.region()?;
        let url = self.invoke_url(model_id)?;
        let creds = self.credentials().await?;
        let payload = serde_json::to_vec(request)?;

        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(RelayError::config(format!("No host in {}", url))),
        };

        let signed = sigv4::sign(
            &SigningRequest {
                method: "POST",
                host: &host,
                path: url.path(),
                content_type: JSON,
                payload: &payload,
                region,
                service: SERVICE,
                time: Utc::now(),
            },
            &creds,
        )?;

        tracing::debug!(%url, bytes = payload.len(), "Invoking Bedrock model");

        let mut builder = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, JSON)
            .header(reqwest::header::ACCEPT, JSON)
            .header("x-amz-date", &signed.amz_date)
            .header(reqwest::header::AUTHORIZATION, &signed.authorization);
        if let Some(ref token) = signed.security_token {
            builder = builder.header("x-amz-security-token", token);
        }

        let response = builder.body(payload).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(RelayError::Service {
                status: status.as_u16(),
                body: String::from_utf8_lossy(truncate(&body, 500)).into_owned(),
            });
        }

        Ok(body)
    }
}

fn truncate(bytes: &[u8], max: usize) -> &[u8] {
    if bytes.len() <= max {
        bytes
    } else {
        &bytes[..max]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(region: Option<&str>, endpoint: Option<&str>) -> RelayConfig {
        RelayConfig {
            region: region.map(str::to_string),
            endpoint: endpoint.map(str::to_string),
            ..RelayConfig::default()
        }
    }

    fn regional_client() -> BedrockClient {
        BedrockClient::new(reqwest::Client::new(), &config(Some("us-east-1"), None), None)
    }

    #[test]
    fn test_invoke_url_encodes_model_id() {
        let client = regional_client();
        let url = client
            .invoke_url("anthropic.claude-3-sonnet-20240229-v1:0")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://bedrock-runtime.us-east-1.amazonaws.com/model/anthropic.claude-3-sonnet-20240229-v1%3A0/invoke"
        );
    }

    #[test]
    fn test_endpoint_override() {
        let client = BedrockClient::new(
            reqwest::Client::new(),
            &config(Some("us-east-1"), Some("http://127.0.0.1:9999/")),
            None,
        );
        let url = client.invoke_url("m").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9999/model/m/invoke");
    }

    #[test]
    fn test_missing_region_is_config_error() {
        let client = BedrockClient::new(reqwest::Client::new(), &config(None, None), None);
        let err = client.invoke_url("m").unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[tokio::test]
    async fn test_missing_provider_is_credentials_error() {
        let client = regional_client();
        let err = client.credentials().await.unwrap_err();
        assert_eq!(err.kind(), "credentials");
    }

    #[tokio::test]
    async fn test_static_provider_is_used() {
        let client = regional_client().with_credentials(aws_credential_types::Credentials::new(
            "AKIDSTATIC",
            "secret",
            Some("token".to_string()),
            None,
            "static",
        ));
        let creds = client.credentials().await.unwrap();
        assert_eq!(creds.access_key_id, "AKIDSTATIC");
        assert_eq!(creds.session_token.as_deref(), Some("token"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate(b"abc", 5), b"abc");
        assert_eq!(truncate(b"abcdef", 3), b"abc");
    }
}
