//! The upstream model-invocation service.
//!
//! [`ModelInvoker`] is the seam between the relay pipeline and Bedrock; tests
//! swap in a stub, production uses [`bedrock::BedrockClient`].

pub mod bedrock;
pub mod sigv4;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::translate::bedrock_types::InvokeRequest;

pub use bedrock::BedrockClient;

#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Send one invocation and return the raw response body.
    async fn invoke(&self, model_id: &str, request: &InvokeRequest) -> Result<Bytes>;
}
