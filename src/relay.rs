use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::translate::anthropic_types::MessagesRequest;
use crate::translate::bedrock_types::InvokeResponse;
use crate::translate::openai_types::{ChatCompletionRequest, ChatCompletionResponse};
use crate::translate::request::{
    build_invocation, normalize_chat_request, normalize_messages_request, Invocation,
};
use crate::translate::response::bedrock_to_openai;
use crate::upstream::ModelInvoker;

use axum::response::{IntoResponse, Response};
use axum::Json;

/// Which dialect the caller speaks, decided once from the route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestShape {
    /// `/v1/chat/completions`: translated in both directions.
    OpenAi,
    /// `/v1/messages`: forwarded as-is in both directions.
    Anthropic,
}

impl RequestShape {
    pub fn route(self) -> &'static str {
        match self {
            Self::OpenAi => "/v1/chat/completions",
            Self::Anthropic => "/v1/messages",
        }
    }
}

/// Outcome of a successful relay.
#[derive(Debug, Clone)]
pub enum RelayResponse {
    Chat(ChatCompletionResponse),
    /// Upstream body, untouched.
    Raw(serde_json::Value),
}

impl IntoResponse for RelayResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Chat(resp) => Json(resp).into_response(),
            Self::Raw(value) => Json(value).into_response(),
        }
    }
}

/// Parse and normalize an inbound body into an invocation.
pub fn prepare(shape: RequestShape, body: &[u8], config: &RelayConfig) -> Result<Invocation> {
    let normalized = match shape {
        RequestShape::OpenAi => {
            let req: ChatCompletionRequest = parse_body(body)?;
            normalize_chat_request(&req)?
        }
        RequestShape::Anthropic => {
            let req: MessagesRequest = parse_body(body)?;
            normalize_messages_request(&req)?
        }
    };

    Ok(build_invocation(
        normalized,
        &config.defaults,
        &config.default_model,
    ))
}

/// Invoke the model once and reshape the reply for the caller's dialect.
pub async fn execute(
    shape: RequestShape,
    invocation: &Invocation,
    invoker: &dyn ModelInvoker,
) -> Result<RelayResponse> {
    let raw = invoker
        .invoke(&invocation.model_id, &invocation.body)
        .await?;

    let value: serde_json::Value = serde_json::from_slice(&raw)
        .map_err(|e| RelayError::decode(format!("upstream body is not JSON: {}", e)))?;

    match shape {
        RequestShape::Anthropic => Ok(RelayResponse::Raw(value)),
        RequestShape::OpenAi => {
            let resp: InvokeResponse = serde_json::from_value(value)
                .map_err(|e| RelayError::decode(format!("unexpected upstream shape: {}", e)))?;
            let created = chrono::Utc::now().timestamp();
            Ok(RelayResponse::Chat(bedrock_to_openai(&resp, created)?))
        }
    }
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body)
        .map_err(|e| RelayError::invalid_request(format!("malformed request body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_MODEL_ID;
    use crate::translate::bedrock_types::{InvokeRequest, SystemPrompt, UpstreamMessages};
    use async_trait::async_trait;
    use bytes::Bytes;

    const SIMPLE_MESSAGES: &[u8] = br#"{"model":"m","messages":[{"role":"user","content":"hi"}]}"#;

    struct FixedInvoker(&'static str);

    #[async_trait]
    impl ModelInvoker for FixedInvoker {
        async fn invoke(
            &self,
            _model_id: &str,
            _request: &InvokeRequest,
        ) -> Result<Bytes> {
            Ok(Bytes::from_static(self.0.as_bytes()))
        }
    }

    #[test]
    fn test_prepare_openai_body() {
        let body = br#"{"model":"gpt-4","messages":[{"role":"system","content":"sys"},{"role":"user","content":"hi"}],"max_tokens":64}"#;
        let invocation = prepare(RequestShape::OpenAi, body, &RelayConfig::default()).unwrap();

        assert_eq!(invocation.model_id, DEFAULT_MODEL_ID);
        assert_eq!(invocation.body.max_tokens, 64);
        assert_eq!(
            invocation.body.system,
            Some(SystemPrompt::Text("sys".to_string()))
        );
        assert!(matches!(
            invocation.body.messages,
            UpstreamMessages::Translated(ref m) if m.len() == 1
        ));
    }

    #[test]
    fn test_prepare_rejects_garbage() {
        let err =
            prepare(RequestShape::OpenAi, b"not json", &RelayConfig::default()).unwrap_err();
        assert!(matches!(err, RelayError::InvalidRequest { .. }));

        let err = prepare(RequestShape::Anthropic, b"{}", &RelayConfig::default()).unwrap_err();
        assert!(matches!(err, RelayError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn test_execute_non_json_is_decode_error() {
        let invocation = prepare(RequestShape::Anthropic, SIMPLE_MESSAGES, &RelayConfig::default())
            .unwrap();
        let err = execute(RequestShape::Anthropic, &invocation, &FixedInvoker("<html>"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    #[tokio::test]
    async fn test_execute_anthropic_returns_raw() {
        let invocation = prepare(RequestShape::Anthropic, SIMPLE_MESSAGES, &RelayConfig::default())
            .unwrap();
        let invoker = FixedInvoker(r#"{"anything":[1,2]}"#);
        let result = execute(RequestShape::Anthropic, &invocation, &invoker)
            .await
            .unwrap();
        match result {
            RelayResponse::Raw(value) => {
                assert_eq!(value, serde_json::json!({"anything": [1, 2]}))
            }
            RelayResponse::Chat(_) => panic!("expected raw passthrough"),
        }
    }
}
