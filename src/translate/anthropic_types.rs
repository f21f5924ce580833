use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::bedrock_types::SystemPrompt;

// ---------------------------------------------------------------------------
// Request types (what callers send TO us on /v1/messages)
// ---------------------------------------------------------------------------

/// Anthropic-shaped request. Messages are already in the shape Bedrock
/// expects, so they are kept as raw JSON and forwarded untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagesRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemPrompt>,
    #[serde(
        default,
        deserialize_with = "crate::translate::deserialize_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(
        default,
        deserialize_with = "crate::translate::deserialize_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub top_k: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Role of a raw message, if it has a string `role` field.
pub fn raw_role(message: &serde_json::Value) -> Option<&str> {
    message.get("role").and_then(serde_json::Value::as_str)
}
