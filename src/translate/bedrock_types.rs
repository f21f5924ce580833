//! Bedrock `InvokeModel` body and response for Anthropic models.
//!
//! The request is the Anthropic Messages schema wrapped with an
//! `anthropic_version` tag; the response is a plain Anthropic message.

use serde::{Deserialize, Serialize};

/// Envelope version tag Bedrock requires for Anthropic models.
pub const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// Media type stamped on every translated image.
pub const IMAGE_MEDIA_TYPE: &str = "image/jpeg";

// ---------------------------------------------------------------------------
// Request types (what we send TO Bedrock)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub anthropic_version: String,
    pub max_tokens: u64,
    pub temperature: f64,
    pub top_k: u64,
    pub top_p: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemPrompt>,
    pub messages: UpstreamMessages,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SystemPrompt {
    Text(String),
    Blocks(Vec<serde_json::Value>),
}

/// Translated messages from the OpenAI route, or the caller's own messages
/// from the Anthropic route.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum UpstreamMessages {
    Translated(Vec<UpstreamMessage>),
    Passthrough(Vec<serde_json::Value>),
}

impl UpstreamMessages {
    pub fn len(&self) -> usize {
        match self {
            Self::Translated(m) => m.len(),
            Self::Passthrough(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpstreamMessage {
    pub role: Role,
    pub content: UpstreamContent,
}

/// System prompts travel out-of-band, so only two roles reach Bedrock.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum UpstreamContent {
    Text(String),
    Parts(Vec<UpstreamPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum UpstreamPart {
    Typed(UpstreamTypedPart),
    Opaque(serde_json::Value),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum UpstreamTypedPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image")]
    Image { source: ImageSource },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub source_type: String, // "base64"
    pub media_type: String,
    pub data: String,
}

impl ImageSource {
    pub fn base64_jpeg(data: impl Into<String>) -> Self {
        Self {
            source_type: "base64".to_string(),
            media_type: IMAGE_MEDIA_TYPE.to_string(),
            data: data.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Response types (what Bedrock sends back)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub id: String,
    pub model: String,
    pub role: String,
    pub content: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl InvokeResponse {
    /// Text of the first content block, when that block is a text block.
    pub fn first_text(&self) -> Option<&str> {
        let first = self.content.first()?;
        if first.get("type").and_then(serde_json::Value::as_str) != Some("text") {
            return None;
        }
        first.get("text").and_then(serde_json::Value::as_str)
    }
}
