//! Normalize inbound requests into the Bedrock invocation envelope.
//!
//! Both routes reduce to a [`NormalizedRequest`]; [`build_invocation`] then
//! fills in defaults and picks the model id. All functions here are pure.

use super::anthropic_types::{raw_role, MessagesRequest};
use super::bedrock_types::{
    ImageSource, InvokeRequest, Role, SystemPrompt, UpstreamContent, UpstreamMessage,
    UpstreamMessages, UpstreamPart, UpstreamTypedPart, ANTHROPIC_VERSION,
};
use super::openai_types::{
    ChatCompletionRequest, ChatContent, ChatMessage, ChatRole, ContentPart, TypedPart,
};
use crate::config::SamplingDefaults;
use crate::error::{RelayError, Result};
use crate::models::resolve_model_id;

/// A request from either route, before defaults are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRequest {
    pub model: String,
    pub system: Option<SystemPrompt>,
    pub max_tokens: Option<u64>,
    pub top_p: Option<f64>,
    pub top_k: Option<u64>,
    pub temperature: Option<f64>,
    pub messages: UpstreamMessages,
}

/// Everything needed for one `InvokeModel` call.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub model_id: String,
    pub body: InvokeRequest,
}

/// Translate an OpenAI-shaped request. System messages leave the sequence and
/// image parts are rewritten into Bedrock image blocks.
pub fn normalize_chat_request(req: &ChatCompletionRequest) -> Result<NormalizedRequest> {
    let model = require_model(req.model.as_deref())?;
    let messages = require_messages(req.messages.as_deref())?;

    // A leading system message overrides the top-level field
    let system = match messages.first() {
        Some(ChatMessage {
            role: ChatRole::System,
            content,
        }) => Some(system_from_content(content)),
        _ => req.system.clone(),
    };

    let translated = openai_to_bedrock_messages(messages);
    if translated.is_empty() {
        return Err(RelayError::invalid_request(
            "no user or assistant messages after removing system messages",
        ));
    }

    Ok(NormalizedRequest {
        model: model.to_string(),
        system,
        max_tokens: req.max_tokens,
        top_p: req.top_p,
        top_k: req.top_k,
        temperature: req.temperature,
        messages: UpstreamMessages::Translated(translated),
    })
}

/// Accept an Anthropic-shaped request. Messages are forwarded exactly as sent;
/// only the system prompt is resolved.
pub fn normalize_messages_request(req: &MessagesRequest) -> Result<NormalizedRequest> {
    let model = require_model(req.model.as_deref())?;
    let messages = require_messages(req.messages.as_deref())?;

    let system = match messages.first() {
        Some(first) if raw_role(first) == Some("system") => {
            let content = first.get("content").cloned().unwrap_or_default();
            Some(serde_json::from_value(content).map_err(|e| {
                RelayError::invalid_request(format!("unsupported system message content: {}", e))
            })?)
        }
        _ => req.system.clone(),
    };

    Ok(NormalizedRequest {
        model: model.to_string(),
        system,
        max_tokens: req.max_tokens,
        top_p: req.top_p,
        top_k: req.top_k,
        temperature: req.temperature,
        messages: UpstreamMessages::Passthrough(messages.to_vec()),
    })
}

/// Apply sampling defaults and resolve the Bedrock model id.
pub fn build_invocation(
    req: NormalizedRequest,
    defaults: &SamplingDefaults,
    default_model: &str,
) -> Invocation {
    let model_id = resolve_model_id(&req.model, default_model);

    let body = InvokeRequest {
        anthropic_version: ANTHROPIC_VERSION.to_string(),
        max_tokens: req.max_tokens.unwrap_or(defaults.max_tokens),
        temperature: req.temperature.unwrap_or(defaults.temperature),
        top_k: req.top_k.unwrap_or(defaults.top_k),
        top_p: req.top_p.unwrap_or(defaults.top_p),
        system: req.system,
        messages: req.messages,
    };

    Invocation { model_id, body }
}

/// Drop every system message and translate the rest, preserving order.
pub fn openai_to_bedrock_messages(messages: &[ChatMessage]) -> Vec<UpstreamMessage> {
    messages
        .iter()
        .filter_map(|msg| {
            let role = match msg.role {
                ChatRole::System => return None,
                ChatRole::User => Role::User,
                ChatRole::Assistant => Role::Assistant,
            };
            Some(UpstreamMessage {
                role,
                content: translate_content(&msg.content),
            })
        })
        .collect()
}

fn translate_content(content: &ChatContent) -> UpstreamContent {
    match content {
        ChatContent::Text(text) => UpstreamContent::Text(text.clone()),
        ChatContent::Parts(parts) => {
            UpstreamContent::Parts(parts.iter().map(translate_part).collect())
        }
    }
}

fn translate_part(part: &ContentPart) -> UpstreamPart {
    match part {
        ContentPart::Typed(TypedPart::Text { text }) => {
            UpstreamPart::Typed(UpstreamTypedPart::Text { text: text.clone() })
        }
        ContentPart::Typed(TypedPart::ImageUrl { image_url }) => {
            UpstreamPart::Typed(UpstreamTypedPart::Image {
                source: ImageSource::base64_jpeg(extract_image_data(&image_url.url)),
            })
        }
        ContentPart::Opaque(value) => UpstreamPart::Opaque(value.clone()),
    }
}

/// Pull the base64 payload out of an image url.
///
/// Callers wrap the payload in braces (`data:image/jpeg;base64,{...}`). Plain
/// data URIs are accepted too. Anything else yields an empty payload.
pub fn extract_image_data(url: &str) -> String {
    if let Some(open) = url.find('{') {
        let rest = &url[open + 1..];
        if let Some(close) = rest.find('}') {
            return rest[..close].to_string();
        }
    }

    if let Some((_, data)) = url.split_once(";base64,") {
        return data.to_string();
    }

    tracing::warn!(
        url_len = url.len(),
        "Image url carries no recognizable base64 payload"
    );
    String::new()
}

fn system_from_content(content: &ChatContent) -> SystemPrompt {
    match content {
        ChatContent::Text(text) => SystemPrompt::Text(text.clone()),
        ChatContent::Parts(parts) => SystemPrompt::Blocks(
            parts
                .iter()
                .filter_map(|p| serde_json::to_value(p).ok())
                .collect(),
        ),
    }
}

fn require_model(model: Option<&str>) -> Result<&str> {
    match model {
        Some(m) if !m.is_empty() => Ok(m),
        _ => Err(RelayError::invalid_request("missing model")),
    }
}

fn require_messages<T>(messages: Option<&[T]>) -> Result<&[T]> {
    match messages {
        Some(m) if !m.is_empty() => Ok(m),
        _ => Err(RelayError::invalid_request("missing or empty messages")),
    }
}
