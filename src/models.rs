//! Model identifiers understood by the relay.
//!
//! Callers speaking the OpenAI dialect usually send model names like `gpt-4`
//! that mean nothing to Bedrock. Anything not already a Bedrock Anthropic id is
//! sent to the default Sonnet model instead.

use serde::Serialize;

/// Model used when the requested one is not a Bedrock Anthropic id.
pub const DEFAULT_MODEL_ID: &str = "anthropic.claude-3-sonnet-20240229-v1:0";

/// Prefix shared by every Bedrock Anthropic model id.
pub const ANTHROPIC_PREFIX: &str = "anthropic";

/// Pick the Bedrock model id for a requested model name.
#[must_use]
pub fn resolve_model_id(requested: &str, default_model: &str) -> String {
    if requested.starts_with(ANTHROPIC_PREFIX) {
        requested.to_string()
    } else {
        default_model.to_string()
    }
}

/// Claude model ids available through Bedrock `InvokeModel` with the
/// `bedrock-2023-05-31` envelope.
#[must_use]
pub fn known_bedrock_models() -> Vec<&'static str> {
    vec![
        "anthropic.claude-3-5-sonnet-20240620-v1:0",
        "anthropic.claude-3-sonnet-20240229-v1:0",
        "anthropic.claude-3-haiku-20240307-v1:0",
        "anthropic.claude-3-opus-20240229-v1:0",
    ]
}

/// An entry of the OpenAI-style `/v1/models` listing.
#[derive(Debug, Clone, Serialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: &'static str,
    pub owned_by: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelList {
    pub object: &'static str,
    pub data: Vec<ModelEntry>,
}

/// Build the model listing, with the configured default first.
#[must_use]
pub fn model_list(default_model: &str) -> ModelList {
    let mut ids = vec![default_model.to_string()];
    for id in known_bedrock_models() {
        if id != default_model {
            ids.push(id.to_string());
        }
    }

    ModelList {
        object: "list",
        data: ids
            .into_iter()
            .map(|id| ModelEntry {
                id,
                object: "model",
                owned_by: "anthropic",
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anthropic_ids_forwarded_verbatim() {
        let id = "anthropic.claude-3-haiku-20240307-v1:0";
        assert_eq!(resolve_model_id(id, DEFAULT_MODEL_ID), id);
    }

    #[test]
    fn test_foreign_ids_resolve_to_default() {
        assert_eq!(resolve_model_id("gpt-4", DEFAULT_MODEL_ID), DEFAULT_MODEL_ID);
        assert_eq!(resolve_model_id("", DEFAULT_MODEL_ID), DEFAULT_MODEL_ID);
        // prefix match is case-sensitive
        assert_eq!(
            resolve_model_id("Anthropic.claude", DEFAULT_MODEL_ID),
            DEFAULT_MODEL_ID
        );
    }

    #[test]
    fn test_model_list_has_default_once() {
        let list = model_list(DEFAULT_MODEL_ID);
        assert_eq!(list.data[0].id, DEFAULT_MODEL_ID);
        let count = list.data.iter().filter(|m| m.id == DEFAULT_MODEL_ID).count();
        assert_eq!(count, 1);
        assert_eq!(list.data.len(), known_bedrock_models().len());
    }
}
