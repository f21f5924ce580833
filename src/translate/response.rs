use super::bedrock_types::InvokeResponse;
use super::openai_types::{ChatCompletionResponse, ChatUsage, Choice, ChoiceMessage};
use crate::error::{RelayError, Result};

/// Translate a Bedrock Anthropic response into an OpenAI `chat.completion`.
/// Pure function: `created` is supplied by the caller.
pub fn bedrock_to_openai(resp: &InvokeResponse, created: i64) -> Result<ChatCompletionResponse> {
    let content = resp
        .first_text()
        .ok_or_else(|| RelayError::decode("upstream response has no leading text block"))?;

    let usage = ChatUsage {
        prompt_tokens: resp.usage.input_tokens,
        completion_tokens: resp.usage.output_tokens,
        total_tokens: resp.usage.input_tokens + resp.usage.output_tokens,
    };

    Ok(ChatCompletionResponse {
        id: resp.id.clone(),
        object: "chat.completion".to_string(),
        created,
        model: resp.model.clone(),
        choices: vec![Choice {
            index: 0,
            finish_reason: "stop".to_string(),
            message: ChoiceMessage {
                role: resp.role.clone(),
                content: content.to_string(),
            },
            logprobs: None,
        }],
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::bedrock_types::Usage;

    fn make_response(content: Vec<serde_json::Value>) -> InvokeResponse {
        InvokeResponse {
            id: "x".to_string(),
            model: "m".to_string(),
            role: "assistant".to_string(),
            content,
            stop_reason: Some("end_turn".to_string()),
            usage: Usage {
                input_tokens: 3,
                output_tokens: 2,
            },
        }
    }

    #[test]
    fn test_simple_text_response() {
        let resp = make_response(vec![serde_json::json!({"type": "text", "text": "hello"})]);
        let result = bedrock_to_openai(&resp, 1_700_000_000).unwrap();

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            serde_json::json!({
                "id": "x",
                "object": "chat.completion",
                "created": 1_700_000_000,
                "model": "m",
                "choices": [{
                    "index": 0,
                    "finish_reason": "stop",
                    "message": {"role": "assistant", "content": "hello"},
                    "logprobs": null
                }],
                "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
            })
        );
    }

    #[test]
    fn test_only_first_block_used() {
        let resp = make_response(vec![
            serde_json::json!({"type": "text", "text": "first"}),
            serde_json::json!({"type": "text", "text": "second"}),
        ]);
        let result = bedrock_to_openai(&resp, 0).unwrap();
        assert_eq!(result.choices[0].message.content, "first");
    }

    #[test]
    fn test_missing_text_is_decode_error() {
        let resp = make_response(Vec::new());
        let err = bedrock_to_openai(&resp, 0).unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    #[test]
    fn test_usage_totals() {
        let mut resp = make_response(vec![serde_json::json!({"type": "text", "text": "t"})]);
        resp.usage = Usage {
            input_tokens: 1200,
            output_tokens: 34,
        };
        let usage = bedrock_to_openai(&resp, 0).unwrap().usage;
        assert_eq!(usage.prompt_tokens, 1200);
        assert_eq!(usage.completion_tokens, 34);
        assert_eq!(usage.total_tokens, usage.prompt_tokens + usage.completion_tokens);
    }
}
