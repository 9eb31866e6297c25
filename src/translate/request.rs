//! Translate Anthropic Messages requests into OpenAI-compatible chat-completions requests.
//!
//! Only `model`, `max_tokens` and each turn's `role`/`content` are carried.
//! The mapping is one message in, one message out, in the same order, with
//! every value copied as-is.

use super::anthropic_types::{ChatMessage, NativeChatRequest};
use super::openai_types::{UpstreamChatRequest, UpstreamMessage};

/// Translate a native Messages request into an upstream chat-completions request.
/// Pure function: absent fields stay absent, turn order is kept.
pub fn to_upstream(req: &NativeChatRequest) -> UpstreamChatRequest {
    UpstreamChatRequest {
        model: req.model.clone(),
        max_tokens: req.max_tokens.clone(),
        messages: req.messages.iter().map(translate_message).collect(),
    }
}

fn translate_message(msg: &ChatMessage) -> UpstreamMessage {
    UpstreamMessage {
        role: msg.role.clone(),
        content: msg.content.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn conversation() -> NativeChatRequest {
        NativeChatRequest {
            model: Some(json!("qwen3-coder-plus")),
            max_tokens: Some(json!(10)),
            messages: vec![
                ChatMessage::text("user", "hi"),
                ChatMessage::text("assistant", "hello"),
                ChatMessage::text("user", "how are you?"),
            ],
        }
    }

    #[test]
    fn test_fields_copied_and_order_kept() {
        let result = to_upstream(&conversation());

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "model": "qwen3-coder-plus",
                "max_tokens": 10,
                "messages": [
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": "hello"},
                    {"role": "user", "content": "how are you?"}
                ]
            })
        );
    }

    #[test]
    fn test_absent_max_tokens_is_not_invented() {
        let mut req = conversation();
        req.max_tokens = None;

        let result = to_upstream(&req);
        assert_eq!(result.max_tokens, None);

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_unmodelled_content_passes_verbatim() {
        let blocks = json!([{"type": "text", "text": "hi"}]);
        let req = NativeChatRequest {
            model: None,
            max_tokens: None,
            messages: vec![ChatMessage {
                role: Some(json!("system")),
                content: Some(blocks.clone()),
            }],
        };

        let result = to_upstream(&req);
        assert_eq!(result.model, None);
        assert_eq!(result.messages[0].role, Some(json!("system")));
        assert_eq!(result.messages[0].content, Some(blocks));
    }

    #[test]
    fn test_empty_conversation() {
        let result = to_upstream(&NativeChatRequest::default());
        assert!(result.messages.is_empty());
    }
}
