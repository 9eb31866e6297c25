use super::anthropic_types::{NativeChatResponse, NativeUsage, ResponseContentBlock};
use super::openai_types::{UpstreamChatResponse, UpstreamUsage};

/// Translate an upstream chat-completions response into a native Messages response.
///
/// Total on any body that deserialized: a missing first choice yields an empty
/// text block, missing usage yields no usage. Error bodies go through here too.
pub fn from_upstream(resp: &UpstreamChatResponse) -> NativeChatResponse {
    NativeChatResponse {
        id: resp.id.clone(),
        response_type: "message".to_string(),
        role: "assistant".to_string(),
        model: resp.model.clone(),
        content: vec![ResponseContentBlock::Text {
            text: first_choice_text(resp).to_string(),
        }],
        usage: resp.usage.as_ref().map(translate_usage),
    }
}

/// `choices[0].message.content`, or `""` if any link of that path is missing.
pub fn first_choice_text(resp: &UpstreamChatResponse) -> &str {
    resp.choices
        .first()
        .and_then(Option::as_ref)
        .and_then(|c| c.message.as_ref())
        .and_then(|m| m.content.as_deref())
        .unwrap_or("")
}

fn translate_usage(usage: &UpstreamUsage) -> NativeUsage {
    NativeUsage {
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::openai_types::*;
    use serde_json::json;

    fn make_response(content: Option<&str>, usage: Option<UpstreamUsage>) -> UpstreamChatResponse {
        UpstreamChatResponse {
            id: Some(json!("chatcmpl-abc123")),
            model: Some(json!("qwen3-coder-plus")),
            choices: vec![Some(Choice {
                message: Some(ChoiceMessage {
                    content: content.map(str::to_string),
                }),
            })],
            usage,
        }
    }

    fn parse(body: &str) -> UpstreamChatResponse {
        serde_json::from_str(body).unwrap()
    }

    fn text_of(resp: &NativeChatResponse) -> &str {
        match &resp.content[..] {
            [ResponseContentBlock::Text { text }] => text,
            other => panic!("Expected a single text block, got {other:?}"),
        }
    }

    #[test]
    fn test_simple_text_response() {
        let resp = make_response(
            Some("hello"),
            Some(UpstreamUsage {
                prompt_tokens: Some(1),
                completion_tokens: Some(2),
            }),
        );
        let result = from_upstream(&resp);

        assert_eq!(result.id, Some(json!("chatcmpl-abc123")));
        assert_eq!(result.model, Some(json!("qwen3-coder-plus")));
        assert_eq!(result.response_type, "message");
        assert_eq!(result.role, "assistant");
        assert_eq!(text_of(&result), "hello");
        assert_eq!(
            serde_json::to_value(result.usage).unwrap(),
            json!({"input_tokens": 1, "output_tokens": 2})
        );
    }

    #[test]
    fn test_missing_usage_stays_missing() {
        let result = from_upstream(&make_response(Some("hi"), None));
        assert_eq!(result.usage, None);

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("usage").is_none());
    }

    #[test]
    fn test_empty_choices_gives_empty_text() {
        let resp = UpstreamChatResponse {
            choices: Vec::new(),
            ..make_response(None, None)
        };
        assert_eq!(text_of(&from_upstream(&resp)), "");
    }

    #[test]
    fn test_missing_message_or_content_gives_empty_text() {
        let no_message = UpstreamChatResponse {
            choices: vec![Some(Choice { message: None })],
            ..make_response(None, None)
        };
        assert_eq!(first_choice_text(&no_message), "");

        let null_content = make_response(None, None);
        assert_eq!(first_choice_text(&null_content), "");
    }

    #[test]
    fn test_null_choices_gives_empty_text() {
        let result = from_upstream(&parse(r#"{"id":"1","model":"qwen","choices":null}"#));
        assert_eq!(text_of(&result), "");
        assert_eq!(result.id, Some(json!("1")));
    }

    #[test]
    fn test_null_first_choice_gives_empty_text() {
        let result = from_upstream(&parse(
            r#"{"choices":[null,{"message":{"content":"second"}}]}"#,
        ));
        assert_eq!(text_of(&result), "");
    }

    #[test]
    fn test_null_message_and_content_give_empty_text() {
        assert_eq!(
            first_choice_text(&parse(r#"{"choices":[{"message":null}]}"#)),
            ""
        );
        assert_eq!(
            first_choice_text(&parse(r#"{"choices":[{"message":{"content":null}}]}"#)),
            ""
        );
    }

    #[test]
    fn test_null_token_counts_are_omitted() {
        let result = from_upstream(&parse(
            r#"{"choices":[],"usage":{"prompt_tokens":3,"completion_tokens":null}}"#,
        ));
        assert_eq!(
            serde_json::to_value(result.usage).unwrap(),
            json!({"input_tokens": 3})
        );

        let null_usage = from_upstream(&parse(r#"{"choices":[],"usage":null}"#));
        assert_eq!(null_usage.usage, None);
    }

    #[test]
    fn test_only_first_choice_is_used() {
        let mut resp = make_response(Some("first"), None);
        resp.choices.push(Some(Choice {
            message: Some(ChoiceMessage {
                content: Some("second".to_string()),
            }),
        }));

        let result = from_upstream(&resp);
        assert_eq!(result.content.len(), 1);
        assert_eq!(text_of(&result), "first");
    }

    #[test]
    fn test_error_body_translates() {
        let result = from_upstream(&parse(
            r#"{"error":{"message":"quota exceeded","type":"rate_limit"}}"#,
        ));

        assert_eq!(result.id, None);
        assert_eq!(result.model, None);
        assert_eq!(text_of(&result), "");
        assert_eq!(result.usage, None);
    }
}
