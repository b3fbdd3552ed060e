//! Bridges a rig `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionModel, Message};
use serde_json::{Value, json};

use crate::error::LlmError;
use crate::llm::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role,
};

/// Adapter from a rig completion model to `LlmProvider`.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
    provider: &'static str,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str, provider: &'static str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            provider,
        }
    }
}

/// A request split the way rig wants it: preamble, history, final prompt.
struct RigParts {
    preamble: Option<String>,
    history: Vec<Message>,
    prompt: Message,
}

fn to_rig_message(message: ChatMessage) -> Option<Message> {
    match message.role {
        Role::System => None,
        Role::User => Some(Message::user(message.content)),
        Role::Assistant => Some(Message::assistant(message.content)),
    }
}

fn split_messages(messages: Vec<ChatMessage>) -> Result<RigParts, String> {
    let system: Vec<String> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.clone())
        .collect();
    let preamble = (!system.is_empty()).then(|| system.join("\n\n"));

    let mut history: Vec<Message> = messages.into_iter().filter_map(to_rig_message).collect();
    let prompt = history
        .pop()
        .ok_or_else(|| "request has no user or assistant message".to_string())?;

    Ok(RigParts {
        preamble,
        history,
        prompt,
    })
}

/// Gemini `generationConfig`, passed through rig's additional params.
fn generation_config(request: &CompletionRequest) -> Value {
    let mut config = serde_json::Map::new();
    if let Some(temperature) = request.temperature {
        config.insert("temperature".into(), json!(temperature));
    }
    if let Some(max_tokens) = request.max_tokens {
        config.insert("maxOutputTokens".into(), json!(max_tokens));
    }
    if let Some(schema) = &request.response_schema {
        config.insert("responseMimeType".into(), json!("application/json"));
        config.insert("responseSchema".into(), schema.clone());
    }
    json!({ "generationConfig": config })
}

/// Map a rig error message onto our error taxonomy.
fn classify_error(provider: &str, reason: String) -> LlmError {
    let lower = reason.to_lowercase();
    if lower.contains("429") || lower.contains("resource_exhausted") || lower.contains("rate limit")
    {
        LlmError::RateLimited {
            provider: provider.to_string(),
            retry_after: None,
        }
    } else if lower.contains("401")
        || lower.contains("403")
        || lower.contains("permission_denied")
        || lower.contains("api key not valid")
    {
        LlmError::AuthFailed {
            provider: provider.to_string(),
        }
    } else {
        LlmError::RequestFailed {
            provider: provider.to_string(),
            reason,
        }
    }
}

fn saturate(tokens: u64) -> u32 {
    u32::try_from(tokens).unwrap_or(u32::MAX)
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let params = generation_config(&request);
        let temperature = request.temperature;
        let max_tokens = request.max_tokens;

        let parts = split_messages(request.messages).map_err(|reason| LlmError::RequestFailed {
            provider: self.provider.to_string(),
            reason,
        })?;

        let mut builder = self
            .model
            .completion_request(parts.prompt)
            .messages(parts.history)
            .additional_params(params);
        if let Some(preamble) = parts.preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_error(self.provider, e.to_string()))?;

        let content: String = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect();

        if content.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.provider.to_string(),
                reason: "no text in completion".to_string(),
            });
        }

        tracing::debug!(
            model = %self.model_name,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Completion finished"
        );

        Ok(CompletionResponse {
            content,
            input_tokens: saturate(response.usage.input_tokens),
            output_tokens: saturate(response.usage.output_tokens),
            finish_reason: FinishReason::Stop,
            response_id: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_messages_become_the_preamble() {
        let parts = split_messages(vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("oi"),
            ChatMessage::assistant("olá"),
            ChatMessage::user("tudo bem?"),
        ])
        .unwrap();

        assert_eq!(parts.preamble.as_deref(), Some("be brief"));
        assert_eq!(parts.history.len(), 2);
        let as_json = |m: &Message| serde_json::to_value(m).unwrap();
        assert_eq!(as_json(&parts.prompt), as_json(&Message::user("tudo bem?")));
        assert_eq!(as_json(&parts.history[1]), as_json(&Message::assistant("olá")));
    }

    #[test]
    fn request_without_chat_messages_is_rejected() {
        assert!(split_messages(vec![ChatMessage::system("only system")]).is_err());
    }

    #[test]
    fn schema_requests_json_output() {
        let request = CompletionRequest::new(vec![ChatMessage::user("extract")])
            .with_max_tokens(8192)
            .with_response_schema(json!({"type": "OBJECT"}));
        let params = generation_config(&request);

        let config = &params["generationConfig"];
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["responseSchema"]["type"], "OBJECT");
        assert_eq!(config["maxOutputTokens"], 8192);
    }

    #[test]
    fn chat_requests_stay_plain_text() {
        let request = CompletionRequest::new(vec![ChatMessage::user("oi")]).with_temperature(0.5);
        let config = &generation_config(&request)["generationConfig"];
        assert!(config.get("responseMimeType").is_none());
        assert_eq!(config["temperature"], 0.5);
    }

    #[test]
    fn errors_keep_their_category() {
        assert!(matches!(
            classify_error("gemini", "HTTP 429 RESOURCE_EXHAUSTED".into()),
            LlmError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_error("gemini", "API key not valid. Please pass a valid API key.".into()),
            LlmError::AuthFailed { .. }
        ));
        match classify_error("gemini", "connection reset".into()) {
            LlmError::RequestFailed { provider, reason } => {
                assert_eq!(provider, "gemini");
                assert_eq!(reason, "connection reset");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn token_counts_saturate() {
        assert_eq!(saturate(12), 12);
        assert_eq!(saturate(u64::MAX), u32::MAX);
    }
}
