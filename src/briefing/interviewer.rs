//! The LLM collaborator: opens and continues the interview, and extracts
//! the structured record from a finished transcript.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::InterviewConfig;
use crate::error::{ExtractionError, LlmError};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

use super::model::{BriefingRecord, SessionId};
use super::prompts::{
    EXTRACTION_SYSTEM_PROMPT, INTERVIEWER_SYSTEM_PROMPT, KICKOFF_MESSAGE, extract_json_object,
    extraction_prompt, record_schema,
};

/// Conversational and extraction services consumed by the session controller.
#[async_trait]
pub trait Interviewer: Send + Sync {
    /// Start a fresh conversation for `session` and return the opening line.
    async fn begin_conversation(&self, session: SessionId) -> Result<String, LlmError>;

    /// Send the respondent's latest text and return the interviewer's reply.
    ///
    /// The collaborator keeps the turn history; callers only send the new text.
    async fn continue_conversation(
        &self,
        session: SessionId,
        respondent_text: &str,
    ) -> Result<String, LlmError>;

    /// Extract a record from a linearized transcript. Stateless.
    async fn extract(&self, transcript_text: &str) -> Result<BriefingRecord, ExtractionError>;
}

/// Collaborator-side chat history, bound to one session.
struct ChatHistory {
    session: SessionId,
    messages: Vec<ChatMessage>,
}

/// `Interviewer` backed by an `LlmProvider`.
///
/// Holds the chat history for the current session only; a new
/// `begin_conversation` replaces it, and calls for any other session fail.
pub struct LlmInterviewer {
    llm: Arc<dyn LlmProvider>,
    config: InterviewConfig,
    history: Mutex<Option<ChatHistory>>,
}

impl LlmInterviewer {
    pub fn new(llm: Arc<dyn LlmProvider>, config: InterviewConfig) -> Self {
        Self {
            llm,
            config,
            history: Mutex::new(None),
        }
    }

    fn chat_request(&self, messages: Vec<ChatMessage>) -> CompletionRequest {
        CompletionRequest::new(messages)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens)
    }

    /// Send `history + user_text`, and on success record both sides.
    async fn exchange(&self, session: SessionId, user_text: &str) -> Result<String, LlmError> {
        let mut messages = {
            let history = self.history.lock().await;
            match history.as_ref() {
                Some(h) if h.session == session => h.messages.clone(),
                _ => {
                    return Err(LlmError::UnknownSession {
                        session: session.to_string(),
                    });
                }
            }
        };
        messages.push(ChatMessage::user(user_text));

        let response = self.llm.complete(self.chat_request(messages)).await?;
        let reply = response.content.trim().to_string();
        if reply.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.llm.model_name().to_string(),
                reason: "empty reply".to_string(),
            });
        }

        let mut history = self.history.lock().await;
        match history.as_mut() {
            Some(h) if h.session == session => {
                h.messages.push(ChatMessage::user(user_text));
                h.messages.push(ChatMessage::assistant(&reply));
                Ok(reply)
            }
            // Replaced by a newer session while the call was in flight.
            _ => Err(LlmError::UnknownSession {
                session: session.to_string(),
            }),
        }
    }
}

#[async_trait]
impl Interviewer for LlmInterviewer {
    async fn begin_conversation(&self, session: SessionId) -> Result<String, LlmError> {
        {
            let mut history = self.history.lock().await;
            *history = Some(ChatHistory {
                session,
                messages: vec![ChatMessage::system(INTERVIEWER_SYSTEM_PROMPT)],
            });
        }
        tracing::debug!(%session, "Opening interview conversation");
        self.exchange(session, KICKOFF_MESSAGE).await
    }

    async fn continue_conversation(
        &self,
        session: SessionId,
        respondent_text: &str,
    ) -> Result<String, LlmError> {
        self.exchange(session, respondent_text).await
    }

    async fn extract(&self, transcript_text: &str) -> Result<BriefingRecord, ExtractionError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(EXTRACTION_SYSTEM_PROMPT),
            ChatMessage::user(extraction_prompt(transcript_text)),
        ])
        .with_max_tokens(self.config.extraction_max_tokens)
        .with_response_schema(record_schema());

        let response = self.llm.complete(request).await?;
        let json_text = extract_json_object(&response.content);

        let value: serde_json::Value = serde_json::from_str(json_text)
            .map_err(|e| ExtractionError::Malformed(e.to_string()))?;
        if !value.is_object() {
            return Err(ExtractionError::Malformed(
                "extraction output is not a JSON object".to_string(),
            ));
        }
        let record: BriefingRecord = serde_json::from_value(value)
            .map_err(|e| ExtractionError::Malformed(e.to_string()))?;

        let missing = record.missing_required_fields();
        if !missing.is_empty() {
            return Err(ExtractionError::MissingFields(missing));
        }
        Ok(record)
    }
}
