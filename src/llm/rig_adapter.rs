//! Bridges rig's `CompletionModel` to [`LlmProvider`].

use async_trait::async_trait;
use rig::completion::{CompletionError, CompletionModel, Message};
use rig::message::AssistantContent;

use crate::error::LlmError;
use crate::llm::provider::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role};

/// Wraps any rig completion model.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

/// A chat flattened into rig's request shape.
#[derive(Debug, PartialEq, Eq)]
struct PromptParts {
    preamble: Option<String>,
    history: Vec<String>,
    prompt: String,
}

impl PromptParts {
    /// System messages become the preamble; the last user message is the
    /// prompt and earlier ones are history.
    fn from_messages(messages: &[ChatMessage], provider: &str) -> Result<Self, LlmError> {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        let mut user: Vec<String> = messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .collect();
        let prompt = user.pop().ok_or_else(|| LlmError::RequestFailed {
            provider: provider.to_string(),
            reason: "request has no user message".to_string(),
        })?;
        Ok(Self {
            preamble: (!system.is_empty()).then(|| system.join("\n\n")),
            history: user,
            prompt,
        })
    }
}

fn map_error(provider: &str, err: CompletionError) -> LlmError {
    let reason = err.to_string();
    let lower = reason.to_lowercase();
    if lower.contains("429") || lower.contains("rate limit") {
        LlmError::RateLimited {
            provider: provider.to_string(),
            retry_after: None,
        }
    } else if lower.contains("401") || lower.contains("unauthorized") || lower.contains("invalid api key") {
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

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let parts = PromptParts::from_messages(&request.messages, &self.model_name)?;

        let mut builder = self.model.completion_request(Message::user(parts.prompt));
        if let Some(preamble) = parts.preamble {
            builder = builder.preamble(preamble);
        }
        if !parts.history.is_empty() {
            builder = builder.messages(parts.history.into_iter().map(Message::user).collect());
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_error(&self.model_name, e))?;

        let content = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        Ok(CompletionResponse {
            content,
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_messages_become_preamble() {
        let parts = PromptParts::from_messages(
            &[
                ChatMessage::system("be brief"),
                ChatMessage::user("earlier"),
                ChatMessage::system("sign with your name"),
                ChatMessage::user("hello"),
            ],
            "gpt-4o-mini",
        )
        .unwrap();

        assert_eq!(
            parts,
            PromptParts {
                preamble: Some("be brief\n\nsign with your name".to_string()),
                history: vec!["earlier".to_string()],
                prompt: "hello".to_string(),
            }
        );
    }

    #[test]
    fn request_without_user_message_fails() {
        let err = PromptParts::from_messages(&[ChatMessage::system("be brief")], "gpt-4o-mini").unwrap_err();
        assert!(matches!(err, LlmError::RequestFailed { .. }));
    }

    #[test]
    fn provider_errors_are_classified() {
        let rate = map_error("m", CompletionError::ProviderError("429 Too Many Requests".into()));
        assert!(matches!(rate, LlmError::RateLimited { .. }));
        let auth = map_error("m", CompletionError::ProviderError("401 Unauthorized".into()));
        assert!(matches!(auth, LlmError::AuthFailed { .. }));
        let other = map_error("m", CompletionError::ProviderError("model overloaded".into()));
        assert!(matches!(other, LlmError::RequestFailed { ref reason, .. } if reason.contains("overloaded")));
    }
}
