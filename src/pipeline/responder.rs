//! Reply drafting.
//!
//! The layered chain tries the generative model first (when one is
//! configured) and falls through to the contextual templates on any
//! failure. The generic chain draws from the template store instead and is
//! selected explicitly by the caller.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::Persona;
use crate::error::LlmError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::templates::{TemplateStore, contextual_reply};
use crate::pipeline::types::{ClassificationResult, Language, Message, ReplyDraft, Tier};

/// Output budget for a generated reply.
const MAX_REPLY_TOKENS: u32 = 150;
/// Sampling temperature for generated replies.
const REPLY_TEMPERATURE: f32 = 0.7;

/// Produces a [`ReplyDraft`] for a classified message.
pub struct ResponseGenerator {
    llm: Option<Arc<dyn LlmProvider>>,
    templates: Arc<TemplateStore>,
    persona: Persona,
}

impl ResponseGenerator {
    /// `llm` is `None` when no model credential is configured; the layered
    /// chain then starts at the contextual tier.
    pub fn new(
        llm: Option<Arc<dyn LlmProvider>>,
        templates: Arc<TemplateStore>,
        persona: Persona,
    ) -> Self {
        Self {
            llm,
            templates,
            persona,
        }
    }

    /// Layered chain: generated, then contextual template. Never empty.
    pub async fn generate(
        &self,
        message: &Message,
        classification: &ClassificationResult,
        language: Language,
    ) -> ReplyDraft {
        if let Some(llm) = &self.llm {
            match self.generate_with_model(llm.as_ref(), message, classification).await {
                Ok(body) => {
                    debug!(model = llm.model_name(), chars = body.len(), "Generated reply");
                    return ReplyDraft::new(body, Tier::Generated);
                }
                Err(e) => {
                    warn!(model = llm.model_name(), error = %e, "Generation failed, using contextual template");
                }
            }
        }

        ReplyDraft::new(
            contextual_reply(
                classification.category,
                language,
                &message.sender_name,
                &self.persona,
            ),
            Tier::ContextualTemplate,
        )
    }

    /// Generic chain: random entry from the template store for the category.
    pub fn generate_generic(&self, classification: &ClassificationResult) -> ReplyDraft {
        let body = self
            .templates
            .pick(classification.category, &mut rand::thread_rng());
        ReplyDraft::new(body, Tier::GenericTemplate)
    }

    async fn generate_with_model(
        &self,
        llm: &dyn LlmProvider,
        message: &Message,
        classification: &ClassificationResult,
    ) -> Result<String, LlmError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(system_prompt(&self.persona)),
            ChatMessage::user(user_prompt(message, classification)),
        ])
        .with_max_tokens(MAX_REPLY_TOKENS)
        .with_temperature(REPLY_TEMPERATURE);

        let response = llm.complete(request).await?;
        debug!(
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Model usage"
        );
        let content = response.content.trim();
        if content.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: llm.model_name().to_string(),
                reason: "empty content".to_string(),
            });
        }
        Ok(content.to_string())
    }
}

fn system_prompt(persona: &Persona) -> String {
    let Persona { name, role, focus } = persona;
    format!(
        "You are responding to professional network messages as {name}, a {role}. \
         Your expertise: {focus}. \
         Keep responses professional, brief (2-4 sentences), and polite. \
         Mirror the tone and formality of the message you receive: if the person uses 'Sie' or formal English, reply formally. \
         If they use 'du' or informal English, reply informally. Use the same language (German or English) as the original message. \
         Don't commit to anything specific. Ask clarifying questions about the role. \
         Always ask about: expected salary/salary range, number of planned interviews, and if fully remote work is possible. \
         If the role doesn't match your background, express interest but ask if your expertise could be a fit. \
         Always sign with 'Viele Grüße, {name}' (German) or 'Best regards, {name}' (English). \
         Be friendly but not overly enthusiastic."
    )
}

fn user_prompt(message: &Message, classification: &ClassificationResult) -> String {
    format!(
        "Generate a professional response to this message from {sender}:\n\n\
         {text}\n\n\
         Message type: {category}\n\n\
         Important: Analyze if this role matches your background. \
         Always include your 3 key questions about salary, interviews, and remote work. \
         Sign the message properly with your name.",
        sender = message.sender_name,
        text = message.text,
        category = classification.category.key(),
    )
}
