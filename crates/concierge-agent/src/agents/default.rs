//! Conversational fallback.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::base::{Agent, AgentRequest};
use crate::clean::clean_response;
use crate::collab::{GenerationOptions, LanguageModel};
use crate::error::Result;
use crate::types::{AgentOutcome, AgentType};

pub const APOLOGY: &str = "Sorry, I could not process this request. Please try rephrasing it.";

const SYSTEM_PROMPT: &str = "\
You are a personal assistant that manages tasks, meetings, deferred \
messages and a knowledge base. Answer briefly and to the point, in the \
language of the user. When the question is unrelated to those areas, give \
a short general answer.";

pub struct DefaultAgent {
    llm: Arc<dyn LanguageModel>,
}

impl DefaultAgent {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Agent for DefaultAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Default
    }

    async fn process_with_context(&self, request: &AgentRequest) -> Result<AgentOutcome> {
        let mut prompt = String::new();
        let notes = request.context_snippets(4, 300);
        if !notes.is_empty() {
            prompt.push_str("Possibly relevant notes:\n");
            for n in &notes {
                prompt.push_str("- ");
                prompt.push_str(n);
                prompt.push('\n');
            }
            prompt.push('\n');
        }
        prompt.push_str(&request.input);

        let options = GenerationOptions {
            max_tokens: Some(600),
            system: Some(SYSTEM_PROMPT.to_string()),
            ..Default::default()
        };
        let outcome = match self.llm.generate_text(&prompt, &options).await {
            Ok(text) => AgentOutcome::new(clean_response(&text)),
            Err(e) => {
                warn!(error = %e, "conversational reply failed");
                AgentOutcome::new(APOLOGY).with_metadata("llm_error", e.to_string())
            }
        };
        Ok(outcome
            .with_metadata("type", "general_response")
            .without_indexing())
    }
}
