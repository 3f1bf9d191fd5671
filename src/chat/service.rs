//! Chat request pipeline
//!
//! validate → retrieve context → build prompt → LLM (timed as rgt)
//! → spawn interaction log write → respond

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::prompt::{build_prompt, PromptParts};
use crate::config::defaults;
use crate::context::{ContextRetriever, Timer};
use crate::llm::{LlmClient, LlmError};
use crate::storage::{InteractionLog, InteractionRecord};
use crate::store::KeyValueStore;

/// Incoming chat request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRequest {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default = "default_llm")]
    pub llm: String,
    #[serde(default = "default_personality")]
    pub personality: String,
    #[serde(default)]
    pub personality_prompt: String,
    #[serde(default)]
    pub last_three_responses: String,
}

fn default_llm() -> String {
    defaults::LLM_DEFAULT_MODEL.to_string()
}

fn default_personality() -> String {
    defaults::DEFAULT_PERSONALITY.to_string()
}

impl QuestionRequest {
    pub fn new(question: &str) -> Self {
        Self {
            question: Some(question.to_string()),
            llm: default_llm(),
            personality: default_personality(),
            personality_prompt: String::new(),
            last_three_responses: String::new(),
        }
    }
}

/// Answer plus the three phase timings (ms)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub cit: f64,
    pub drt: f64,
    pub rgt: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Please provide a question")]
    MissingQuestion,
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),
}

/// Everything one chat turn needs
pub struct ChatService {
    retriever: Arc<ContextRetriever>,
    store: Option<Arc<dyn KeyValueStore>>,
    llm: Arc<dyn LlmClient>,
    default_model: String,
    interactions: Option<InteractionLog>,
}

impl ChatService {
    pub fn new(
        retriever: Arc<ContextRetriever>,
        store: Option<Arc<dyn KeyValueStore>>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            retriever,
            store,
            llm,
            default_model: default_llm(),
            interactions: None,
        }
    }

    /// Model used when a request sends an empty `llm`
    #[must_use]
    pub fn with_default_model(mut self, model: &str) -> Self {
        self.default_model = model.to_string();
        self
    }

    #[must_use]
    pub fn with_interaction_log(mut self, log: InteractionLog) -> Self {
        self.interactions = Some(log);
        self
    }

    pub fn interaction_log(&self) -> Option<&InteractionLog> {
        self.interactions.as_ref()
    }

    pub fn retriever(&self) -> &ContextRetriever {
        &self.retriever
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    pub fn llm_backend(&self) -> &'static str {
        self.llm.backend_name()
    }

    /// Answer one question.
    pub async fn respond(&self, request: QuestionRequest) -> Result<ChatResponse, ChatError> {
        let question = request
            .question
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or(ChatError::MissingQuestion)?;

        let outcome = self
            .retriever
            .retrieve_context(question, self.store.as_deref(), &request.personality)
            .await;

        let prompt = build_prompt(&PromptParts {
            personality_prompt: &request.personality_prompt,
            relative_info: &outcome.context,
            last_three_responses: &request.last_three_responses,
            question,
        });

        let model = match request.llm.trim() {
            "" => self.default_model.as_str(),
            named => named,
        };

        let mut rgt = 0.0;
        let completion = {
            let _timer = Timer::scoped(&mut rgt);
            self.llm.complete(model, &prompt).await
        };
        let response = completion.map_err(|e| {
            warn!(model, backend = self.llm.backend_name(), error = %e, "Response generation failed");
            e
        })?;

        info!(
            personality = %request.personality,
            model,
            cit = outcome.cit_ms,
            drt = outcome.drt_ms,
            rgt,
            context_chars = outcome.context.len(),
            "Chat response generated"
        );

        if let Some(log) = &self.interactions {
            let record = InteractionRecord::new(
                question,
                &response,
                outcome.cit_ms,
                outcome.drt_ms,
                rgt,
                &request.personality,
                model,
                &outcome.context,
            );
            spawn_log_write(log.clone(), record);
        }

        Ok(ChatResponse {
            response,
            cit: outcome.cit_ms,
            drt: outcome.drt_ms,
            rgt,
        })
    }
}

/// Write on the blocking pool; the caller never waits and never sees errors.
fn spawn_log_write(log: InteractionLog, record: InteractionRecord) {
    tokio::task::spawn_blocking(move || {
        if let Err(e) = log.record(&record) {
            warn!(id = %record.id, error = %e, "Failed to log interaction");
        }
    });
}
