//! persona-chat: Persona chatbot service with contextual retrieval
//!
//! Answers questions in the voice of a persona, grounding each answer in
//! facts pulled from a key-value store.
//!
//! ## Architecture
//!
//! - **Context Engine**: classify the question, scan `{personality}:{category}:*`,
//!   batch-fetch, memoize, retry with linear backoff
//! - **Store**: `KeyValueStore` trait with sled, in-memory and bounded impls
//! - **Chat Service**: prompt assembly, LLM call, interaction logging
//! - **API**: axum router exposing `/cv/chat`

pub mod api;
pub mod chat;
pub mod config;
pub mod context;
pub mod llm;
pub mod storage;
pub mod store;

// Re-export configuration
pub use config::ChatConfig;

// Re-export the retrieval engine
pub use context::{Category, CategoryClassifier, ContextRetriever, RetrievalOutcome};

// Re-export chat components
pub use chat::{ChatError, ChatResponse, ChatService, QuestionRequest};

// Re-export stores
pub use store::{BoundedStore, KeyValueStore, MemoryStore, SledStore, StoreError};

// Re-export LLM components
pub use llm::{LlmClient, LlmError, OpenAiCompatClient};

// Re-export storage
pub use storage::{InteractionLog, InteractionRecord};
