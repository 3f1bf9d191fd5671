//! Chat Module
//!
//! Turns a `QuestionRequest` into a persona answer with cit/drt/rgt timings.

pub mod prompt;
pub mod service;

pub use prompt::{build_prompt, render, PromptParts, PERSONA_TEMPLATE};
pub use service::{ChatError, ChatResponse, ChatService, QuestionRequest};
