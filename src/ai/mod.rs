//! Hosted LLM integration: the Messages API client, prompt templates and
//! the loose JSON extraction applied to model output.

pub mod client;
pub mod extract;
pub mod prompts;
pub mod types;

pub use client::{LlmClient, LlmError};
pub use extract::{RecognizedProduct, SearchInterpretation, extract_json};
