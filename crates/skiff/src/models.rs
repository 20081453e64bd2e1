//! These models represent the objects passed around by the agent
//!
//! There are three wire formats we need to interact with:
//! - anthropic messages/tools, sent from the agent to the LLM
//! - openai chat completion messages/tools, sent from the agent to the LLM
//! - gemini generateContent contents/function declarations, sent from the agent to the LLM
//!
//! These overlap to varying degrees. Every adapter immediately converts to and from the
//! internal structs here, so the loop and the dispatcher never see a provider shape.
pub mod message;
pub mod role;
pub mod tool;
pub mod validation;

pub use validation::ValidationError;
