//! API translation between Anthropic and `OpenAI` formats.
//!
//! Converts Messages requests into chat-completions requests and chat-completions
//! responses back into Messages responses. All translation functions are pure (no I/O).

pub mod anthropic_types;
pub mod openai_types;
pub mod request;
pub mod response;

pub use request::to_upstream;
pub use response::from_upstream;
