pub mod error;
pub mod provider;
pub mod router;
pub mod types;

pub use error::LlmError;
pub use provider::{HttpProvider, LlmProvider};
pub use router::LlmRouter;
pub use types::{ChatMessage, ChatRole};
