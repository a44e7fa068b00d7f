pub mod character;
pub mod engine;
pub mod error;
pub mod pair_context;
pub mod registry;
pub mod types;

pub use character::{CharacterLoader, StaticCharacterLoader};
pub use engine::Orchestrator;
pub use error::OrchestratorError;
pub use types::{TurnRequest, TurnResponse};
