pub mod engine;
pub mod extract;
pub mod pronoun;
pub mod types;

pub use engine::{process_message, ExtractionOutcome, DEFAULT_CONTEXT_WINDOW_SIZE, NEW_ENTITY_CONFIDENCE};
pub use extract::{extract_mentions, Mention};
pub use pronoun::{resolve, AmbiguousRef, Resolution, ResolutionResult};
pub use types::{normalize_name, ContextWindow, Entity, EntityType};
