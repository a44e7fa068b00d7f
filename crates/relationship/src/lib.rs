pub mod engine;
pub mod level;
pub mod scoring;
pub mod types;

pub use engine::update_relationship;
pub use types::{Bonuses, UpdateOutcome};
