use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// One entry in the bounded emotional trajectory ring.
#[derive(Debug, Clone)]
pub struct EmotionalEvent {
    pub label: String,
    pub intensity: f32,
    pub at: DateTime<Utc>,
}

/// In-memory mood/state cache for one `(character, user)` pair (spec §4.5).
///
/// This is the read-side source of truth; `engine::MoodEngine` persists it
/// to `character_states` write-behind, so a reader may observe a value a
/// few milliseconds stale relative to the last `update()` call.
#[derive(Debug, Clone)]
pub struct CharacterState {
    pub character_id: String,
    pub user_id: String,
    pub current_mood: String,
    pub mood_intensity: f32,
    pub emotional_trajectory: Vec<EmotionalEvent>,
    pub personality_evolution: HashMap<String, String>,
    pub last_interaction: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl CharacterState {
    pub fn default_for(character_id: &str, user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            character_id: character_id.to_string(),
            user_id: user_id.to_string(),
            current_mood: "neutral".to_string(),
            mood_intensity: 0.5,
            emotional_trajectory: Vec::new(),
            personality_evolution: HashMap::new(),
            last_interaction: None,
            updated_at: now,
        }
    }
}

/// Snapshot returned by `MoodEngine::snapshot()` — a cheap clone, safe to
/// hand to the prompt assembler without holding the engine's lock.
#[derive(Debug, Clone)]
pub struct MoodSnapshot {
    pub current_mood: String,
    pub mood_intensity: f32,
    pub recent_trajectory: Vec<EmotionalEvent>,
}
