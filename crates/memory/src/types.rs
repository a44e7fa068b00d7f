use std::collections::HashMap;

use charcore_storage::{EntityRow, MemoryRow};

/// Primary topic families memories are bucketed into (spec §4.3 step 4).
pub const TOPICS: &[&str] = &["work", "family", "pets", "health", "projects", "general"];

#[derive(Debug, Clone, Default)]
pub struct TopicDistribution {
    pub primary: String,
    pub counts: HashMap<String, u64>,
}

#[derive(Debug, Clone)]
pub struct EmotionalContext {
    pub latest_label: String,
    pub latest_valence: f32,
    pub recent_history: Vec<(String, f32)>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStats {
    pub buffer_count: i64,
    pub summary_count: i64,
    pub archived_count: i64,
    pub compressed_count: i64,
}

/// Communication-style / interests summary derived from stored memories
/// and entities (spec §4.3 `profile_insights`).
#[derive(Debug, Clone, Default)]
pub struct ProfileInsights {
    pub communication_style: String,
    pub top_interests: Vec<String>,
    pub activity_hours: Vec<u32>,
}

/// Structured personal-details map accumulated from regex extraction
/// over stored memories (spec §4.3 "Personal-detail extraction").
#[derive(Debug, Clone, Default)]
pub struct PersonalDetails {
    pub name: Option<String>,
    pub age: Option<String>,
    pub location: Option<String>,
    pub family: HashMap<String, Vec<String>>,
    pub pets: Vec<String>,
    pub work: Vec<String>,
}

/// The assembled context bundle returned by `get_context` (spec §4.3).
#[derive(Debug, Clone, Default)]
pub struct ContextBundle {
    pub recent: Vec<MemoryRow>,
    pub important: Vec<MemoryRow>,
    pub entities: Vec<EntityRow>,
    pub summary_context: Option<String>,
    pub emotional_context: Option<EmotionalContext>,
    pub topic: TopicDistribution,
    pub stats: MemoryStats,
    pub profile_insights: ProfileInsights,
    pub error: Option<String>,
}
