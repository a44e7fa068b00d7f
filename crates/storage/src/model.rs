use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRow {
    pub id: String,
    pub character_id: String,
    pub user_id: String,
    pub content: String,
    pub memory_type: String,
    pub importance: f32,
    pub emotional_valence: f32,
    pub relationship_impact: f32,
    pub related_entity_ids: Vec<String>,
    pub conversation_id: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: i64,
    pub archive_status: String,
    pub compressed_content: Option<String>,
    pub topic: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRow {
    pub id: String,
    pub user_id: String,
    pub entity_type: String,
    pub name: String,
    pub normalized_name: String,
    pub aliases: Vec<String>,
    pub attributes: HashMap<String, String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub mention_count: i64,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextWindowRow {
    pub conversation_id: String,
    pub entity_ids: Vec<String>,
    pub current_topic: Option<String>,
    pub emotional_context: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipRow {
    pub user_id: String,
    pub character_id: String,
    pub level: f32,
    pub conversations: i64,
    pub time_minutes: f64,
    pub emotional_moments: i64,
    pub memories_shared: i64,
    pub conflicts_resolved: i64,
    pub growth_events: i64,
    pub consistency_score: f32,
    pub authenticity_score: f32,
    pub last_interaction: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Idempotency marker for the last applied exchange (spec §4.4);
    /// `None` until the first successful update.
    pub last_exchange_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardRow {
    pub user_id: String,
    pub character_id: String,
    pub rank: i64,
    pub awarded_at: DateTime<Utc>,
    pub wallet_address: Option<String>,
    pub minted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterStateRow {
    pub user_id: String,
    pub character_id: String,
    pub current_mood: String,
    pub mood_intensity: f32,
    pub emotional_trajectory: Vec<(String, f32)>,
    pub personality_evolution: HashMap<String, String>,
    pub last_interaction: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageDiagnostics {
    pub tables: Vec<String>,
    pub size_bytes: i64,
    pub schema_version: i64,
}
