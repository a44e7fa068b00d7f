use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Person,
    Pet,
    Place,
    Object,
    Concept,
    Project,
    Event,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Person => "person",
            EntityType::Pet => "pet",
            EntityType::Place => "place",
            EntityType::Object => "object",
            EntityType::Concept => "concept",
            EntityType::Project => "project",
            EntityType::Event => "event",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        Some(match s {
            "person" => EntityType::Person,
            "pet" => EntityType::Pet,
            "place" => EntityType::Place,
            "object" => EntityType::Object,
            "concept" => EntityType::Concept,
            "project" => EntityType::Project,
            "event" => EntityType::Event,
            _ => return None,
        })
    }
}

/// A per-user entity: person, pet, place, object, concept, project, or
/// event. `(user_id, type, normalized_name)` is unique; merges happen on
/// alias collision (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub user_id: String,
    pub entity_type: EntityType,
    pub name: String,
    pub aliases: BTreeSet<String>,
    pub attributes: HashMap<String, String>,
    pub edges: HashMap<String, BTreeSet<String>>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub mention_count: u64,
    pub confidence: f32,
}

impl Entity {
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }
}

pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Ordered, bounded window of recently mentioned entities for a single
/// conversation, used for pronoun resolution (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextWindow {
    pub conversation_id: String,
    pub entity_ids: Vec<String>,
    pub current_topic: Option<String>,
    pub emotional_context: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ContextWindow {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            entity_ids: Vec::new(),
            current_topic: None,
            emotional_context: None,
            updated_at: Utc::now(),
        }
    }

    /// Push the most-recently-mentioned entity to the front, bounded to
    /// `max_size` (default 10, spec §3).
    pub fn push_mention(&mut self, entity_id: &str, max_size: usize, now: DateTime<Utc>) {
        self.entity_ids.retain(|id| id != entity_id);
        self.entity_ids.insert(0, entity_id.to_string());
        self.entity_ids.truncate(max_size);
        self.updated_at = now;
    }
}
