use chrono::Utc;
use charcore_storage::{EntityRow, PairStore};

use crate::extract::{extract_mentions, Mention};
use crate::pronoun::{resolve, AmbiguousRef, Resolution};
use crate::types::{normalize_name, ContextWindow, Entity, EntityType};

/// Default bound on how many entities a `ContextWindow` remembers for
/// pronoun resolution (spec §3).
pub const DEFAULT_CONTEXT_WINDOW_SIZE: usize = 10;

/// Default confidence assigned to a newly created entity (spec §4.2).
pub const NEW_ENTITY_CONFIDENCE: f32 = 0.8;

pub struct ExtractionOutcome {
    pub entities: Vec<EntityRow>,
    pub resolutions: Vec<Resolution>,
    pub ambiguous: Vec<AmbiguousRef>,
}

/// Runs the full per-message pipeline: extract candidate mentions,
/// look each up by `(user_id, type, normalized_name)`, increment
/// `mention_count` on a hit or create with [`NEW_ENTITY_CONFIDENCE`] on
/// a miss, then resolve any pronouns against the updated context
/// window (spec §4.2).
pub fn process_message(
    store: &PairStore,
    user_id: &str,
    message: &str,
    conversation_id: &str,
) -> anyhow::Result<ExtractionOutcome> {
    let now = Utc::now();
    let mentions = extract_mentions(message);

    let mut touched = Vec::with_capacity(mentions.len());
    for mention in &mentions {
        let row = upsert_mention(store, user_id, mention, now)?;
        touched.push(row);
    }

    let mut window = store
        .get_context_window(conversation_id)?
        .unwrap_or_else(|| to_storage_context_window(ContextWindow::new(conversation_id)));
    for row in &touched {
        push_mention_id(&mut window.entity_ids, &row.id, DEFAULT_CONTEXT_WINDOW_SIZE);
    }
    window.updated_at = now;
    store.upsert_context_window(&window)?;

    let context = from_storage_context_window(&window);
    let candidate_ids = context.entity_ids.clone();
    let candidates: Vec<Entity> = candidate_ids
        .iter()
        .filter_map(|id| store.find_entity_by_id(id).ok().flatten())
        .map(from_storage_entity)
        .collect();

    let resolution = resolve(message, &context, &candidates);

    Ok(ExtractionOutcome {
        entities: touched,
        resolutions: resolution.resolutions,
        ambiguous: resolution.ambiguous,
    })
}

fn upsert_mention(
    store: &PairStore,
    user_id: &str,
    mention: &Mention,
    now: chrono::DateTime<Utc>,
) -> anyhow::Result<EntityRow> {
    let normalized = normalize_name(&mention.name);
    let entity_type = mention.entity_type.as_str();

    if let Some(mut existing) = store.find_entity(entity_type, &normalized)? {
        existing.mention_count += 1;
        existing.last_seen = now;
        for (k, v) in &mention.attributes {
            existing.attributes.insert(k.clone(), v.clone());
        }
        store.upsert_entity(&existing)?;
        return Ok(existing);
    }

    let id = charcore_storage::entity_id(user_id, entity_type, &normalized);
    let row = EntityRow {
        id,
        user_id: user_id.to_string(),
        entity_type: entity_type.to_string(),
        name: mention.name.clone(),
        normalized_name: normalized,
        aliases: Vec::new(),
        attributes: mention.attributes.iter().cloned().collect(),
        first_seen: now,
        last_seen: now,
        mention_count: 1,
        confidence: NEW_ENTITY_CONFIDENCE,
    };
    store.upsert_entity(&row)?;
    Ok(row)
}

fn push_mention_id(ids: &mut Vec<String>, entity_id: &str, max_size: usize) {
    ids.retain(|id| id != entity_id);
    ids.insert(0, entity_id.to_string());
    ids.truncate(max_size);
}

fn to_storage_context_window(window: ContextWindow) -> charcore_storage::ContextWindowRow {
    charcore_storage::ContextWindowRow {
        conversation_id: window.conversation_id,
        entity_ids: window.entity_ids,
        current_topic: window.current_topic,
        emotional_context: window.emotional_context,
        updated_at: window.updated_at,
    }
}

fn from_storage_context_window(row: &charcore_storage::ContextWindowRow) -> ContextWindow {
    ContextWindow {
        conversation_id: row.conversation_id.clone(),
        entity_ids: row.entity_ids.clone(),
        current_topic: row.current_topic.clone(),
        emotional_context: row.emotional_context.clone(),
        updated_at: row.updated_at,
    }
}

fn from_storage_entity(row: EntityRow) -> Entity {
    Entity {
        id: row.id,
        user_id: row.user_id,
        entity_type: EntityType::from_str_loose(&row.entity_type).unwrap_or(EntityType::Concept),
        name: row.name,
        aliases: row.aliases.into_iter().collect(),
        attributes: row.attributes,
        edges: std::collections::HashMap::new(),
        first_seen: row.first_seen,
        last_seen: row.last_seen,
        mention_count: row.mention_count.max(0) as u64,
        confidence: row.confidence,
    }
}
