use chrono::Utc;
use charcore_config::MemoryConfig;
use charcore_storage::{MemoryRow, PairStore};
use tracing::instrument;

use crate::importance::{compute_importance, detect_topic};
use crate::sentiment::{has_emotional_content, infer_valence};

/// Runs the per-message ingest pipeline: stable id, entity association,
/// importance scoring, topic tagging, and buffer-window enforcement
/// (spec §4.3 "Ingest pipeline").
#[instrument(skip(store, content))]
pub fn ingest_message(
    store: &PairStore,
    user_id: &str,
    character_id: &str,
    conversation_id: &str,
    content: &str,
    config: &MemoryConfig,
) -> anyhow::Result<MemoryRow> {
    let now = Utc::now();
    let outcome = charcore_entity::process_message(store, user_id, content, conversation_id)?;
    let related_entity_ids: Vec<String> = outcome.entities.iter().map(|e| e.id.clone()).collect();

    let emotional_present = has_emotional_content(content);
    let importance = compute_importance(content, !related_entity_ids.is_empty(), emotional_present);
    let topic = detect_topic(content);
    let valence = infer_valence(content);

    let id = charcore_storage::memory_id(user_id, character_id, conversation_id, content);
    let row = MemoryRow {
        id,
        character_id: character_id.to_string(),
        user_id: user_id.to_string(),
        content: content.to_string(),
        memory_type: "buffer".to_string(),
        importance,
        emotional_valence: valence,
        relationship_impact: 0.0,
        related_entity_ids,
        conversation_id: conversation_id.to_string(),
        created_at: now,
        last_accessed: now,
        access_count: 0,
        archive_status: "active".to_string(),
        compressed_content: None,
        topic: Some(topic.to_string()),
    };
    store.insert_memory(&row)?;

    crate::summarize::enforce_buffer_window(store, config)?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use charcore_config::AppConfig;
    use charcore_storage::{Pair, PoolManager};
    use tempfile::tempdir;

    #[test]
    fn ingest_sets_buffer_type_and_active_status() {
        let dir = tempdir().unwrap();
        let manager = PoolManager::new(dir.path(), 2);
        let pair = Pair::new("luna", "alex");
        let pool = manager.open(&pair).unwrap();
        let store = PairStore::new(pair, pool);
        let config = AppConfig::default().memory;

        let row = ingest_message(&store, "alex", "luna", "conv-1", "My name is Alex, I'm 31.", &config).unwrap();
        assert_eq!(row.memory_type, "buffer");
        assert_eq!(row.archive_status, "active");
        assert!(row.importance > 0.5);
    }
}
