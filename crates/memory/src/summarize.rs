use chrono::Utc;
use charcore_config::MemoryConfig;
use charcore_storage::{MemoryRow, PairStore};
use tracing::{info, instrument};

use crate::sentiment::has_emotional_content;

/// Runs after every ingest: shrinks the buffer once it crosses the
/// summary threshold, or promotes the oldest low-importance subset once
/// it crosses the buffer window (spec §4.3 steps 6 and "Summarization").
#[instrument(skip(store))]
pub fn enforce_buffer_window(store: &PairStore, config: &MemoryConfig) -> anyhow::Result<()> {
    let buffer_count = store.count_by_type("buffer")? as usize;

    if buffer_count > config.summary_threshold {
        generate_summary(store, config, 10)?;
    } else if buffer_count > config.buffer_window_size {
        promote_oldest_low_importance(store, config)?;
    }
    Ok(())
}

/// Promotes the oldest, lowest-importance buffer rows past the window
/// size into `archived` without creating a new summary row — the full
/// rollup only happens at `summary_threshold` (spec §4.3 step 6).
fn promote_oldest_low_importance(store: &PairStore, config: &MemoryConfig) -> anyhow::Result<()> {
    let buffer_count = store.count_by_type("buffer")? as usize;
    let overflow = buffer_count.saturating_sub(config.buffer_window_size);
    if overflow == 0 {
        return Ok(());
    }

    let all = store.all_memories()?;
    let mut oldest_buffer: Vec<&MemoryRow> = all
        .iter()
        .filter(|m| m.memory_type == "buffer" && m.archive_status == "active")
        .collect();
    oldest_buffer.sort_by_key(|m| m.created_at);

    let mut promoted = 0;
    for row in oldest_buffer.into_iter().take(overflow) {
        if row.importance < config.archive_importance_below {
            let mut updated = row.clone();
            updated.memory_type = "archived".to_string();
            updated.archive_status = "archived".to_string();
            store.update_memory(&updated)?;
            promoted += 1;
        }
    }
    if promoted > 0 {
        info!(promoted, "promoted low-importance buffer rows to archived");
    }
    Ok(())
}

/// Generates a textual rollup of top entities, topic distribution, and
/// emotional-interaction count, inserts it as `memory_type=summary`,
/// and shrinks the buffer to the most recent `keep_recent` rows (spec
/// §4.3 "Summarization"). Summaries are append-only: existing summary
/// rows are never rewritten.
#[instrument(skip(store))]
pub fn generate_summary(store: &PairStore, config: &MemoryConfig, keep_recent: usize) -> anyhow::Result<Option<MemoryRow>> {
    let buffer = store.query_recent(100_000, Some("buffer"))?;
    if buffer.len() <= keep_recent {
        return Ok(None);
    }

    let (keep, to_summarize) = buffer.split_at(keep_recent.min(buffer.len()));

    let top_entities = store.top_entities(5)?;
    let mut topic_counts: std::collections::HashMap<String, u64> = std::collections::HashMap::new();
    let mut emotional_count = 0u64;
    for row in to_summarize {
        if let Some(topic) = &row.topic {
            *topic_counts.entry(topic.clone()).or_insert(0) += 1;
        }
        if has_emotional_content(&row.content) {
            emotional_count += 1;
        }
    }

    let entity_names: Vec<String> = top_entities.iter().map(|e| e.name.clone()).collect();
    let mut topics: Vec<(String, u64)> = topic_counts.into_iter().collect();
    topics.sort_by(|a, b| b.1.cmp(&a.1));

    let summary_text = format!(
        "Summary of {} exchanges. Top entities: {}. Topic distribution: {}. Emotional interactions: {}.",
        to_summarize.len(),
        if entity_names.is_empty() { "none".to_string() } else { entity_names.join(", ") },
        if topics.is_empty() {
            "none".to_string()
        } else {
            topics.iter().map(|(t, c)| format!("{t}={c}")).collect::<Vec<_>>().join(", ")
        },
        emotional_count,
    );

    let now = Utc::now();
    let first = to_summarize.first().unwrap();
    let summary_id = charcore_storage::memory_id(&first.user_id, &first.character_id, &first.conversation_id, &summary_text);
    let summary_row = MemoryRow {
        id: summary_id,
        character_id: first.character_id.clone(),
        user_id: first.user_id.clone(),
        content: summary_text,
        memory_type: "summary".to_string(),
        importance: 0.8,
        emotional_valence: 0.0,
        relationship_impact: 0.0,
        related_entity_ids: top_entities.iter().map(|e| e.id.clone()).collect(),
        conversation_id: first.conversation_id.clone(),
        created_at: now,
        last_accessed: now,
        access_count: 0,
        archive_status: "active".to_string(),
        compressed_content: None,
        topic: topics.first().map(|(t, _)| t.clone()),
    };
    store.insert_memory(&summary_row)?;

    for row in to_summarize {
        let mut updated = row.clone();
        updated.memory_type = "archived".to_string();
        updated.archive_status = "archived".to_string();
        store.update_memory(&updated)?;
    }

    info!(summarized = to_summarize.len(), kept = keep.len(), "generated buffer summary");
    Ok(Some(summary_row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use charcore_config::AppConfig;
    use charcore_storage::{Pair, PoolManager};
    use tempfile::tempdir;

    fn sample(n: usize, user: &str, character: &str) -> MemoryRow {
        let now = Utc::now();
        MemoryRow {
            id: format!("mem_{n}"),
            character_id: character.to_string(),
            user_id: user.to_string(),
            content: format!("message number {n} about daily life"),
            memory_type: "buffer".to_string(),
            importance: 0.3,
            emotional_valence: 0.0,
            relationship_impact: 0.0,
            related_entity_ids: vec![],
            conversation_id: "conv-1".to_string(),
            created_at: now - chrono::Duration::seconds((1000 - n) as i64),
            last_accessed: now,
            access_count: 0,
            archive_status: "active".to_string(),
            compressed_content: None,
            topic: Some("general".to_string()),
        }
    }

    #[test]
    fn summary_generated_past_threshold_and_shrinks_buffer() {
        let dir = tempdir().unwrap();
        let manager = PoolManager::new(dir.path(), 2);
        let pair = Pair::new("luna", "alex");
        let pool = manager.open(&pair).unwrap();
        let store = PairStore::new(pair, pool);

        for i in 0..110 {
            store.insert_memory(&sample(i, "alex", "luna")).unwrap();
        }

        let config = AppConfig::default().memory;
        generate_summary(&store, &config, 10).unwrap();

        let remaining_buffer = store.count_by_type("buffer").unwrap();
        assert_eq!(remaining_buffer, 10);
        let summaries = store.count_by_type("summary").unwrap();
        assert_eq!(summaries, 1);
    }
}
