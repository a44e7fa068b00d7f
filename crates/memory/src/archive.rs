use chrono::Utc;
use charcore_config::MemoryConfig;
use charcore_storage::PairStore;
use tracing::{info, instrument};

/// Sweeps archival and compression candidates (spec §4.3 "Archiving and
/// compression"). Preserves entity ids, importance, emotional valence,
/// and timestamps — only `archive_status`/`compressed_content` change.
#[instrument(skip(store))]
pub fn run_maintenance_sweep(store: &PairStore, config: &MemoryConfig) -> anyhow::Result<(usize, usize)> {
    let now = Utc::now();
    let all = store.all_memories()?;

    let mut archived = 0;
    let mut compressed = 0;

    for row in &all {
        let age_days = (now - row.created_at).num_days();

        if row.archive_status == "active"
            && age_days > config.archive_after_days
            && row.importance < config.archive_importance_below
        {
            let mut updated = row.clone();
            updated.archive_status = "archived".to_string();
            store.update_memory(&updated)?;
            archived += 1;
            continue;
        }

        if row.archive_status != "compressed"
            && age_days > config.compress_after_days
            && row.content.len() > config.compress_min_chars
        {
            let compressed_content = compress(&row.content, config.compression_head_chars, config.compression_tail_chars);
            let mut updated = row.clone();
            updated.compressed_content = Some(compressed_content);
            updated.archive_status = "compressed".to_string();
            store.update_memory(&updated)?;
            compressed += 1;
        }
    }

    info!(archived, compressed, "maintenance sweep complete");
    Ok((archived, compressed))
}

/// `head(n) || " … [COMPRESSED] … " || tail(m)` (spec §4.3, compression_ratio≈0.3).
fn compress(content: &str, head_chars: usize, tail_chars: usize) -> String {
    let chars: Vec<char> = content.chars().collect();
    let head: String = chars.iter().take(head_chars).collect();
    let tail: String = chars.iter().rev().take(tail_chars).collect::<Vec<_>>().into_iter().rev().collect();
    format!("{head} … [COMPRESSED] … {tail}")
}

/// Transparent recovery read: returns the best available content plus a
/// flag indicating whether it was served from the compressed form.
pub fn read_content(row: &charcore_storage::MemoryRow) -> (String, bool) {
    match &row.compressed_content {
        Some(compressed) if row.archive_status == "compressed" => (compressed.clone(), true),
        _ => (row.content.clone(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charcore_config::AppConfig;
    use charcore_storage::{MemoryRow, Pair, PoolManager};
    use tempfile::tempdir;

    fn old_row(id: &str, age_days: i64, importance: f32, content: &str) -> MemoryRow {
        let now = Utc::now();
        MemoryRow {
            id: id.to_string(),
            character_id: "luna".to_string(),
            user_id: "alex".to_string(),
            content: content.to_string(),
            memory_type: "buffer".to_string(),
            importance,
            emotional_valence: 0.0,
            relationship_impact: 0.0,
            related_entity_ids: vec![],
            conversation_id: "conv-1".to_string(),
            created_at: now - chrono::Duration::days(age_days),
            last_accessed: now,
            access_count: 0,
            archive_status: "active".to_string(),
            compressed_content: None,
            topic: Some("general".to_string()),
        }
    }

    #[test]
    fn old_low_importance_row_gets_archived() {
        let dir = tempdir().unwrap();
        let manager = PoolManager::new(dir.path(), 2);
        let pair = Pair::new("luna", "alex");
        let pool = manager.open(&pair).unwrap();
        let store = PairStore::new(pair, pool);
        store.insert_memory(&old_row("mem_old", 120, 0.3, "short")).unwrap();

        let config = AppConfig::default().memory;
        run_maintenance_sweep(&store, &config).unwrap();

        let row = store.get_memory("mem_old").unwrap().unwrap();
        assert_eq!(row.archive_status, "archived");
    }

    #[test]
    fn long_old_row_gets_compressed_preserving_entities() {
        let dir = tempdir().unwrap();
        let manager = PoolManager::new(dir.path(), 2);
        let pair = Pair::new("luna", "alex");
        let pool = manager.open(&pair).unwrap();
        let store = PairStore::new(pair, pool);
        let long_content = "x".repeat(300);
        let mut row = old_row("mem_long", 70, 0.9, &long_content);
        row.related_entity_ids = vec!["ent_1".to_string()];
        store.insert_memory(&row).unwrap();

        let config = AppConfig::default().memory;
        run_maintenance_sweep(&store, &config).unwrap();

        let updated = store.get_memory("mem_long").unwrap().unwrap();
        assert_eq!(updated.archive_status, "compressed");
        assert!(updated.compressed_content.is_some());
        assert_eq!(updated.related_entity_ids, vec!["ent_1".to_string()]);
        assert_eq!(updated.importance, 0.9);
    }
}
