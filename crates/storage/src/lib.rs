pub mod error;
pub mod migrations;
pub mod model;
pub mod pair;
pub mod pool;
pub mod registry;

pub use error::{Result, StorageError};
pub use model::{
    CharacterStateRow, ContextWindowRow, EntityRow, MemoryRow, RelationshipRow, RewardRow,
    StorageDiagnostics,
};
pub use pair::PairStore;
pub use pool::{Pair, PoolManager};
pub use registry::RewardRegistry;

use sha2::{Digest, Sha256};

/// Content hash used for `MemoryEntry::id` derivation and dedup lookups.
/// Normalizes whitespace so trivial formatting differences collapse to
/// the same hash.
pub fn content_hash(content: &str) -> String {
    let normalized: String = content
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Stable memory id: `hash(user || character || conversation || content_head)`
/// (spec §4.3 step 1).
pub fn memory_id(user_id: &str, character_id: &str, conversation_id: &str, content: &str) -> String {
    let head: String = content.chars().take(64).collect();
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(b"|");
    hasher.update(character_id.as_bytes());
    hasher.update(b"|");
    hasher.update(conversation_id.as_bytes());
    hasher.update(b"|");
    hasher.update(head.as_bytes());
    format!("mem_{}", hex::encode(hasher.finalize()))
}

/// Stable entity id: `hash(user || type || normalized_name)` (spec §3).
pub fn entity_id(user_id: &str, entity_type: &str, normalized_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(b"|");
    hasher.update(entity_type.as_bytes());
    hasher.update(b"|");
    hasher.update(normalized_name.as_bytes());
    format!("ent_{}", hex::encode(hasher.finalize()))
}

/// Relationship-update idempotency key: `hash(user_msg, response,
/// timestamp_bucket)` (spec §4.4). A retried turn that lands in the
/// same minute bucket with the same text hashes identically, letting
/// the relationship engine short-circuit without double-counting.
pub fn exchange_key(user_message: &str, character_response: &str, timestamp_bucket: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_message.as_bytes());
    hasher.update(b"|");
    hasher.update(character_response.as_bytes());
    hasher.update(b"|");
    hasher.update(timestamp_bucket.as_bytes());
    format!("xch_{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MemoryRow;
    use chrono::Utc;
    use tempfile::tempdir;

    fn sample_row(id: &str) -> MemoryRow {
        let now = Utc::now();
        MemoryRow {
            id: id.to_string(),
            character_id: "luna".to_string(),
            user_id: "alex".to_string(),
            content: "Hi, I'm Alex, 31, I live in Berlin.".to_string(),
            memory_type: "buffer".to_string(),
            importance: 0.7,
            emotional_valence: 0.2,
            relationship_impact: 0.1,
            related_entity_ids: vec!["ent_1".to_string()],
            conversation_id: "conv-1".to_string(),
            created_at: now,
            last_accessed: now,
            access_count: 0,
            archive_status: "active".to_string(),
            compressed_content: None,
            topic: Some("general".to_string()),
        }
    }

    #[test]
    fn migrate_creates_required_tables_and_indexes() {
        let dir = tempdir().unwrap();
        let manager = PoolManager::new(dir.path(), 2);
        let pair = Pair::new("luna", "alex");
        let pool = manager.open(&pair).unwrap();
        let store = PairStore::new(pair, pool);

        let diag = store.diagnostics().unwrap();
        for table in [
            "memories",
            "entities",
            "entity_edges",
            "entity_mentions",
            "context_windows",
            "relationships",
            "emotional_moments",
            "conversation_sessions",
            "rewards",
            "character_states",
        ] {
            assert!(diag.tables.contains(&table.to_string()), "missing table {table}");
        }
        assert_eq!(diag.schema_version, migrations::SCHEMA_VERSION);
    }

    #[test]
    fn insert_and_query_recent_round_trips() {
        let dir = tempdir().unwrap();
        let manager = PoolManager::new(dir.path(), 2);
        let pair = Pair::new("luna", "alex");
        let pool = manager.open(&pair).unwrap();
        let store = PairStore::new(pair, pool);

        store.insert_memory(&sample_row("mem_1")).unwrap();
        let recent = store.query_recent(10, Some("buffer")).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].content, "Hi, I'm Alex, 31, I live in Berlin.");
    }

    #[test]
    fn reopening_same_pair_reuses_pool() {
        let dir = tempdir().unwrap();
        let manager = PoolManager::new(dir.path(), 2);
        let pair = Pair::new("luna", "alex");
        let a = manager.open(&pair).unwrap();
        let b = manager.open(&pair).unwrap();
        assert!(std::sync::Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn reward_registry_enforces_rank_uniqueness_and_cap() {
        let dir = tempdir().unwrap();
        let registry = RewardRegistry::open(dir.path()).unwrap();
        let now = Utc::now();

        let first = registry.try_award("alex", "luna", 2, now).unwrap();
        assert_eq!(first.unwrap().rank, 1);

        // Same pair again: no second reward.
        let again = registry.try_award("alex", "luna", 2, now).unwrap();
        assert!(again.is_none());

        let second = registry.try_award("sam", "luna", 2, now).unwrap();
        assert_eq!(second.unwrap().rank, 2);

        // Cap reached: third pair gets nothing.
        let third = registry.try_award("jo", "luna", 2, now).unwrap();
        assert!(third.is_none());
    }

    #[test]
    fn content_hash_is_stable_across_whitespace() {
        assert_eq!(content_hash("Hello  World"), content_hash("hello world"));
    }
}
