pub mod archive;
pub mod cache;
pub mod importance;
pub mod ingest;
pub mod personal_details;
pub mod retrieval;
pub mod sentiment;
pub mod summarize;
pub mod types;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use charcore_config::MemoryConfig;
use charcore_storage::{MemoryRow, PairStore};

pub use cache::ContextCache;
pub use retrieval::ContextQuery;
pub use types::{ContextBundle, EmotionalContext, MemoryStats, PersonalDetails, ProfileInsights, TopicDistribution};

/// Owns a pair's memory pipeline: ingest, buffer/summary maintenance,
/// retrieval caching, and personal-detail extraction (spec §4.3).
pub struct MemoryEngine {
    store: PairStore,
    config: MemoryConfig,
    cache: Mutex<ContextCache>,
    ingest_count: AtomicU64,
    personal_details: Mutex<PersonalDetailsCache>,
}

#[derive(Default)]
struct PersonalDetailsCache {
    details: Option<PersonalDetails>,
    ingests_at_last_scan: u64,
}

impl MemoryEngine {
    pub fn new(store: PairStore, config: MemoryConfig) -> Self {
        let cache = ContextCache::new(config.context_cache_capacity, config.context_cache_ttl_secs);
        Self {
            store,
            config,
            cache: Mutex::new(cache),
            ingest_count: AtomicU64::new(0),
            personal_details: Mutex::new(PersonalDetailsCache::default()),
        }
    }

    pub fn store(&self) -> &PairStore {
        &self.store
    }

    /// Runs the ingest pipeline and invalidates the pair's cached
    /// contexts. Opportunistically triggers the maintenance sweep every
    /// `maintenance_every_n_ingests` calls (spec §4.3 "Archiving and
    /// compression").
    pub fn ingest_message(&self, user_id: &str, character_id: &str, conversation_id: &str, content: &str) -> anyhow::Result<MemoryRow> {
        let row = ingest::ingest_message(&self.store, user_id, character_id, conversation_id, content, &self.config)?;
        self.cache.lock().expect("cache mutex poisoned").invalidate_pair(character_id, user_id);

        let n = self.ingest_count.fetch_add(1, Ordering::Relaxed) + 1;
        if n % self.config.maintenance_every_n_ingests.max(1) == 0 {
            archive::run_maintenance_sweep(&self.store, &self.config)?;
        }
        Ok(row)
    }

    pub fn get_context(&self, query: &ContextQuery) -> ContextBundle {
        let mut cache = self.cache.lock().expect("cache mutex poisoned");
        retrieval::get_context(&self.store, &mut cache, &self.config, query)
    }

    pub fn run_maintenance_sweep(&self) -> anyhow::Result<(usize, usize)> {
        archive::run_maintenance_sweep(&self.store, &self.config)
    }

    /// Rescans stored memories for personal details every
    /// `personal_details_rescan_interval` ingests for this pair,
    /// caching the result between rescans (spec §4 open-question
    /// decision: cadence is configurable, not unthrottled per-call).
    pub fn personal_details(&self) -> anyhow::Result<PersonalDetails> {
        let current = self.ingest_count.load(Ordering::Relaxed);
        let interval = self.config.personal_details_rescan_interval.max(1);
        let mut cache = self.personal_details.lock().expect("personal details mutex poisoned");

        let due = match &cache.details {
            Some(_) => current.saturating_sub(cache.ingests_at_last_scan) >= interval,
            None => true,
        };

        if due {
            let all = self.store.all_memories()?;
            let details = personal_details::extract_personal_details(all.iter().map(|m| m.content.as_str()));
            cache.details = Some(details.clone());
            cache.ingests_at_last_scan = current;
            Ok(details)
        } else {
            Ok(cache.details.clone().unwrap_or_default())
        }
    }

    /// Renders the stable "About you, I remember …" preface the
    /// orchestrator prepends to prompts (spec §4.3).
    pub fn personal_details_preface(&self) -> anyhow::Result<Option<String>> {
        let details = self.personal_details()?;
        let mut parts = Vec::new();
        if let Some(name) = &details.name {
            parts.push(format!("your name is {name}"));
        }
        if let Some(age) = &details.age {
            parts.push(format!("you are {age} years old"));
        }
        if let Some(location) = &details.location {
            parts.push(format!("you live in {location}"));
        }
        for (role, names) in &details.family {
            parts.push(format!("your {role} is {}", names.join(" and ")));
        }
        if !details.pets.is_empty() {
            parts.push(format!("you have a pet named {}", details.pets.join(" and ")));
        }
        if !details.work.is_empty() {
            parts.push(format!("you work as {}", details.work.join(" and ")));
        }

        if parts.is_empty() {
            Ok(None)
        } else {
            Ok(Some(format!("About you, I remember {}.", parts.join(", "))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charcore_config::AppConfig;
    use charcore_storage::{Pair, PoolManager};
    use tempfile::tempdir;

    #[test]
    fn engine_ingests_and_builds_preface() {
        let dir = tempdir().unwrap();
        let manager = PoolManager::new(dir.path(), 2);
        let pair = Pair::new("luna", "alex");
        let pool = manager.open(&pair).unwrap();
        let store = PairStore::new(pair, pool);
        let config = AppConfig::default().memory;
        let engine = MemoryEngine::new(store, config);

        engine.ingest_message("alex", "luna", "conv-1", "My name is Alex and I live in Berlin.").unwrap();
        let preface = engine.personal_details_preface().unwrap();
        assert!(preface.unwrap().contains("Alex"));
    }
}
