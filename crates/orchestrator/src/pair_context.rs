use std::sync::Arc;

use charcore_config::AppConfig;
use charcore_memory::MemoryEngine;
use charcore_mood::MoodEngine;
use charcore_relationship::update_relationship;
use charcore_storage::{Pair, PairStore, PoolManager, RewardRegistry};
use dashmap::DashMap;

/// Everything scoped to one `(character, user)` pair: the storage
/// handle and the three engines built over it. Opened lazily and
/// cached for the life of the process (spec §5: "the per-pair storage
/// handle is pooled").
pub struct PairContext {
    pub store: PairStore,
    pub memory: MemoryEngine,
    pub mood: MoodEngine,
}

pub struct PairContextCache {
    pools: Arc<PoolManager>,
    config: AppConfig,
    contexts: DashMap<Pair, Arc<PairContext>>,
}

impl PairContextCache {
    pub fn new(pools: Arc<PoolManager>, config: AppConfig) -> Self {
        Self {
            pools,
            config,
            contexts: DashMap::new(),
        }
    }

    pub fn open(&self, pair: &Pair) -> anyhow::Result<Arc<PairContext>> {
        if let Some(existing) = self.contexts.get(pair) {
            return Ok(existing.clone());
        }

        let pool = self.pools.open(pair)?;
        let store = PairStore::new(pair.clone(), pool);
        let memory = MemoryEngine::new(store.clone(), self.config.memory.clone());
        let mood = MoodEngine::load(store.clone(), &pair.character_id, &pair.user_id)?;

        let ctx = Arc::new(PairContext { store, memory, mood });
        self.contexts.insert(pair.clone(), ctx.clone());
        Ok(ctx)
    }
}

/// Thin helper so callers don't need to import `charcore_relationship`
/// directly just to update a pair's counters.
pub fn relationship_update(
    ctx: &PairContext,
    registry: &RewardRegistry,
    config: &AppConfig,
    user_id: &str,
    character_id: &str,
    user_message: &str,
    character_response: &str,
    duration_minutes: f64,
    now: chrono::DateTime<chrono::Utc>,
) -> anyhow::Result<charcore_relationship::UpdateOutcome> {
    Ok(update_relationship(
        &ctx.store,
        registry,
        &config.relationship,
        user_id,
        character_id,
        user_message,
        character_response,
        duration_minutes,
        now,
    )?)
}
