use chrono::{DateTime, Utc};
use charcore_config::RelationshipConfig;
use charcore_storage::{PairStore, RelationshipRow, RewardRegistry};
use tracing::instrument;

use crate::level::{recompute_level, Counters};
use crate::scoring::{authenticity_score, connection_boosters, depth_score, emotional_score};
use crate::types::{Bonuses, UpdateOutcome};

/// Runs the full per-exchange relationship update (spec §4.4).
#[instrument(skip(store, registry, user_message, character_response))]
pub fn update_relationship(
    store: &PairStore,
    registry: &RewardRegistry,
    config: &RelationshipConfig,
    user_id: &str,
    character_id: &str,
    user_message: &str,
    character_response: &str,
    duration_minutes: f64,
    now: DateTime<Utc>,
) -> anyhow::Result<UpdateOutcome> {
    let existing = store.get_relationship()?;

    let timestamp_bucket = now.format("%Y-%m-%dT%H:%M").to_string();
    let exchange_key = charcore_storage::exchange_key(user_message, character_response, &timestamp_bucket);

    if let Some(row) = &existing {
        if row.last_exchange_key.as_deref() == Some(exchange_key.as_str()) {
            let reward_rank = registry.reward_for(user_id, character_id)?.map(|r| r.rank);
            return Ok(UpdateOutcome {
                new_level: row.level as u32,
                level_up: false,
                bonuses: Bonuses::default(),
                reward_rank,
                rejected_too_frequent: false,
                emotional_score: 0.0,
                authenticity_score: row.authenticity_score,
            });
        }
        if let Some(last) = row.last_interaction {
            let elapsed = (now - last).to_std().unwrap_or_default();
            if elapsed.as_secs_f64() < config.min_inter_turn_interval_secs {
                return Ok(UpdateOutcome {
                    new_level: row.level as u32,
                    level_up: false,
                    bonuses: Bonuses::default(),
                    reward_rank: None,
                    rejected_too_frequent: true,
                    emotional_score: 0.0,
                    authenticity_score: 0.0,
                });
            }
        }
    }

    let mut row = existing.unwrap_or_else(|| RelationshipRow {
        user_id: user_id.to_string(),
        character_id: character_id.to_string(),
        level: 0.0,
        conversations: 0,
        time_minutes: 0.0,
        emotional_moments: 0,
        memories_shared: 0,
        conflicts_resolved: 0,
        growth_events: 0,
        consistency_score: 0.0,
        authenticity_score: 0.0,
        last_interaction: None,
        created_at: now,
        last_exchange_key: None,
    });

    let base_emotional = emotional_score(user_message, character_response);
    let depth = depth_score(user_message);
    let authenticity = authenticity_score(user_message);
    let booster_bonuses = connection_boosters(user_message);

    let total_emotional = base_emotional + depth * 0.5 + booster_bonuses.emotional;

    if total_emotional > 0.3 && authenticity > 0.3 {
        let day_bucket = now.format("%Y-%m-%d").to_string();
        let today_count = store.emotional_moments_today(&day_bucket)?;
        if today_count < config.daily_emotional_moment_cap as i64 {
            store.record_emotional_moment(&day_bucket, total_emotional, authenticity, now)?;
            row.emotional_moments += 1;
        }
    }

    row.conversations += 1;
    row.time_minutes += duration_minutes;
    row.memories_shared += booster_bonuses.memories;
    row.growth_events += booster_bonuses.growth;
    row.consistency_score = (row.consistency_score + booster_bonuses.consistency).min(1.0);
    row.authenticity_score = authenticity;
    row.last_interaction = Some(now);
    row.last_exchange_key = Some(exchange_key);

    let previous_level = row.level as u32;
    let new_level = recompute_level(
        previous_level,
        &Counters {
            conversations: row.conversations,
            time_minutes: row.time_minutes,
            emotional_moments: row.emotional_moments,
            memories_shared: row.memories_shared,
        },
    );
    let boosted_level = new_level.max((new_level as f32 + booster_bonuses.direct_level).round() as u32);
    row.level = boosted_level as f32;

    store.upsert_relationship(&row)?;

    let mut reward_rank = None;
    if boosted_level >= 10 {
        if let Some(reward) = registry.try_award(user_id, character_id, config.reward_cap, now)? {
            reward_rank = Some(reward.rank);
        }
    }

    Ok(UpdateOutcome {
        new_level: boosted_level,
        level_up: boosted_level > previous_level,
        bonuses: booster_bonuses,
        reward_rank,
        rejected_too_frequent: false,
        emotional_score: total_emotional,
        authenticity_score: authenticity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use charcore_config::AppConfig;
    use charcore_storage::{Pair, PoolManager};
    use tempfile::tempdir;

    fn setup() -> (PairStore, RewardRegistry, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let manager = PoolManager::new(dir.path(), 2);
        let pair = Pair::new("luna", "alex");
        let pool = manager.open(&pair).unwrap();
        let store = PairStore::new(pair, pool);
        let registry = RewardRegistry::open(dir.path()).unwrap();
        (store, registry, dir)
    }

    #[test]
    fn too_frequent_exchange_is_rejected_without_mutation() {
        let (store, registry, _dir) = setup();
        let config = AppConfig::default().relationship;
        let now = Utc::now();

        update_relationship(&store, &registry, &config, "alex", "luna", "hello", "hi there", 1.0, now).unwrap();
        let outcome = update_relationship(&store, &registry, &config, "alex", "luna", "hello again", "hi", 1.0, now).unwrap();
        assert!(outcome.rejected_too_frequent);
    }

    #[test]
    fn personal_sharing_increments_memories_and_growth() {
        let (store, registry, _dir) = setup();
        let config = AppConfig::default().relationship;
        let now = Utc::now();

        let outcome = update_relationship(
            &store,
            &registry,
            &config,
            "alex",
            "luna",
            "My name is Alex and I live in Berlin, I feel happy sharing this.",
            "That's wonderful to hear, thank you for sharing.",
            2.0,
            now,
        )
        .unwrap();
        assert_eq!(outcome.bonuses.memories, 3);
        assert!(!outcome.rejected_too_frequent);
    }

    #[test]
    fn retried_exchange_does_not_double_count() {
        let (store, registry, _dir) = setup();
        let config = AppConfig::default().relationship;
        let now = Utc::now();

        let first = update_relationship(&store, &registry, &config, "alex", "luna", "my dog Rex is great", "love hearing that", 1.0, now).unwrap();
        let row_after_first = store.get_relationship().unwrap().unwrap();

        // Same (user_msg, response, bucket) retried: counters must not move again.
        let retried = update_relationship(&store, &registry, &config, "alex", "luna", "my dog Rex is great", "love hearing that", 1.0, now).unwrap();
        let row_after_retry = store.get_relationship().unwrap().unwrap();

        assert_eq!(row_after_first.conversations, row_after_retry.conversations);
        assert_eq!(row_after_first.memories_shared, row_after_retry.memories_shared);
        assert!(!retried.rejected_too_frequent);
        assert_eq!(first.new_level, retried.new_level);
    }

    #[test]
    fn level_never_decreases_across_updates() {
        let (store, registry, _dir) = setup();
        let config = AppConfig::default().relationship;
        let mut now = Utc::now();

        for _ in 0..3 {
            update_relationship(&store, &registry, &config, "alex", "luna", "just checking in", "sounds good", 1.0, now).unwrap();
            now += chrono::Duration::seconds(config.min_inter_turn_interval_secs as i64 + 1);
        }
        let row = store.get_relationship().unwrap().unwrap();
        assert!(row.level >= 0.0);
    }
}
