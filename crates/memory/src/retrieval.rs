use charcore_config::MemoryConfig;
use charcore_storage::PairStore;
use tracing::{instrument, warn};

use crate::cache::ContextCache;
use crate::sentiment::label_for;
use crate::types::{ContextBundle, EmotionalContext, MemoryStats, ProfileInsights, TopicDistribution};

/// Parameters for [`get_context`] (spec §4.3 "Retrieval / context
/// reconstruction").
pub struct ContextQuery<'a> {
    pub character_id: &'a str,
    pub user_id: &'a str,
    pub conversation_id: &'a str,
    pub semantic_query: Option<&'a str>,
    pub max_memories: usize,
    pub min_importance: f32,
    pub include_emotional: bool,
}

/// Builds the structured retrieval bundle. Bounded and deterministic
/// given the same inputs. Storage failures degrade to whatever
/// in-memory buffer is reachable, flagged via `bundle.error` — retrieval
/// never panics or propagates (spec §4.3 "Failure semantics").
#[instrument(skip(store, cache, query))]
pub fn get_context(store: &PairStore, cache: &mut ContextCache, config: &MemoryConfig, query: &ContextQuery) -> ContextBundle {
    if let Some(cached) = cache.get(query.character_id, query.user_id, query.conversation_id) {
        return cached;
    }

    let bundle = match build_bundle(store, config, query) {
        Ok(bundle) => bundle,
        Err(e) => {
            warn!(error = %e, "context retrieval failed, returning degraded bundle");
            let mut degraded = ContextBundle::default();
            degraded.error = Some(e.to_string());
            degraded.recent = store.query_recent(query.max_memories, Some("buffer")).unwrap_or_default();
            degraded
        }
    };

    cache.put(query.character_id, query.user_id, query.conversation_id, bundle.clone());
    bundle
}

fn build_bundle(store: &PairStore, config: &MemoryConfig, query: &ContextQuery) -> anyhow::Result<ContextBundle> {
    let recent = if let Some(text) = query.semantic_query {
        let mut hits = store.search_text(text, query.max_memories)?;
        if hits.is_empty() {
            hits = store.query_recent(query.max_memories, Some("buffer"))?;
        }
        hits.retain(|m| m.importance >= query.min_importance);
        hits
    } else {
        store.query_recent(query.max_memories, Some("buffer"))?
    };

    let important = store.query_by_importance(query.min_importance.max(0.6), 10)?;
    let entities = store.top_entities(config.context_window_entities.min(20))?;

    let summaries = store.query_recent(5, Some("summary"))?;
    let summary_context = summaries.first().map(|s| {
        let previews: Vec<String> = summaries.iter().skip(1).map(|s| truncate(&s.content, 60)).collect();
        if previews.is_empty() {
            s.content.clone()
        } else {
            format!("{}\nEarlier: {}", s.content, previews.join(" | "))
        }
    });

    let emotional_context = if query.include_emotional {
        let history = store.query_recent(5, None)?;
        history.first().map(|latest| EmotionalContext {
            latest_label: label_for(latest.emotional_valence).to_string(),
            latest_valence: latest.emotional_valence,
            recent_history: history
                .iter()
                .map(|m| (label_for(m.emotional_valence).to_string(), m.emotional_valence))
                .collect(),
        })
    } else {
        None
    };

    let topic = topic_distribution(store)?;
    let stats = MemoryStats {
        buffer_count: store.count_by_type("buffer")?,
        summary_count: store.count_by_type("summary")?,
        archived_count: store.count_by_type("archived")?,
        compressed_count: store.count_by_type("compressed")?,
    };
    let profile_insights = build_profile_insights(store, &entities)?;

    Ok(ContextBundle {
        recent,
        important,
        entities,
        summary_context,
        emotional_context,
        topic,
        stats,
        profile_insights,
        error: None,
    })
}

fn topic_distribution(store: &PairStore) -> anyhow::Result<TopicDistribution> {
    let all = store.query_recent(200, None)?;
    let mut counts = std::collections::HashMap::new();
    for row in &all {
        if let Some(topic) = &row.topic {
            *counts.entry(topic.clone()).or_insert(0u64) += 1;
        }
    }
    let primary = counts
        .iter()
        .max_by_key(|(_, c)| **c)
        .map(|(t, _)| t.clone())
        .unwrap_or_else(|| "general".to_string());
    Ok(TopicDistribution { primary, counts })
}

fn build_profile_insights(store: &PairStore, entities: &[charcore_storage::EntityRow]) -> anyhow::Result<ProfileInsights> {
    let recent = store.query_recent(50, None)?;

    let question_count = recent.iter().filter(|m| m.content.contains('?')).count();
    let emotional_count = recent.iter().filter(|m| m.emotional_valence.abs() > 0.2).count();
    let analytical_count = recent
        .iter()
        .filter(|m| m.content.split_whitespace().count() > 25)
        .count();

    let total = recent.len().max(1);
    let communication_style = if question_count * 3 > total {
        "inquisitive"
    } else if emotional_count * 3 > total {
        "emotional"
    } else if analytical_count * 3 > total {
        "analytical"
    } else {
        "conversational"
    };

    let mut by_mentions = entities.to_vec();
    by_mentions.sort_by(|a, b| b.mention_count.cmp(&a.mention_count));
    let top_interests = by_mentions.into_iter().take(5).map(|e| e.name).collect();

    let mut activity_hours: Vec<u32> = recent.iter().map(|m| m.created_at.format("%H").to_string().parse().unwrap_or(0)).collect();
    activity_hours.sort_unstable();
    activity_hours.dedup();

    Ok(ProfileInsights {
        communication_style: communication_style.to_string(),
        top_interests,
        activity_hours,
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect::<String>() + "…"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charcore_config::AppConfig;
    use charcore_storage::{Pair, PoolManager};
    use tempfile::tempdir;

    #[test]
    fn get_context_returns_bounded_deterministic_bundle() {
        let dir = tempdir().unwrap();
        let manager = PoolManager::new(dir.path(), 2);
        let pair = Pair::new("luna", "alex");
        let pool = manager.open(&pair).unwrap();
        let store = PairStore::new(pair, pool);
        let config = AppConfig::default().memory;

        crate::ingest::ingest_message(&store, "alex", "luna", "conv-1", "My name is Alex, I live in Berlin.", &config).unwrap();

        let mut cache = ContextCache::new(10, 300);
        let query = ContextQuery {
            character_id: "luna",
            user_id: "alex",
            conversation_id: "conv-1",
            semantic_query: None,
            max_memories: 10,
            min_importance: 0.0,
            include_emotional: true,
        };
        let bundle = get_context(&store, &mut cache, &config, &query);
        assert!(bundle.error.is_none());
        assert_eq!(bundle.recent.len(), 1);
    }

    #[test]
    fn repeated_query_hits_cache() {
        let dir = tempdir().unwrap();
        let manager = PoolManager::new(dir.path(), 2);
        let pair = Pair::new("luna", "alex");
        let pool = manager.open(&pair).unwrap();
        let store = PairStore::new(pair, pool);
        let config = AppConfig::default().memory;

        let mut cache = ContextCache::new(10, 300);
        let query = ContextQuery {
            character_id: "luna",
            user_id: "alex",
            conversation_id: "conv-1",
            semantic_query: None,
            max_memories: 10,
            min_importance: 0.0,
            include_emotional: false,
        };
        get_context(&store, &mut cache, &config, &query);
        get_context(&store, &mut cache, &config, &query);
        assert!(cache.hit_rate_pct() > 0.0);
    }
}
