use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use tracing::{instrument, warn};

use crate::error::{Result, StorageError};
use crate::model::{
    CharacterStateRow, ContextWindowRow, EntityRow, MemoryRow, RelationshipRow, StorageDiagnostics,
};
use crate::pool::{Pair, SqlitePool};

/// Handle to one `(character_id, user_id)`'s durable store.
///
/// All multi-row writes run inside a single SQLite transaction; a
/// missing-table error triggers a migration and one retry (spec §4.1
/// failure semantics).
#[derive(Clone)]
pub struct PairStore {
    pair: Pair,
    pool: Arc<SqlitePool>,
}

impl PairStore {
    pub fn new(pair: Pair, pool: Arc<SqlitePool>) -> Self {
        Self { pair, pool }
    }

    pub fn pair(&self) -> &Pair {
        &self.pair
    }

    fn with_retry<T>(&self, f: impl Fn(&rusqlite::Connection) -> Result<T>) -> Result<T> {
        let conn = self.pool.get()?;
        match f(&conn) {
            Ok(v) => Ok(v),
            Err(StorageError::Unavailable(msg)) if msg.contains("no such table") => {
                warn!(pair = ?self.pair, "missing table detected, re-running migrations");
                crate::migrations::migrate_if_needed(&conn)
                    .map_err(|_| StorageError::SchemaMigrationFailed(format!("{:?}", self.pair)))?;
                f(&conn)
            }
            Err(e) => Err(e),
        }
    }

    // ── memories ────────────────────────────────────────────────────

    #[instrument(skip(self, row))]
    pub fn insert_memory(&self, row: &MemoryRow) -> Result<()> {
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO memories (
                    id, character_id, user_id, content, memory_type, importance,
                    emotional_valence, relationship_impact, related_entity_ids,
                    conversation_id, created_at, last_accessed, access_count,
                    archive_status, compressed_content, topic, content_hash
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17)
                ON CONFLICT(id) DO UPDATE SET
                    importance=excluded.importance,
                    memory_type=excluded.memory_type,
                    archive_status=excluded.archive_status,
                    compressed_content=excluded.compressed_content,
                    last_accessed=excluded.last_accessed,
                    access_count=excluded.access_count",
                params![
                    row.id,
                    row.character_id,
                    row.user_id,
                    row.content,
                    row.memory_type,
                    row.importance,
                    row.emotional_valence,
                    row.relationship_impact,
                    serde_json::to_string(&row.related_entity_ids).unwrap_or_default(),
                    row.conversation_id,
                    row.created_at.to_rfc3339(),
                    row.last_accessed.to_rfc3339(),
                    row.access_count,
                    row.archive_status,
                    row.compressed_content,
                    row.topic,
                    crate::content_hash(&row.content),
                ],
            )?;
            Ok(())
        })
    }

    pub fn update_memory(&self, row: &MemoryRow) -> Result<()> {
        self.insert_memory(row)
    }

    pub fn delete_memory(&self, id: &str) -> Result<()> {
        self.with_retry(|conn| {
            conn.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
            Ok(())
        })
    }

    pub fn get_memory(&self, id: &str) -> Result<Option<MemoryRow>> {
        self.with_retry(|conn| {
            conn.query_row(
                "SELECT id, character_id, user_id, content, memory_type, importance,
                        emotional_valence, relationship_impact, related_entity_ids,
                        conversation_id, created_at, last_accessed, access_count,
                        archive_status, compressed_content, topic
                 FROM memories WHERE id = ?1",
                params![id],
                row_to_memory,
            )
            .optional()
            .map_err(StorageError::from)
        })
    }

    pub fn query_recent(&self, limit: usize, memory_type: Option<&str>) -> Result<Vec<MemoryRow>> {
        self.with_retry(|conn| {
            let sql = match memory_type {
                Some(_) => {
                    "SELECT id, character_id, user_id, content, memory_type, importance,
                            emotional_valence, relationship_impact, related_entity_ids,
                            conversation_id, created_at, last_accessed, access_count,
                            archive_status, compressed_content, topic
                     FROM memories WHERE memory_type = ?1
                     ORDER BY created_at DESC LIMIT ?2"
                }
                None => {
                    "SELECT id, character_id, user_id, content, memory_type, importance,
                            emotional_valence, relationship_impact, related_entity_ids,
                            conversation_id, created_at, last_accessed, access_count,
                            archive_status, compressed_content, topic
                     FROM memories ORDER BY created_at DESC LIMIT ?1"
                }
            };
            let mut stmt = conn.prepare(sql)?;
            let rows = if let Some(t) = memory_type {
                stmt.query_map(params![t, limit as i64], row_to_memory)?
                    .filter_map(|r| r.ok())
                    .collect()
            } else {
                stmt.query_map(params![limit as i64], row_to_memory)?
                    .filter_map(|r| r.ok())
                    .collect()
            };
            Ok(rows)
        })
    }

    pub fn query_by_importance(&self, min: f32, limit: usize) -> Result<Vec<MemoryRow>> {
        self.with_retry(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, character_id, user_id, content, memory_type, importance,
                        emotional_valence, relationship_impact, related_entity_ids,
                        conversation_id, created_at, last_accessed, access_count,
                        archive_status, compressed_content, topic
                 FROM memories WHERE importance >= ?1
                 ORDER BY importance DESC, created_at DESC LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![min, limit as i64], row_to_memory)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(rows)
        })
    }

    /// Lexical substring/token search over memory content. The contract
    /// only requires deterministic ranking, not any particular engine —
    /// see SPEC_FULL.md §4 (semantic search is lexical, no vector DB).
    pub fn search_text(&self, query: &str, limit: usize) -> Result<Vec<MemoryRow>> {
        self.with_retry(|conn| {
            let pattern = format!("%{}%", query.replace('%', "").replace('_', ""));
            let mut stmt = conn.prepare(
                "SELECT id, character_id, user_id, content, memory_type, importance,
                        emotional_valence, relationship_impact, related_entity_ids,
                        conversation_id, created_at, last_accessed, access_count,
                        archive_status, compressed_content, topic
                 FROM memories WHERE content LIKE ?1
                 ORDER BY importance DESC, created_at DESC LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![pattern, limit as i64], row_to_memory)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(rows)
        })
    }

    pub fn count_by_type(&self, memory_type: &str) -> Result<i64> {
        self.with_retry(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM memories WHERE memory_type = ?1",
                params![memory_type],
                |row| row.get(0),
            )
            .map_err(StorageError::from)
        })
    }

    pub fn touch_access(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        self.with_retry(|conn| {
            conn.execute(
                "UPDATE memories SET last_accessed = ?1, access_count = access_count + 1 WHERE id = ?2",
                params![now.to_rfc3339(), id],
            )?;
            Ok(())
        })
    }

    pub fn all_memories(&self) -> Result<Vec<MemoryRow>> {
        self.with_retry(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, character_id, user_id, content, memory_type, importance,
                        emotional_valence, relationship_impact, related_entity_ids,
                        conversation_id, created_at, last_accessed, access_count,
                        archive_status, compressed_content, topic
                 FROM memories ORDER BY created_at ASC",
            )?;
            let rows = stmt
                .query_map([], row_to_memory)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(rows)
        })
    }

    // ── entities ────────────────────────────────────────────────────

    pub fn upsert_entity(&self, row: &EntityRow) -> Result<()> {
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO entities (
                    id, user_id, entity_type, name, normalized_name, aliases,
                    attributes, first_seen, last_seen, mention_count, confidence
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)
                ON CONFLICT(user_id, entity_type, normalized_name) DO UPDATE SET
                    aliases=excluded.aliases,
                    attributes=excluded.attributes,
                    last_seen=excluded.last_seen,
                    mention_count=entities.mention_count + 1,
                    confidence=excluded.confidence",
                params![
                    row.id,
                    row.user_id,
                    row.entity_type,
                    row.name,
                    row.normalized_name,
                    serde_json::to_string(&row.aliases).unwrap_or_default(),
                    serde_json::to_string(&row.attributes).unwrap_or_default(),
                    row.first_seen.to_rfc3339(),
                    row.last_seen.to_rfc3339(),
                    row.mention_count,
                    row.confidence,
                ],
            )?;
            Ok(())
        })
    }

    pub fn find_entity(&self, entity_type: &str, normalized_name: &str) -> Result<Option<EntityRow>> {
        self.with_retry(|conn| {
            conn.query_row(
                "SELECT id, user_id, entity_type, name, normalized_name, aliases,
                        attributes, first_seen, last_seen, mention_count, confidence
                 FROM entities WHERE entity_type = ?1 AND normalized_name = ?2",
                params![entity_type, normalized_name],
                row_to_entity,
            )
            .optional()
            .map_err(StorageError::from)
        })
    }

    pub fn find_entity_by_id(&self, id: &str) -> Result<Option<EntityRow>> {
        self.with_retry(|conn| {
            conn.query_row(
                "SELECT id, user_id, entity_type, name, normalized_name, aliases,
                        attributes, first_seen, last_seen, mention_count, confidence
                 FROM entities WHERE id = ?1",
                params![id],
                row_to_entity,
            )
            .optional()
            .map_err(StorageError::from)
        })
    }

    pub fn top_entities(&self, limit: usize) -> Result<Vec<EntityRow>> {
        self.with_retry(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, entity_type, name, normalized_name, aliases,
                        attributes, first_seen, last_seen, mention_count, confidence
                 FROM entities ORDER BY mention_count DESC, last_seen DESC LIMIT ?1",
            )?;
            let rows = stmt
                .query_map(params![limit as i64], row_to_entity)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(rows)
        })
    }

    pub fn add_edge(&self, from_id: &str, relationship_type: &str, to_id: &str) -> Result<()> {
        self.with_retry(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO entity_edges (from_entity_id, relationship_type, to_entity_id)
                 VALUES (?1, ?2, ?3)",
                params![from_id, relationship_type, to_id],
            )?;
            Ok(())
        })
    }

    pub fn record_mention(&self, entity_id: &str, memory_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO entity_mentions (entity_id, memory_id, mentioned_at) VALUES (?1, ?2, ?3)",
                params![entity_id, memory_id, at.to_rfc3339()],
            )?;
            Ok(())
        })
    }

    // ── context windows ─────────────────────────────────────────────

    pub fn upsert_context_window(&self, row: &ContextWindowRow) -> Result<()> {
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO context_windows (conversation_id, entity_ids, current_topic, emotional_context, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(conversation_id) DO UPDATE SET
                    entity_ids=excluded.entity_ids,
                    current_topic=excluded.current_topic,
                    emotional_context=excluded.emotional_context,
                    updated_at=excluded.updated_at",
                params![
                    row.conversation_id,
                    serde_json::to_string(&row.entity_ids).unwrap_or_default(),
                    row.current_topic,
                    row.emotional_context,
                    row.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_context_window(&self, conversation_id: &str) -> Result<Option<ContextWindowRow>> {
        self.with_retry(|conn| {
            conn.query_row(
                "SELECT conversation_id, entity_ids, current_topic, emotional_context, updated_at
                 FROM context_windows WHERE conversation_id = ?1",
                params![conversation_id],
                row_to_context_window,
            )
            .optional()
            .map_err(StorageError::from)
        })
    }

    // ── relationships ───────────────────────────────────────────────

    pub fn get_relationship(&self) -> Result<Option<RelationshipRow>> {
        self.with_retry(|conn| {
            conn.query_row(
                "SELECT user_id, character_id, level, conversations, time_minutes,
                        emotional_moments, memories_shared, conflicts_resolved, growth_events,
                        consistency_score, authenticity_score, last_interaction, created_at,
                        last_exchange_key
                 FROM relationships WHERE user_id = ?1 AND character_id = ?2",
                params![self.pair.user_id, self.pair.character_id],
                row_to_relationship,
            )
            .optional()
            .map_err(StorageError::from)
        })
    }

    pub fn upsert_relationship(&self, row: &RelationshipRow) -> Result<()> {
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO relationships (
                    user_id, character_id, level, conversations, time_minutes,
                    emotional_moments, memories_shared, conflicts_resolved, growth_events,
                    consistency_score, authenticity_score, last_interaction, created_at,
                    last_exchange_key
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)
                ON CONFLICT(user_id, character_id) DO UPDATE SET
                    level=excluded.level,
                    conversations=excluded.conversations,
                    time_minutes=excluded.time_minutes,
                    emotional_moments=excluded.emotional_moments,
                    memories_shared=excluded.memories_shared,
                    conflicts_resolved=excluded.conflicts_resolved,
                    growth_events=excluded.growth_events,
                    consistency_score=excluded.consistency_score,
                    authenticity_score=excluded.authenticity_score,
                    last_interaction=excluded.last_interaction,
                    last_exchange_key=excluded.last_exchange_key",
                params![
                    row.user_id,
                    row.character_id,
                    row.level,
                    row.conversations,
                    row.time_minutes,
                    row.emotional_moments,
                    row.memories_shared,
                    row.conflicts_resolved,
                    row.growth_events,
                    row.consistency_score,
                    row.authenticity_score,
                    row.last_interaction.map(|t| t.to_rfc3339()),
                    row.created_at.to_rfc3339(),
                    row.last_exchange_key,
                ],
            )?;
            Ok(())
        })
    }

    /// Count of emotional moments already recorded today for this pair
    /// (spec §4.4 step 6: per-day cap on recorded moments).
    pub fn emotional_moments_today(&self, day_bucket: &str) -> Result<i64> {
        self.with_retry(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM emotional_moments
                 WHERE user_id = ?1 AND character_id = ?2 AND day_bucket = ?3",
                params![self.pair.user_id, self.pair.character_id, day_bucket],
                |row| row.get(0),
            )
            .map_err(StorageError::from)
        })
    }

    pub fn record_emotional_moment(
        &self,
        day_bucket: &str,
        emotional_score: f32,
        authenticity_score: f32,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO emotional_moments (user_id, character_id, day_bucket, emotional_score, authenticity_score, created_at)
                 VALUES (?1,?2,?3,?4,?5,?6)",
                params![
                    self.pair.user_id,
                    self.pair.character_id,
                    day_bucket,
                    emotional_score,
                    authenticity_score,
                    at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn upsert_session(&self, session_id: &str, started_at: DateTime<Utc>, last_exchange_at: DateTime<Utc>) -> Result<()> {
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO conversation_sessions (session_id, user_id, character_id, started_at, last_exchange_at)
                 VALUES (?1,?2,?3,?4,?5)
                 ON CONFLICT(session_id) DO UPDATE SET last_exchange_at=excluded.last_exchange_at",
                params![
                    session_id,
                    self.pair.user_id,
                    self.pair.character_id,
                    started_at.to_rfc3339(),
                    last_exchange_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    // ── character state (mood cache) ────────────────────────────────

    pub fn get_character_state(&self) -> Result<Option<CharacterStateRow>> {
        self.with_retry(|conn| {
            conn.query_row(
                "SELECT user_id, character_id, current_mood, mood_intensity,
                        emotional_trajectory, personality_evolution, last_interaction, updated_at
                 FROM character_states WHERE user_id = ?1 AND character_id = ?2",
                params![self.pair.user_id, self.pair.character_id],
                row_to_character_state,
            )
            .optional()
            .map_err(StorageError::from)
        })
    }

    pub fn upsert_character_state(&self, row: &CharacterStateRow) -> Result<()> {
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO character_states (
                    user_id, character_id, current_mood, mood_intensity,
                    emotional_trajectory, personality_evolution, last_interaction, updated_at
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)
                ON CONFLICT(user_id, character_id) DO UPDATE SET
                    current_mood=excluded.current_mood,
                    mood_intensity=excluded.mood_intensity,
                    emotional_trajectory=excluded.emotional_trajectory,
                    personality_evolution=excluded.personality_evolution,
                    last_interaction=excluded.last_interaction,
                    updated_at=excluded.updated_at",
                params![
                    row.user_id,
                    row.character_id,
                    row.current_mood,
                    row.mood_intensity,
                    serde_json::to_string(&row.emotional_trajectory).unwrap_or_default(),
                    serde_json::to_string(&row.personality_evolution).unwrap_or_default(),
                    row.last_interaction.map(|t| t.to_rfc3339()),
                    row.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    // ── maintenance ─────────────────────────────────────────────────

    pub fn vacuum(&self) -> Result<()> {
        self.with_retry(|conn| {
            conn.execute_batch("VACUUM;")?;
            Ok(())
        })
    }

    pub fn analyze(&self) -> Result<()> {
        self.with_retry(|conn| {
            conn.execute_batch("ANALYZE;")?;
            Ok(())
        })
    }

    pub fn diagnostics(&self) -> Result<StorageDiagnostics> {
        self.with_retry(|conn| {
            let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table'")?;
            let tables: Vec<String> = stmt
                .query_map([], |row| row.get(0))?
                .filter_map(|r| r.ok())
                .collect();
            drop(stmt);

            let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
            let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
            let schema_version: i64 = conn
                .query_row(
                    "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                    [],
                    |row| row.get(0),
                )
                .unwrap_or(0);

            Ok(StorageDiagnostics {
                tables,
                size_bytes: page_count * page_size,
                schema_version,
            })
        })
    }
}

fn row_to_memory(row: &rusqlite::Row) -> rusqlite::Result<MemoryRow> {
    let related_json: String = row.get(8)?;
    Ok(MemoryRow {
        id: row.get(0)?,
        character_id: row.get(1)?,
        user_id: row.get(2)?,
        content: row.get(3)?,
        memory_type: row.get(4)?,
        importance: row.get(5)?,
        emotional_valence: row.get(6)?,
        relationship_impact: row.get(7)?,
        related_entity_ids: serde_json::from_str(&related_json).unwrap_or_default(),
        conversation_id: row.get(9)?,
        created_at: parse_dt(row.get::<_, String>(10)?),
        last_accessed: parse_dt(row.get::<_, String>(11)?),
        access_count: row.get(12)?,
        archive_status: row.get(13)?,
        compressed_content: row.get(14)?,
        topic: row.get(15)?,
    })
}

fn row_to_entity(row: &rusqlite::Row) -> rusqlite::Result<EntityRow> {
    let aliases_json: String = row.get(5)?;
    let attrs_json: String = row.get(6)?;
    Ok(EntityRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        entity_type: row.get(2)?,
        name: row.get(3)?,
        normalized_name: row.get(4)?,
        aliases: serde_json::from_str(&aliases_json).unwrap_or_default(),
        attributes: serde_json::from_str(&attrs_json).unwrap_or_default(),
        first_seen: parse_dt(row.get::<_, String>(7)?),
        last_seen: parse_dt(row.get::<_, String>(8)?),
        mention_count: row.get(9)?,
        confidence: row.get(10)?,
    })
}

fn row_to_context_window(row: &rusqlite::Row) -> rusqlite::Result<ContextWindowRow> {
    let ids_json: String = row.get(1)?;
    Ok(ContextWindowRow {
        conversation_id: row.get(0)?,
        entity_ids: serde_json::from_str(&ids_json).unwrap_or_default(),
        current_topic: row.get(2)?,
        emotional_context: row.get(3)?,
        updated_at: parse_dt(row.get::<_, String>(4)?),
    })
}

fn row_to_relationship(row: &rusqlite::Row) -> rusqlite::Result<RelationshipRow> {
    let last_interaction: Option<String> = row.get(11)?;
    Ok(RelationshipRow {
        user_id: row.get(0)?,
        character_id: row.get(1)?,
        level: row.get(2)?,
        conversations: row.get(3)?,
        time_minutes: row.get(4)?,
        emotional_moments: row.get(5)?,
        memories_shared: row.get(6)?,
        conflicts_resolved: row.get(7)?,
        growth_events: row.get(8)?,
        consistency_score: row.get(9)?,
        authenticity_score: row.get(10)?,
        last_interaction: last_interaction.map(parse_dt),
        created_at: parse_dt(row.get::<_, String>(12)?),
        last_exchange_key: row.get(13)?,
    })
}

fn row_to_character_state(row: &rusqlite::Row) -> rusqlite::Result<CharacterStateRow> {
    let trajectory_json: String = row.get(4)?;
    let evolution_json: String = row.get(5)?;
    let last_interaction: Option<String> = row.get(6)?;
    Ok(CharacterStateRow {
        user_id: row.get(0)?,
        character_id: row.get(1)?,
        current_mood: row.get(2)?,
        mood_intensity: row.get(3)?,
        emotional_trajectory: serde_json::from_str(&trajectory_json).unwrap_or_default(),
        personality_evolution: serde_json::from_str(&evolution_json).unwrap_or_default(),
        last_interaction: last_interaction.map(parse_dt),
        updated_at: parse_dt(row.get::<_, String>(7)?),
    })
}

fn parse_dt(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
