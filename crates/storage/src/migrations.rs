//! Versioned, additive schema migrations for a per-pair database.
//!
//! New columns get safe defaults, new indexes are created
//! `IF NOT EXISTS`, and nothing is ever dropped — callers on an older
//! schema see zero-valued/defaulted columns rather than errors.

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 4;

pub fn migrate_if_needed(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current < 1 {
        migrate_v1(conn)?;
    }
    if current < 2 {
        migrate_v2(conn)?;
    }
    if current < 3 {
        migrate_v3(conn)?;
    }
    if current < 4 {
        migrate_v4(conn)?;
    }
    Ok(())
}

/// Initial schema: every table named in spec §4.1, with the minimum
/// required index set.
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS memories (
            id TEXT PRIMARY KEY,
            character_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            content TEXT NOT NULL,
            memory_type TEXT NOT NULL,
            importance REAL NOT NULL DEFAULT 0.5,
            emotional_valence REAL NOT NULL DEFAULT 0.0,
            relationship_impact REAL NOT NULL DEFAULT 0.0,
            related_entity_ids TEXT NOT NULL DEFAULT '[]',
            conversation_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            last_accessed TEXT NOT NULL,
            access_count INTEGER NOT NULL DEFAULT 0,
            archive_status TEXT NOT NULL DEFAULT 'active',
            compressed_content TEXT,
            topic TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_memories_pair_time
            ON memories(user_id, character_id, created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_memories_importance
            ON memories(importance DESC, archive_status);
        CREATE INDEX IF NOT EXISTS idx_memories_type_time
            ON memories(memory_type, created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_memories_conversation
            ON memories(conversation_id, created_at);

        CREATE TABLE IF NOT EXISTS entities (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            name TEXT NOT NULL,
            normalized_name TEXT NOT NULL,
            aliases TEXT NOT NULL DEFAULT '[]',
            attributes TEXT NOT NULL DEFAULT '{}',
            first_seen TEXT NOT NULL,
            last_seen TEXT NOT NULL,
            mention_count INTEGER NOT NULL DEFAULT 1,
            confidence REAL NOT NULL DEFAULT 0.8,
            UNIQUE(user_id, entity_type, normalized_name)
        );
        CREATE INDEX IF NOT EXISTS idx_entities_name ON entities(normalized_name);

        CREATE TABLE IF NOT EXISTS entity_edges (
            from_entity_id TEXT NOT NULL,
            relationship_type TEXT NOT NULL,
            to_entity_id TEXT NOT NULL,
            PRIMARY KEY (from_entity_id, relationship_type, to_entity_id),
            FOREIGN KEY (from_entity_id) REFERENCES entities(id) ON DELETE CASCADE,
            FOREIGN KEY (to_entity_id) REFERENCES entities(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS entity_mentions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_id TEXT NOT NULL,
            memory_id TEXT NOT NULL,
            mentioned_at TEXT NOT NULL,
            FOREIGN KEY (entity_id) REFERENCES entities(id) ON DELETE CASCADE,
            FOREIGN KEY (memory_id) REFERENCES memories(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS context_windows (
            conversation_id TEXT PRIMARY KEY,
            entity_ids TEXT NOT NULL DEFAULT '[]',
            current_topic TEXT,
            emotional_context TEXT,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS relationships (
            user_id TEXT NOT NULL,
            character_id TEXT NOT NULL,
            level REAL NOT NULL DEFAULT 0.0,
            conversations INTEGER NOT NULL DEFAULT 0,
            time_minutes REAL NOT NULL DEFAULT 0.0,
            emotional_moments INTEGER NOT NULL DEFAULT 0,
            memories_shared INTEGER NOT NULL DEFAULT 0,
            conflicts_resolved INTEGER NOT NULL DEFAULT 0,
            growth_events INTEGER NOT NULL DEFAULT 0,
            consistency_score REAL NOT NULL DEFAULT 1.0,
            authenticity_score REAL NOT NULL DEFAULT 1.0,
            last_interaction TEXT,
            created_at TEXT NOT NULL,
            PRIMARY KEY (user_id, character_id)
        );

        CREATE TABLE IF NOT EXISTS emotional_moments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            character_id TEXT NOT NULL,
            day_bucket TEXT NOT NULL,
            emotional_score REAL NOT NULL,
            authenticity_score REAL NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_emotional_moments_day
            ON emotional_moments(user_id, character_id, day_bucket);

        CREATE TABLE IF NOT EXISTS conversation_sessions (
            session_id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            character_id TEXT NOT NULL,
            started_at TEXT NOT NULL,
            last_exchange_at TEXT
        );

        CREATE TABLE IF NOT EXISTS rewards (
            user_id TEXT NOT NULL,
            character_id TEXT NOT NULL,
            rank INTEGER NOT NULL,
            awarded_at TEXT NOT NULL,
            wallet_address TEXT,
            minted INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (user_id, character_id)
        );

        INSERT INTO schema_version (version) VALUES (1);
        "#,
    )?;
    Ok(())
}

/// Adds content-hash based dedup support, following the same
/// ALTER-then-backfill-in-Rust shape used for `content_hash` columns
/// in SQLite-backed memory stores elsewhere in the ecosystem.
fn migrate_v2(conn: &Connection) -> Result<()> {
    let has_column: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM pragma_table_info('memories') WHERE name = 'content_hash'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(false);

    if !has_column {
        conn.execute_batch(
            "ALTER TABLE memories ADD COLUMN content_hash TEXT;
             CREATE INDEX IF NOT EXISTS idx_memories_content_hash ON memories(content_hash);",
        )?;

        let mut stmt = conn.prepare("SELECT id, content FROM memories WHERE content_hash IS NULL")?;
        let rows: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .filter_map(|r| r.ok())
            .collect();
        drop(stmt);

        let mut update = conn.prepare("UPDATE memories SET content_hash = ?1 WHERE id = ?2")?;
        for (id, content) in rows {
            let hash = crate::content_hash(&content);
            update.execute(rusqlite::params![hash, id])?;
        }
    }

    conn.execute("INSERT INTO schema_version (version) VALUES (2)", [])?;
    Ok(())
}

/// Adds the mood/state cache's durable backing table (spec §4.5:
/// "Persists asynchronously but must survive process restart").
fn migrate_v3(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS character_states (
            user_id TEXT NOT NULL,
            character_id TEXT NOT NULL,
            current_mood TEXT NOT NULL DEFAULT 'neutral',
            mood_intensity REAL NOT NULL DEFAULT 0.5,
            emotional_trajectory TEXT NOT NULL DEFAULT '[]',
            personality_evolution TEXT NOT NULL DEFAULT '{}',
            last_interaction TEXT,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (user_id, character_id)
        );

        INSERT INTO schema_version (version) VALUES (3);
        "#,
    )?;
    Ok(())
}

/// Adds the relationship exchange idempotency marker (spec §4.4:
/// "relationship counters update exactly once per exchange even if
/// retries occur"). Nothing to backfill — existing rows simply have no
/// prior exchange key.
fn migrate_v4(conn: &Connection) -> Result<()> {
    let has_column: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM pragma_table_info('relationships') WHERE name = 'last_exchange_key'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(false);

    if !has_column {
        conn.execute_batch("ALTER TABLE relationships ADD COLUMN last_exchange_key TEXT;")?;
    }

    conn.execute("INSERT INTO schema_version (version) VALUES (4)", [])?;
    Ok(())
}

/// The global reward registry lives in its own shared database so rank
/// uniqueness can be enforced across all pairs (spec §6).
pub fn migrate_registry_if_needed(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS rewards (
            rank INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL,
            character_id TEXT NOT NULL,
            awarded_at TEXT NOT NULL,
            wallet_address TEXT,
            minted INTEGER NOT NULL DEFAULT 0,
            UNIQUE(user_id, character_id)
        );

        INSERT OR IGNORE INTO schema_version (version) VALUES (1);
        "#,
    )?;
    Ok(())
}
