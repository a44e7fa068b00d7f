use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};

use crate::error::Result;
use crate::migrations::migrate_registry_if_needed;
use crate::model::RewardRow;

/// Shared, cross-pair registry enforcing global reward-rank uniqueness
/// (spec §6: "Reward rank uniqueness is enforced by a global uniqueness
/// constraint"). See DESIGN.md's Open Question decisions for why this
/// lives outside any single pair's database.
pub struct RewardRegistry {
    pool: Pool<SqliteConnectionManager>,
}

impl RewardRegistry {
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let dir: PathBuf = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| crate::StorageError::Unavailable(e.to_string()))?;
        let manager = SqliteConnectionManager::file(dir.join("registry.db"))
            .with_init(|conn| conn.execute_batch("PRAGMA journal_mode=WAL;"));
        let pool = Pool::builder().max_size(2).build(manager)?;
        {
            let conn = pool.get()?;
            migrate_registry_if_needed(&conn)?;
        }
        Ok(Self { pool })
    }

    /// Allocates the next rank for `(user_id, character_id)` atomically,
    /// unless a reward already exists for the pair or the global cap has
    /// been reached. Returns `None` when no reward should be minted.
    pub fn try_award(
        &self,
        user_id: &str,
        character_id: &str,
        cap: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<RewardRow>> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT rank FROM rewards WHERE user_id = ?1 AND character_id = ?2",
                params![user_id, character_id],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            tx.rollback()?;
            return Ok(None);
        }

        let current_count: i64 = tx.query_row("SELECT COUNT(*) FROM rewards", [], |row| row.get(0))?;
        if current_count >= cap as i64 {
            tx.rollback()?;
            return Ok(None);
        }

        let next_rank: i64 = tx.query_row(
            "SELECT COALESCE(MAX(rank), 0) + 1 FROM rewards",
            [],
            |row| row.get(0),
        )?;

        tx.execute(
            "INSERT INTO rewards (rank, user_id, character_id, awarded_at, minted) VALUES (?1, ?2, ?3, ?4, 0)",
            params![next_rank, user_id, character_id, now.to_rfc3339()],
        )?;
        tx.commit()?;

        Ok(Some(RewardRow {
            user_id: user_id.to_string(),
            character_id: character_id.to_string(),
            rank: next_rank,
            awarded_at: now,
            wallet_address: None,
            minted: false,
        }))
    }

    pub fn reward_for(&self, user_id: &str, character_id: &str) -> Result<Option<RewardRow>> {
        let conn = self.pool.get()?;
        conn.query_row(
            "SELECT rank, user_id, character_id, awarded_at, wallet_address, minted FROM rewards
             WHERE user_id = ?1 AND character_id = ?2",
            params![user_id, character_id],
            row_to_reward,
        )
        .optional()
        .map_err(crate::StorageError::from)
    }

    pub fn leaderboard(&self, limit: usize) -> Result<Vec<RewardRow>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT rank, user_id, character_id, awarded_at, wallet_address, minted
             FROM rewards ORDER BY rank ASC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], row_to_reward)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    pub fn set_wallet(&self, user_id: &str, character_id: &str, wallet_address: &str) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE rewards SET wallet_address = ?1 WHERE user_id = ?2 AND character_id = ?3",
            params![wallet_address, user_id, character_id],
        )?;
        Ok(())
    }

    pub fn awarded_count(&self) -> Result<i64> {
        let conn = self.pool.get()?;
        conn.query_row("SELECT COUNT(*) FROM rewards", [], |row| row.get(0))
            .map_err(crate::StorageError::from)
    }
}

fn row_to_reward(row: &rusqlite::Row) -> rusqlite::Result<RewardRow> {
    let awarded_at: String = row.get(3)?;
    Ok(RewardRow {
        rank: row.get(0)?,
        user_id: row.get(1)?,
        character_id: row.get(2)?,
        awarded_at: DateTime::parse_from_rfc3339(&awarded_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        wallet_address: row.get(4)?,
        minted: row.get::<_, i64>(5)? != 0,
    })
}
