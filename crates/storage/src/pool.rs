use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::error::{Result, StorageError};
use crate::migrations;

pub type SqlitePool = Pool<SqliteConnectionManager>;

/// The unit of isolation for memory, relationship, and mood state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pair {
    pub character_id: String,
    pub user_id: String,
}

impl Pair {
    pub fn new(character_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            character_id: character_id.into(),
            user_id: user_id.into(),
        }
    }

    fn file_stem(&self) -> String {
        format!("{}_{}_memory", self.character_id, self.user_id)
    }
}

/// One pooled connection handle per `(character_id, user_id)` pair.
///
/// Opening the same pair twice returns the same pool: the handle is
/// cached, not the data, so callers across the process share a single
/// writer-serializing pool per pair (spec §5: "the per-pair storage
/// handle is pooled — one active writer at a time, readers allowed").
pub struct PoolManager {
    data_dir: PathBuf,
    pools: DashMap<Pair, Arc<SqlitePool>>,
    pool_max_size: u32,
}

impl PoolManager {
    pub fn new(data_dir: impl AsRef<Path>, pool_max_size: u32) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            pools: DashMap::new(),
            pool_max_size,
        }
    }

    pub fn path_for(&self, pair: &Pair) -> PathBuf {
        self.data_dir.join(format!("{}.db", pair.file_stem()))
    }

    pub fn open(&self, pair: &Pair) -> Result<Arc<SqlitePool>> {
        if let Some(existing) = self.pools.get(pair) {
            return Ok(existing.clone());
        }

        std::fs::create_dir_all(&self.data_dir)
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        let path = self.path_for(pair);
        let manager = SqliteConnectionManager::file(&path).with_init(|conn| {
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        });
        let pool = Pool::builder()
            .max_size(self.pool_max_size)
            .build(manager)?;

        {
            let conn = pool.get()?;
            migrations::migrate_if_needed(&conn)
                .map_err(|_| StorageError::SchemaMigrationFailed(pair.file_stem()))?;
        }

        let pool = Arc::new(pool);
        self.pools.insert(pair.clone(), pool.clone());
        Ok(pool)
    }
}
