use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory under which `{character_id}_{user_id}_memory.db` files live.
    pub data_dir: String,
    pub pool_max_size: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "memories".to_string(),
            pool_max_size: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub buffer_window_size: usize,
    pub summary_threshold: usize,
    pub archive_after_days: i64,
    pub archive_importance_below: f32,
    pub compress_after_days: i64,
    pub compress_min_chars: usize,
    pub compression_head_chars: usize,
    pub compression_tail_chars: usize,
    pub retention_days: i64,
    pub context_window_entities: usize,
    pub context_cache_capacity: usize,
    pub context_cache_ttl_secs: u64,
    pub maintenance_every_n_ingests: u64,
    pub personal_details_rescan_interval: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            buffer_window_size: 50,
            summary_threshold: 100,
            archive_after_days: 90,
            archive_importance_below: 0.6,
            compress_after_days: 60,
            compress_min_chars: 200,
            compression_head_chars: 100,
            compression_tail_chars: 50,
            retention_days: 365,
            context_window_entities: 10,
            context_cache_capacity: 50,
            context_cache_ttl_secs: 300,
            maintenance_every_n_ingests: 100,
            personal_details_rescan_interval: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipConfig {
    pub min_inter_turn_interval_secs: f64,
    pub daily_emotional_moment_cap: u32,
    pub reward_cap: u32,
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self {
            min_inter_turn_interval_secs: 60.0,
            daily_emotional_moment_cap: 10,
            reward_cap: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub turn_timeout_ms: u64,
    pub llm_timeout_ms: u64,
    pub cancellation_grace_ms: u64,
    pub pending_queue_depth: usize,
    pub prompt_max_chars: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            turn_timeout_ms: 2_500,
            llm_timeout_ms: 2_000,
            cancellation_grace_ms: 500,
            pending_queue_depth: 1,
            prompt_max_chars: 8_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub memory: MemoryConfig,
    pub relationship: RelationshipConfig,
    pub orchestrator: OrchestratorConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    /// A handful of knobs are commonly overridden per-deployment without
    /// touching the checked-in TOML (test suites in particular want a
    /// 1s inter-turn interval instead of the 60s production default).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("CHARCORE_MIN_INTER_TURN_SECS") {
            if let Ok(secs) = val.parse() {
                self.relationship.min_inter_turn_interval_secs = secs;
            }
        }
        if let Ok(val) = env::var("CHARCORE_TURN_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                self.orchestrator.turn_timeout_ms = ms;
            }
        }
        if let Ok(val) = env::var("CHARCORE_DATA_DIR") {
            if !val.is_empty() {
                self.storage.data_dir = val;
            }
        }
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::from_millis(self.orchestrator.turn_timeout_ms)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_millis(self.orchestrator.llm_timeout_ms)
    }

    pub fn cancellation_grace(&self) -> Duration {
        Duration::from_millis(self.orchestrator.cancellation_grace_ms)
    }

    pub fn min_inter_turn_interval(&self) -> Duration {
        Duration::from_secs_f64(self.relationship.min_inter_turn_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_knobs() {
        let config = AppConfig::default();
        assert_eq!(config.memory.buffer_window_size, 50);
        assert_eq!(config.memory.summary_threshold, 100);
        assert_eq!(config.relationship.reward_cap, 100);
        assert_eq!(config.orchestrator.pending_queue_depth, 1);
    }

    #[test]
    fn round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.memory.buffer_window_size = 75;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.memory.buffer_window_size, 75);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from("/nonexistent/path/config.toml").unwrap();
        assert_eq!(config.memory.buffer_window_size, 50);
    }

    #[test]
    fn env_override_changes_inter_turn_interval() {
        unsafe {
            env::set_var("CHARCORE_MIN_INTER_TURN_SECS", "1.0");
        }
        let config = AppConfig::load_from("/nonexistent/path/config.toml").unwrap();
        assert_eq!(config.relationship.min_inter_turn_interval_secs, 1.0);
        unsafe {
            env::remove_var("CHARCORE_MIN_INTER_TURN_SECS");
        }
    }
}
