use chrono::Utc;
use charcore_storage::{CharacterStateRow, PairStore};
use tokio::sync::Mutex;
use tracing::{instrument, warn};

use crate::types::{CharacterState, EmotionalEvent, MoodSnapshot};

/// Bound on `emotional_trajectory`: oldest entries drop off the front
/// once the cache grows past this (spec §4.5: "capped emotional trajectory").
const MAX_TRAJECTORY: usize = 20;

/// Exponential-smoothing weight applied to a fresh emotion reading; the
/// user's own stated emotion moves the mood further than the character's
/// reply does, since the user is the one whose feelings the mood tracks.
const USER_EMOTION_WEIGHT: f32 = 0.6;
const CHAR_EMOTION_WEIGHT: f32 = 0.3;

/// Per-pair mood cache with write-behind persistence (spec §4.5:
/// "Persists asynchronously but must survive process restart; readers
/// tolerate a slightly stale value").
pub struct MoodEngine {
    store: PairStore,
    state: Mutex<CharacterState>,
}

impl MoodEngine {
    /// Loads existing state from storage, or seeds a default one — never
    /// blocks on a background task, since this runs once at pair open.
    pub fn load(store: PairStore, character_id: &str, user_id: &str) -> anyhow::Result<Self> {
        let now = Utc::now();
        let state = match store.get_character_state()? {
            Some(row) => from_row(row),
            None => CharacterState::default_for(character_id, user_id, now),
        };
        Ok(Self {
            store,
            state: Mutex::new(state),
        })
    }

    #[instrument(skip(self))]
    pub async fn update_user_emotion(&self, label: &str, intensity: f32) {
        self.apply_update(label, intensity, USER_EMOTION_WEIGHT).await;
    }

    #[instrument(skip(self))]
    pub async fn update_char_emotion(&self, label: &str, intensity: f32) {
        self.apply_update(label, intensity, CHAR_EMOTION_WEIGHT).await;
    }

    async fn apply_update(&self, label: &str, intensity: f32, weight: f32) {
        let now = Utc::now();
        let mut guard = self.state.lock().await;
        guard.current_mood = label.to_string();
        guard.mood_intensity = (guard.mood_intensity * (1.0 - weight) + intensity * weight).clamp(0.0, 1.0);
        guard.emotional_trajectory.push(EmotionalEvent {
            label: label.to_string(),
            intensity,
            at: now,
        });
        if guard.emotional_trajectory.len() > MAX_TRAJECTORY {
            let overflow = guard.emotional_trajectory.len() - MAX_TRAJECTORY;
            guard.emotional_trajectory.drain(0..overflow);
        }
        guard.last_interaction = Some(now);
        guard.updated_at = now;

        let row = to_row(&guard);
        drop(guard);
        self.persist_write_behind(row);
    }

    /// Spawns the durable write off the turn's critical path; a failure
    /// here only risks losing the most recent mood tick on crash, never
    /// the in-memory read the caller already has.
    fn persist_write_behind(&self, row: CharacterStateRow) {
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::task::spawn_blocking(move || store.upsert_character_state(&row)).await {
                warn!(?err, "mood state persistence task panicked");
            }
        });
    }

    pub async fn snapshot(&self) -> MoodSnapshot {
        let guard = self.state.lock().await;
        MoodSnapshot {
            current_mood: guard.current_mood.clone(),
            mood_intensity: guard.mood_intensity,
            recent_trajectory: guard.emotional_trajectory.clone(),
        }
    }

    /// Forces the in-memory state to disk synchronously — used on clean
    /// shutdown so the next process start doesn't rely on the
    /// write-behind task having won the race against exit.
    pub fn flush_blocking(&self) -> anyhow::Result<()> {
        let guard = self.state.blocking_lock();
        self.store.upsert_character_state(&to_row(&guard))?;
        Ok(())
    }
}

fn to_row(state: &CharacterState) -> CharacterStateRow {
    CharacterStateRow {
        user_id: state.user_id.clone(),
        character_id: state.character_id.clone(),
        current_mood: state.current_mood.clone(),
        mood_intensity: state.mood_intensity,
        emotional_trajectory: state
            .emotional_trajectory
            .iter()
            .map(|e| (e.label.clone(), e.intensity))
            .collect(),
        personality_evolution: state.personality_evolution.clone(),
        last_interaction: state.last_interaction,
        updated_at: state.updated_at,
    }
}

fn from_row(row: CharacterStateRow) -> CharacterState {
    CharacterState {
        character_id: row.character_id,
        user_id: row.user_id,
        current_mood: row.current_mood,
        mood_intensity: row.mood_intensity,
        emotional_trajectory: row
            .emotional_trajectory
            .into_iter()
            .map(|(label, intensity)| EmotionalEvent {
                label,
                intensity,
                at: row.updated_at,
            })
            .collect(),
        personality_evolution: row.personality_evolution,
        last_interaction: row.last_interaction,
        updated_at: row.updated_at,
    }
}
