use std::sync::Arc;
use std::time::{Duration, Instant};

use charcore_config::AppConfig;
use charcore_memory::ContextQuery;
use charcore_memory::sentiment::{infer_valence, label_for};
use charcore_prompt::assemble_prompt;
use charcore_storage::{Pair, PoolManager, RewardRegistry};
use chrono::Utc;
use tracing::{instrument, warn};

use crate::character::CharacterLoader;
use crate::error::OrchestratorError;
use crate::pair_context::{relationship_update, PairContextCache};
use crate::registry::PairGuards;
use crate::types::{TurnRequest, TurnResponse};

const TIMEOUT_APOLOGY: &str =
    "Sorry, that took longer than I expected — can you say that again?";

/// Wires the six engines behind one turn pipeline: `Start → Preflight →
/// (MoodUpdate ∥ EntityExtract) → Retrieve → AmbiguityCheck →
/// (Clarify | LLMCall) → Analyze → Persist → Reply` (spec §4.6, §9). The
/// orchestrator holds no character data itself — everything about a
/// character comes from `CharacterLoader`, and everything about the LLM
/// comes from the provider behind `LlmRouter`.
pub struct Orchestrator {
    config: AppConfig,
    contexts: PairContextCache,
    reward_registry: Arc<RewardRegistry>,
    guards: PairGuards,
    llm: charcore_llm::LlmRouter,
    character_loader: Arc<dyn CharacterLoader>,
}

impl Orchestrator {
    pub fn new(
        config: AppConfig,
        character_loader: Arc<dyn CharacterLoader>,
        llm_provider: Arc<dyn charcore_llm::LlmProvider>,
    ) -> anyhow::Result<Self> {
        let pools = Arc::new(PoolManager::new(&config.storage.data_dir, config.storage.pool_max_size));
        let reward_registry = Arc::new(RewardRegistry::open(&config.storage.data_dir)?);
        let guards = PairGuards::new(config.orchestrator.pending_queue_depth);
        let llm = charcore_llm::LlmRouter::new(llm_provider);
        let contexts = PairContextCache::new(pools, config.clone());

        Ok(Self {
            config,
            contexts,
            reward_registry,
            guards,
            llm,
            character_loader,
        })
    }

    #[instrument(skip(self, request), fields(character = %request.character_id, user = %request.user_id))]
    pub async fn process_turn(&self, request: TurnRequest) -> Result<TurnResponse, OrchestratorError> {
        let start = Instant::now();
        let pair = Pair::new(request.character_id.clone(), request.user_id.clone());

        // Preflight: reject immediately if this pair already has a turn in
        // flight (spec §5: bounded pending-turn queue, "busy" rejection).
        let _permit = self.guards.try_acquire(&pair).ok_or(OrchestratorError::Busy)?;

        let descriptor = self.character_loader.load(&request.character_id).await?;
        let ctx = self.contexts.open(&pair)?;

        // Rate limit: same gate `update_relationship` applies later, checked
        // here so a too-frequent turn short-circuits before doing any work
        // and leaves state untouched, per spec §4.4's "reject without
        // mutation" contract.
        if let Some(row) = ctx.store.get_relationship()? {
            if let Some(last) = row.last_interaction {
                let elapsed = (Utc::now() - last).to_std().unwrap_or_default();
                if elapsed < self.config.min_inter_turn_interval() {
                    let mood = ctx.mood.snapshot().await;
                    return Ok(TurnResponse {
                        response: String::new(),
                        character_name: descriptor.name,
                        relationship_level: row.level as u32,
                        mood: mood.current_mood,
                        bonuses: None,
                        clarification_required: false,
                        ambiguous_references: Vec::new(),
                        rate_limited: true,
                    });
                }
            }
        }

        // Persisting the user's message happens outside the deadline below
        // so it survives even if the rest of the turn times out (spec
        // §4.6's "best-effort grace-period persistence on cancellation" —
        // guaranteed trivially here rather than raced against the clock).
        if let Err(err) = ctx.memory.ingest_message(&request.user_id, &request.character_id, &request.conversation_id, &request.message) {
            warn!(?err, "failed to persist user message, continuing with in-memory state only");
        }

        let result = tokio::time::timeout(self.config.turn_timeout(), self.run_body(&request, &ctx, &descriptor, start)).await;

        match result {
            Ok(inner) => inner,
            Err(_) => {
                warn!("turn deadline exceeded, returning apology");
                let mood = ctx.mood.snapshot().await;
                Ok(TurnResponse {
                    response: TIMEOUT_APOLOGY.to_string(),
                    character_name: descriptor.name,
                    relationship_level: ctx.store.get_relationship()?.map(|r| r.level as u32).unwrap_or(0),
                    mood: mood.current_mood,
                    bonuses: None,
                    clarification_required: false,
                    ambiguous_references: Vec::new(),
                    rate_limited: false,
                })
            }
        }
    }

    async fn run_body(
        &self,
        request: &TurnRequest,
        ctx: &crate::pair_context::PairContext,
        descriptor: &charcore_prompt::CharacterDescriptor,
        start: Instant,
    ) -> Result<TurnResponse, OrchestratorError> {
        // MoodUpdate ∥ EntityExtract: the user's felt state and the
        // mention/pronoun pipeline don't depend on each other, so they run
        // concurrently (spec §4.6 step diagram).
        let user_valence = infer_valence(&request.message);
        let mood_task = ctx.mood.update_user_emotion(label_for(user_valence), user_valence.abs().max(0.05));

        let store_for_entities = ctx.store.clone();
        let user_id = request.user_id.clone();
        let message = request.message.clone();
        let conversation_id = request.conversation_id.clone();
        let entity_task = tokio::task::spawn_blocking(move || {
            charcore_entity::process_message(&store_for_entities, &user_id, &message, &conversation_id)
        });

        let (_, entity_joined) = tokio::join!(mood_task, entity_task);
        let extraction = match entity_joined {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                warn!(?err, "entity extraction failed, continuing without entity context");
                charcore_entity::ExtractionOutcome { entities: Vec::new(), resolutions: Vec::new(), ambiguous: Vec::new() }
            }
            Err(join_err) => {
                warn!(?join_err, "entity extraction task panicked");
                charcore_entity::ExtractionOutcome { entities: Vec::new(), resolutions: Vec::new(), ambiguous: Vec::new() }
            }
        };

        if !extraction.ambiguous.is_empty() {
            return self.clarify(request, ctx, descriptor, &extraction).await;
        }

        // Retrieve.
        let query = ContextQuery {
            character_id: &request.character_id,
            user_id: &request.user_id,
            conversation_id: &request.conversation_id,
            semantic_query: Some(&request.message),
            max_memories: self.config.memory.context_window_entities,
            min_importance: 0.0,
            include_emotional: true,
        };
        let bundle = ctx.memory.get_context(&query);
        let preface = ctx.memory.personal_details_preface().unwrap_or(None);
        let mood_snapshot = ctx.mood.snapshot().await;

        let prompt = assemble_prompt(
            descriptor,
            &bundle,
            preface.as_deref(),
            &mood_snapshot,
            &request.locale,
            &request.message,
            self.config.orchestrator.prompt_max_chars,
        );

        let response = self
            .llm
            .generate_with_fallback(&prompt, &request.message, &request.user_id, self.config.llm_timeout())
            .await;

        // Analyze: the character's own emotional tone feeds the mood cache
        // at a lower weight than the user's (spec §4.5).
        let response_valence = infer_valence(&response);
        ctx.mood.update_char_emotion(label_for(response_valence), response_valence.abs().max(0.05)).await;

        let duration_minutes = start.elapsed().as_secs_f64() / 60.0;
        let outcome = relationship_update(
            ctx,
            &self.reward_registry,
            &self.config,
            &request.user_id,
            &request.character_id,
            &request.message,
            &response,
            duration_minutes,
            Utc::now(),
        )?;

        if let Err(err) = ctx.memory.ingest_message(&request.user_id, &request.character_id, &request.conversation_id, &response) {
            warn!(?err, "failed to persist character response");
        }

        let mood_after = ctx.mood.snapshot().await;
        Ok(TurnResponse {
            response,
            character_name: descriptor.name.clone(),
            relationship_level: outcome.new_level,
            mood: mood_after.current_mood,
            bonuses: Some(outcome.bonuses),
            clarification_required: false,
            ambiguous_references: Vec::new(),
            rate_limited: false,
        })
    }

    /// Ambiguity branch: no LLM call, no relationship advance beyond a
    /// minimal acknowledgment (spec §4.2 "ambiguous pronoun" scenario).
    async fn clarify(
        &self,
        request: &TurnRequest,
        ctx: &crate::pair_context::PairContext,
        descriptor: &charcore_prompt::CharacterDescriptor,
        extraction: &charcore_entity::ExtractionOutcome,
    ) -> Result<TurnResponse, OrchestratorError> {
        let references: Vec<String> = extraction.ambiguous.iter().map(|a| a.pronoun.clone()).collect();
        let question = if references.len() == 1 {
            format!("Just to make sure I follow — who do you mean by \"{}\"?", references[0])
        } else {
            format!(
                "I want to make sure I follow — who do you mean by {}?",
                references.iter().map(|r| format!("\"{r}\"")).collect::<Vec<_>>().join(" and ")
            )
        };

        let relationship_level = ctx.store.get_relationship()?.map(|r| r.level as u32).unwrap_or(0);
        let mood = ctx.mood.snapshot().await;

        Ok(TurnResponse {
            response: question,
            character_name: descriptor.name.clone(),
            relationship_level,
            mood: mood.current_mood,
            bonuses: None,
            clarification_required: true,
            ambiguous_references: references,
            rate_limited: false,
        })
    }

    #[cfg(test)]
    pub(crate) fn config(&self) -> &AppConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use charcore_llm::LlmError;
    use charcore_prompt::{CharacterDescriptor, LocaleContext, PersonaFields};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl charcore_llm::LlmProvider for EchoProvider {
        async fn generate(&self, prompt: &str, _user_id: &str, _deadline: Duration) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("Luna says: {prompt}"))
        }
    }

    fn luna() -> CharacterDescriptor {
        CharacterDescriptor {
            id: "luna".to_string(),
            name: "Luna".to_string(),
            persona_fields: PersonaFields {
                description: "a warm, curious companion".to_string(),
                tone: Some("gentle".to_string()),
                background: None,
            },
            memory_db_path: String::new(),
            learning_enabled: true,
        }
    }

    fn orchestrator(dir: &std::path::Path) -> Orchestrator {
        let mut config = AppConfig::default();
        config.storage.data_dir = dir.to_string_lossy().to_string();
        config.relationship.min_inter_turn_interval_secs = 0.0;
        let loader = Arc::new(crate::character::StaticCharacterLoader::new(vec![luna()]));
        let provider = Arc::new(EchoProvider { calls: AtomicUsize::new(0) });
        Orchestrator::new(config, loader, provider).unwrap()
    }

    fn request(message: &str) -> TurnRequest {
        TurnRequest {
            character_id: "luna".to_string(),
            user_id: "alex".to_string(),
            conversation_id: "conv-1".to_string(),
            message: message.to_string(),
            locale: LocaleContext::default(),
        }
    }

    #[tokio::test]
    async fn first_contact_turn_returns_a_reply_and_advances_relationship() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());

        let response = orch.process_turn(request("Hi, I'm Alex, nice to meet you.")).await.unwrap();
        assert!(!response.clarification_required);
        assert!(response.response.contains("Luna says"));
        assert_eq!(response.character_name, "Luna");
        assert!(response.bonuses.is_some());
    }

    #[tokio::test]
    async fn ambiguous_pronoun_triggers_clarification_without_llm_call() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());

        orch.process_turn(request("My sister Maria and my friend Sofia are visiting.")).await.unwrap();
        let response = orch.process_turn(request("Is she coming for dinner?")).await.unwrap();

        assert!(response.clarification_required);
        assert!(!response.ambiguous_references.is_empty());
        assert!(response.response.contains('?'));
    }

    #[tokio::test]
    async fn concurrent_turn_for_same_pair_is_rejected_as_busy() {
        let dir = tempfile::tempdir().unwrap();
        let orch = Arc::new(orchestrator(dir.path()));

        let guard = orch.guards.try_acquire(&Pair::new("luna", "alex"));
        assert!(guard.is_some());

        let result = orch.process_turn(request("hello again")).await;
        assert!(matches!(result, Err(OrchestratorError::Busy)));
    }

    #[tokio::test]
    async fn second_turn_inside_the_rate_limit_window_is_flagged_and_leaves_state_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.storage.data_dir = dir.path().to_string_lossy().to_string();
        config.relationship.min_inter_turn_interval_secs = 60.0;
        let loader = Arc::new(crate::character::StaticCharacterLoader::new(vec![luna()]));
        let provider = Arc::new(EchoProvider { calls: AtomicUsize::new(0) });
        let orch = Orchestrator::new(config, loader, provider).unwrap();

        let first = orch.process_turn(request("hello")).await.unwrap();
        assert!(!first.rate_limited);

        let second = orch.process_turn(request("hello again")).await.unwrap();
        assert!(second.rate_limited);
        assert_eq!(second.relationship_level, first.relationship_level);
    }
}
