pub mod app;

pub use app::Charcore;
pub use charcore_orchestrator::CharacterLoader;

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use charcore_config::AppConfig;
    use charcore_llm::LlmError;
    use charcore_orchestrator::{StaticCharacterLoader, TurnRequest};
    use charcore_prompt::{CharacterDescriptor, LocaleContext, PersonaFields};

    use super::*;

    struct EchoProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl charcore_llm::LlmProvider for EchoProvider {
        async fn generate(&self, _prompt: &str, _user_id: &str, _deadline: Duration) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("Hi there, lovely to meet you.".to_string())
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

    fn charcore(dir: &std::path::Path, min_inter_turn_secs: f64) -> Charcore {
        let mut config = AppConfig::default();
        config.storage.data_dir = dir.to_string_lossy().to_string();
        config.relationship.min_inter_turn_interval_secs = min_inter_turn_secs;
        let loader = Arc::new(StaticCharacterLoader::new(vec![luna()]));
        let provider = Arc::new(EchoProvider { calls: AtomicUsize::new(0) });
        Charcore::new(config, loader, provider).unwrap()
    }

    fn request(user_id: &str, message: &str) -> TurnRequest {
        TurnRequest {
            character_id: "luna".to_string(),
            user_id: user_id.to_string(),
            conversation_id: "conv-1".to_string(),
            message: message.to_string(),
            locale: LocaleContext::default(),
        }
    }

    /// Scenario 1 (spec §8): first contact against empty state.
    #[tokio::test]
    async fn first_contact_greets_and_records_entities_and_personal_details() {
        let dir = tempfile::tempdir().unwrap();
        let app = charcore(dir.path(), 0.0);

        let response = app.process_turn(request("alex", "Hi, I'm Alex, 31, I live in Berlin.")).await.unwrap();
        assert!(!response.response.is_empty());
        assert!(!response.clarification_required);
        assert_eq!(response.relationship_level, 0);
        assert!(response.bonuses.is_some());

        let pools = charcore_storage::PoolManager::new(dir.path(), 2);
        let pair = charcore_storage::Pair::new("luna", "alex");
        let pool = pools.open(&pair).unwrap();
        let store = charcore_storage::PairStore::new(pair, pool);
        assert!(store.find_entity("place", "berlin").unwrap().is_some());

        let memory = charcore_memory::MemoryEngine::new(store, AppConfig::default().memory);
        let details = memory.personal_details().unwrap();
        assert_eq!(details.name.as_deref(), Some("Alex"));
        assert_eq!(details.age.as_deref(), Some("31"));
        assert_eq!(details.location.as_deref(), Some("Berlin"));
    }

    /// Scenario 2 (spec §8): family introduction carries into the next turn's context.
    #[tokio::test]
    async fn family_introduction_is_remembered_in_the_next_turn() {
        let dir = tempfile::tempdir().unwrap();
        let app = charcore(dir.path(), 0.0);

        let first = app
            .process_turn(request("alex", "My sister Eloise lives in Brighton with her partner Claire."))
            .await
            .unwrap();
        assert!(first.bonuses.as_ref().unwrap().memories >= 1);

        let pools = charcore_storage::PoolManager::new(dir.path(), 2);
        let pair = charcore_storage::Pair::new("luna", "alex");
        let pool = pools.open(&pair).unwrap();
        let store = charcore_storage::PairStore::new(pair, pool);
        assert!(store.find_entity("person", "eloise").unwrap().is_some());
        assert!(store.find_entity("place", "brighton").unwrap().is_some());
        assert!(store.find_entity("person", "claire").unwrap().is_some());
    }

    /// Scenario 3 (spec §8): an ambiguous pronoun after two candidates
    /// skips the LLM call entirely and surfaces the ambiguity.
    #[tokio::test]
    async fn ambiguous_pronoun_after_two_people_requires_clarification() {
        let dir = tempfile::tempdir().unwrap();
        let app = charcore(dir.path(), 0.0);

        app.process_turn(request("alex", "My sister Eloise and my friend Claire came over."))
            .await
            .unwrap();
        let response = app.process_turn(request("alex", "How is she doing?")).await.unwrap();

        assert!(response.clarification_required);
        assert_eq!(response.ambiguous_references, vec!["she".to_string()]);
    }

    /// Scenario 4 (spec §8): two rapid-fire exchanges for the same pair.
    #[tokio::test]
    async fn rapid_fire_exchange_is_rate_limited_without_mutating_state() {
        let dir = tempfile::tempdir().unwrap();
        let app = charcore(dir.path(), 60.0);

        let first = app.process_turn(request("alex", "Good morning!")).await.unwrap();
        assert!(!first.rate_limited);

        let second = app.process_turn(request("alex", "Good morning again!")).await.unwrap();
        assert!(second.rate_limited);
        assert_eq!(second.relationship_level, first.relationship_level);
    }
}
