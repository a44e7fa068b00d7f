use std::sync::Arc;

use charcore_config::AppConfig;
use charcore_llm::LlmProvider;
use charcore_orchestrator::{CharacterLoader, Orchestrator, OrchestratorError, TurnRequest, TurnResponse};

/// Top-level wiring (spec §9: "wire by construction; no runtime
/// monkey-patching"). The only two things a caller supplies are the
/// character loader and the LLM provider — both out-of-scope
/// collaborators per spec §6; everything else is built from `AppConfig`.
pub struct Charcore {
    orchestrator: Orchestrator,
}

impl Charcore {
    pub fn new(
        config: AppConfig,
        character_loader: Arc<dyn CharacterLoader>,
        llm_provider: Arc<dyn LlmProvider>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            orchestrator: Orchestrator::new(config, character_loader, llm_provider)?,
        })
    }

    pub async fn process_turn(&self, request: TurnRequest) -> Result<TurnResponse, OrchestratorError> {
        self.orchestrator.process_turn(request).await
    }
}
