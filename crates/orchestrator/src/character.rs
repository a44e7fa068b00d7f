use std::collections::HashMap;

use async_trait::async_trait;
use charcore_prompt::CharacterDescriptor;

/// The character loader contract (spec §6): `load(character_id) →
/// character_descriptor`. The orchestrator never parses character files
/// directly — this is the out-of-scope collaborator seam.
#[async_trait]
pub trait CharacterLoader: Send + Sync {
    async fn load(&self, character_id: &str) -> anyhow::Result<CharacterDescriptor>;
}

/// In-memory loader backing local exercising and integration tests.
pub struct StaticCharacterLoader {
    characters: HashMap<String, CharacterDescriptor>,
}

impl StaticCharacterLoader {
    pub fn new(characters: Vec<CharacterDescriptor>) -> Self {
        Self {
            characters: characters.into_iter().map(|c| (c.id.clone(), c)).collect(),
        }
    }
}

#[async_trait]
impl CharacterLoader for StaticCharacterLoader {
    async fn load(&self, character_id: &str) -> anyhow::Result<CharacterDescriptor> {
        self.characters
            .get(character_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown character: {character_id}"))
    }
}
