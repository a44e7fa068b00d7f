use charcore_prompt::LocaleContext;
use charcore_relationship::Bonuses;

#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub character_id: String,
    pub user_id: String,
    pub conversation_id: String,
    pub message: String,
    pub locale: LocaleContext,
}

/// Summary fields mirroring the `POST /chat` response shape in spec §6
/// (`{ response, character_name, relationship, mood, bonuses?,
/// clarification_required?, ambiguous_references? }`), minus the
/// transport-specific envelope (HTTP is out of scope).
#[derive(Debug, Clone)]
pub struct TurnResponse {
    pub response: String,
    pub character_name: String,
    pub relationship_level: u32,
    pub mood: String,
    pub bonuses: Option<Bonuses>,
    pub clarification_required: bool,
    pub ambiguous_references: Vec<String>,
    pub rate_limited: bool,
}
