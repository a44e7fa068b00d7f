/// Free-form persona fields supplied by the character loader (spec §6:
/// "character loader contract"). The core never parses character files
/// directly — it only consumes whatever fields the loader hands back.
#[derive(Debug, Clone, Default)]
pub struct PersonaFields {
    pub description: String,
    pub tone: Option<String>,
    pub background: Option<String>,
}

/// `character_descriptor` named in spec.md §6.
#[derive(Debug, Clone)]
pub struct CharacterDescriptor {
    pub id: String,
    pub name: String,
    pub persona_fields: PersonaFields,
    pub memory_db_path: String,
    pub learning_enabled: bool,
}

/// Optional timezone/location context, when the orchestrator's caller
/// supplies it (spec §4.6: "timezone/location context if available").
#[derive(Debug, Clone, Default)]
pub struct LocaleContext {
    pub timezone: Option<String>,
    pub location: Option<String>,
}
