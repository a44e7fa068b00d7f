use charcore_memory::types::ContextBundle;
use charcore_mood::MoodSnapshot;

use crate::types::{CharacterDescriptor, LocaleContext};

/// Keywords that trigger the historical/biographical block even for a
/// character whose persona doesn't always surface it (spec §4.6: "only
/// when triggered by character type or message content").
const BIOGRAPHICAL_TRIGGERS: &[&str] = &[
    "who are you",
    "tell me about yourself",
    "your past",
    "your story",
    "where are you from",
    "your childhood",
];

fn triggers_biography(user_message: &str) -> bool {
    let lower = user_message.to_lowercase();
    BIOGRAPHICAL_TRIGGERS.iter().any(|t| lower.contains(t))
}

fn persona_block(descriptor: &CharacterDescriptor) -> String {
    let mut block = format!("You are {}. {}", descriptor.name, descriptor.persona_fields.description);
    if let Some(tone) = &descriptor.persona_fields.tone {
        block.push_str(&format!("\nTone: {tone}."));
    }
    block
}

fn biography_block(descriptor: &CharacterDescriptor, user_message: &str) -> Option<String> {
    let background = descriptor.persona_fields.background.as_ref()?;
    if background.trim().is_empty() {
        return None;
    }
    if triggers_biography(user_message) {
        Some(format!("BACKGROUND:\n{background}"))
    } else {
        None
    }
}

fn personal_details_block(preface: Option<&str>) -> Option<String> {
    preface.map(|p| p.to_string()).filter(|p| !p.is_empty())
}

fn memory_context_block(bundle: &ContextBundle) -> String {
    let mut lines = Vec::new();

    if !bundle.important.is_empty() {
        lines.push("IMPORTANT MEMORIES:".to_string());
        for row in &bundle.important {
            lines.push(format!("- {}", truncate(&row.content, 200)));
        }
    }

    if !bundle.recent.is_empty() {
        lines.push("RECENT CONTEXT:".to_string());
        for row in &bundle.recent {
            lines.push(format!("- {}", truncate(&row.content, 200)));
        }
    }

    if let Some(summary) = &bundle.summary_context {
        lines.push(format!("SUMMARY:\n{summary}"));
    }

    if !bundle.topic.primary.is_empty() {
        lines.push(format!("Current topic: {}", bundle.topic.primary));
    }

    if lines.is_empty() {
        "(no relevant memories retrieved)".to_string()
    } else {
        lines.join("\n")
    }
}

fn mood_line(mood: &MoodSnapshot) -> String {
    format!("Your current mood: {} (intensity {:.2}).", mood.current_mood, mood.mood_intensity)
}

fn locale_line(locale: &LocaleContext) -> Option<String> {
    if locale.timezone.is_none() && locale.location.is_none() {
        return None;
    }
    let mut parts = Vec::new();
    if let Some(tz) = &locale.timezone {
        parts.push(format!("timezone {tz}"));
    }
    if let Some(loc) = &locale.location {
        parts.push(format!("location {loc}"));
    }
    Some(format!("User context: {}.", parts.join(", ")))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{head}…")
    }
}

/// Assembles the full prompt sent to the LLM provider (spec §4.6 "Prompt
/// assembly (C7)"), in order: persona, biographical context (if
/// triggered), personal-details preface, memory context, mood line,
/// locale context, separator, raw user message. Bounded by `max_chars`;
/// when over budget, the oldest recent-memory lines are dropped first
/// since they're the least likely to still be relevant.
pub fn assemble_prompt(
    descriptor: &CharacterDescriptor,
    bundle: &ContextBundle,
    personal_preface: Option<&str>,
    mood: &MoodSnapshot,
    locale: &LocaleContext,
    user_message: &str,
    max_chars: usize,
) -> String {
    let mut sections = vec![persona_block(descriptor)];
    if let Some(bio) = biography_block(descriptor, user_message) {
        sections.push(bio);
    }
    if let Some(details) = personal_details_block(personal_preface) {
        sections.push(details);
    }
    sections.push(memory_context_block(bundle));
    sections.push(mood_line(mood));
    if let Some(locale_line) = locale_line(locale) {
        sections.push(locale_line);
    }

    let mut prompt = format!("{}\n\n---\n{}", sections.join("\n\n"), user_message);

    while prompt.chars().count() > max_chars && !bundle.recent.is_empty() {
        let mut trimmed_bundle = bundle.clone();
        trimmed_bundle.recent.pop();
        let mut trimmed_sections = vec![persona_block(descriptor)];
        if let Some(bio) = biography_block(descriptor, user_message) {
            trimmed_sections.push(bio);
        }
        if let Some(details) = personal_details_block(personal_preface) {
            trimmed_sections.push(details);
        }
        trimmed_sections.push(memory_context_block(&trimmed_bundle));
        trimmed_sections.push(mood_line(mood));
        if let Some(locale_line) = locale_line(locale) {
            trimmed_sections.push(locale_line);
        }
        prompt = format!("{}\n\n---\n{}", trimmed_sections.join("\n\n"), user_message);
        if trimmed_bundle.recent.is_empty() {
            break;
        }
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PersonaFields;
    use charcore_memory::types::{MemoryStats, ProfileInsights, TopicDistribution};
    use charcore_storage::MemoryRow;
    use chrono::Utc;

    fn descriptor() -> CharacterDescriptor {
        CharacterDescriptor {
            id: "luna".to_string(),
            name: "Luna".to_string(),
            persona_fields: PersonaFields {
                description: "a warm, curious companion".to_string(),
                tone: Some("gentle".to_string()),
                background: Some("Grew up near the coast.".to_string()),
            },
            memory_db_path: "memories/luna_alex_memory.db".to_string(),
            learning_enabled: true,
        }
    }

    fn sample_row(content: &str) -> MemoryRow {
        let now = Utc::now();
        MemoryRow {
            id: "mem_1".to_string(),
            character_id: "luna".to_string(),
            user_id: "alex".to_string(),
            content: content.to_string(),
            memory_type: "buffer".to_string(),
            importance: 0.5,
            emotional_valence: 0.0,
            relationship_impact: 0.0,
            related_entity_ids: vec![],
            conversation_id: "conv-1".to_string(),
            created_at: now,
            last_accessed: now,
            access_count: 0,
            archive_status: "active".to_string(),
            compressed_content: None,
            topic: None,
        }
    }

    #[test]
    fn biography_only_appears_when_triggered() {
        let d = descriptor();
        let bundle = ContextBundle {
            topic: TopicDistribution { primary: "general".to_string(), ..Default::default() },
            stats: MemoryStats::default(),
            profile_insights: ProfileInsights::default(),
            ..Default::default()
        };
        let mood = MoodSnapshot { current_mood: "neutral".to_string(), mood_intensity: 0.5, recent_trajectory: vec![] };
        let locale = LocaleContext::default();

        let untriggered = assemble_prompt(&d, &bundle, None, &mood, &locale, "hi there", 4000);
        assert!(!untriggered.contains("BACKGROUND"));

        let triggered = assemble_prompt(&d, &bundle, None, &mood, &locale, "who are you?", 4000);
        assert!(triggered.contains("BACKGROUND"));
    }

    #[test]
    fn trims_oldest_recent_memories_to_stay_under_budget() {
        let d = descriptor();
        let bundle = ContextBundle {
            recent: vec![sample_row(&"x".repeat(500)), sample_row(&"y".repeat(500))],
            topic: TopicDistribution { primary: "general".to_string(), ..Default::default() },
            stats: MemoryStats::default(),
            profile_insights: ProfileInsights::default(),
            ..Default::default()
        };
        let mood = MoodSnapshot { current_mood: "neutral".to_string(), mood_intensity: 0.5, recent_trajectory: vec![] };
        let locale = LocaleContext::default();

        let prompt = assemble_prompt(&d, &bundle, None, &mood, &locale, "hello", 400);
        assert!(prompt.chars().count() <= 700);
    }
}
