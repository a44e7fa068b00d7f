//! Gaming-resistant signal extraction from a single exchange: emotional
//! keyword scoring, depth heuristics, connection-booster clusters, and
//! authenticity anti-spam checks (spec §4.4 steps 2-5).

use std::collections::HashSet;

use crate::types::Bonuses;

/// Ten labeled emotion families (spec §4.4 step 2).
const EMOTION_FAMILIES: &[(&str, &[&str])] = &[
    ("joy", &["happy", "joy", "delighted", "thrilled", "glad", "cheerful"]),
    ("sadness", &["sad", "down", "upset", "heartbroken", "grief", "sorrow"]),
    ("anger", &["angry", "furious", "frustrated", "annoyed", "irritated", "mad"]),
    ("fear", &["afraid", "scared", "anxious", "worried", "nervous", "terrified"]),
    ("surprise", &["surprised", "shocked", "astonished", "unexpected", "wow"]),
    ("love", &["love", "adore", "cherish", "affection", "care about"]),
    ("trust", &["trust", "rely on", "confide", "believe in you", "faith"]),
    ("gratitude", &["thank", "grateful", "appreciate", "thankful"]),
    ("hope", &["hope", "hopeful", "optimistic", "looking forward"]),
    ("empathy", &["understand how you feel", "i feel for you", "empathize", "that must be hard"]),
];

const REFLECTIVE_VERBS: &[&str] = &["realize", "reflect", "wonder", "consider", "notice", "realized"];
const HYPOTHETICAL_WORDS: &[&str] = &["if", "would", "could", "imagine", "suppose", "what if"];

const PERSONAL_INFO_CLUSTER: &[&str] = &["my name is", "i live in", "my family", "i work as", "i was born", "my address"];
const AI_CONSCIOUSNESS_CLUSTER: &[&str] = &["are you conscious", "do you feel", "are you alive", "do you have feelings", "are you sentient", "do you dream"];
const PROJECT_COLLAB_CLUSTER: &[&str] = &["let's build", "working on", "our project", "collaborate", "let's create", "build together"];

/// Counts weighted hits across the ten emotion families: user-message
/// hits count 1.0, response hits 0.5 (spec §4.4 step 2).
pub fn emotional_score(user_message: &str, character_response: &str) -> f32 {
    let user_lower = user_message.to_lowercase();
    let response_lower = character_response.to_lowercase();

    let mut score = 0.0;
    for (_family, keywords) in EMOTION_FAMILIES {
        for kw in *keywords {
            if user_lower.contains(kw) {
                score += 1.0;
            }
            if response_lower.contains(kw) {
                score += 0.5;
            }
        }
    }
    score
}

/// Heuristic depth score normalized to `[0, 1]` over six signals (spec
/// §4.4 step 3).
pub fn depth_score(user_message: &str) -> f32 {
    let lower = user_message.to_lowercase();
    let token_count = user_message.split_whitespace().count();

    let mut hits = 0u32;
    if token_count > 10 {
        hits += 1;
    }
    if user_message.contains('?') {
        hits += 1;
    }
    if REFLECTIVE_VERBS.iter().any(|v| lower.contains(v)) {
        hits += 1;
    }
    if HYPOTHETICAL_WORDS.iter().any(|w| lower.contains(w)) {
        hits += 1;
    }
    if user_message.contains('"') || user_message.contains('\'') {
        hits += 1;
    }
    if has_affective_words(&lower) {
        hits += 1;
    }

    hits as f32 / 6.0
}

fn has_affective_words(lower: &str) -> bool {
    EMOTION_FAMILIES.iter().any(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
}

/// Applies the three connection-booster clusters, each independently
/// (spec §4.4 step 4).
pub fn connection_boosters(user_message: &str) -> Bonuses {
    let lower = user_message.to_lowercase();
    let mut bonuses = Bonuses::default();

    if PERSONAL_INFO_CLUSTER.iter().any(|p| lower.contains(p)) {
        bonuses = bonuses
            + Bonuses {
                emotional: 0.8,
                memories: 3,
                growth: 2,
                trust: 0.1,
                ..Default::default()
            };
    }

    if AI_CONSCIOUSNESS_CLUSTER.iter().any(|p| lower.contains(p)) {
        bonuses = bonuses
            + Bonuses {
                emotional: 1.2,
                memories: 4,
                growth: 4,
                trust: 0.2,
                direct_level: 0.3,
                ..Default::default()
            };
    }

    let project_hits = PROJECT_COLLAB_CLUSTER.iter().filter(|p| lower.contains(**p)).count();
    if project_hits >= 2 {
        bonuses = bonuses
            + Bonuses {
                emotional: 1.0,
                memories: 3,
                growth: 3,
                trust: 0.15,
                consistency: 0.1,
                ..Default::default()
            };
    }

    bonuses
}

/// Four anti-spam authenticity checks averaged into `[0, 1]` (spec §4.4
/// step 5).
pub fn authenticity_score(user_message: &str) -> f32 {
    let checks = [
        is_non_repetitive(user_message),
        has_no_spam_patterns(user_message),
        has_natural_language_flow(user_message),
        has_vocabulary_diversity(user_message),
    ];
    checks.iter().filter(|c| **c).count() as f32 / checks.len() as f32
}

fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

fn is_non_repetitive(text: &str) -> bool {
    let words = tokens(text);
    if words.is_empty() {
        return true;
    }
    let mut counts = std::collections::HashMap::new();
    for w in &words {
        *counts.entry(w.clone()).or_insert(0u32) += 1;
    }
    let top = counts.values().max().copied().unwrap_or(0);
    (top as f32 / words.len() as f32) <= 0.4
}

fn has_no_spam_patterns(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    let mut run_len = 1;
    for window in chars.windows(2) {
        if window[0] == window[1] && window[0].is_alphabetic() {
            run_len += 1;
            if run_len >= 5 {
                return false;
            }
        } else {
            run_len = 1;
        }
    }

    let words = tokens(text);
    for pair in words.windows(3) {
        if pair[0] == pair[1] && pair[1] == pair[2] {
            return false;
        }
    }
    true
}

fn has_natural_language_flow(text: &str) -> bool {
    let words = tokens(text);
    if words.len() < 2 {
        return !text.trim().is_empty();
    }
    text.contains(' ') && text.chars().any(|c| c.is_alphabetic())
}

fn has_vocabulary_diversity(text: &str) -> bool {
    let words = tokens(text);
    if words.is_empty() {
        return false;
    }
    let unique: HashSet<&String> = words.iter().collect();
    (unique.len() as f32 / words.len() as f32) > 0.7
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emotional_score_counts_user_and_response_hits() {
        let score = emotional_score("I feel so happy and grateful today", "I'm glad to hear that");
        assert!(score > 0.0);
    }

    #[test]
    fn depth_score_rewards_reflective_question() {
        let score = depth_score("I wonder if you would understand how I really feel about this whole situation?");
        assert!(score > 0.5);
    }

    #[test]
    fn personal_info_cluster_applies_bonus() {
        let bonuses = connection_boosters("My name is Alex and I live in Berlin.");
        assert_eq!(bonuses.memories, 3);
        assert_eq!(bonuses.growth, 2);
    }

    #[test]
    fn project_cluster_requires_two_hits() {
        let one_hit = connection_boosters("I'm working on something new.");
        assert_eq!(one_hit.memories, 0);

        let two_hits = connection_boosters("Let's build this together, working on our project this weekend.");
        assert_eq!(two_hits.memories, 3);
    }

    #[test]
    fn repetitive_spam_fails_authenticity() {
        let score = authenticity_score("spam spam spam spam spam spam spam spam");
        assert!(score < 0.5);
    }

    #[test]
    fn natural_message_scores_high_authenticity() {
        let score = authenticity_score("I had a really thoughtful conversation with my sister about our plans for the weekend.");
        assert!(score >= 0.75);
    }
}
