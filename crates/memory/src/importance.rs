//! Importance scoring and topic tagging for freshly ingested memories.
//!
//! Mirrors the keyword-heuristic shape of the teacher's `sentiment.rs`:
//! cheap, deterministic signals summed into a bounded score rather than
//! a learned model.

const PERSONAL_KEYWORDS: &[&str] = &["my", "i", "family", "work", "feel", "think"];

const WORK_KEYWORDS: &[&str] = &["work", "job", "office", "project", "deadline", "meeting", "boss", "colleague"];
const FAMILY_KEYWORDS: &[&str] = &["mother", "father", "sister", "brother", "son", "daughter", "family", "mom", "dad", "wife", "husband"];
const PET_KEYWORDS: &[&str] = &["dog", "cat", "pet", "puppy", "kitten"];
const HEALTH_KEYWORDS: &[&str] = &["sick", "doctor", "hospital", "pain", "tired", "sleep", "health", "therapy"];
const PROJECT_KEYWORDS: &[&str] = &["building", "launched", "shipped", "coding", "app", "startup"];

/// Weighted-sum importance in `[0, 1]` (spec §4.3 step 3).
pub fn compute_importance(content: &str, has_entities: bool, emotional_present: bool) -> f32 {
    let lower = content.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();

    let mut score: f32 = 0.5;
    if has_entities {
        score += 0.2;
    }
    if emotional_present {
        score += 0.15;
    }
    if content.contains('?') {
        score += 0.1;
    }
    if words.iter().any(|w| PERSONAL_KEYWORDS.contains(&trim_punct(w))) {
        score += 0.1;
    }
    if words.len() > 10 {
        score += 0.05;
    }
    score.min(1.0)
}

fn trim_punct(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric())
}

/// Buckets content into the fixed topic set, defaulting to `general`
/// (spec §4.3 step 4).
pub fn detect_topic(content: &str) -> &'static str {
    let lower = content.to_lowercase();
    let hits = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

    if hits(FAMILY_KEYWORDS) {
        "family"
    } else if hits(PET_KEYWORDS) {
        "pets"
    } else if hits(HEALTH_KEYWORDS) {
        "health"
    } else if hits(PROJECT_KEYWORDS) {
        "projects"
    } else if hits(WORK_KEYWORDS) {
        "work"
    } else {
        "general"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_score_with_no_signals() {
        let score = compute_importance("some plain statement without markers", false, false);
        assert!((score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn accumulates_all_signals_and_caps_at_one() {
        let content = "My family and I feel great about work today, do you agree? It has been a long week overall.";
        let score = compute_importance(content, true, true);
        assert!(score <= 1.0);
        assert!(score > 0.9);
    }

    #[test]
    fn topic_defaults_to_general() {
        assert_eq!(detect_topic("the sky looks nice today"), "general");
    }

    #[test]
    fn topic_detects_pets() {
        assert_eq!(detect_topic("my dog learned a new trick"), "pets");
    }
}
