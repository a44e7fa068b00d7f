//! Heuristic valence inference, kept from the teacher's keyword-and-negation
//! approach. Returns a value in `[-1.0, 1.0]`.

const POSITIVE_WORDS: &[&str] = &[
    "great", "love", "excited", "happy", "amazing", "solved", "success", "excellent", "wonderful",
    "fantastic", "glad", "pleased", "proud", "brilliant", "perfect", "works", "fixed", "done",
    "achieved", "helpful", "thanks", "awesome", "enjoy", "like", "good", "nice", "yes",
];

const NEGATIVE_WORDS: &[&str] = &[
    "frustrated", "confused", "error", "failed", "worried", "stuck", "broken", "terrible", "awful",
    "wrong", "bad", "hate", "annoying", "difficult", "struggle", "issue", "bug", "crash", "problem",
    "cannot", "unable", "fail", "loss", "lost", "miss", "missing", "sad", "angry", "lonely", "scared",
];

pub fn infer_valence(content: &str) -> f32 {
    let lower = content.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let mut score: f32 = 0.0;
    for (i, word) in words.iter().enumerate() {
        let negated = (i > 0 && matches!(words[i - 1], "not" | "no" | "never" | "without"))
            || (i > 1 && matches!(words[i - 2], "not" | "no" | "never" | "without"));

        if POSITIVE_WORDS.contains(word) {
            score += if negated { -0.10 } else { 0.15 };
        } else if NEGATIVE_WORDS.contains(word) {
            score += if negated { 0.10 } else { -0.15 };
        }
    }

    let exclamations = content.chars().filter(|&c| c == '!').count() as f32;
    score += (exclamations * 0.05).min(0.20);

    score.clamp(-1.0, 1.0)
}

/// Whether the content carries a non-trivial emotional signal at all
/// (spec §4.3 step 3: "+0.15 if emotional context present").
pub fn has_emotional_content(content: &str) -> bool {
    infer_valence(content).abs() > 0.1
}

pub fn label_for(valence: f32) -> &'static str {
    if valence > 0.2 {
        "positive"
    } else if valence < -0.2 {
        "negative"
    } else {
        "neutral"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_text_scores_positive() {
        assert!(infer_valence("This is amazing! I love it, great success!") > 0.0);
    }

    #[test]
    fn negative_text_scores_negative() {
        assert!(infer_valence("I'm so frustrated, this is broken and everything failed") < 0.0);
    }

    #[test]
    fn neutral_text_has_no_emotional_content() {
        assert!(!has_emotional_content("The user asked about the current project status"));
    }
}
