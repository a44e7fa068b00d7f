use std::sync::OnceLock;

use regex::Regex;

use crate::types::{ContextWindow, Entity, EntityType};

/// Gendered/number pronoun classes used to narrow candidate entities
/// before falling back to pure recency (spec §4.2 ambiguity handling).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PronounClass {
    MaleSingular,
    FemaleSingular,
    NeuterSingular,
    Plural,
}

fn pronoun_patterns() -> &'static Vec<(Regex, PronounClass)> {
    static PATTERNS: OnceLock<Vec<(Regex, PronounClass)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            (Regex::new(r"(?i)\b(he|him|his)\b").unwrap(), PronounClass::MaleSingular),
            (Regex::new(r"(?i)\b(she|her|hers)\b").unwrap(), PronounClass::FemaleSingular),
            (Regex::new(r"(?i)\b(it|its)\b").unwrap(), PronounClass::NeuterSingular),
            (Regex::new(r"(?i)\b(they|them|their)\b").unwrap(), PronounClass::Plural),
        ]
    })
}

/// A resolved pronoun reference: the pronoun text plus the entity id it
/// was resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub pronoun: String,
    pub entity_id: String,
}

/// A pronoun the resolver could not confidently assign, because zero or
/// more than one equally plausible candidate existed (spec §4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousRef {
    pub pronoun: String,
    pub candidates: Vec<String>,
}

pub struct ResolutionResult {
    pub resolutions: Vec<Resolution>,
    pub ambiguous: Vec<AmbiguousRef>,
}

/// Resolves pronouns in `message` against the recency-ordered
/// `ContextWindow`, scoring candidates by entity-type/gender-heuristic
/// match first and recency second. An ambiguity is reported when the
/// candidate pool for a pronoun, after narrowing, has zero or more than
/// one equally-plausible member.
pub fn resolve(message: &str, context: &ContextWindow, entities: &[Entity]) -> ResolutionResult {
    let mut resolutions = Vec::new();
    let mut ambiguous = Vec::new();

    for (re, class) in pronoun_patterns() {
        for cap in re.captures_iter(message) {
            let pronoun = cap.get(1).unwrap().as_str().to_string();
            let candidates = rank_candidates(*class, context, entities);
            match candidates.as_slice() {
                [] => ambiguous.push(AmbiguousRef { pronoun, candidates: vec![] }),
                [only] => resolutions.push(Resolution { pronoun, entity_id: only.clone() }),
                many => ambiguous.push(AmbiguousRef {
                    pronoun,
                    candidates: many.to_vec(),
                }),
            }
        }
    }

    ResolutionResult { resolutions, ambiguous }
}

fn rank_candidates(class: PronounClass, context: &ContextWindow, entities: &[Entity]) -> Vec<String> {
    let type_filter = |e: &&Entity| match class {
        PronounClass::NeuterSingular => {
            matches!(e.entity_type, EntityType::Object | EntityType::Place | EntityType::Concept | EntityType::Project | EntityType::Event | EntityType::Pet)
        }
        PronounClass::Plural => true,
        PronounClass::MaleSingular | PronounClass::FemaleSingular => {
            matches!(e.entity_type, EntityType::Person | EntityType::Pet)
        }
    };

    let gender_filter = |e: &&Entity| match class {
        PronounClass::MaleSingular => e
            .attributes
            .get("gender")
            .map(|g| g.eq_ignore_ascii_case("male"))
            .unwrap_or(true),
        PronounClass::FemaleSingular => e
            .attributes
            .get("gender")
            .map(|g| g.eq_ignore_ascii_case("female"))
            .unwrap_or(true),
        _ => true,
    };

    context
        .entity_ids
        .iter()
        .filter_map(|id| entities.iter().find(|e| &e.id == id))
        .filter(type_filter)
        .filter(gender_filter)
        .map(|e| e.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::{BTreeSet, HashMap};

    fn person(id: &str, gender: Option<&str>) -> Entity {
        let mut attributes = HashMap::new();
        if let Some(g) = gender {
            attributes.insert("gender".to_string(), g.to_string());
        }
        Entity {
            id: id.to_string(),
            user_id: "alex".to_string(),
            entity_type: EntityType::Person,
            name: id.to_string(),
            aliases: BTreeSet::new(),
            attributes,
            edges: HashMap::new(),
            first_seen: Utc::now(),
            last_seen: Utc::now(),
            mention_count: 1,
            confidence: 0.8,
        }
    }

    #[test]
    fn resolves_to_most_recent_matching_gender() {
        let maria = person("ent_maria", Some("female"));
        let sam = person("ent_sam", Some("male"));
        let mut context = ContextWindow::new("conv-1");
        context.entity_ids = vec!["ent_maria".to_string(), "ent_sam".to_string()];

        let result = resolve("Is she coming tonight?", &context, &[maria, sam]);
        assert_eq!(result.resolutions.len(), 1);
        assert_eq!(result.resolutions[0].entity_id, "ent_maria");
        assert!(result.ambiguous.is_empty());
    }

    #[test]
    fn flags_ambiguity_when_no_candidate() {
        let context = ContextWindow::new("conv-1");
        let result = resolve("Tell her I said hi.", &context, &[]);
        assert_eq!(result.ambiguous.len(), 1);
        assert!(result.resolutions.is_empty());
    }

    #[test]
    fn flags_ambiguity_on_equal_recency_tie() {
        let a = person("ent_a", None);
        let b = person("ent_b", None);
        let mut context = ContextWindow::new("conv-1");
        context.entity_ids = vec!["ent_a".to_string(), "ent_b".to_string()];
        let result = resolve("They left early.", &context, &[a, b]);
        assert!(result.resolutions.is_empty());
        assert_eq!(result.ambiguous.len(), 1);
    }
}
