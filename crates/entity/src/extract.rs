use regex::Regex;
use std::sync::OnceLock;

use crate::types::EntityType;

/// A single raw mention pulled out of a message, before normalization or
/// lookup against storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub entity_type: EntityType,
    pub name: String,
    pub attributes: Vec<(String, String)>,
}

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "this", "that", "these", "those", "my", "your", "his", "her", "its", "our",
    "their", "i", "you", "he", "she", "it", "we", "they", "today", "yesterday", "tomorrow",
];

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(Patterns::compile)
}

struct Patterns {
    name_intro: Vec<Regex>,
    relation: Regex,
    pet: Regex,
    place: Regex,
    project: Regex,
    age: Regex,
    occupation: Regex,
    proper_noun: Regex,
}

impl Patterns {
    fn compile() -> Self {
        Self {
            name_intro: vec![
                Regex::new(r"(?i)\bmy name is ([A-Z][\w'-]*(?: [A-Z][\w'-]*)?)").unwrap(),
                Regex::new(r"(?i)\bi'?m ([A-Z][\w'-]*)\b").unwrap(),
                Regex::new(r"(?i)\bcall me ([A-Z][\w'-]*)\b").unwrap(),
            ],
            relation: Regex::new(
                r"(?i)\bmy (mother|mom|father|dad|sister|brother|sibling|wife|husband|partner|son|daughter|cousin|aunt|uncle|grandmother|grandfather|friend|colleague|coworker|boss|roommate) (?:is |named |called )?([A-Z][\w'-]*)",
            )
            .unwrap(),
            pet: Regex::new(
                r"(?i)\bmy (dog|cat|pet|bird|hamster|rabbit|fish|horse) (?:named |called )?([A-Z][\w'-]*)",
            )
            .unwrap(),
            place: Regex::new(r"(?i)\bi (?:live|grew up|work) in ([A-Z][\w'-]*(?: [A-Z][\w'-]*)?)").unwrap(),
            project: Regex::new(r"(?i)\b(?:working on|building|launched) (?:a |an |the )?([A-Z][\w'-]*(?: [A-Z][\w'-]*){0,3})").unwrap(),
            age: Regex::new(r"(?i)\b(?:i'?m|i am|aged?) (\d{1,3})(?: years old)?\b").unwrap(),
            occupation: Regex::new(r"(?i)\bi (?:work as|am) (?:a |an )([a-z][\w -]{2,30}?)(?:[.,!]|$)").unwrap(),
            proper_noun: Regex::new(r"\b([A-Z][a-z]{2,})\b").unwrap(),
        }
    }
}

/// Extracts candidate entity mentions from a single message, per the
/// pattern families in spec §4.2: person introductions, relationship
/// markers, pets, places, projects, and a proper-noun fallback.
pub fn extract_mentions(message: &str) -> Vec<Mention> {
    let p = patterns();
    let mut out = Vec::new();

    for re in &p.name_intro {
        for cap in re.captures_iter(message) {
            if let Some(name) = cap.get(1) {
                push_person(&mut out, name.as_str(), message);
            }
        }
    }

    for cap in p.relation.captures_iter(message) {
        let label = cap.get(1).unwrap().as_str().to_lowercase();
        let name = cap.get(2).unwrap().as_str();
        if is_plausible_name(name) {
            out.push(Mention {
                entity_type: EntityType::Person,
                name: name.to_string(),
                attributes: vec![("relationship".to_string(), label)],
            });
        }
    }

    for cap in p.pet.captures_iter(message) {
        let species = cap.get(1).unwrap().as_str().to_lowercase();
        let name = cap.get(2).unwrap().as_str();
        if is_plausible_name(name) {
            out.push(Mention {
                entity_type: EntityType::Pet,
                name: name.to_string(),
                attributes: vec![("species".to_string(), species)],
            });
        }
    }

    for cap in p.place.captures_iter(message) {
        let name = cap.get(1).unwrap().as_str();
        if is_plausible_name(name) {
            out.push(Mention {
                entity_type: EntityType::Place,
                name: name.to_string(),
                attributes: vec![],
            });
        }
    }

    for cap in p.project.captures_iter(message) {
        let name = cap.get(1).unwrap().as_str();
        if is_plausible_name(name) {
            out.push(Mention {
                entity_type: EntityType::Project,
                name: name.to_string(),
                attributes: vec![],
            });
        }
    }

    if out.is_empty() {
        for cap in p.proper_noun.captures_iter(message) {
            let name = cap.get(1).unwrap().as_str();
            if is_plausible_name(name) && !STOPWORDS.contains(&name.to_lowercase().as_str()) {
                out.push(Mention {
                    entity_type: EntityType::Person,
                    name: name.to_string(),
                    attributes: vec![],
                });
            }
        }
    }

    out
}

fn push_person(out: &mut Vec<Mention>, name: &str, message: &str) {
    if !is_plausible_name(name) {
        return;
    }
    let mut attributes = Vec::new();
    if let Some(cap) = patterns().age.captures(message) {
        attributes.push(("age".to_string(), cap[1].to_string()));
    }
    if let Some(cap) = patterns().occupation.captures(message) {
        attributes.push(("occupation".to_string(), cap[1].trim().to_string()));
    }
    out.push(Mention {
        entity_type: EntityType::Person,
        name: name.to_string(),
        attributes,
    });
}

fn is_plausible_name(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.len() >= 2 && !STOPWORDS.contains(&trimmed.to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_name_introduction() {
        let mentions = extract_mentions("Hi, my name is Alex and I'm 31.");
        assert!(mentions.iter().any(|m| m.entity_type == EntityType::Person && m.name == "Alex"));
    }

    #[test]
    fn extracts_family_relation() {
        let mentions = extract_mentions("My sister Maria is visiting this weekend.");
        let found = mentions
            .iter()
            .find(|m| m.name == "Maria")
            .expect("expected Maria to be extracted");
        assert_eq!(found.entity_type, EntityType::Person);
        assert!(found.attributes.iter().any(|(k, v)| k == "relationship" && v == "sister"));
    }

    #[test]
    fn extracts_pet_with_species() {
        let mentions = extract_mentions("My dog named Rex loves the park.");
        let found = mentions.iter().find(|m| m.name == "Rex").unwrap();
        assert_eq!(found.entity_type, EntityType::Pet);
        assert!(found.attributes.iter().any(|(k, v)| k == "species" && v == "dog"));
    }

    #[test]
    fn extracts_place() {
        let mentions = extract_mentions("I live in Berlin these days.");
        assert!(mentions.iter().any(|m| m.entity_type == EntityType::Place && m.name == "Berlin"));
    }

    #[test]
    fn ignores_stopwords_in_fallback() {
        let mentions = extract_mentions("The Today is fine.");
        assert!(mentions.is_empty());
    }
}
