use std::sync::OnceLock;

use regex::Regex;

use crate::types::PersonalDetails;

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(Patterns::compile)
}

struct Patterns {
    name: Regex,
    age: Regex,
    location: Regex,
    family: Regex,
    pet: Regex,
    work: Regex,
}

impl Patterns {
    fn compile() -> Self {
        Self {
            name: Regex::new(r"(?i)\bmy name is ([A-Z][\w'-]*)|\bi'?m ([A-Z][\w'-]*)\b").unwrap(),
            age: Regex::new(r"(?i)\b(?:i'?m|i am|aged?) (\d{1,3})(?: years old)?\b").unwrap(),
            location: Regex::new(r"(?i)\bi (?:live|grew up) in ([A-Z][\w'-]*(?: [A-Z][\w'-]*)?)").unwrap(),
            family: Regex::new(
                r"(?i)\bmy (mother|mom|father|dad|sister|brother|wife|husband|son|daughter|partner) (?:is |named |called )?([A-Z][\w'-]*)",
            )
            .unwrap(),
            pet: Regex::new(r"(?i)\bmy (?:dog|cat|pet|bird|hamster|rabbit) (?:named |called )?([A-Z][\w'-]*)").unwrap(),
            work: Regex::new(r"(?i)\bi (?:work as|am) (?:a |an )([a-z][\w -]{2,30}?)(?:[.,!]|$)").unwrap(),
        }
    }
}

/// Scans stored memory content and accumulates a structured personal
/// details map; repeated occurrences merge into sets rather than
/// overwriting (spec §4.3 "Personal-detail extraction").
pub fn extract_personal_details<'a>(contents: impl Iterator<Item = &'a str>) -> PersonalDetails {
    let p = patterns();
    let mut details = PersonalDetails::default();

    for content in contents {
        if details.name.is_none() {
            if let Some(cap) = p.name.captures(content) {
                let name = cap.get(1).or_else(|| cap.get(2)).map(|m| m.as_str().to_string());
                details.name = name;
            }
        }
        if details.age.is_none() {
            if let Some(cap) = p.age.captures(content) {
                details.age = Some(cap[1].to_string());
            }
        }
        if details.location.is_none() {
            if let Some(cap) = p.location.captures(content) {
                details.location = Some(cap[1].to_string());
            }
        }
        for cap in p.family.captures_iter(content) {
            let role = cap[1].to_lowercase();
            let name = cap[2].to_string();
            let entry = details.family.entry(role).or_default();
            if !entry.contains(&name) {
                entry.push(name);
            }
        }
        for cap in p.pet.captures_iter(content) {
            let name = cap[1].to_string();
            if !details.pets.contains(&name) {
                details.pets.push(name);
            }
        }
        for cap in p.work.captures_iter(content) {
            let occupation = cap[1].trim().to_string();
            if !details.work.contains(&occupation) {
                details.work.push(occupation);
            }
        }
    }

    details
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_across_multiple_messages() {
        let messages = vec![
            "Hi, my name is Alex.",
            "I'm 31 years old and I live in Berlin.",
            "My sister Maria visits often.",
            "My dog named Rex is a good boy.",
        ];
        let details = extract_personal_details(messages.into_iter());
        assert_eq!(details.name.as_deref(), Some("Alex"));
        assert_eq!(details.age.as_deref(), Some("31"));
        assert_eq!(details.location.as_deref(), Some("Berlin"));
        assert_eq!(details.family.get("sister"), Some(&vec!["Maria".to_string()]));
        assert_eq!(details.pets, vec!["Rex".to_string()]);
    }
}
