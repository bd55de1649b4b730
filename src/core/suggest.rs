//! Rule suggestions from detection results.
//!
//! Given a detected span, proposes a starting draft: a regex for the
//! primary element and the most frequent nearby words as supporting
//! keywords. Users refine suggestions in the builder; nothing here is
//! submitted automatically.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{
    PrimaryElement, SitDraft, SitVersionDraft, SupportingGroup, SupportingItem, SupportingLogic,
};
use crate::highlight::DetectionSpan;

use super::builder::DEFAULT_GROUP_NAME;

/// Characters of context taken on each side of a span
pub const DEFAULT_WINDOW: usize = 60;

/// Words ranked by frequency before trimming
const MAX_CONTEXT_WORDS: usize = 5;

/// Words kept as supporting keywords
const MAX_SUPPORTING_KEYWORDS: usize = 3;

const STOPWORDS: [&str; 7] = ["the", "and", "for", "with", "this", "that", "from"];

fn word_pattern() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"[a-zA-Z]{3,}").expect("static word pattern"))
}

/// Regex for well-known entity types, falling back to a generalisation of
/// the matched value
pub fn suggest_regex(entity_type: &str, value: &str) -> String {
    let known = match entity_type {
        "SSN" | "US_SSN" => Some(r"\b\d{3}-\d{2}-\d{4}\b"),
        "CREDIT_CARD" => Some(r"\b(?:\d[ -]*?){13,19}\b"),
        "PHONE_NUMBER" => Some(r"\b\+?\d[\d\s().-]{7,}\b"),
        "EMAIL_ADDRESS" => Some(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"),
        "IP_ADDRESS" => Some(r"\b(?:\d{1,3}\.){3}\d{1,3}\b"),
        _ => None,
    };

    match known {
        Some(pattern) => pattern.to_string(),
        None => generalize_value(value),
    }
}

/// Replace each character of `value` with its character class
fn generalize_value(value: &str) -> String {
    let mut pattern = String::new();
    for c in value.chars() {
        if c.is_ascii_digit() {
            pattern.push_str(r"\d");
        } else if c.is_alphabetic() {
            pattern.push_str("[A-Za-z]");
        } else if c.is_whitespace() {
            pattern.push_str(r"\s");
        } else {
            pattern.push_str(&regex::escape(&c.to_string()));
        }
    }
    pattern
}

/// Most frequent words around a span, most common first
///
/// Words are lowercase runs of 3+ ASCII letters inside the window,
/// excluding stopwords and anything contained in the entity text itself.
/// Ties keep first-seen order.
pub fn context_keywords(text: &str, span: &DetectionSpan, window: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let start = span.start.min(chars.len());
    let end = span.end.min(chars.len()).max(start);
    let left = start.saturating_sub(window);
    let right = (end + window).min(chars.len());

    let context: String = chars[left..right].iter().collect::<String>().to_lowercase();
    let entity_text: String = chars[start..end].iter().collect::<String>().to_lowercase();

    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for word in word_pattern().find_iter(&context).map(|m| m.as_str()) {
        if STOPWORDS.contains(&word) || entity_text.contains(word) {
            continue;
        }
        let count = counts.entry(word.to_string()).or_insert(0);
        if *count == 0 {
            order.push(word.to_string());
        }
        *count += 1;
    }

    // Stable sort keeps first-seen order among equal counts
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order.truncate(MAX_CONTEXT_WORDS);
    order
}

/// Propose a draft rule for one detected span
///
/// # Arguments
/// * `text` - The analysed text
/// * `span` - The detection to build a rule for
/// * `source` - Provenance to record on the version
/// * `window` - Context characters on each side of the span
pub fn suggest_draft(
    text: &str,
    span: &DetectionSpan,
    source: Option<&str>,
    window: usize,
) -> SitDraft {
    let value: String = text
        .chars()
        .skip(span.start)
        .take(span.len())
        .collect();

    let keywords: Vec<SupportingItem> = context_keywords(text, span, window)
        .into_iter()
        .take(MAX_SUPPORTING_KEYWORDS)
        .map(SupportingItem::keyword)
        .collect();

    let supporting_groups = if keywords.is_empty() {
        Vec::new()
    } else {
        vec![SupportingGroup::new(DEFAULT_GROUP_NAME, keywords)]
    };

    SitDraft {
        name: format!("{}_custom", span.entity_type),
        description: None,
        version: SitVersionDraft {
            entity_type: Some(span.entity_type.clone()),
            confidence: Some(span.confidence()),
            source: source.map(str::to_string),
            primary_element: PrimaryElement::regex(suggest_regex(&span.entity_type, &value)),
            supporting_logic: SupportingLogic::any(),
            supporting_groups,
        },
    }
}

/// Propose a draft for every span
pub fn suggest_drafts(
    text: &str,
    spans: &[DetectionSpan],
    source: Option<&str>,
    window: usize,
) -> Vec<SitDraft> {
    spans
        .iter()
        .map(|span| suggest_draft(text, span, source, window))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Confidence;

    #[test]
    fn test_suggest_regex_known_type() {
        assert_eq!(suggest_regex("SSN", "123-45-6789"), r"\b\d{3}-\d{2}-\d{4}\b");
    }

    #[test]
    fn test_suggest_regex_generalizes() {
        let pattern = suggest_regex("EMPLOYEE_ID", "AB-12 x");
        assert!(pattern.starts_with(r"[A-Za-z][A-Za-z]"));
        assert!(pattern.ends_with(r"\d\d\s[A-Za-z]"));
        let compiled = Regex::new(&suggest_regex("EMPLOYEE_ID", "AB-12 x")).unwrap();
        assert!(compiled.is_match("ZQ-99 k"));
    }

    #[test]
    fn test_context_keywords_ranked() {
        let text = "Employee badge: badge number 4411 for payroll badge payroll office";
        let span = DetectionSpan::new(29, 33, "BADGE_ID", 0.7);
        let words = context_keywords(text, &span, 60);
        assert_eq!(words[0], "badge");
        assert_eq!(words[1], "payroll");
        assert!(!words.contains(&"for".to_string()));
    }

    #[test]
    fn test_context_keywords_skip_entity_text() {
        let text = "contact alice at alice@example.com today";
        let span = DetectionSpan::new(17, 34, "EMAIL_ADDRESS", 0.9);
        let words = context_keywords(text, &span, 60);
        assert!(!words.contains(&"alice".to_string()));
        assert!(!words.contains(&"example".to_string()));
        assert!(words.contains(&"contact".to_string()));
    }

    #[test]
    fn test_suggest_draft() {
        let text = "Social security number 123-45-6789 on file";
        let span = DetectionSpan::new(23, 34, "SSN", 0.9);
        let draft = suggest_draft(text, &span, Some("scan:7"), DEFAULT_WINDOW);

        assert_eq!(draft.name, "SSN_custom");
        assert_eq!(draft.version.confidence, Some(Confidence::High));
        assert_eq!(draft.version.source.as_deref(), Some("scan:7"));
        let group = &draft.version.supporting_groups[0];
        assert_eq!(group.items.len(), 3);
        assert_eq!(group.items[0], SupportingItem::keyword("social"));
    }

    #[test]
    fn test_suggest_draft_without_context() {
        let text = "123-45-6789";
        let span = DetectionSpan::new(0, 11, "SSN", 0.4);
        let draft = suggest_draft(text, &span, None, DEFAULT_WINDOW);
        assert!(draft.version.supporting_groups.is_empty());
        assert_eq!(draft.version.confidence, Some(Confidence::Low));
    }
}
