//! Binary EN/DE language heuristic.

use crate::pipeline::types::Language;

/// Distinct indicator hits needed to call a message German.
const GERMAN_THRESHOLD: usize = 3;

/// German function words and domain terms. Matched as substrings.
const GERMAN_INDICATORS: &[&str] = &[
    "hallo", "guten", "tag", "ich", "bin", "wir", "sind", "haben", "können",
    "möchten", "würden", "stelle", "position", "unternehmen", "firma",
    "bewerbung", "lebenslauf", "gehalt", "vergütung", "remote", "homeoffice",
    "interviews", "gespräche", "prozess", "ablauf", "viele", "grüße",
    "freundliche", "beste", "mit", "für", "auf", "bei", "zu", "von",
];

/// Count distinct German indicators present in `text`.
pub fn german_indicator_count(text: &str) -> usize {
    let lower = text.to_lowercase();
    GERMAN_INDICATORS
        .iter()
        .filter(|word| lower.contains(**word))
        .count()
}

/// Detect the language of a message: `De` on three or more indicators, else `En`.
pub fn detect_language(text: &str) -> Language {
    if german_indicator_count(text) >= GERMAN_THRESHOLD {
        Language::De
    } else {
        Language::En
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn german_offer_detected() {
        assert_eq!(
            detect_language("Hallo, wir suchen einen Entwickler für unser Team, Gehalt verhandelbar"),
            Language::De
        );
    }

    #[test]
    fn english_offer_detected() {
        assert_eq!(
            detect_language(
                "We have an exciting DevOps Engineer opportunity with Kubernetes and AWS, salary negotiable"
            ),
            Language::En
        );
    }

    #[test]
    fn exactly_three_indicators_is_german() {
        assert_eq!(german_indicator_count("hallo wir sind"), 3);
        assert_eq!(detect_language("hallo wir sind"), Language::De);
    }

    #[test]
    fn exactly_two_indicators_is_english() {
        assert_eq!(german_indicator_count("hallo wir"), 2);
        assert_eq!(detect_language("hallo wir"), Language::En);
    }

    #[test]
    fn repeated_indicator_counts_once() {
        assert_eq!(german_indicator_count("hallo hallo hallo"), 1);
        assert_eq!(detect_language("hallo hallo hallo"), Language::En);
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(detect_language("HALLO, WIR SIND DA"), Language::De);
    }

    #[test]
    fn empty_text_is_english() {
        assert_eq!(detect_language(""), Language::En);
    }
}
