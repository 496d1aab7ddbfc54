//! Canned replies.
//!
//! Two sources live here:
//! - [`TemplateStore`]: category key → list of generic reply strings, loaded
//!   once from a JSON file with an in-process default.
//! - [`contextual_reply`]: hand-authored bilingual templates keyed by
//!   (category, language), signed with the configured persona.

use std::collections::HashMap;
use std::path::Path;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::config::Persona;
use crate::error::ConfigError;
use crate::pipeline::types::{Category, Language};

/// Key that must always be present in the store.
const FALLBACK_KEY: &str = "job_offer";

/// Read-only mapping from category key to non-empty reply lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateStore {
    entries: HashMap<String, Vec<String>>,
}

impl TemplateStore {
    /// The built-in store: four keys, two or three entries each.
    pub fn defaults() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            "job_offer".to_string(),
            vec![
                "Thank you for reaching out about this opportunity. I appreciate you considering me for this role. Could you please share more details about the position and requirements? I'd be interested in learning more to see if it aligns with my experience and career goals.".to_string(),
                "I appreciate your message regarding this opportunity. I'm always open to discussing interesting roles. Could you provide more information about the position, including responsibilities and requirements? This would help me determine if it's a good fit for my background.".to_string(),
                "Thanks for thinking of me for this position. I'd like to learn more about the role and your company. Could you share details about the team, tech stack, and expectations? This would help me understand if it aligns with my current career direction.".to_string(),
            ],
        );
        entries.insert(
            "recruiter_intro".to_string(),
            vec![
                "Thank you for connecting. I'm always interested in learning about new opportunities that align with my skills and career goals. Could you tell me more about the specific role you have in mind?".to_string(),
                "I appreciate you reaching out. I'm selectively exploring new opportunities at the moment. Could you share more details about the position and company you're recruiting for?".to_string(),
            ],
        );
        entries.insert(
            "follow_up".to_string(),
            vec![
                "Thank you for the additional information. I've reviewed the details, and I'm interested in discussing this further. Would you be available for a brief call to talk about the role in more depth?".to_string(),
                "Thanks for sharing more about the position. Based on what you've described, I'd like to learn more. What would be the next steps in the process?".to_string(),
            ],
        );
        entries.insert(
            "not_interested".to_string(),
            vec![
                "Thank you for thinking of me for this opportunity. After careful consideration, I don't think this is the right fit for me at this time. I appreciate your consideration and wish you success in finding the right candidate.".to_string(),
                "I appreciate you reaching out about this role. After reviewing the details, I've decided to focus on opportunities that more closely align with my current career direction. Thank you for considering me, and I wish you all the best in your search.".to_string(),
            ],
        );
        Self { entries }
    }

    /// Load the store from `path`, falling back to [`TemplateStore::defaults`]
    /// when the file is absent or unparseable.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No template file, using defaults");
                return Self::defaults();
            }
        };
        match Self::from_json(&raw) {
            Ok(store) => {
                debug!(path = %path.display(), keys = store.entries.len(), "Loaded template store");
                store
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Template file unusable, using defaults");
                Self::defaults()
            }
        }
    }

    /// Parse a JSON object of `key → [reply, ...]`.
    ///
    /// Empty lists are dropped. The `job_offer` key is filled from the
    /// defaults when the file omits it.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let parsed: HashMap<String, Vec<String>> =
            serde_json::from_str(raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        let mut entries: HashMap<String, Vec<String>> = parsed
            .into_iter()
            .map(|(key, list)| {
                let list: Vec<String> = list.into_iter().filter(|s| !s.trim().is_empty()).collect();
                (key, list)
            })
            .filter(|(_, list)| !list.is_empty())
            .collect();

        if entries.is_empty() {
            return Err(ConfigError::ParseError("template file has no non-empty lists".into()));
        }

        if !entries.contains_key(FALLBACK_KEY) {
            let mut defaults = Self::defaults().entries;
            if let Some(list) = defaults.remove(FALLBACK_KEY) {
                entries.insert(FALLBACK_KEY.to_string(), list);
            }
        }

        Ok(Self { entries })
    }

    /// Replies stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Uniform random pick for `category`, or the first `job_offer` entry
    /// when the store has nothing under that category.
    pub fn pick<R: Rng + ?Sized>(&self, category: Category, rng: &mut R) -> String {
        if let Some(choice) = self.get(category.key()).and_then(|list| list.choose(rng)) {
            return choice.clone();
        }
        self.get(FALLBACK_KEY)
            .and_then(|list| list.first())
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Deterministic bilingual reply for a (category, language) pair.
///
/// Job offers and technical recruiters share one template per language.
pub fn contextual_reply(
    category: Category,
    language: Language,
    sender_name: &str,
    persona: &Persona,
) -> String {
    let Persona { name, role, focus } = persona;
    match (language, category.is_recruiting(), category) {
        (Language::De, true, _) => format!(
            "Hallo {sender_name},\n\n\
             vielen Dank für Ihre Nachricht bezüglich dieser Gelegenheit. \
             Ich schätze Ihr Interesse sehr.\n\n\
             Als {role} mit Fokus auf {focus} \
             bin ich immer interessiert an spannenden Herausforderungen.\n\n\
             Könnten Sie mir bitte weitere Details mitteilen:\n\
             • Wie ist die Gehaltsvorstellung/der Gehaltsbereich?\n\
             • Wie viele Interview-Runden sind im Recruiting-Prozess vorgesehen?\n\
             • Ist 100% Remote-Arbeit möglich?\n\n\
             Diese Informationen würden mir helfen zu verstehen, ob die Position zu meiner aktuellen Karriererichtung passt.\n\n\
             Viele Grüße,\n\
             {name}"
        ),
        (Language::De, false, Category::SalesPitch) => format!(
            "Hallo {sender_name},\n\n\
             vielen Dank für die Information über Ihr Produkt/Ihre Lösung. \
             Als {role} bin ich immer interessiert an innovativen Tools, \
             die unsere Infrastruktur und Prozesse verbessern können.\n\n\
             Könnten Sie mir mehr Details über die technische Integration und \
             Kompatibilität mit unserer bestehenden Umgebung mitteilen?\n\n\
             Beste Grüße,\n\
             {name}"
        ),
        (Language::De, false, _) => format!(
            "Hallo {sender_name},\n\n\
             vielen Dank für Ihre Nachricht. Ich schätze es, dass Sie sich gemeldet haben.\n\n\
             Könnten Sie mir etwas mehr Kontext zu Ihrer Anfrage geben? \
             Gerne setze ich das Gespräch fort, sobald ich Ihre Nachricht besser verstehe.\n\n\
             Beste Grüße,\n\
             {name}"
        ),
        (Language::En, true, _) => format!(
            "Hello {sender_name},\n\n\
             Thank you for reaching out regarding this opportunity. \
             I appreciate your consideration.\n\n\
             As a {role} with focus on {focus}, \
             I'm always interested in exciting challenges.\n\n\
             Could you please share more details about:\n\
             • What is the expected salary range?\n\
             • How many interview rounds are in the recruiting process?\n\
             • Is 100% remote work possible?\n\n\
             This information would help me understand if the role aligns with my current career direction.\n\n\
             Best regards,\n\
             {name}"
        ),
        (Language::En, false, Category::SalesPitch) => format!(
            "Hello {sender_name},\n\n\
             Thank you for sharing information about your product/solution. \
             As a {role}, I'm always interested in innovative tools \
             that can improve our infrastructure and processes.\n\n\
             Could you provide more details about technical integration and \
             compatibility with our existing environment?\n\n\
             Best regards,\n\
             {name}"
        ),
        (Language::En, false, _) => format!(
            "Hello {sender_name},\n\n\
             Thank you for your message. I appreciate you reaching out.\n\n\
             Could you provide a bit more context about your inquiry? \
             I'd be happy to continue the conversation once I better understand your message.\n\n\
             Best regards,\n\
             {name}"
        ),
    }
}
