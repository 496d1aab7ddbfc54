//! Keyword classifier for inbound messages.
//!
//! Scores lower-cased text against bilingual (EN + DE) keyword lists and
//! decides whether a message is job-related outreach worth a reply.
//! Recall is favoured over precision: a false positive only produces a
//! draft for the approval gate.
//!
//! Matching is plain substring containment, so short keywords also match
//! inside longer words ("product" in "productivity").

use std::sync::Arc;

use tracing::debug;

use crate::pipeline::types::{Category, ClassificationResult};

/// Minimum score for a recruiting category to be actionable.
const ACTIONABLE_THRESHOLD: u32 = 3;

/// Score forced when the recruiter override fires.
const RECRUITER_OVERRIDE_SCORE: u32 = 5;

/// Raw technical keyword count that, together with a recruiter signature,
/// forces `TechnicalRecruiter`.
const RECRUITER_OVERRIDE_MIN_TECH: u32 = 2;

/// Text longer than this (in chars) earns the long-message bonus.
const LONG_MESSAGE_CHARS: usize = 500;
const LONG_MESSAGE_BONUS: u32 = 2;
const SIGNATURE_BONUS: u32 = 3;
const JOB_PHRASE_BONUS: u32 = 1;

/// Technology-term override: this many terms in a message longer than
/// `TECH_OVERRIDE_MIN_CHARS` makes it actionable.
const TECH_OVERRIDE_MIN_TERMS: usize = 2;
const TECH_OVERRIDE_MIN_CHARS: usize = 300;

/// Immutable keyword configuration for the classifier.
///
/// Built once at startup and shared by reference; nothing mutates it.
#[derive(Debug, Clone)]
pub struct KeywordTables {
    /// Keyword list per scored category, in `Category::SCORED` order.
    pub categories: Vec<(Category, Vec<String>)>,
    /// Phrases that strongly suggest the sender is a recruiter.
    pub recruiter_signatures: Vec<String>,
    /// Job-intent phrases; any match adds a one-off bonus.
    pub job_phrases: Vec<String>,
    /// Terms counted by the technology override.
    pub tech_terms: Vec<String>,
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| (*w).to_string()).collect()
}

impl KeywordTables {
    /// The built-in bilingual tables.
    pub fn default_tables() -> Self {
        let job_offer = owned(&[
            // English
            "job", "position", "opportunity", "opening", "role", "vacancy",
            "recruiter", "recruiting", "talent", "hiring", "career", "employment",
            "interview", "application", "apply", "resume", "cv", "profile",
            // German
            "stelle", "position", "rolle", "jobangebot", "stellenangebot", "karriere",
            "bewerbung", "lebenslauf", "berufserfahrung", "arbeitgeber", "unternehmen",
            "herausforderung", "verantwortung", "team", "firma", "gehalt", "vergütung",
        ]);
        let technical_recruiter = owned(&[
            // English
            "experience", "skills", "qualification", "technical", "developer", "engineer",
            "programming", "code", "software", "devops", "cloud", "aws", "azure", "gcp",
            "kubernetes", "docker", "ci/cd", "pipeline", "infrastructure", "architect",
            // German
            "erfahrung", "kenntnisse", "qualifikation", "entwickler", "ingenieur",
            "programmierung", "software", "infrastruktur", "automatisierung", "optimierung",
            "terraform", "ansible", "skalierbar", "transformation", "technologien",
        ]);
        let networking = owned(&[
            // English
            "connect", "network", "introduction", "meetup", "event", "conference",
            "webinar", "community", "group", "forum", "discussion", "chat", "conversation",
            // German
            "verbinden", "netzwerk", "vorstellung", "treffen", "veranstaltung", "konferenz",
            "gemeinschaft", "gruppe", "forum", "diskussion", "unterhaltung",
        ]);
        let sales_pitch = owned(&[
            // English
            "product", "service", "solution", "offer", "discount", "price", "cost",
            "demo", "presentation", "showcase", "trial", "free", "premium", "subscription",
            // German
            "produkt", "dienst", "lösung", "angebot", "rabatt", "preis", "kosten",
            "demo", "präsentation", "vorführung", "testversion", "kostenlos", "premium",
            "abonnement",
        ]);

        Self {
            categories: vec![
                (Category::JobOffer, job_offer),
                (Category::TechnicalRecruiter, technical_recruiter),
                (Category::Networking, networking),
                (Category::SalesPitch, sales_pitch),
            ],
            recruiter_signatures: owned(&[
                // English
                "recruiter", "talent acquisition", "headhunter", "sourcing", "staffing",
                "placement", "account manager", "recruiting", "talent", "hr",
                "human resources", "personnel",
                // German
                "personalberater", "personalvermittler", "personalreferent", "personaler",
                "recruiter", "account manager", "personalwesen", "personalsuche",
            ]),
            job_phrases: owned(&[
                "looking for", "we are seeking", "suche", "stelle", "position",
                "opportunity", "opening", "vacancy", "job", "role", "arbeit",
            ]),
            tech_terms: owned(&[
                "devops", "engineer", "entwickler", "cloud", "aws", "azure",
                "kubernetes", "docker", "terraform", "ansible", "pipeline", "ci/cd",
            ]),
        }
    }

    fn keywords(&self, category: Category) -> &[String] {
        self.categories
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, words)| words.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for KeywordTables {
    fn default() -> Self {
        Self::default_tables()
    }
}

/// Count list entries contained in `haystack`. Duplicate entries count twice.
fn count_matches(haystack: &str, words: &[String]) -> u32 {
    words.iter().filter(|w| haystack.contains(w.as_str())).count() as u32
}

/// Deterministic keyword classifier.
#[derive(Debug, Clone)]
pub struct Classifier {
    tables: Arc<KeywordTables>,
}

impl Classifier {
    pub fn new(tables: Arc<KeywordTables>) -> Self {
        Self { tables }
    }

    /// Classify a message. A pure function of `text`.
    pub fn classify(&self, text: &str) -> ClassificationResult {
        let lower = text.to_lowercase();
        let char_len = text.chars().count();
        let tables = &self.tables;

        let has_signature = tables
            .recruiter_signatures
            .iter()
            .any(|s| lower.contains(s.as_str()));
        let has_job_phrase = tables.job_phrases.iter().any(|p| lower.contains(p.as_str()));

        let mut best = Category::General;
        let mut best_score = 0u32;
        let mut tech_raw = 0u32;

        for category in Category::SCORED {
            let raw = count_matches(&lower, tables.keywords(category));
            if category == Category::TechnicalRecruiter {
                tech_raw = raw;
            }

            let mut score = raw;
            if category.is_recruiting() {
                if char_len > LONG_MESSAGE_CHARS {
                    score += LONG_MESSAGE_BONUS;
                }
                if has_signature {
                    score += SIGNATURE_BONUS;
                }
                if has_job_phrase {
                    score += JOB_PHRASE_BONUS;
                }
            }

            // Strictly greater: earlier categories win ties.
            if score > best_score {
                best_score = score;
                best = category;
            }
        }

        if has_signature && tech_raw >= RECRUITER_OVERRIDE_MIN_TECH {
            best = Category::TechnicalRecruiter;
            best_score = best_score.max(RECRUITER_OVERRIDE_SCORE);
        }

        let actionable = best.is_recruiting() && best_score >= ACTIONABLE_THRESHOLD;
        if !actionable {
            let tech_terms = tables
                .tech_terms
                .iter()
                .filter(|t| lower.contains(t.as_str()))
                .count();
            if tech_terms >= TECH_OVERRIDE_MIN_TERMS && char_len > TECH_OVERRIDE_MIN_CHARS {
                debug!(tech_terms, "Technology-term override marks message actionable");
                return ClassificationResult {
                    category: Category::TechnicalRecruiter,
                    actionable: true,
                    score: best_score,
                };
            }
        }

        debug!(
            category = %best,
            score = best_score,
            actionable,
            signature = has_signature,
            "Classified message"
        );

        ClassificationResult {
            category: best,
            actionable,
            score: best_score,
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(Arc::new(KeywordTables::default_tables()))
    }
}
