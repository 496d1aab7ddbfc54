//! Shared types for the triage pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Captured message ────────────────────────────────────────────────

/// An inbound message as captured from an opened conversation.
///
/// Created once by discovery and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Concatenated text of the conversation's message bodies.
    pub text: String,
    /// Display name of the other participant.
    pub sender_name: String,
    /// When discovery captured the text.
    pub observed_at: DateTime<Utc>,
}

impl Message {
    pub fn new(text: impl Into<String>, sender_name: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender_name: sender_name.into(),
            observed_at: Utc::now(),
        }
    }
}

// ── Classification ──────────────────────────────────────────────────

/// Message category. Declaration order is the tie-break order for scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    JobOffer,
    TechnicalRecruiter,
    Networking,
    SalesPitch,
    General,
}

impl Category {
    /// Categories that carry keyword lists, in scoring order.
    pub const SCORED: [Category; 4] = [
        Category::JobOffer,
        Category::TechnicalRecruiter,
        Category::Networking,
        Category::SalesPitch,
    ];

    /// Stable key used in logs and the template store file.
    pub fn key(&self) -> &'static str {
        match self {
            Self::JobOffer => "job_offer",
            Self::TechnicalRecruiter => "technical_recruiter",
            Self::Networking => "networking",
            Self::SalesPitch => "sales_pitch",
            Self::General => "general_message",
        }
    }

    /// Whether the category is one of the two recruiting-flavored ones.
    pub fn is_recruiting(&self) -> bool {
        matches!(self, Self::JobOffer | Self::TechnicalRecruiter)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Classifier verdict for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: Category,
    pub actionable: bool,
    pub score: u32,
}

// ── Language ────────────────────────────────────────────────────────

/// Detected message language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    De,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::De => "de",
        }
    }
}

// ── Reply draft ─────────────────────────────────────────────────────

/// Which response-generation stage produced a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Generated,
    ContextualTemplate,
    GenericTemplate,
}

impl Tier {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Generated => "generated",
            Self::ContextualTemplate => "contextual_template",
            Self::GenericTemplate => "generic_template",
        }
    }
}

/// A reply ready for the approval gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyDraft {
    pub body: String,
    pub tier: Tier,
}

impl ReplyDraft {
    pub fn new(body: impl Into<String>, tier: Tier) -> Self {
        Self {
            body: body.into(),
            tier,
        }
    }

    /// A new draft carrying operator-edited text. The original is untouched.
    pub fn edited(&self, body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            tier: self.tier,
        }
    }
}
