//! Message pipeline.
//!
//! Every captured message flows through:
//! 1. `Classifier::classify()`: keyword scoring, category and actionable verdict
//! 2. `detect_language()`: EN/DE heuristic
//! 3. `ResponseGenerator`: layered (generated → contextual) or generic draft
//!
//! Nothing here touches the browser. The triage loop owns the I/O around it.

pub mod classifier;
pub mod language;
pub mod responder;
pub mod templates;
pub mod types;

pub use classifier::{Classifier, KeywordTables};
pub use language::detect_language;
pub use responder::ResponseGenerator;
pub use templates::TemplateStore;
pub use types::{Category, ClassificationResult, Language, Message, ReplyDraft, Tier};
