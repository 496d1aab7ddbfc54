//! The discovery → classify → draft → approve → deliver loop.
//!
//! One conversation at a time, in listing order. Handles are re-discovered
//! after every restore since the list re-renders; entries already visited
//! in this run are recognized by their fingerprint and skipped.

pub mod delivery;
pub mod discovery;

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::approval::{ApprovalGate, Decision};
use crate::artifacts::ArtifactWriter;
use crate::browser::{Locator, Surface};
use crate::config::ReplyStrategy;
use crate::error::{self, PipelineError};
use crate::pacing::{PacePoint, Pacer};
use crate::pipeline::{
    Category, Classifier, ResponseGenerator, Tier, detect_language, types::Message,
};
use crate::session::SessionManager;

pub use delivery::{DeliveryOutcome, deliver};
pub use discovery::{ConversationHandle, UNKNOWN_SENDER};

/// Most conversations handled in one run.
pub const MAX_CONVERSATIONS_PER_RUN: usize = 20;

/// What happened to one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationOutcome {
    Sent { tier: Tier },
    EditedThenSent { tier: Tier },
    SkippedByGate,
    NotActionable { category: Category },
    DeliveryFailed,
    Failed { reason: String },
}

impl ConversationOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Sent { .. } => "sent",
            Self::EditedThenSent { .. } => "edited_then_sent",
            Self::SkippedByGate => "skipped_by_gate",
            Self::NotActionable { .. } => "not_actionable",
            Self::DeliveryFailed => "delivery_failed",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn was_sent(&self) -> bool {
        matches!(self, Self::Sent { .. } | Self::EditedThenSent { .. })
    }
}

/// One processed conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRecord {
    pub ordinal: usize,
    pub sender: String,
    pub outcome: ConversationOutcome,
}

/// Result of one triage run.
#[derive(Debug, Clone)]
pub struct TriageReport {
    pub run_id: Uuid,
    pub records: Vec<ConversationRecord>,
    /// The messaging interface never appeared; nothing was enumerated.
    pub interface_missing: bool,
}

impl TriageReport {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            records: Vec::new(),
            interface_missing: false,
        }
    }

    pub fn processed(&self) -> usize {
        self.records.len()
    }

    pub fn sent(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.was_sent()).count()
    }

    fn count(&self, label: &str) -> usize {
        self.records.iter().filter(|r| r.outcome.label() == label).count()
    }

    fn log_summary(&self) {
        info!(
            processed = self.processed(),
            sent = self.sent(),
            skipped = self.count("skipped_by_gate"),
            not_actionable = self.count("not_actionable"),
            delivery_failed = self.count("delivery_failed"),
            failed = self.count("failed"),
            "Triage run finished"
        );
    }
}

/// Drives one triage run over a [`Surface`].
pub struct TriageRunner<S: Surface> {
    surface: Arc<S>,
    classifier: Classifier,
    responder: ResponseGenerator,
    strategy: ReplyStrategy,
    gate: ApprovalGate,
    locator: Locator,
    pacer: Pacer,
    artifacts: ArtifactWriter,
    session: Option<SessionManager>,
}

impl<S: Surface> TriageRunner<S> {
    pub fn new(
        surface: Arc<S>,
        classifier: Classifier,
        responder: ResponseGenerator,
        strategy: ReplyStrategy,
        gate: ApprovalGate,
    ) -> Self {
        Self {
            surface,
            classifier,
            responder,
            strategy,
            gate,
            locator: Locator::default(),
            pacer: Pacer::default(),
            artifacts: ArtifactWriter::disabled(),
            session: None,
        }
    }

    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_artifacts(mut self, artifacts: ArtifactWriter) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Check the session before every [`Self::run_authenticated`] cycle.
    pub fn with_session(mut self, session: SessionManager) -> Self {
        self.session = Some(session);
        self
    }

    pub fn into_surface(self) -> Arc<S> {
        self.surface
    }

    /// Make sure the surface is logged in, re-establishing the session when
    /// it has lapsed, then run one cycle.
    pub async fn run_authenticated(&self) -> error::Result<TriageReport> {
        if let Some(session) = &self.session {
            let method = session.ensure(self.surface.as_ref()).await?;
            debug!(?method, "Session ready");
        }
        Ok(self.run().await)
    }

    /// Run one full cycle. Per-conversation failures are recorded, never returned.
    pub async fn run(&self) -> TriageReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("triage_run", %run_id);
        async move {
            let report = self.run_inner(run_id).await;
            report.log_summary();
            report
        }
        .instrument(span)
        .await
    }

    async fn run_inner(&self, run_id: Uuid) -> TriageReport {
        let surface = self.surface.as_ref();
        let mut report = TriageReport::new(run_id);

        discovery::open_messaging(surface, &self.pacer).await;
        if !discovery::messaging_ready(surface, &self.locator).await {
            warn!("Messaging interface not found, nothing to triage");
            self.artifacts.capture(surface, "messaging_interface_missing").await;
            report.interface_missing = true;
            return report;
        }

        let mut visited: HashSet<String> = HashSet::new();
        while report.processed() < MAX_CONVERSATIONS_PER_RUN {
            let unread = discovery::unread_conversations(surface, &self.locator).await;
            let Some(handle) = unread
                .into_iter()
                .find(|h| !visited.contains(&h.fingerprint))
            else {
                debug!("No unvisited unread conversations left");
                break;
            };
            visited.insert(handle.fingerprint.clone());

            let n = report.processed() + 1;
            info!(n, ordinal = handle.ordinal, "Processing conversation");
            let record = match self.process(&handle, n).await {
                Ok(record) => record,
                Err(e) => {
                    warn!(n, error = %e, "Conversation failed");
                    self.artifacts.capture(surface, &format!("conversation_{n}_error")).await;
                    ConversationRecord {
                        ordinal: handle.ordinal,
                        sender: UNKNOWN_SENDER.to_string(),
                        outcome: ConversationOutcome::Failed {
                            reason: e.to_string(),
                        },
                    }
                }
            };
            info!(n, sender = %record.sender, outcome = record.outcome.label(), "Conversation done");
            report.records.push(record);

            if let Err(e) = discovery::restore_list(surface, &self.locator, &self.pacer).await {
                warn!(error = %e, "Restore failed, re-navigating to messaging");
                discovery::open_messaging(surface, &self.pacer).await;
            }
        }

        if report.processed() >= MAX_CONVERSATIONS_PER_RUN {
            info!(max = MAX_CONVERSATIONS_PER_RUN, "Per-run conversation cap reached");
        }
        report
    }

    async fn process(
        &self,
        handle: &ConversationHandle<S::Node>,
        n: usize,
    ) -> Result<ConversationRecord, PipelineError> {
        let surface = self.surface.as_ref();

        discovery::open_conversation(surface, &self.pacer, handle).await?;
        discovery::await_conversation_view(surface, &self.locator).await;
        self.artifacts.capture(surface, &format!("conversation_{n}_opened")).await;

        let sender = discovery::extract_sender(surface, &self.locator).await;
        self.pacer.pause(PacePoint::Step).await;
        let text = discovery::extract_body(surface, &self.locator)
            .await
            .ok_or_else(|| PipelineError::Extraction(format!("no message text from {sender}")))?;
        let message = Message::new(text, sender);

        let classification = self.classifier.classify(&message.text);
        info!(
            sender = %message.sender_name,
            category = %classification.category,
            score = classification.score,
            actionable = classification.actionable,
            "Classified message"
        );

        let record = |outcome| ConversationRecord {
            ordinal: handle.ordinal,
            sender: message.sender_name.clone(),
            outcome,
        };

        if !classification.actionable {
            return Ok(record(ConversationOutcome::NotActionable {
                category: classification.category,
            }));
        }

        let language = detect_language(&message.text);
        let draft = match self.strategy {
            ReplyStrategy::Layered => {
                self.responder
                    .generate(&message, &classification, language)
                    .await
            }
            ReplyStrategy::Generic => self.responder.generate_generic(&classification),
        };
        debug!(tier = draft.tier.label(), language = language.code(), "Drafted reply");

        let (to_send, edited) = match self.gate.decide(&draft, &message.sender_name).await {
            Decision::Send => (draft, false),
            Decision::Edit(edited) => (edited, true),
            Decision::Skip => return Ok(record(ConversationOutcome::SkippedByGate)),
        };

        let delivery = deliver(surface, &self.locator, &self.pacer, &to_send).await;
        if !delivery.succeeded() {
            self.artifacts.capture(surface, &format!("conversation_{n}_delivery_failed")).await;
            return Ok(record(ConversationOutcome::DeliveryFailed));
        }
        self.artifacts.capture(surface, &format!("conversation_{n}_sent")).await;

        let tier = to_send.tier;
        Ok(record(if edited {
            ConversationOutcome::EditedThenSent { tier }
        } else {
            ConversationOutcome::Sent { tier }
        }))
    }
}
