//! Approval gate in front of every send.
//!
//! With auto-approve on, every draft is sent. Otherwise the draft is shown
//! to the operator and a reader task waits for one line of input while the
//! gate waits on a single-use decision slot with a deadline. The reader is
//! abandoned on timeout; anything it reads later is drained before the next
//! prompt.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::ApprovalConfig;
use crate::pipeline::types::ReplyDraft;

/// Minimum wait when an operator is expected to answer.
pub const INTERACTIVE_WAIT_FLOOR: Duration = Duration::from_secs(120);

/// Operator verdict on a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Send,
    /// Send this replacement draft instead.
    Edit(ReplyDraft),
    Skip,
}

/// Line-oriented operator console.
#[async_trait]
pub trait OperatorInput: Send + Sync {
    /// Show text to the operator.
    fn present(&self, text: &str);

    /// Next line of input; `None` once input is closed.
    async fn read_line(&self) -> Option<String>;

    /// Discard lines typed before the current prompt.
    fn drain(&self);
}

/// Reads lines from stdin on a dedicated thread.
///
/// The thread blocks in `read_line` and forwards each line over a channel,
/// so an abandoned read never holds up the runtime.
pub struct StdinInput {
    rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl StdinInput {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let spawned = std::thread::Builder::new()
            .name("operator-stdin".into())
            .spawn(move || {
                let stdin = std::io::stdin();
                let mut line = String::new();
                loop {
                    line.clear();
                    match stdin.read_line(&mut line) {
                        Ok(0) => break,
                        Ok(_) => {
                            if tx.send(line.trim_end_matches(['\r', '\n']).to_string()).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::error!("Error reading stdin: {}", e);
                            break;
                        }
                    }
                }
            });
        if let Err(e) = spawned {
            tracing::error!("Failed to spawn stdin reader: {}", e);
        }
        Self { rx: Mutex::new(rx) }
    }
}

#[async_trait]
impl OperatorInput for StdinInput {
    fn present(&self, text: &str) {
        eprintln!("{text}");
    }

    async fn read_line(&self) -> Option<String> {
        self.rx.lock().await.recv().await
    }

    fn drain(&self) {
        if let Ok(mut rx) = self.rx.try_lock() {
            while rx.try_recv().is_ok() {}
        }
    }
}

/// Operator input that never answers.
pub struct NoOperator;

#[async_trait]
impl OperatorInput for NoOperator {
    fn present(&self, _text: &str) {}

    async fn read_line(&self) -> Option<String> {
        None
    }

    fn drain(&self) {}
}

/// Send/edit/skip decision point.
pub struct ApprovalGate {
    config: ApprovalConfig,
    input: Arc<dyn OperatorInput>,
}

impl ApprovalGate {
    pub fn new(config: ApprovalConfig, input: Arc<dyn OperatorInput>) -> Self {
        Self { config, input }
    }

    /// How long [`ApprovalGate::decide`] waits for the operator.
    pub fn wait(&self) -> Duration {
        if self.config.non_interactive {
            self.config.response_timeout
        } else {
            self.config.response_timeout.max(INTERACTIVE_WAIT_FLOOR)
        }
    }

    pub async fn decide(&self, draft: &ReplyDraft, sender_name: &str) -> Decision {
        if self.config.auto_approve {
            debug!(sender = sender_name, "Auto-approved");
            return Decision::Send;
        }

        let wait = self.wait();
        let choices = if self.config.non_interactive {
            "[a]pprove / anything else skips"
        } else {
            "[a]pprove / [e]dit / anything else skips"
        };
        self.input.drain();
        self.input.present(&format!(
            "\n── Reply to {sender_name} ({tier}) ──\n{body}\n──\n{choices} ({secs}s): ",
            tier = draft.tier.label(),
            body = draft.body,
            secs = wait.as_secs(),
        ));

        let Some(line) = read_line_within(&self.input, wait).await else {
            info!(sender = sender_name, ?wait, "No decision before deadline, skipping");
            return Decision::Skip;
        };

        match line.trim().to_lowercase().as_str() {
            "a" | "send" | "approve" => Decision::Send,
            "e" | "edit" if self.config.non_interactive => Decision::Send,
            "e" | "edit" => self.read_edit(draft, wait).await,
            other => {
                debug!(sender = sender_name, input = other, "Skipping");
                Decision::Skip
            }
        }
    }

    async fn read_edit(&self, draft: &ReplyDraft, wait: Duration) -> Decision {
        self.input.present("Enter the edited reply on one line: ");
        match read_line_within(&self.input, wait).await {
            Some(line) if !line.trim().is_empty() => Decision::Edit(draft.edited(line.trim())),
            _ => {
                info!("No edited text, sending the original draft");
                Decision::Send
            }
        }
    }
}

/// One line from `input`, or `None` once `wait` has elapsed.
///
/// Closed input counts as no answer; the deadline is still honored.
pub async fn read_line_within(input: &Arc<dyn OperatorInput>, wait: Duration) -> Option<String> {
    let deadline = Instant::now() + wait;
    let (tx, rx) = oneshot::channel();
    let reader_input = Arc::clone(input);
    let reader = tokio::spawn(async move {
        if let Some(line) = reader_input.read_line().await {
            let _ = tx.send(line);
        }
    });

    match tokio::time::timeout_at(deadline, rx).await {
        Ok(Ok(line)) => Some(line),
        Ok(Err(_)) => {
            tokio::time::sleep_until(deadline).await;
            None
        }
        Err(_) => {
            reader.abort();
            None
        }
    }
}
