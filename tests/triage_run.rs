//! End-to-end triage runs against the in-memory messaging surface.
//!
//! Each test logs in, runs the full discovery → classify → draft →
//! approve → deliver cycle and inspects what the surface received.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;

use inbox_triage::approval::{ApprovalGate, NoOperator};
use inbox_triage::browser::memory::{FakeAccount, FakeConversation, Layout, MemorySurface, fixtures};
use inbox_triage::config::{ApprovalConfig, Credentials, Persona, ReplyStrategy};
use inbox_triage::error::LlmError;
use inbox_triage::llm::{CompletionRequest, CompletionResponse, LlmProvider};
use inbox_triage::pacing::Pacer;
use inbox_triage::pipeline::{Classifier, ResponseGenerator, TemplateStore, Tier};
use inbox_triage::session::{LoginMethod, SessionManager, SessionStore};
use inbox_triage::triage::{ConversationOutcome, TriageRunner};

/// Model stub that counts calls and always answers with one line.
struct CountingLlm {
    calls: AtomicUsize,
}

#[async_trait]
impl LlmProvider for CountingLlm {
    fn model_name(&self) -> &str {
        "counting"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CompletionResponse {
            content: "Thanks for reaching out! What is the salary range?".into(),
            input_tokens: 80,
            output_tokens: 12,
        })
    }
}

fn auto_approve() -> ApprovalConfig {
    ApprovalConfig {
        non_interactive: true,
        auto_approve: true,
        response_timeout: Duration::from_secs(30),
    }
}

fn runner(
    surface: Arc<MemorySurface>,
    llm: Option<Arc<dyn LlmProvider>>,
    strategy: ReplyStrategy,
    approval: ApprovalConfig,
) -> TriageRunner<MemorySurface> {
    let responder = ResponseGenerator::new(llm, Arc::new(TemplateStore::defaults()), Persona::default());
    TriageRunner::new(
        surface,
        Classifier::default(),
        responder,
        strategy,
        ApprovalGate::new(approval, Arc::new(NoOperator)),
    )
    .with_pacer(Pacer::instant())
}

const DEVOPS_OFFER: &str =
    "We have an exciting DevOps Engineer opportunity with Kubernetes and AWS, salary negotiable";

fn account() -> FakeAccount {
    FakeAccount {
        email: "me@example.com".into(),
        password: "hunter2".into(),
        pin: None,
        token: "session-token".into(),
    }
}

fn session(dir: &tempfile::TempDir) -> SessionManager {
    SessionManager::new(
        SessionStore::new(dir.path().join("cookies.json")),
        Some(Credentials {
            email: "me@example.com".into(),
            password: SecretString::from("hunter2"),
        }),
        true,
        Arc::new(NoOperator),
    )
    .with_pacer(Pacer::instant())
}

#[tokio::test(start_paused = true)]
async fn login_then_reply_to_every_unread_conversation() {
    let dir = tempfile::tempdir().unwrap();
    let surface = Arc::new(MemorySurface::requiring_login(account()));
    for conversation in fixtures::inbox().into_iter().rev() {
        surface.deliver(conversation);
    }

    let session = session(&dir);
    assert_eq!(session.establish(surface.as_ref()).await.unwrap(), LoginMethod::Credentials);
    assert!(dir.path().join("cookies.json").exists());

    let report = runner(surface.clone(), None, ReplyStrategy::Layered, auto_approve())
        .run()
        .await;

    assert_eq!(report.processed(), 2);
    assert_eq!(report.sent(), 2);
    assert_eq!(surface.unread_count(), 0);

    let sent = surface.sent();
    assert_eq!(sent[0].0, "Jane Recruiter (2nd)");
    assert!(sent[0].1.contains("Best regards,\nAlex"));
    assert_eq!(sent[1].0, "Klaus Personal");
    assert!(sent[1].1.starts_with("Hallo Klaus Personal"));
}

#[tokio::test(start_paused = true)]
async fn rerun_is_idempotent_and_picks_up_new_mail() {
    let surface = Arc::new(MemorySurface::with_inbox(fixtures::inbox()));
    let runner = runner(surface.clone(), None, ReplyStrategy::Layered, auto_approve());

    assert_eq!(runner.run().await.sent(), 2);
    assert_eq!(runner.run().await.processed(), 0);

    surface.deliver(FakeConversation::unread(
        "New Recruiter (3rd)",
        &["Interested in this position? Please send your resume and cv."],
    ));
    let third = runner.run().await;
    assert_eq!(third.processed(), 1);
    assert_eq!(third.records[0].sender, "New Recruiter");
    assert_eq!(surface.sent().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn generated_tier_used_only_for_actionable_messages() {
    let surface = Arc::new(MemorySurface::with_inbox(vec![
        FakeConversation::unread("Vendor (3rd)", &["Check out our new productivity app, free trial available!"]),
        FakeConversation::unread(
            "Jane (2nd)",
            &["We have an exciting DevOps Engineer opportunity with Kubernetes and AWS, salary negotiable"],
        ),
    ]));
    let llm = Arc::new(CountingLlm {
        calls: AtomicUsize::new(0),
    });
    let report = runner(surface.clone(), Some(llm.clone() as Arc<dyn LlmProvider>), ReplyStrategy::Layered, auto_approve())
        .run()
        .await;

    assert!(matches!(report.records[0].outcome, ConversationOutcome::NotActionable { .. }));
    assert_eq!(report.records[1].outcome, ConversationOutcome::Sent { tier: Tier::Generated });
    assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        surface.sent(),
        vec![(
            "Jane (2nd)".to_string(),
            "Thanks for reaching out! What is the salary range?".to_string()
        )]
    );
}

#[tokio::test(start_paused = true)]
async fn generic_strategy_sends_a_store_template() {
    let surface = Arc::new(MemorySurface::with_inbox(fixtures::inbox()));
    let report = runner(surface.clone(), None, ReplyStrategy::Generic, auto_approve())
        .run()
        .await;

    let store = TemplateStore::defaults();
    assert!(report
        .records
        .iter()
        .all(|r| r.outcome == ConversationOutcome::Sent { tier: Tier::GenericTemplate }));
    for (_, body) in surface.sent() {
        let known = ["job_offer", "recruiter_intro", "follow_up", "not_interested"]
            .iter()
            .filter_map(|k| store.get(k))
            .flatten()
            .any(|t| *t == body);
        assert!(known, "unexpected body {body:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn silent_operator_skips_after_timeout() {
    let surface = Arc::new(MemorySurface::with_inbox(fixtures::inbox()));
    let approval = ApprovalConfig {
        non_interactive: true,
        auto_approve: false,
        response_timeout: Duration::from_secs(5),
    };
    let started = tokio::time::Instant::now();
    let report = runner(surface.clone(), None, ReplyStrategy::Layered, approval)
        .run()
        .await;

    assert_eq!(report.processed(), 2);
    assert!(report
        .records
        .iter()
        .all(|r| r.outcome == ConversationOutcome::SkippedByGate));
    assert!(surface.sent().is_empty());
    assert!(started.elapsed() >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn identical_listings_are_each_answered() {
    let surface = Arc::new(MemorySurface::with_inbox(vec![
        FakeConversation::unread("LinkedIn Member", &[DEVOPS_OFFER]),
        FakeConversation::unread("LinkedIn Member", &[DEVOPS_OFFER]),
    ]));
    let report = runner(surface.clone(), None, ReplyStrategy::Layered, auto_approve())
        .run()
        .await;

    assert_eq!(report.processed(), 2);
    assert_eq!(report.sent(), 2);
    assert_eq!(surface.unread_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn lost_list_after_reply_is_recovered_by_navigation() {
    let surface = Arc::new(MemorySurface::with_inbox(fixtures::inbox()));
    surface.set_layout(Layout {
        list_after_back: false,
        ..Layout::default()
    });
    let report = runner(surface.clone(), None, ReplyStrategy::Layered, auto_approve())
        .run()
        .await;

    assert_eq!(report.sent(), 2);
    assert_eq!(report.records[1].sender, "Klaus Personal");
    assert_eq!(surface.unread_count(), 0);
    // Initial navigation plus one after each failed restore.
    assert_eq!(surface.navigation_timeouts().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn lapsed_session_is_restored_before_the_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let surface = Arc::new(MemorySurface::requiring_login(account()));
    for conversation in fixtures::inbox().into_iter().rev() {
        surface.deliver(conversation);
    }
    let runner = runner(surface.clone(), None, ReplyStrategy::Layered, auto_approve()).with_session(session(&dir));

    let first = runner.run_authenticated().await.unwrap();
    assert_eq!(first.sent(), 2);

    surface.expire_session();
    surface.deliver(FakeConversation::unread("New Recruiter (3rd)", &[DEVOPS_OFFER]));
    let second = runner.run_authenticated().await.unwrap();

    assert!(surface.is_authenticated());
    assert_eq!(second.processed(), 1);
    assert_eq!(second.records[0].sender, "New Recruiter");
    assert_eq!(surface.sent().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn missing_credentials_end_the_cycle_with_a_session_error() {
    let dir = tempfile::tempdir().unwrap();
    let surface = Arc::new(MemorySurface::requiring_login(account()));
    let session = SessionManager::new(
        SessionStore::new(dir.path().join("cookies.json")),
        None,
        true,
        Arc::new(NoOperator),
    )
    .with_pacer(Pacer::instant());
    let runner = runner(surface.clone(), None, ReplyStrategy::Layered, auto_approve()).with_session(session);

    let err = runner.run_authenticated().await.unwrap_err();
    assert!(matches!(
        err,
        inbox_triage::Error::Session(inbox_triage::error::SessionError::CredentialsUnavailable)
    ));
    assert!(surface.sent().is_empty());
}
