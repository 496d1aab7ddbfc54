use std::path::Path;
use std::sync::{Arc, OnceLock};

use anyhow::Context;
use tokio::sync::{Notify, OnceCell};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use inbox_triage::approval::{ApprovalGate, NoOperator, OperatorInput, StdinInput};
use inbox_triage::artifacts::ArtifactWriter;
use inbox_triage::browser::ChromiumSurface;
use inbox_triage::config::TriageConfig;
use inbox_triage::llm::{LlmConfig, LlmProvider, create_provider};
use inbox_triage::pipeline::{Classifier, ResponseGenerator, TemplateStore};
use inbox_triage::scheduler::Scheduler;
use inbox_triage::session::{SessionManager, SessionStore};
use inbox_triage::triage::{TriageReport, TriageRunner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let once = std::env::args().skip(1).any(|arg| arg == "--once");
    let config = TriageConfig::from_env().context("invalid configuration")?;
    let _log_guard = init_tracing(config.log_dir.as_deref());

    eprintln!("📬 Inbox Triage v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   Mode: {}{}",
        if config.approval.non_interactive { "non-interactive" } else { "interactive" },
        if config.approval.auto_approve { ", auto-approve" } else { "" }
    );
    if once {
        eprintln!("   Running a single cycle");
    } else {
        eprintln!(
            "   Active {}:00-{}:00, every {} min",
            config.schedule.start_hour,
            config.schedule.end_hour,
            config.schedule.check_interval.as_secs() / 60
        );
    }

    let operator: Arc<dyn OperatorInput> = if config.approval.non_interactive {
        Arc::new(NoOperator)
    } else {
        Arc::new(StdinInput::spawn())
    };

    // The browser starts on the first cycle that actually runs.
    let runner = OnceCell::new();
    if once {
        match cycle(&runner, &config, &operator).await {
            Ok(report) => {
                tracing::info!(processed = report.processed(), sent = report.sent(), "Single cycle done");
            }
            Err(e) => {
                close(runner).await;
                return Err(e).context("triage run failed");
            }
        }
    } else {
        let scheduler = Scheduler::from_config(&config.schedule);
        let fatal = OnceLock::new();
        let stop = Notify::new();
        {
            let (runner, config, operator) = (&runner, &config, &operator);
            let (fatal, stop) = (&fatal, &stop);
            scheduler
                .run(
                    move || async move {
                        match cycle(runner, config, operator).await {
                            Ok(_) => {}
                            Err(e) if e.is_fatal() => {
                                tracing::error!(error = %e, "Triage cannot continue");
                                let _ = fatal.set(e);
                                stop.notify_one();
                            }
                            Err(e) => {
                                tracing::error!(error = %e, "Triage cycle failed, retrying on the next trigger");
                            }
                        }
                    },
                    async {
                        tokio::select! {
                            signal = tokio::signal::ctrl_c() => {
                                if let Err(e) = signal {
                                    tracing::error!("Failed to listen for shutdown signal: {}", e);
                                    std::future::pending::<()>().await;
                                }
                            }
                            _ = stop.notified() => {}
                        }
                    },
                )
                .await;
        }
        if let Some(e) = fatal.into_inner() {
            close(runner).await;
            return Err(e).context("triage stopped");
        }
    }

    close(runner).await;
    Ok(())
}

async fn close(runner: OnceCell<TriageRunner<ChromiumSurface>>) {
    if let Some(runner) = runner.into_inner() {
        match Arc::try_unwrap(runner.into_surface()) {
            Ok(surface) => surface.close().await,
            Err(_) => tracing::warn!("Browser still referenced at shutdown"),
        }
    }
}

/// One triage cycle: start the browser if needed, make sure the session is
/// live, then triage.
async fn cycle(
    runner: &OnceCell<TriageRunner<ChromiumSurface>>,
    config: &TriageConfig,
    operator: &Arc<dyn OperatorInput>,
) -> inbox_triage::Result<TriageReport> {
    let runner = runner
        .get_or_try_init(|| start(config, Arc::clone(operator)))
        .await?;
    runner.run_authenticated().await
}

async fn start(
    config: &TriageConfig,
    operator: Arc<dyn OperatorInput>,
) -> inbox_triage::Result<TriageRunner<ChromiumSurface>> {
    let llm: Option<Arc<dyn LlmProvider>> = match &config.openai_api_key {
        Some(key) => match create_provider(&LlmConfig {
            api_key: key.clone(),
            model: config.openai_model.clone(),
        }) {
            Ok(provider) => Some(provider),
            Err(e) => {
                tracing::warn!(error = %e, "Model client unavailable, using templates only");
                None
            }
        },
        None => {
            tracing::info!("No OPENAI_API_KEY, replies come from templates");
            None
        }
    };

    let surface = Arc::new(ChromiumSurface::launch(config.headless).await?);
    tracing::info!(headless = config.headless, "Browser started");

    let session = SessionManager::new(
        SessionStore::new(config.session_path.clone()),
        config.credentials.clone(),
        config.approval.non_interactive,
        Arc::clone(&operator),
    );
    let templates = Arc::new(TemplateStore::load(&config.templates_path));
    let responder = ResponseGenerator::new(llm, templates, config.persona.clone());
    Ok(TriageRunner::new(
        surface,
        Classifier::default(),
        responder,
        config.reply_strategy,
        ApprovalGate::new(config.approval, operator),
    )
    .with_session(session)
    .with_artifacts(ArtifactWriter::new(config.debug_dir.clone())))
}

/// Stderr logging, plus a daily log file when `log_dir` is set.
fn init_tracing(log_dir: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let (file, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "inbox-triage.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file)
        .init();
    guard
}
