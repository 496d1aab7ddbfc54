//! Process configuration, read from environment-style key/value pairs.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default active window (8:00 to 20:00 local time).
const DEFAULT_START_HOUR: u32 = 8;
const DEFAULT_END_HOUR: u32 = 20;
const DEFAULT_CHECK_INTERVAL_MINUTES: u64 = 60;
const DEFAULT_RESPONSE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Identity the replies are written as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    /// First name used in sign-offs.
    pub name: String,
    /// Job title, e.g. "Senior DevOps and Platform Engineer".
    pub role: String,
    /// Short list of focus areas.
    pub focus: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            name: "Alex".to_string(),
            role: "Senior DevOps and Platform Engineer".to_string(),
            focus: "Kubernetes, Terraform and container technologies".to_string(),
        }
    }
}

/// Which reply chain the triage loop runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplyStrategy {
    /// Generated tier when a model credential exists, then contextual templates.
    #[default]
    Layered,
    /// Random pick from the template store.
    Generic,
}

/// Account credential pair.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

/// Approval gate settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovalConfig {
    /// No operator is present; edits degrade to send.
    pub non_interactive: bool,
    /// Approve every draft immediately.
    pub auto_approve: bool,
    /// Configured wait for an operator decision.
    pub response_timeout: Duration,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            non_interactive: false,
            auto_approve: false,
            response_timeout: Duration::from_secs(DEFAULT_RESPONSE_TIMEOUT_SECS),
        }
    }
}

/// Scheduling window and interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub start_hour: u32,
    pub end_hour: u32,
    pub check_interval: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            start_hour: DEFAULT_START_HOUR,
            end_hour: DEFAULT_END_HOUR,
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_MINUTES * 60),
        }
    }
}

/// Full process configuration.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    pub credentials: Option<Credentials>,
    pub openai_api_key: Option<SecretString>,
    pub openai_model: String,
    pub approval: ApprovalConfig,
    pub schedule: ScheduleConfig,
    pub reply_strategy: ReplyStrategy,
    pub persona: Persona,
    pub templates_path: PathBuf,
    pub session_path: PathBuf,
    /// Directory for screenshots and page captures. `None` disables them.
    pub debug_dir: Option<PathBuf>,
    pub headless: bool,
    /// Directory for the rolling log file. `None` logs to stderr only.
    pub log_dir: Option<PathBuf>,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            credentials: None,
            openai_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            approval: ApprovalConfig::default(),
            schedule: ScheduleConfig::default(),
            reply_strategy: ReplyStrategy::default(),
            persona: Persona::default(),
            templates_path: PathBuf::from("response_templates.json"),
            session_path: PathBuf::from("linkedin_cookies.json"),
            debug_dir: None,
            headless: true,
            log_dir: None,
        }
    }
}

impl TriageConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let flag = |key: &str, default: bool| {
            non_empty(key)
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(default)
        };

        let credentials = match (non_empty("LINKEDIN_EMAIL"), lookup("LINKEDIN_PASSWORD")) {
            (Some(email), Some(password)) if !password.is_empty() => Some(Credentials {
                email,
                password: SecretString::from(password),
            }),
            _ => None,
        };

        let response_timeout_secs: u64 =
            parse_or(non_empty("RESPONSE_TIMEOUT"), "RESPONSE_TIMEOUT", DEFAULT_RESPONSE_TIMEOUT_SECS)?;
        let start_hour: u32 = parse_or(non_empty("ACTIVE_START_HOUR"), "ACTIVE_START_HOUR", DEFAULT_START_HOUR)?;
        let end_hour: u32 = parse_or(non_empty("ACTIVE_END_HOUR"), "ACTIVE_END_HOUR", DEFAULT_END_HOUR)?;
        let interval_minutes: u64 = parse_or(
            non_empty("CHECK_INTERVAL_MINUTES"),
            "CHECK_INTERVAL_MINUTES",
            DEFAULT_CHECK_INTERVAL_MINUTES,
        )?;

        if start_hour > 24 || end_hour > 24 {
            return Err(ConfigError::InvalidValue {
                key: "ACTIVE_START_HOUR/ACTIVE_END_HOUR".into(),
                message: format!("hours must be within 0..=24 (got {start_hour}..{end_hour})"),
            });
        }
        if interval_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CHECK_INTERVAL_MINUTES".into(),
                message: "must be at least 1".into(),
            });
        }
        let interval_secs = interval_minutes
            .checked_mul(60)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "CHECK_INTERVAL_MINUTES".into(),
                message: format!("{interval_minutes} minutes is out of range"),
            })?;

        let reply_strategy = match non_empty("REPLY_STRATEGY").as_deref() {
            None | Some("layered") => ReplyStrategy::Layered,
            Some("generic") => ReplyStrategy::Generic,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "REPLY_STRATEGY".into(),
                    message: format!("expected 'layered' or 'generic', got '{other}'"),
                });
            }
        };

        let defaults = Persona::default();
        let persona = Persona {
            name: non_empty("PERSONA_NAME").unwrap_or(defaults.name),
            role: non_empty("PERSONA_ROLE").unwrap_or(defaults.role),
            focus: non_empty("PERSONA_FOCUS").unwrap_or(defaults.focus),
        };

        Ok(Self {
            credentials,
            openai_api_key: non_empty("OPENAI_API_KEY").map(SecretString::from),
            openai_model: non_empty("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            approval: ApprovalConfig {
                non_interactive: flag("NON_INTERACTIVE", false),
                auto_approve: flag("AUTO_APPROVE", false),
                response_timeout: Duration::from_secs(response_timeout_secs),
            },
            schedule: ScheduleConfig {
                start_hour,
                end_hour,
                check_interval: Duration::from_secs(interval_secs),
            },
            reply_strategy,
            persona,
            templates_path: non_empty("TEMPLATES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("response_templates.json")),
            session_path: non_empty("SESSION_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("linkedin_cookies.json")),
            debug_dir: non_empty("DEBUG_DIR").map(PathBuf::from),
            headless: flag("HEADLESS", true),
            log_dir: non_empty("TRIAGE_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{value}': {e}"),
        }),
    }
}
