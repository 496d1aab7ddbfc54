//! Inbox triage: classify unread messages and reply with operator approval.

pub mod approval;
pub mod artifacts;
pub mod browser;
pub mod config;
pub mod error;
pub mod llm;
pub mod pacing;
pub mod pipeline;
pub mod scheduler;
pub mod session;
pub mod triage;

pub use error::{Error, Result};
