//! Browser automation seam.
//!
//! Everything that touches the messaging UI goes through the [`Surface`]
//! trait. [`chromium::ChromiumSurface`] drives a real browser over CDP;
//! `memory::MemorySurface` is an in-process stand-in with the same
//! observable behavior, built for tests and the `test-support` feature.

pub mod chromium;
pub mod locator;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod selectors;

pub use chromium::ChromiumSurface;
pub use locator::{CandidateList, Locator, Probe, ProbePredicate};

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BrowserError;

/// One browser cookie, in the field layout of the persisted session file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    /// Seconds since the epoch; `-1` for session cookies.
    #[serde(default = "default_cookie_expiry")]
    pub expires: f64,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_cookie_expiry() -> f64 {
    -1.0
}

/// A page the triage loop can query and drive.
///
/// `scope = None` queries the whole document; `Some(node)` limits the query
/// to that node's subtree. Node handles are only valid until the page
/// re-renders; callers re-query instead of holding them across navigation.
#[async_trait]
pub trait Surface: Send + Sync {
    type Node: Send + Sync;

    /// Navigate and wait for the load to finish, failing after `timeout`.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    /// All nodes matching a CSS selector, in document order.
    async fn query_all(
        &self,
        scope: Option<&Self::Node>,
        selector: &str,
    ) -> Result<Vec<Self::Node>, BrowserError>;

    /// Rendered text of a node.
    async fn text(&self, node: &Self::Node) -> Result<String, BrowserError>;

    async fn attribute(&self, node: &Self::Node, name: &str) -> Result<Option<String>, BrowserError>;

    /// Computed CSS font weight (400 = normal, 700 = bold).
    async fn font_weight(&self, node: &Self::Node) -> Result<u32, BrowserError>;

    async fn scroll_into_view(&self, node: &Self::Node) -> Result<(), BrowserError>;

    /// Native pointer click.
    async fn click(&self, node: &Self::Node) -> Result<(), BrowserError>;

    /// `element.click()` run as page script.
    async fn script_click(&self, node: &Self::Node) -> Result<(), BrowserError>;

    /// Empty an input or contenteditable node.
    async fn clear(&self, node: &Self::Node) -> Result<(), BrowserError>;

    /// Type text into a node as keystrokes.
    async fn type_text(&self, node: &Self::Node, text: &str) -> Result<(), BrowserError>;

    /// Replace a node's text in page script, for editors that drop keystrokes.
    async fn set_text_content(&self, node: &Self::Node, text: &str) -> Result<(), BrowserError>;

    async fn press_enter(&self, node: &Self::Node) -> Result<(), BrowserError>;

    async fn screenshot(&self, path: &Path) -> Result<(), BrowserError>;

    /// Serialized HTML of the current document.
    async fn page_source(&self) -> Result<String, BrowserError>;

    async fn cookies(&self) -> Result<Vec<CookieRecord>, BrowserError>;

    async fn set_cookies(&self, cookies: &[CookieRecord]) -> Result<(), BrowserError>;
}

/// Navigate, retrying once with double the timeout when the first attempt
/// times out. Other errors are returned as-is.
pub async fn goto_with_retry<S: Surface + ?Sized>(
    surface: &S,
    url: &str,
    timeout: Duration,
) -> Result<(), BrowserError> {
    match surface.goto(url, timeout).await {
        Err(BrowserError::NavigationTimeout { .. }) => {
            tracing::warn!(url, ?timeout, "Navigation timed out, retrying with a longer timeout");
            surface.goto(url, timeout * 2).await
        }
        other => other,
    }
}
