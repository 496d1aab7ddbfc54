//! Ordered-candidate element lookup.
//!
//! A [`CandidateList`] names one logical UI target and the probes that may
//! find it. Probes are tried strictly in order; each is polled until the
//! list's per-candidate timeout, and the first probe that yields a match
//! wins. Lookups never fail with an error: exhausting the list is `None`.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::browser::Surface;

/// Extra condition a matched node must satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbePredicate {
    /// Trimmed text equals the value exactly.
    TextEquals(String),
    /// Attribute exists and contains the needle.
    AttributeContains { name: String, needle: String },
    /// Trimmed text is non-empty.
    NonEmptyText,
}

/// A selector plus an optional predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub selector: String,
    pub predicate: Option<ProbePredicate>,
}

impl Probe {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            predicate: None,
        }
    }

    pub fn with_text(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            predicate: Some(ProbePredicate::TextEquals(text.into())),
        }
    }

    pub fn with_attribute(
        selector: impl Into<String>,
        name: impl Into<String>,
        needle: impl Into<String>,
    ) -> Self {
        Self {
            selector: selector.into(),
            predicate: Some(ProbePredicate::AttributeContains {
                name: name.into(),
                needle: needle.into(),
            }),
        }
    }

    pub fn non_empty(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            predicate: Some(ProbePredicate::NonEmptyText),
        }
    }
}

/// Ordered probes for one UI target.
#[derive(Debug, Clone)]
pub struct CandidateList {
    /// Name used in logs, e.g. "send control".
    pub target: &'static str,
    pub probes: Vec<Probe>,
    /// How long each probe is polled before moving on. Zero means one attempt.
    pub timeout: Duration,
}

impl CandidateList {
    pub fn new(target: &'static str, probes: Vec<Probe>) -> Self {
        Self {
            target,
            probes,
            timeout: Duration::ZERO,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Default delay between polls of a single probe.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Resolves candidate lists against a surface.
#[derive(Debug, Clone, Copy)]
pub struct Locator {
    poll_interval: Duration,
}

impl Default for Locator {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl Locator {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// First node of the first probe that matches within its timeout.
    pub async fn locate<S: Surface + ?Sized>(
        &self,
        surface: &S,
        candidates: &CandidateList,
        scope: Option<&S::Node>,
    ) -> Option<S::Node> {
        let (index, mut nodes) = self.resolve(surface, candidates, scope).await?;
        debug!(target_name = candidates.target, probe = index, "Located");
        Some(nodes.swap_remove(0))
    }

    /// Every node matched by the first probe that matches anything.
    pub async fn locate_all<S: Surface + ?Sized>(
        &self,
        surface: &S,
        candidates: &CandidateList,
        scope: Option<&S::Node>,
    ) -> Vec<S::Node> {
        match self.resolve(surface, candidates, scope).await {
            Some((index, nodes)) => {
                debug!(target_name = candidates.target, probe = index, count = nodes.len(), "Located all");
                nodes
            }
            None => Vec::new(),
        }
    }

    /// Whether any probe matches right now (single attempt per probe).
    pub async fn exists<S: Surface + ?Sized>(
        &self,
        surface: &S,
        candidates: &CandidateList,
        scope: Option<&S::Node>,
    ) -> bool {
        for probe in &candidates.probes {
            if !self.attempt(surface, probe, scope).await.is_empty() {
                return true;
            }
        }
        false
    }

    async fn resolve<S: Surface + ?Sized>(
        &self,
        surface: &S,
        candidates: &CandidateList,
        scope: Option<&S::Node>,
    ) -> Option<(usize, Vec<S::Node>)> {
        for (index, probe) in candidates.probes.iter().enumerate() {
            let deadline = Instant::now() + candidates.timeout;
            loop {
                let nodes = self.attempt(surface, probe, scope).await;
                if !nodes.is_empty() {
                    return Some((index, nodes));
                }
                if Instant::now() >= deadline {
                    break;
                }
                tokio::time::sleep(self.poll_interval).await;
            }
            trace!(target_name = candidates.target, selector = %probe.selector, "Probe missed");
        }
        debug!(target_name = candidates.target, "No candidate resolved");
        None
    }

    async fn attempt<S: Surface + ?Sized>(
        &self,
        surface: &S,
        probe: &Probe,
        scope: Option<&S::Node>,
    ) -> Vec<S::Node> {
        let nodes = match surface.query_all(scope, &probe.selector).await {
            Ok(nodes) => nodes,
            Err(e) => {
                trace!(selector = %probe.selector, error = %e, "Query failed");
                return Vec::new();
            }
        };
        let Some(predicate) = &probe.predicate else {
            return nodes;
        };

        let mut matched = Vec::new();
        for node in nodes {
            if satisfies(surface, &node, predicate).await {
                matched.push(node);
            }
        }
        matched
    }
}

async fn satisfies<S: Surface + ?Sized>(surface: &S, node: &S::Node, predicate: &ProbePredicate) -> bool {
    match predicate {
        ProbePredicate::TextEquals(expected) => surface
            .text(node)
            .await
            .is_ok_and(|text| text.trim() == expected),
        ProbePredicate::NonEmptyText => surface
            .text(node)
            .await
            .is_ok_and(|text| !text.trim().is_empty()),
        ProbePredicate::AttributeContains { name, needle } => surface
            .attribute(node, name)
            .await
            .ok()
            .flatten()
            .is_some_and(|value| value.contains(needle.as_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::memory::{MemorySurface, fixtures};

    fn list(probes: Vec<Probe>) -> CandidateList {
        CandidateList::new("test target", probes).with_timeout(Duration::from_secs(2))
    }

    #[tokio::test(start_paused = true)]
    async fn first_matching_probe_wins() {
        let surface = MemorySurface::with_inbox(fixtures::inbox());
        surface.goto(fixtures::MESSAGING_URL, Duration::from_secs(5)).await.unwrap();
        let locator = Locator::default();

        let candidates = list(vec![
            Probe::css(".does-not-exist"),
            Probe::css(".msg-conversation-listitem"),
            Probe::css(".msg-conversations-container"),
        ]);
        let nodes = locator.locate_all(&surface, &candidates, None).await;
        assert_eq!(nodes.len(), fixtures::inbox().len());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_list_is_none_after_polling() {
        let surface = MemorySurface::new();
        let locator = Locator::default();
        let started = Instant::now();

        let candidates = list(vec![Probe::css(".a"), Probe::css(".b")]);
        assert!(locator.locate(&surface, &candidates, None).await.is_none());
        assert!(started.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_is_single_attempt() {
        let surface = MemorySurface::new();
        let locator = Locator::default();
        let started = Instant::now();

        let candidates = CandidateList::new("quick", vec![Probe::css(".a")]);
        assert!(locator.locate(&surface, &candidates, None).await.is_none());
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn text_predicate_filters_matches() {
        let surface = MemorySurface::with_inbox(fixtures::inbox());
        surface.goto(fixtures::MESSAGING_URL, Duration::from_secs(5)).await.unwrap();
        let locator = Locator::default();

        let first = locator
            .locate(&surface, &list(vec![Probe::css(".msg-conversation-listitem")]), None)
            .await
            .unwrap();
        surface.click(&first).await.unwrap();

        let send = list(vec![Probe::with_text("button", "Senden"), Probe::with_text("button", "Send")]);
        let node = locator.locate(&surface, &send, None).await.unwrap();
        assert_eq!(surface.text(&node).await.unwrap(), "Send");
    }

    #[tokio::test(start_paused = true)]
    async fn attribute_predicate_matches_substring() {
        let surface = MemorySurface::with_inbox(fixtures::inbox());
        surface.goto(fixtures::MESSAGING_URL, Duration::from_secs(5)).await.unwrap();
        let locator = Locator::default();
        let first = locator
            .locate(&surface, &list(vec![Probe::css(".msg-conversation-listitem")]), None)
            .await
            .unwrap();
        surface.click(&first).await.unwrap();

        let german = list(vec![Probe::with_attribute("div[contenteditable='true']", "aria-label", "Nachricht")]);
        assert!(locator.locate(&surface, &german, None).await.is_none());
        let english = list(vec![Probe::with_attribute("div[contenteditable='true']", "aria-label", "message")]);
        assert!(locator.locate(&surface, &english, None).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn scope_limits_query_to_subtree() {
        let surface = MemorySurface::with_inbox(fixtures::inbox());
        surface.goto(fixtures::MESSAGING_URL, Duration::from_secs(5)).await.unwrap();
        let locator = Locator::default();

        let items = locator
            .locate_all(&surface, &list(vec![Probe::css(".msg-conversation-listitem")]), None)
            .await;
        let badge = CandidateList::new("badge", vec![Probe::css(".msg-conversation-card__unread-count")]);
        // Fixture order: unread badge, read, bold-only unread.
        assert!(locator.exists(&surface, &badge, Some(&items[0])).await);
        assert!(!locator.exists(&surface, &badge, Some(&items[1])).await);
    }
}
