//! Finding unread conversations and reading the open one.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::browser::{Locator, Surface, goto_with_retry, selectors};
use crate::error::PipelineError;
use crate::pacing::{PacePoint, Pacer};

/// Placeholder when no profile probe yields a usable name.
pub const UNKNOWN_SENDER: &str = "Unknown Contact";

/// Title font weight above which an entry counts as unread.
const BOLD_THRESHOLD: u32 = 400;

/// Longest accepted sender name, in characters (exclusive).
const MAX_SENDER_CHARS: usize = 50;

/// Timeout for the messaging page load.
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(15);

static MEMBERSHIP_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s+\((?:LinkedIn Member|1st|2nd|3rd)\)$").expect("valid suffix regex")
});

/// An unread conversation entry as listed right now.
///
/// Valid only until the list re-renders; the triage loop re-discovers
/// after every restore instead of reusing handles.
#[derive(Debug)]
pub struct ConversationHandle<N> {
    pub node: N,
    /// Position in the current listing.
    pub ordinal: usize,
    /// Thread href when the entry links to one, otherwise ordinal plus
    /// listing text. Recognizes the entry after a re-render.
    pub fingerprint: String,
}

/// Navigate to the messaging page. Failure is logged; the page may still
/// have partially loaded.
pub async fn open_messaging<S: Surface + ?Sized>(surface: &S, pacer: &Pacer) {
    pacer.pause(PacePoint::Navigate).await;
    if let Err(e) = goto_with_retry(surface, selectors::MESSAGING_URL, NAVIGATION_TIMEOUT).await {
        warn!(error = %e, "Messaging navigation failed, continuing with current page");
    }
}

/// Whether any messaging-interface candidate resolves.
pub async fn messaging_ready<S: Surface + ?Sized>(surface: &S, locator: &Locator) -> bool {
    locator
        .locate(surface, &selectors::messaging_interface(), None)
        .await
        .is_some()
}

/// Unread entries in listing order.
pub async fn unread_conversations<S: Surface + ?Sized>(
    surface: &S,
    locator: &Locator,
) -> Vec<ConversationHandle<S::Node>> {
    let entries = locator
        .locate_all(surface, &selectors::conversation_items(), None)
        .await;
    let total = entries.len();

    let mut unread = Vec::new();
    for (ordinal, node) in entries.into_iter().enumerate() {
        if !is_unread(surface, locator, &node).await {
            continue;
        }
        let href = match locator
            .locate(surface, &selectors::conversation_link(), Some(&node))
            .await
        {
            Some(link) => surface.attribute(&link, "href").await.ok().flatten(),
            None => None,
        };
        let text = surface.text(&node).await.unwrap_or_default();
        let fingerprint = fingerprint(href.as_deref(), ordinal, &text);
        unread.push(ConversationHandle {
            node,
            ordinal,
            fingerprint,
        });
    }
    debug!(total, unread = unread.len(), "Scanned conversation list");
    unread
}

/// Identity of a listed conversation: its thread href, or the ordinal and
/// trimmed listing text when the entry carries no link.
pub fn fingerprint(href: Option<&str>, ordinal: usize, text: &str) -> String {
    match href.map(str::trim) {
        Some(href) if !href.is_empty() => href.to_string(),
        _ => format!("#{ordinal}:{}", text.trim()),
    }
}

/// Unread if an indicator matches inside the entry, or its title is bold.
pub async fn is_unread<S: Surface + ?Sized>(surface: &S, locator: &Locator, entry: &S::Node) -> bool {
    if locator
        .exists(surface, &selectors::unread_indicators(), Some(entry))
        .await
    {
        return true;
    }

    let titles = locator
        .locate_all(surface, &selectors::conversation_title(), Some(entry))
        .await;
    for title in &titles {
        if let Ok(weight) = surface.font_weight(title).await
            && weight > BOLD_THRESHOLD
        {
            return true;
        }
    }
    false
}

/// Scroll to and click an entry, falling back to a script click.
pub async fn open_conversation<S: Surface + ?Sized>(
    surface: &S,
    pacer: &Pacer,
    handle: &ConversationHandle<S::Node>,
) -> Result<(), PipelineError> {
    if let Err(e) = surface.scroll_into_view(&handle.node).await {
        debug!(ordinal = handle.ordinal, error = %e, "Scroll into view failed");
    }
    pacer.pause(PacePoint::Scroll).await;

    if let Err(e) = surface.click(&handle.node).await {
        warn!(ordinal = handle.ordinal, error = %e, "Direct click failed, trying script click");
        surface
            .script_click(&handle.node)
            .await
            .map_err(|e| PipelineError::OpenFailed {
                ordinal: handle.ordinal,
                reason: e.to_string(),
            })?;
    }
    pacer.pause(PacePoint::Open).await;
    Ok(())
}

/// Wait for the opened conversation's message container. Absence is only a warning.
pub async fn await_conversation_view<S: Surface + ?Sized>(surface: &S, locator: &Locator) -> bool {
    let ready = locator
        .locate(surface, &selectors::conversation_view(), None)
        .await
        .is_some();
    if !ready {
        warn!("Conversation view did not appear, extracting anyway");
    }
    ready
}

/// Strip membership and degree suffixes; reject empty or overlong names.
pub fn clean_sender_name(raw: &str) -> Option<String> {
    let mut name = raw.trim().to_string();
    while let Some(m) = MEMBERSHIP_SUFFIX.find(&name) {
        name.truncate(m.start());
    }
    let name = name.trim();
    (!name.is_empty() && name.chars().count() < MAX_SENDER_CHARS).then(|| name.to_string())
}

/// Sender name from the first profile probe that yields a usable name.
pub async fn extract_sender<S: Surface + ?Sized>(surface: &S, locator: &Locator) -> String {
    for probe in selectors::profile_title().probes {
        let single = crate::browser::CandidateList::new("profile title", vec![probe]);
        for node in locator.locate_all(surface, &single, None).await {
            if let Ok(text) = surface.text(&node).await
                && let Some(name) = clean_sender_name(&text)
            {
                debug!(sender = %name, "Found sender name");
                return name;
            }
        }
    }
    UNKNOWN_SENDER.to_string()
}

/// Message text: bodies from the first probe with non-empty text, one per line.
pub async fn extract_body<S: Surface + ?Sized>(surface: &S, locator: &Locator) -> Option<String> {
    let nodes = locator
        .locate_all(surface, &selectors::message_bodies(), None)
        .await;
    let mut texts = Vec::with_capacity(nodes.len());
    for node in &nodes {
        if let Ok(text) = surface.text(node).await {
            let text = text.trim();
            if !text.is_empty() {
                texts.push(text.to_string());
            }
        }
    }
    (!texts.is_empty()).then(|| texts.join("\n"))
}

/// Return to the conversation list: back control first, else re-navigate.
pub async fn restore_list<S: Surface + ?Sized>(
    surface: &S,
    locator: &Locator,
    pacer: &Pacer,
) -> Result<(), PipelineError> {
    let went_back = match locator.locate(surface, &selectors::back_button(), None).await {
        Some(back) => match surface.click(&back).await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Back control click failed");
                false
            }
        },
        None => false,
    };

    if !went_back {
        info!("No back control, navigating to the conversation list");
        goto_with_retry(surface, selectors::MESSAGING_URL, NAVIGATION_TIMEOUT)
            .await
            .map_err(|e| PipelineError::RestoreFailed(e.to_string()))?;
    }
    pacer.pause(PacePoint::Restore).await;

    if locator
        .locate(surface, &selectors::conversation_list(), None)
        .await
        .is_none()
    {
        return Err(PipelineError::RestoreFailed("conversation list did not appear".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::memory::{FakeConversation, Layout, MemorySurface, fixtures};

    async fn on_messaging(inbox: Vec<FakeConversation>) -> MemorySurface {
        let surface = MemorySurface::with_inbox(inbox);
        surface.goto(fixtures::MESSAGING_URL, Duration::from_secs(5)).await.unwrap();
        surface
    }

    #[test]
    fn suffixes_are_stripped() {
        assert_eq!(clean_sender_name("Jane Doe (2nd)").as_deref(), Some("Jane Doe"));
        assert_eq!(clean_sender_name("  Max Muster (LinkedIn Member) ").as_deref(), Some("Max Muster"));
        assert_eq!(clean_sender_name("Sam (1st)").as_deref(), Some("Sam"));
        assert_eq!(clean_sender_name("Team (3rd party)").as_deref(), Some("Team (3rd party)"));
    }

    #[test]
    fn empty_or_long_names_rejected() {
        assert!(clean_sender_name("   ").is_none());
        assert!(clean_sender_name(&"x".repeat(50)).is_none());
        assert!(clean_sender_name(&"x".repeat(49)).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn badge_and_bold_entries_are_unread() {
        let surface = on_messaging(fixtures::inbox()).await;
        let unread = unread_conversations(&surface, &Locator::default()).await;
        let ordinals: Vec<usize> = unread.iter().map(|h| h.ordinal).collect();
        assert_eq!(ordinals, vec![0, 2]);
        assert_eq!(unread[0].fingerprint, "/messaging/thread/2-fake0/");
        assert_eq!(unread[1].fingerprint, "/messaging/thread/2-fake2/");
    }

    #[test]
    fn fingerprint_prefers_href_then_ordinal_and_text() {
        assert_eq!(fingerprint(Some("/messaging/thread/abc/"), 3, "Jane"), "/messaging/thread/abc/");
        assert_eq!(fingerprint(Some("  "), 3, " Jane \n hi "), "#3:Jane \n hi");
        assert_ne!(fingerprint(None, 0, "LinkedIn Member"), fingerprint(None, 1, "LinkedIn Member"));
    }

    #[tokio::test(start_paused = true)]
    async fn identical_listings_get_distinct_fingerprints() {
        let surface = on_messaging(vec![
            FakeConversation::unread("LinkedIn Member", &["Same text"]),
            FakeConversation::unread("LinkedIn Member", &["Same text"]),
        ])
        .await;
        let unread = unread_conversations(&surface, &Locator::default()).await;
        assert_eq!(unread.len(), 2);
        assert_ne!(unread[0].fingerprint, unread[1].fingerprint);
    }

    #[tokio::test(start_paused = true)]
    async fn messaging_interface_detected() {
        let surface = on_messaging(fixtures::inbox()).await;
        assert!(messaging_ready(&surface, &Locator::default()).await);

        let elsewhere = MemorySurface::with_inbox(fixtures::inbox());
        elsewhere
            .goto(crate::browser::selectors::FEED_URL, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(!messaging_ready(&elsewhere, &Locator::default()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn open_falls_back_to_script_click() {
        let surface = on_messaging(vec![FakeConversation::unread("A", &["hello"]).with_failing_click()]).await;
        let handle = unread_conversations(&surface, &Locator::default()).await.remove(0);
        open_conversation(&surface, &Pacer::instant(), &handle).await.unwrap();
        assert_eq!(surface.open_conversation(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn extracts_sender_and_joined_body() {
        let surface = on_messaging(vec![FakeConversation::unread(
            "Jane Doe (2nd)",
            &["Hi there", "  ", "We have a role for you"],
        )])
        .await;
        let locator = Locator::default();
        let handle = unread_conversations(&surface, &locator).await.remove(0);
        open_conversation(&surface, &Pacer::instant(), &handle).await.unwrap();

        assert!(await_conversation_view(&surface, &locator).await);
        assert_eq!(extract_sender(&surface, &locator).await, "Jane Doe");
        assert_eq!(
            extract_body(&surface, &locator).await.as_deref(),
            Some("Hi there\nWe have a role for you")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sender_placeholder_when_no_probe_resolves() {
        let surface = on_messaging(fixtures::inbox()).await;
        assert_eq!(extract_sender(&surface, &Locator::default()).await, UNKNOWN_SENDER);
        assert!(extract_body(&surface, &Locator::default()).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn restore_uses_back_control() {
        let surface = on_messaging(fixtures::inbox()).await;
        let locator = Locator::default();
        let handle = unread_conversations(&surface, &locator).await.remove(0);
        open_conversation(&surface, &Pacer::instant(), &handle).await.unwrap();

        let navigations_before = surface.navigation_timeouts().len();
        restore_list(&surface, &locator, &Pacer::instant()).await.unwrap();
        assert_eq!(surface.open_conversation(), None);
        assert_eq!(surface.navigation_timeouts().len(), navigations_before);
    }

    #[tokio::test(start_paused = true)]
    async fn restore_renavigates_without_back_control() {
        let surface = on_messaging(fixtures::inbox()).await;
        surface.set_layout(Layout {
            back_button: false,
            ..Layout::default()
        });
        let locator = Locator::default();
        let handle = unread_conversations(&surface, &locator).await.remove(0);
        open_conversation(&surface, &Pacer::instant(), &handle).await.unwrap();

        let navigations_before = surface.navigation_timeouts().len();
        restore_list(&surface, &locator, &Pacer::instant()).await.unwrap();
        assert_eq!(surface.open_conversation(), None);
        assert_eq!(surface.navigation_timeouts().len(), navigations_before + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restore_fails_when_list_never_appears() {
        let surface = MemorySurface::new();
        surface.goto(crate::browser::selectors::FEED_URL, Duration::from_secs(5)).await.unwrap();
        surface.fail_next_navigations(2);
        let err = restore_list(&surface, &Locator::default(), &Pacer::instant())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::RestoreFailed(_)));
    }
}
