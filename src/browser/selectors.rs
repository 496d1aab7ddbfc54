//! Candidate lists for the messaging UI.
//!
//! This is the one place that changes when the platform's markup changes.

use std::time::Duration;

use crate::browser::locator::{CandidateList, Probe};

pub const HOME_URL: &str = "https://www.linkedin.com/";
pub const LOGIN_URL: &str = "https://www.linkedin.com/login";
pub const FEED_URL: &str = "https://www.linkedin.com/feed/";
pub const MESSAGING_URL: &str = "https://www.linkedin.com/messaging/";

/// Marker present only for an authenticated session.
pub fn authenticated_marker() -> CandidateList {
    CandidateList::new(
        "authenticated marker",
        vec![Probe::css(".feed-identity-module"), Probe::css(".global-nav")],
    )
    .with_timeout(Duration::from_secs(5))
}

pub fn sign_in_link() -> CandidateList {
    CandidateList::new("sign-in link", vec![Probe::css("a.nav__button-secondary")])
        .with_timeout(Duration::from_secs(5))
}

pub fn username_field() -> CandidateList {
    CandidateList::new("username field", vec![Probe::css("#username")])
        .with_timeout(Duration::from_secs(10))
}

pub fn password_field() -> CandidateList {
    CandidateList::new("password field", vec![Probe::css("#password")])
        .with_timeout(Duration::from_secs(5))
}

pub fn submit_button() -> CandidateList {
    CandidateList::new("submit button", vec![Probe::css("button[type='submit']")])
        .with_timeout(Duration::from_secs(5))
}

pub fn verification_pin_field() -> CandidateList {
    CandidateList::new(
        "verification PIN field",
        vec![
            Probe::css("input#input__email_verification_pin"),
            Probe::css("#verification-code"),
        ],
    )
}

/// Either outcome of a submitted login form.
pub fn post_login_marker() -> CandidateList {
    CandidateList::new(
        "post-login marker",
        vec![
            Probe::css(".feed-identity-module"),
            Probe::css(".global-nav"),
            Probe::css("input#input__email_verification_pin"),
            Probe::css("#verification-code"),
        ],
    )
    .with_timeout(Duration::from_secs(30))
}

/// The messaging interface as a whole.
pub fn messaging_interface() -> CandidateList {
    CandidateList::new(
        "messaging interface",
        vec![
            Probe::css(".msg-conversations-container__conversations-list"),
            Probe::css(".msg-conversations-container"),
            Probe::css(".msg-overlay-list-bubble"),
            Probe::css(".msg-conversation-listitem"),
            Probe::css(".msg-conversation-card"),
            Probe::css(".msg-selectable-entity"),
            Probe::css(".msg-thread"),
            Probe::css(".msg-thread-list"),
            Probe::css(".msg-s-message-list-container"),
        ],
    )
    .with_timeout(Duration::from_secs(3))
}

/// Entries of the conversation list.
pub fn conversation_items() -> CandidateList {
    CandidateList::new(
        "conversation items",
        vec![
            Probe::css(".msg-conversation-listitem"),
            Probe::css(".msg-conversation-card"),
            Probe::css(".msg-thread-list-item"),
            Probe::css(".msg-selectable-entity"),
            Probe::css("[data-control-name='overlay.conversation_item']"),
        ],
    )
    .with_timeout(Duration::from_secs(2))
}

/// Thread link inside one conversation entry. Its href identifies the thread.
pub fn conversation_link() -> CandidateList {
    CandidateList::new(
        "conversation link",
        vec![
            Probe::css("a.msg-conversation-listitem__link"),
            Probe::css("a[href*='/messaging/thread/']"),
        ],
    )
}

/// Unread indicators, queried inside one conversation entry.
pub fn unread_indicators() -> CandidateList {
    CandidateList::new(
        "unread indicator",
        vec![
            Probe::css(".msg-conversation-card__unread-count"),
            Probe::css(".notification-badge--show"),
            Probe::css(".msg-conversation-listitem--unread"),
            Probe::css(".artdeco-badge"),
            Probe::css(".artdeco-notification-badge"),
        ],
    )
}

/// Participant title inside one conversation entry, for the bold fallback.
pub fn conversation_title() -> CandidateList {
    CandidateList::new(
        "conversation title",
        vec![
            Probe::css(".msg-conversation-listitem__participant-names"),
            Probe::css(".msg-conversation-card__participant-names"),
        ],
    )
}

/// Container of an opened conversation's messages.
pub fn conversation_view() -> CandidateList {
    CandidateList::new(
        "conversation view",
        vec![Probe::css(".msg-s-message-list-container")],
    )
    .with_timeout(Duration::from_secs(10))
}

/// Sender name in an opened conversation.
pub fn profile_title() -> CandidateList {
    CandidateList::new(
        "profile title",
        [
            ".msg-entity-lockup__entity-title",
            ".profile-card-one-to-one__profile-title",
            ".msg-thread__profile-info h2",
            ".msg-overlay-bubble-header__title",
            ".msg-conversation-card__participant-names",
            ".msg-s-message-group__profile-link strong",
            ".msg-s-message-group__name",
            ".msg-thread__link-to-profile",
            ".artdeco-entity-lockup__title",
        ]
        .into_iter()
        .map(Probe::non_empty)
        .collect(),
    )
}

/// Message bodies in an opened conversation.
pub fn message_bodies() -> CandidateList {
    CandidateList::new(
        "message bodies",
        [
            ".msg-s-event-listitem__body",
            ".msg-s-event__content",
            ".msg-thread__message-text",
            ".msg-s-message-group__content",
        ]
        .into_iter()
        .map(Probe::non_empty)
        .collect(),
    )
    .with_timeout(Duration::from_secs(1))
}

/// Controls that return from a conversation to the list.
pub fn back_button() -> CandidateList {
    CandidateList::new(
        "back button",
        vec![
            Probe::css(".msg-overlay-bubble-header__back-button"),
            Probe::css(".msg-thread-actions__back-button"),
            Probe::css("button[data-control-name='overlay.close_conversation_window']"),
        ],
    )
}

/// List view after a restore.
pub fn conversation_list() -> CandidateList {
    CandidateList::new(
        "conversation list",
        vec![
            Probe::css(".msg-conversations-container"),
            Probe::css(".msg-conversation-listitem"),
        ],
    )
    .with_timeout(Duration::from_secs(10))
}

/// Reply input surface.
pub fn reply_input() -> CandidateList {
    CandidateList::new(
        "reply input",
        vec![
            Probe::css(".msg-form__contenteditable[contenteditable='true'][role='textbox']"),
            Probe::css("div.msg-form__contenteditable[contenteditable='true']"),
            Probe::css("div[role='textbox'][contenteditable='true']"),
            Probe::with_attribute("div[contenteditable='true']", "aria-label", "Nachricht"),
            Probe::with_attribute("div[contenteditable='true']", "aria-label", "Message"),
            Probe::css(".msg-form__message-texteditor div[contenteditable='true']"),
            Probe::css("form div[contenteditable='true']"),
            Probe::css("div.msg-form__contenteditable"),
            Probe::css("div[contenteditable='true']"),
        ],
    )
    .with_timeout(Duration::from_secs(2))
}

/// Send control.
pub fn send_control() -> CandidateList {
    CandidateList::new(
        "send control",
        vec![
            Probe::css("button.msg-form__send-button"),
            Probe::css("form button[type='submit']"),
            Probe::with_text("button", "Send"),
            Probe::with_text("button", "Senden"),
            Probe::css("footer button"),
            Probe::css("button.artdeco-button--primary"),
        ],
    )
    .with_timeout(Duration::from_secs(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_list_has_probes() {
        let lists = [
            authenticated_marker(),
            messaging_interface(),
            conversation_items(),
            unread_indicators(),
            conversation_title(),
            profile_title(),
            message_bodies(),
            back_button(),
            reply_input(),
            send_control(),
        ];
        for list in lists {
            assert!(!list.probes.is_empty(), "{} has no probes", list.target);
        }
    }

    #[test]
    fn profile_and_body_probes_require_text() {
        use crate::browser::locator::ProbePredicate;
        assert!(profile_title()
            .probes
            .iter()
            .all(|p| p.predicate == Some(ProbePredicate::NonEmptyText)));
        assert!(message_bodies()
            .probes
            .iter()
            .all(|p| p.predicate == Some(ProbePredicate::NonEmptyText)));
    }
}
